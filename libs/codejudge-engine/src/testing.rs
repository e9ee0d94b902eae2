// Shared fixtures for process-level tests. Shell scripts stand in for
// compiled submissions so the pipeline runs without a C toolchain.

use crate::compiler::Toolchain;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// A "toolchain" that installs the submitted shell script as the artifact
pub(crate) fn script_toolchain(source_file: &str) -> Toolchain {
    Toolchain {
        compiler: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            "cp \"$0\" \"$1\" && chmod +x \"$1\"".to_string(),
            "{source}".to_string(),
            "{output}".to_string(),
        ],
        source_file: source_file.to_string(),
    }
}

/// Write an executable `/bin/sh` script into `dir`
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
