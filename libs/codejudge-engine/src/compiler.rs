/// Compiler Invoker - turns submitted source into a workspace executable
///
/// Toolchains come from `config/toolchains.json` when present, otherwise
/// from the built-in gcc/g++ defaults. Any failure to produce an artifact
/// (rejected source, missing compiler, timeout) is a compile failure
/// carrying diagnostic text, never a pipeline error.

use anyhow::{bail, Context};
use codejudge_common::types::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File name of the compiled executable inside a workspace
pub const ARTIFACT_NAME: &str = "solution.out";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toolchain {
    pub compiler: String,
    /// Arguments; `{source}` and `{output}` are substituted per submission
    pub args: Vec<String>,
    pub source_file: String,
}

impl Toolchain {
    fn gnu(compiler: &str, source_file: &str) -> Self {
        Self {
            compiler: compiler.to_string(),
            args: vec!["{source}".to_string(), "-o".to_string(), "{output}".to_string()],
            source_file: source_file.to_string(),
        }
    }

    pub fn render_args(&self, source: &Path, output: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{source}", &source).replace("{output}", &output))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolchainEntry {
    language: String,
    #[serde(flatten)]
    toolchain: Toolchain,
}

#[derive(Debug, Deserialize)]
struct ToolchainsJson {
    toolchains: Vec<ToolchainEntry>,
}

/// Toolchain per language. C++ doubles as the fallback for unknown tags.
#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    c: Toolchain,
    cpp: Toolchain,
}

impl Default for ToolchainRegistry {
    fn default() -> Self {
        Self {
            c: Toolchain::gnu("gcc", "solution.c"),
            cpp: Toolchain::gnu("g++", "solution.cpp"),
        }
    }
}

impl ToolchainRegistry {
    pub fn new(c: Toolchain, cpp: Toolchain) -> Self {
        Self { c, cpp }
    }

    /// Load toolchains from a JSON file; languages it omits keep their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed: ToolchainsJson = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let mut registry = Self::default();
        for entry in parsed.toolchains {
            if entry.toolchain.compiler.is_empty() {
                bail!("Toolchain for '{}' has an empty compiler", entry.language);
            }
            match Language::from_tag(&entry.language) {
                Language::C => registry.c = entry.toolchain,
                Language::Cpp => registry.cpp = entry.toolchain,
            }
        }
        Ok(registry)
    }

    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            info!(path = %path.display(), "Loading toolchain configuration");
            Self::load(path)
        } else {
            info!(path = %path.display(), "No toolchain configuration found; using gcc/g++ defaults");
            Ok(Self::default())
        }
    }

    pub fn get(&self, language: Language) -> &Toolchain {
        match language {
            Language::C => &self.c,
            Language::Cpp => &self.cpp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    Failed { diagnostics: String },
}

#[derive(Debug, Clone)]
pub struct Compiler {
    registry: ToolchainRegistry,
    timeout: Duration,
}

impl Compiler {
    pub fn new(registry: ToolchainRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn source_file(&self, language: Language) -> &str {
        &self.registry.get(language).source_file
    }

    pub async fn compile(&self, language: Language, source: &Path, output: &Path) -> CompileOutcome {
        let toolchain = self.registry.get(language);
        let args = toolchain.render_args(source, output);
        debug!(compiler = %toolchain.compiler, ?args, "Invoking toolchain");

        let child = Command::new(&toolchain.compiler)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(compiler = %toolchain.compiler, error = %e, "Failed to invoke toolchain");
                return CompileOutcome::Failed {
                    diagnostics: format!("Failed to invoke {}: {}", toolchain.compiler, e),
                };
            }
        };

        let start = Instant::now();
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return CompileOutcome::Failed {
                    diagnostics: format!("Failed to wait for {}: {}", toolchain.compiler, e),
                };
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Compilation timed out");
                return CompileOutcome::Failed {
                    diagnostics: format!("Compilation timed out after {}ms", self.timeout.as_millis()),
                };
            }
        };

        debug!(
            language = %language,
            status = %output.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Toolchain finished"
        );

        if output.status.success() {
            return CompileOutcome::Success;
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let diagnostics = if stderr.is_empty() {
            format!("{} exited with {}", toolchain.compiler, output.status)
        } else {
            stderr
        };
        CompileOutcome::Failed { diagnostics }
    }
}
