// Runtime configuration, read from the environment at startup

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Cache lifetimes for each population path.
///
/// A single problem gets a different TTL depending on whether it was
/// cached by a direct lookup or by the submission path. Both values are
/// kept as separate knobs on purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtls {
    pub problem_list_secs: u64,
    pub problem_secs: u64,
    pub submission_problem_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            problem_list_secs: 60 * 60 * 3,
            problem_secs: 60 * 60,
            submission_problem_secs: 60 * 60 * 3,
        }
    }
}

/// Process isolation for executed submissions.
///
/// Disabled by default: submitted binaries then run with the judge's own
/// privileges and no resource limits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IsolationConfig {
    pub enabled: bool,
    pub memory_limit_mb: Option<u64>,
    pub cpu_time_limit_secs: Option<u64>,
    pub deny_network: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub redis_url: String,
    pub problems_path: PathBuf,
    pub workspace_root: PathBuf,
    pub toolchains_path: PathBuf,
    pub compile_timeout_ms: u64,
    pub test_timeout_ms: u64,
    /// Per-stream cap on captured test output
    pub output_limit_bytes: u64,
    pub max_parallel_tests: usize,
    pub cache_ttls: CacheTtls,
    pub isolation: IsolationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            problems_path: PathBuf::from("data/problems.json"),
            workspace_root: PathBuf::from("submissions"),
            toolchains_path: PathBuf::from("config/toolchains.json"),
            compile_timeout_ms: 10_000,
            test_timeout_ms: 5_000,
            output_limit_bytes: 1024 * 1024,
            max_parallel_tests: 4,
            cache_ttls: CacheTtls::default(),
            isolation: IsolationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let ttl_defaults = CacheTtls::default();

        let sandbox_enabled = parse_or(&lookup, "SANDBOX_ENABLED", false)?;
        let isolation = IsolationConfig {
            enabled: sandbox_enabled,
            memory_limit_mb: parse_opt(&lookup, "SANDBOX_MEMORY_MB")?,
            cpu_time_limit_secs: parse_opt(&lookup, "SANDBOX_CPU_SECS")?,
            deny_network: parse_or(&lookup, "SANDBOX_DENY_NETWORK", sandbox_enabled)?,
        };

        let max_parallel_tests: usize = parse_or(&lookup, "MAX_PARALLEL_TESTS", defaults.max_parallel_tests)?;
        if max_parallel_tests == 0 {
            bail!("MAX_PARALLEL_TESTS must be at least 1");
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            problems_path: lookup("PROBLEMS_PATH").map(PathBuf::from).unwrap_or(defaults.problems_path),
            workspace_root: lookup("WORKSPACE_ROOT").map(PathBuf::from).unwrap_or(defaults.workspace_root),
            toolchains_path: lookup("TOOLCHAINS_PATH").map(PathBuf::from).unwrap_or(defaults.toolchains_path),
            compile_timeout_ms: parse_or(&lookup, "COMPILE_TIMEOUT_MS", defaults.compile_timeout_ms)?,
            test_timeout_ms: parse_or(&lookup, "TEST_TIMEOUT_MS", defaults.test_timeout_ms)?,
            output_limit_bytes: parse_or(&lookup, "OUTPUT_LIMIT_BYTES", defaults.output_limit_bytes)?,
            max_parallel_tests,
            cache_ttls: CacheTtls {
                problem_list_secs: parse_or(&lookup, "CACHE_LIST_TTL_SECS", ttl_defaults.problem_list_secs)?,
                problem_secs: parse_or(&lookup, "CACHE_PROBLEM_TTL_SECS", ttl_defaults.problem_secs)?,
                submission_problem_secs: parse_or(
                    &lookup,
                    "CACHE_SUBMIT_PROBLEM_TTL_SECS",
                    ttl_defaults.submission_problem_secs,
                )?,
            },
            isolation,
        })
    }
}

fn parse_opt<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
