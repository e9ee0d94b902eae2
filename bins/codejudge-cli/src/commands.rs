// CLI commands: local judging and problem file inspection
use anyhow::{bail, Context, Result};
use codejudge_common::config::{CacheTtls, Config};
use codejudge_common::types::{Language, Problem, SubmissionOutcome, SubmitRequest};
use codejudge_engine::cache::MemoryCache;
use codejudge_engine::compiler::ToolchainRegistry;
use codejudge_engine::executor::SubmissionExecutor;
use codejudge_engine::gateway::ProblemGateway;
use codejudge_engine::store::{FileProblemStore, ProblemStore};
use codejudge_engine::JudgeError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct JudgeOptions {
    pub problem_id: String,
    pub source: PathBuf,
    pub language: String,
    pub problems: PathBuf,
    pub toolchains: PathBuf,
    pub workspace: PathBuf,
    pub timeout_ms: u64,
    pub parallel: usize,
}

/// Run the full judging pipeline on a local file and print the response
pub async fn judge(options: JudgeOptions) -> Result<()> {
    let code = fs::read_to_string(&options.source)
        .with_context(|| format!("Failed to read {}", options.source.display()))?;

    let config = Config {
        problems_path: options.problems.clone(),
        workspace_root: options.workspace,
        toolchains_path: options.toolchains,
        test_timeout_ms: options.timeout_ms,
        max_parallel_tests: options.parallel.max(1),
        ..Config::default()
    };

    let gateway = Arc::new(ProblemGateway::new(
        Arc::new(FileProblemStore::new(&config.problems_path)),
        Arc::new(MemoryCache::new()),
        CacheTtls::default(),
    ));
    let toolchains = ToolchainRegistry::load_or_default(&config.toolchains_path)?;
    let executor = SubmissionExecutor::from_config(&config, gateway, toolchains);

    let request = SubmitRequest {
        language: Language::from_tag(&options.language),
        code,
        problem_id: options.problem_id.clone(),
    };

    println!("→ Judging {} against problem {}", options.source.display(), options.problem_id);
    println!("  Language: {}", request.language);
    println!();

    let outcome = match executor.submit(&request).await {
        Ok(outcome) => outcome,
        Err(JudgeError::NotFound(_)) => {
            bail!("Problem '{}' not found in {}", options.problem_id, options.problems.display())
        }
        Err(e) => return Err(e).context("Judging failed"),
    };

    for line in summarize(&outcome) {
        println!("{}", line);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

/// Print id, title and test count for every problem in a file
pub async fn list_problems(path: &Path) -> Result<()> {
    let store = FileProblemStore::new(path);
    let problems = store
        .find_all()
        .await
        .with_context(|| format!("Failed to load problems from {}", path.display()))?;

    if problems.is_empty() {
        println!("No problems found in {}", path.display());
        return Ok(());
    }

    for row in problem_rows(&problems) {
        println!("{}", row);
    }
    Ok(())
}

fn problem_rows(problems: &[Problem]) -> Vec<String> {
    problems
        .iter()
        .map(|p| format!("{:<24} {:<40} {} tests", p.id, p.title, p.test_cases.len()))
        .collect()
}

fn summarize(outcome: &SubmissionOutcome) -> Vec<String> {
    match outcome {
        SubmissionOutcome::CompilationFailed { details, .. } => {
            let mut lines = vec!["✗ Compilation failed".to_string()];
            lines.extend(details.lines().map(|l| format!("    {}", l)));
            lines
        }
        SubmissionOutcome::Judged { results } => {
            let passed = results.iter().filter(|r| r.passed).count();
            let mut lines: Vec<String> = results
                .iter()
                .map(|r| {
                    let mark = if r.passed { "✓" } else { "✗" };
                    format!("  {} Test {}: {}", mark, r.test_index, r.output.lines().next().unwrap_or(""))
                })
                .collect();
            lines.push(format!("  Passed {} / {}", passed, results.len()));
            lines
        }
    }
}
