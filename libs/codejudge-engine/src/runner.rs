/// Test Runner - fans a compiled submission out over its test cases
///
/// One fresh process per test case, all launched without waiting for each
/// other (bounded by a semaphore), each fed its input on stdin. Results
/// are joined in arrival order and attributed by test index.
///
/// A single test failing to launch, crashing or timing out is recorded in
/// that test's result; it never aborts its siblings.

use crate::evaluator::{evaluate_test, ExecutionOutput, ResultAggregator};
use crate::error::Result;
use crate::metrics::TEST_EXECUTIONS_TOTAL;
use codejudge_common::config::IsolationConfig;
use codejudge_common::types::{TestCase, TestResult};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Spawn retries on ETXTBSY: the artifact is still open for writing in a
/// process that forked concurrently. Retrying shortly after succeeds.
const SPAWN_ATTEMPTS: u32 = 5;

/// Per-stream capture cap when none is configured
pub const DEFAULT_OUTPUT_LIMIT_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TestRunner {
    timeout: Duration,
    max_parallel: usize,
    output_limit_bytes: u64,
    isolation: IsolationConfig,
}

impl TestRunner {
    pub fn new(timeout: Duration, max_parallel: usize, isolation: IsolationConfig) -> Self {
        Self {
            timeout,
            max_parallel: max_parallel.max(1),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            isolation,
        }
    }

    /// Cap on captured bytes per stream; a run writing more fails its test
    pub fn with_output_limit(mut self, bytes: u64) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    /// Run every test case and return results ordered by test index
    pub async fn run_all(
        &self,
        executable: &Path,
        workdir: &Path,
        test_cases: &[TestCase],
    ) -> Result<Vec<TestResult>> {
        let permits = Semaphore::new(self.max_parallel);
        let mut aggregator = ResultAggregator::new(test_cases.len());

        let mut pending: FuturesUnordered<_> = test_cases
            .iter()
            .enumerate()
            .map(|(idx, test_case)| {
                let permits = &permits;
                async move {
                    let _permit = permits.acquire().await.ok();
                    let output = self.execute(executable, workdir, &test_case.input).await;
                    let result = evaluate_test(idx + 1, &output, test_case);
                    let outcome = if output.timed_out {
                        "timeout"
                    } else if output.output_limit_exceeded {
                        "output_limit"
                    } else if result.passed {
                        "passed"
                    } else {
                        "failed"
                    };
                    TEST_EXECUTIONS_TOTAL.with_label_values(&[outcome]).inc();
                    debug!(
                        test = idx + 1,
                        outcome,
                        execution_ms = output.execution_time_ms,
                        "Test process finished"
                    );
                    result
                }
            })
            .collect();

        while let Some(result) = pending.next().await {
            aggregator.record(result)?;
        }

        Ok(aggregator.into_results()?)
    }

    /// Run the executable once with `input` on stdin
    pub async fn execute(&self, executable: &Path, workdir: &Path, input: &str) -> ExecutionOutput {
        let start = Instant::now();

        let mut child = match self.spawn(executable, workdir).await {
            Ok(child) => child,
            Err(e) => {
                warn!(executable = %executable.display(), error = %e, "Failed to launch test process");
                return ExecutionOutput {
                    error: Some(format!("Failed to launch {}: {}", executable.display(), e)),
                    ..Default::default()
                };
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.output_limit_bytes;
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // The program may exit without reading its input
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Test process closed stdin early");
                }
            }
        };
        let run = async {
            let (_, stdout, stderr) = tokio::join!(
                feed,
                read_capped(stdout, limit),
                read_capped(stderr, limit)
            );
            let (stdout, stdout_over) = stdout?;
            let (stderr, stderr_over) = stderr?;
            let overflowed = stdout_over || stderr_over;
            if overflowed {
                // The capture pipe is already closed; do not wait for SIGPIPE
                let _ = child.start_kill();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((stdout, stderr, status, overflowed))
        };

        let result = tokio::time::timeout(self.timeout, run).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok((stdout, stderr, status, overflowed))) => {
                let error = if overflowed {
                    warn!(limit_bytes = limit, "Test process exceeded output limit");
                    Some(format!("Output limit exceeded ({} bytes)", limit))
                } else if status.success() {
                    None
                } else {
                    Some(format!("Process exited with {}", status))
                };
                ExecutionOutput {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    error,
                    timed_out: false,
                    output_limit_exceeded: overflowed,
                    execution_time_ms,
                }
            }
            Ok(Err(e)) => ExecutionOutput {
                error: Some(format!("Failed to collect process output: {}", e)),
                execution_time_ms,
                ..Default::default()
            },
            Err(_) => {
                // Dropping the child future kills the process
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Test process timed out");
                ExecutionOutput {
                    error: Some(format!("Time limit exceeded after {}ms", self.timeout.as_millis())),
                    timed_out: true,
                    execution_time_ms,
                    ..Default::default()
                }
            }
        }
    }

    async fn spawn(&self, executable: &Path, workdir: &Path) -> std::io::Result<Child> {
        let argv = command_line(executable, &self.isolation);
        let mut attempt = 1;
        loop {
            let mut cmd = Command::new(&argv[0]);
            cmd.args(&argv[1..])
                .current_dir(workdir)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if self.isolation.enabled {
                cmd.env_clear();
            }

            match cmd.spawn() {
                Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                other => return other,
            }
        }
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes.
///
/// Returns whether the stream had more than `limit` bytes. The pipe is
/// dropped as soon as the cap is passed.
async fn read_capped<R>(reader: Option<R>, limit: u64) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(reader) = reader {
        reader.take(limit.saturating_add(1)).read_to_end(&mut buf).await?;
    }
    let overflowed = buf.len() as u64 > limit;
    if overflowed {
        buf.truncate(limit as usize);
    }
    Ok((buf, overflowed))
}

/// Full argv for one test run, including isolation wrappers when enabled
pub fn command_line(executable: &Path, isolation: &IsolationConfig) -> Vec<OsString> {
    let mut argv: Vec<OsString> = Vec::new();

    if isolation.enabled {
        let mut limits = Vec::new();
        if let Some(mb) = isolation.memory_limit_mb {
            limits.push(format!("--as={}", mb * 1024 * 1024));
        }
        if let Some(secs) = isolation.cpu_time_limit_secs {
            limits.push(format!("--cpu={}", secs));
        }
        if !limits.is_empty() {
            argv.push("prlimit".into());
            argv.extend(limits.into_iter().map(OsString::from));
            argv.push("--".into());
        }
        if isolation.deny_network {
            for arg in ["unshare", "--net", "--map-root-user", "--"] {
                argv.push(arg.into());
            }
        }
    }

    argv.push(executable.as_os_str().to_owned());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_script;

    fn runner(timeout_ms: u64, max_parallel: usize) -> TestRunner {
        TestRunner::new(Duration::from_millis(timeout_ms), max_parallel, IsolationConfig::default())
    }

    fn case(input: &str, expected: &str) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected: expected.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sum_program_passes() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "read a b\necho $((a + b))");

        let results = runner(5_000, 4)
            .run_all(&exe, dir.path(), &[case("2 3\n", "5"), case("10 -4\n", "6"), case("1 1\n", "3")])
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[0],
            TestResult { test_index: 1, passed: true, output: "5".to_string() }
        );
        assert!(results[1].passed);
        assert_eq!(
            results[2],
            TestResult { test_index: 3, passed: false, output: "2".to_string() }
        );
    }

    #[tokio::test]
    async fn test_results_ordered_despite_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "read d\nsleep \"$d\"\necho \"$d\"");

        let cases = vec![case("0.3\n", "0.3"), case("0.1\n", "0.1"), case("0\n", "0")];
        let results = runner(5_000, 3).run_all(&exe, dir.path(), &cases).await.unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.test_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[tokio::test]
    async fn test_stderr_and_exit_status_fail_only_their_test() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(
            dir.path(),
            "solution.out",
            "read mode\ncase \"$mode\" in\n  err) echo boom >&2 ;;\n  exit) exit 3 ;;\n  *) echo ok ;;\nesac",
        );

        let cases = vec![case("ok\n", "ok"), case("err\n", "ok"), case("exit\n", "ok")];
        let results = runner(5_000, 2).run_all(&exe, dir.path(), &cases).await.unwrap();

        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert_eq!(results[1].output, "boom\n");
        assert!(!results[2].passed);
        assert!(results[2].output.starts_with("Process exited with"), "{}", results[2].output);
        assert!(results[2].output.contains('3'));
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "read x\nif [ \"$x\" = hang ]; then sleep 10; fi\necho \"$x\"");

        let start = Instant::now();
        let results = runner(200, 2)
            .run_all(&exe, dir.path(), &[case("hang\n", "hang"), case("fast\n", "fast")])
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(
            results[0],
            TestResult { test_index: 1, passed: false, output: "Time limit exceeded after 200ms".to_string() }
        );
        assert!(results[1].passed);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_every_test() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("solution.out");

        let results = runner(1_000, 1)
            .run_all(&exe, dir.path(), &[case("", "x"), case("", "y")])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.passed);
            assert!(result.output.starts_with("Failed to launch"));
        }
    }

    #[tokio::test]
    async fn test_program_ignoring_large_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "echo done");
        let input = "x".repeat(1024 * 1024);

        let results = runner(5_000, 1).run_all(&exe, dir.path(), &[case(&input, "done")]).await.unwrap();
        assert!(results[0].passed);
    }

    #[tokio::test]
    async fn test_output_limit_fails_the_test() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(
            dir.path(),
            "solution.out",
            "read n\nif [ \"$n\" = big ]; then head -c 4000000 /dev/zero | tr '\\0' a; else echo ok; fi",
        );

        let start = Instant::now();
        let results = runner(5_000, 2)
            .with_output_limit(1024)
            .run_all(&exe, dir.path(), &[case("big\n", "ok"), case("small\n", "ok")])
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(
            results[0],
            TestResult { test_index: 1, passed: false, output: "Output limit exceeded (1024 bytes)".to_string() }
        );
        assert!(results[1].passed);
    }

    #[tokio::test]
    async fn test_output_at_limit_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "echo ab");

        let output = runner(5_000, 1).with_output_limit(3).execute(&exe, dir.path(), "").await;
        assert!(!output.output_limit_exceeded);
        assert_eq!(output.stdout, "ab\n");
        assert!(output.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_suite() {
        let dir = tempfile::tempdir().unwrap();
        let results = runner(1_000, 1)
            .run_all(&dir.path().join("never-run"), dir.path(), &[])
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_script(dir.path(), "solution.out", "sleep 0.2\necho ok");
        let cases: Vec<TestCase> = (0..4).map(|_| case("", "ok")).collect();

        let start = Instant::now();
        let results = runner(5_000, 1).run_all(&exe, dir.path(), &cases).await.unwrap();
        assert!(results.iter().all(|r| r.passed));
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[test]
    fn test_command_line_without_isolation() {
        let argv = command_line(Path::new("/w/solution.out"), &IsolationConfig::default());
        assert_eq!(argv, vec![OsString::from("/w/solution.out")]);
    }

    #[test]
    fn test_command_line_with_isolation() {
        let isolation = IsolationConfig {
            enabled: true,
            memory_limit_mb: Some(256),
            cpu_time_limit_secs: Some(2),
            deny_network: true,
        };
        let argv: Vec<String> = command_line(Path::new("/w/solution.out"), &isolation)
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(
            argv,
            vec![
                "prlimit",
                "--as=268435456",
                "--cpu=2",
                "--",
                "unshare",
                "--net",
                "--map-root-user",
                "--",
                "/w/solution.out"
            ]
        );
    }
}
