/// Submission Executor - end-to-end orchestration of one submission
///
/// ```text
/// ResolveProblem → PrepareWorkspace → Compile ─┬─ failed → CompilationFailed
///                                               └─ ok → RunTests → Judged
/// ```
///
/// Cleanup runs on every terminal path once a workspace exists. An
/// unknown problem fails before any workspace is created.

use crate::compiler::{CompileOutcome, Compiler, ToolchainRegistry, ARTIFACT_NAME};
use crate::error::Result;
use crate::gateway::ProblemGateway;
use crate::metrics::{SUBMISSIONS_TOTAL, SUBMISSION_DURATION_SECONDS};
use crate::runner::TestRunner;
use crate::workspace::{Workspace, WorkspaceManager};
use codejudge_common::config::Config;
use codejudge_common::types::{Problem, SubmissionOutcome, SubmitRequest};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};
use uuid::Uuid;

pub struct SubmissionExecutor {
    gateway: Arc<ProblemGateway>,
    workspaces: WorkspaceManager,
    compiler: Compiler,
    runner: TestRunner,
}

impl SubmissionExecutor {
    pub fn new(
        gateway: Arc<ProblemGateway>,
        workspaces: WorkspaceManager,
        compiler: Compiler,
        runner: TestRunner,
    ) -> Self {
        Self {
            gateway,
            workspaces,
            compiler,
            runner,
        }
    }

    pub fn from_config(config: &Config, gateway: Arc<ProblemGateway>, toolchains: ToolchainRegistry) -> Self {
        Self::new(
            gateway,
            WorkspaceManager::new(&config.workspace_root),
            Compiler::new(toolchains, Duration::from_millis(config.compile_timeout_ms)),
            TestRunner::new(
                Duration::from_millis(config.test_timeout_ms),
                config.max_parallel_tests,
                config.isolation.clone(),
            )
            .with_output_limit(config.output_limit_bytes),
        )
    }

    /// Judge one submission against its problem's test cases
    #[instrument(skip(self, request), fields(problem_id = %request.problem_id, language = %request.language))]
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmissionOutcome> {
        let start = Instant::now();
        let problem = self.gateway.get_problem_for_submission(&request.problem_id).await?;

        let submission_id = Uuid::new_v4();
        let workspace = self.workspaces.prepare(submission_id).await?;
        let source_path = workspace.path(self.compiler.source_file(request.language));
        let artifact_path = workspace.path(ARTIFACT_NAME);

        let result = self.judge(&workspace, request, &problem, &source_path, &artifact_path).await;
        workspace.cleanup(&[source_path, artifact_path]).await;

        let elapsed = start.elapsed();
        SUBMISSION_DURATION_SECONDS.observe(elapsed.as_secs_f64());
        match &result {
            Ok(outcome) => {
                SUBMISSIONS_TOTAL.with_label_values(&[outcome.verdict()]).inc();
                info!(
                    submission_id = %submission_id,
                    verdict = outcome.verdict(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Submission judged"
                );
            }
            Err(e) => {
                SUBMISSIONS_TOTAL.with_label_values(&["internal_error"]).inc();
                error!(submission_id = %submission_id, error = %e, "Submission failed");
            }
        }

        result
    }

    async fn judge(
        &self,
        workspace: &Workspace,
        request: &SubmitRequest,
        problem: &Problem,
        source_path: &Path,
        artifact_path: &Path,
    ) -> Result<SubmissionOutcome> {
        let file_name = self.compiler.source_file(request.language);
        workspace.write_source(file_name, &request.code).await?;

        if let CompileOutcome::Failed { diagnostics } =
            self.compiler.compile(request.language, source_path, artifact_path).await
        {
            info!(submission_id = %workspace.submission_id(), "Compilation failed");
            return Ok(SubmissionOutcome::compilation_failed(diagnostics));
        }

        info!(
            submission_id = %workspace.submission_id(),
            test_cases = problem.test_cases.len(),
            "Compiled; running tests"
        );
        let results = self
            .runner
            .run_all(artifact_path, workspace.dir(), &problem.test_cases)
            .await?;

        Ok(SubmissionOutcome::Judged { results })
    }
}
