/// Problem Store - persistent source of problem documents
///
/// The gateway only needs two queries from the store: every problem, and
/// one problem by id. Anything else about how documents are kept is the
/// store's business.

use crate::error::{JudgeError, Result};
use async_trait::async_trait;
use codejudge_common::types::Problem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Problem>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Problem>>;
}

/// Store backed by a JSON array of problem documents.
///
/// The file is read on every query, so edits made by the authoring side
/// become visible as soon as the corresponding cache entry expires.
pub struct FileProblemStore {
    path: PathBuf,
}

impl FileProblemStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Problem>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| JudgeError::Store(format!("failed to read {}: {}", self.path.display(), e)))?;

        let problems: Vec<Problem> = serde_json::from_str(&content)
            .map_err(|e| JudgeError::Store(format!("failed to parse {}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), count = problems.len(), "Loaded problem documents");
        Ok(problems)
    }
}

#[async_trait]
impl ProblemStore for FileProblemStore {
    async fn find_all(&self) -> Result<Vec<Problem>> {
        self.read_all().await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Problem>> {
        Ok(self.read_all().await?.into_iter().find(|p| p.id == id))
    }
}

/// In-process store; counts queries so callers can observe cache behaviour
#[derive(Default)]
pub struct InMemoryProblemStore {
    problems: RwLock<Vec<Problem>>,
    queries: AtomicUsize,
}

impl InMemoryProblemStore {
    pub fn new(problems: Vec<Problem>) -> Self {
        Self {
            problems: RwLock::new(problems),
            queries: AtomicUsize::new(0),
        }
    }

    /// Insert or replace a problem by id
    pub fn upsert(&self, problem: Problem) {
        let mut problems = self.problems.write().unwrap_or_else(|e| e.into_inner());
        match problems.iter_mut().find(|p| p.id == problem.id) {
            Some(existing) => *existing = problem,
            None => problems.push(problem),
        }
    }

    pub fn remove(&self, id: &str) {
        let mut problems = self.problems.write().unwrap_or_else(|e| e.into_inner());
        problems.retain(|p| p.id != id);
    }

    /// Number of queries served so far
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<Problem> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.problems.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ProblemStore for InMemoryProblemStore {
    async fn find_all(&self) -> Result<Vec<Problem>> {
        Ok(self.snapshot())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Problem>> {
        Ok(self.snapshot().into_iter().find(|p| p.id == id))
    }
}
