/// Problem Cache Gateway - read-through cache in front of the problem store
///
/// Lookup order is always cache first, then store. A store hit is written
/// back with the TTL of the path that fetched it. Nothing ever invalidates
/// an entry, so a reader may see a document up to one TTL old.

use crate::cache::CacheBackend;
use crate::error::{JudgeError, Result};
use crate::metrics::CACHE_LOOKUPS_TOTAL;
use crate::store::ProblemStore;
use codejudge_common::config::CacheTtls;
use codejudge_common::redis::{problem_key, PROBLEMS_KEY};
use codejudge_common::types::Problem;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ProblemGateway {
    store: Arc<dyn ProblemStore>,
    cache: Arc<dyn CacheBackend>,
    ttls: CacheTtls,
}

impl ProblemGateway {
    pub fn new(store: Arc<dyn ProblemStore>, cache: Arc<dyn CacheBackend>, ttls: CacheTtls) -> Self {
        Self { store, cache, ttls }
    }

    /// Every problem. An empty store is reported as not found.
    pub async fn get_all_problems(&self) -> Result<Vec<Problem>> {
        if let Some(problems) = self.read_cached::<Vec<Problem>>("problems", PROBLEMS_KEY).await {
            info!(count = problems.len(), "Serving problem list from cache");
            return Ok(problems);
        }

        let problems = self.store.find_all().await?;
        if problems.is_empty() {
            return Err(JudgeError::NotFound("No Questions Found".to_string()));
        }

        self.write_cached(PROBLEMS_KEY, self.ttls.problem_list_secs, &problems).await;
        info!(count = problems.len(), "Fetched problem list from store");
        Ok(problems)
    }

    /// Single problem, cached with the direct-lookup TTL
    pub async fn get_problem(&self, id: &str) -> Result<Problem> {
        self.lookup_problem(id, self.ttls.problem_secs).await
    }

    /// Single problem, cached with the submission-path TTL
    pub async fn get_problem_for_submission(&self, id: &str) -> Result<Problem> {
        self.lookup_problem(id, self.ttls.submission_problem_secs).await
    }

    async fn lookup_problem(&self, id: &str, ttl_secs: u64) -> Result<Problem> {
        let key = problem_key(id);
        if let Some(problem) = self.read_cached::<Problem>("problem", &key).await {
            info!(problem_id = %id, "Serving problem from cache");
            return Ok(problem);
        }

        let problem = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| JudgeError::NotFound(format!("Problem not found: {}", id)))?;

        self.write_cached(&key, ttl_secs, &problem).await;
        info!(problem_id = %id, ttl_secs, "Fetched problem from store");
        Ok(problem)
    }

    /// Cache read that treats any failure as a miss
    async fn read_cached<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Option<T> {
        let payload = match self.cache.get(key).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed; falling back to store");
                None
            }
        };

        let value = payload.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        });

        let result = if value.is_some() { "hit" } else { "miss" };
        CACHE_LOOKUPS_TOTAL.with_label_values(&[kind, result]).inc();
        value
    }

    async fn write_cached<T: Serialize>(&self, key: &str, ttl_secs: u64, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.cache.set_ex(key, ttl_secs, &payload).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::InMemoryProblemStore;
    use async_trait::async_trait;
    use codejudge_common::types::TestCase;
    use tokio::time::Duration;

    fn problem(id: &str) -> Problem {
        Problem {
            id: id.to_string(),
            title: "Sum".to_string(),
            statement: "Print a + b".to_string(),
            test_cases: vec![TestCase { input: "2 3\n".to_string(), expected: "5".to_string() }],
        }
    }

    fn gateway(store: Arc<InMemoryProblemStore>, cache: Arc<MemoryCache>) -> ProblemGateway {
        ProblemGateway::new(store, cache, CacheTtls::default())
    }

    #[tokio::test]
    async fn test_miss_populates_cache() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1")]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store.clone(), cache.clone());

        assert_eq!(gateway.get_problem("p1").await.unwrap(), problem("p1"));
        assert_eq!(store.queries(), 1);
        assert!(cache.get("problem:p1").await.unwrap().is_some());

        assert_eq!(gateway.get_problem("p1").await.unwrap(), problem("p1"));
        assert_eq!(store.queries(), 1, "second lookup must be served from cache");
    }

    #[tokio::test]
    async fn test_missing_problem_is_not_found() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1")]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store, cache.clone());

        assert!(matches!(gateway.get_problem("nope").await, Err(JudgeError::NotFound(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let store = Arc::new(InMemoryProblemStore::new(vec![]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store, cache.clone());

        assert!(matches!(gateway.get_all_problems().await, Err(JudgeError::NotFound(_))));
        assert!(cache.get(PROBLEMS_KEY).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_is_cached_until_ttl() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1"), problem("p2")]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store.clone(), cache.clone());

        let first = gateway.get_all_problems().await.unwrap();
        let cached = cache.get(PROBLEMS_KEY).await.unwrap().unwrap();
        let second = gateway.get_all_problems().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.get(PROBLEMS_KEY).await.unwrap().unwrap(), cached);
        assert_eq!(store.queries(), 1);

        tokio::time::advance(Duration::from_secs(3 * 60 * 60)).await;
        gateway.get_all_problems().await.unwrap();
        assert_eq!(store.queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_served_within_ttl() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1")]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store.clone(), cache);

        gateway.get_problem("p1").await.unwrap();
        store.remove("p1");

        assert!(gateway.get_problem("p1").await.is_ok());

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        assert!(matches!(gateway.get_problem("p1").await, Err(JudgeError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_depends_on_population_path() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1"), problem("p2")]));
        let cache = Arc::new(MemoryCache::new());
        let gateway = gateway(store.clone(), cache.clone());

        gateway.get_problem("p1").await.unwrap();
        gateway.get_problem_for_submission("p2").await.unwrap();

        tokio::time::advance(Duration::from_secs(2 * 60 * 60)).await;
        assert!(cache.get("problem:p1").await.unwrap().is_none());
        assert!(cache.get("problem:p2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_entry_falls_back_to_store() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1")]));
        let cache = Arc::new(MemoryCache::new());
        cache.set_ex("problem:p1", 60, "not json").await.unwrap();
        let gateway = gateway(store.clone(), cache.clone());

        assert_eq!(gateway.get_problem("p1").await.unwrap().id, "p1");
        assert_eq!(store.queries(), 1);
        assert_ne!(cache.get("problem:p1").await.unwrap().as_deref(), Some("not json"));
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheBackend for BrokenCache {
        async fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }

        async fn set_ex(&self, _key: &str, _ttl_secs: u64, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_cache_outage_degrades_to_store() {
        let store = Arc::new(InMemoryProblemStore::new(vec![problem("p1")]));
        let gateway = ProblemGateway::new(store.clone(), Arc::new(BrokenCache), CacheTtls::default());

        assert_eq!(gateway.get_problem("p1").await.unwrap().id, "p1");
        assert_eq!(gateway.get_all_problems().await.unwrap().len(), 1);
        assert_eq!(store.queries(), 2);
    }
}
