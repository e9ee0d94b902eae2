use redis::{AsyncCommands, RedisResult};

/// Redis cache semantics shared by every component that reads or
/// populates the problem cache. Keys are deterministic so any instance
/// can serve an entry another instance wrote.

pub const PROBLEMS_KEY: &str = "problems";
pub const PROBLEM_PREFIX: &str = "problem";

/// Cache key for a single problem document
pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

/// Read a raw cache entry
pub async fn get_raw(
    conn: &mut redis::aio::ConnectionManager,
    key: &str,
) -> RedisResult<Option<String>> {
    conn.get(key).await
}

/// Write a raw cache entry with an expiry in seconds (SETEX)
pub async fn set_raw_ex(
    conn: &mut redis::aio::ConnectionManager,
    key: &str,
    ttl_seconds: u64,
    payload: &str,
) -> RedisResult<()> {
    conn.set_ex(key, payload, ttl_seconds).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_key_format() {
        assert_eq!(problem_key("p1"), "problem:p1");
        assert_eq!(problem_key("65f0c0ffee"), "problem:65f0c0ffee");
    }

    #[test]
    fn test_list_key_is_distinct() {
        assert_ne!(problem_key(""), PROBLEMS_KEY);
        assert!(!PROBLEMS_KEY.contains(':'));
    }
}
