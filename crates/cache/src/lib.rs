//! C13 Redis Response Cache (spec §4.13, §6.6).
//!
//! No teacher module owns a `redis` connection directly (the teacher's
//! `RedisSessionStore` is an explicit stub); grounded instead on the
//! `redis::aio::ConnectionManager` + `get`/`set_ex`/`ping` idiom used by
//! the retrieved pack's own RAG service
//! (`other_examples/.../production-rag-src-m.rs`), adapted from bare
//! `anyhow::Result` to this workspace's typed `CacheError`.

use sha2::{Digest, Sha256};
use thiserror::Error;

use pipeline_core::Answer;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis operation error: {0}")]
    Operation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CacheError> for pipeline_core::Error {
    fn from(err: CacheError) -> Self {
        pipeline_core::Error::Cache(err.to_string())
    }
}

/// Cache key, a pure function of `(language, normalized query text)` per
/// spec §8 invariant #4 — never a function of conversation history.
pub fn cache_key(language: &str, query_text: &str) -> String {
    let normalized = normalize_query(query_text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("q:{}:{:x}", language, hasher.finalize())
}

fn normalize_query(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Redis-backed cache of `Answer`s. Disables itself on connection or ping
/// failure; every public method degrades to a miss rather than failing
/// the caller's request (spec §4.13: "Miss/cache-error must never fail
/// the request").
pub struct ResponseCache {
    conn: Option<redis::aio::ConnectionManager>,
    ttl_s: u64,
}

impl ResponseCache {
    /// Connects to `redis://host:port` (or `rediss://` when `ssl` is set)
    /// and runs an initial ping health check. On any failure, returns a
    /// disabled cache rather than an error.
    pub async fn connect(host: &str, port: u16, ssl: bool, ttl_s: u64) -> Self {
        let scheme = if ssl { "rediss" } else { "redis" };
        let url = format!("{scheme}://{host}:{port}");

        match Self::try_connect(&url).await {
            Ok(conn) => {
                tracing::info!(dep = "redis", op = "connect", status = "OK", %url);
                Self { conn: Some(conn), ttl_s }
            }
            Err(err) => {
                tracing::warn!(dep = "redis", op = "connect", status = "FALLBACK", error = %err, "cache disabled");
                Self { conn: None, ttl_s }
            }
        }
    }

    async fn try_connect(url: &str) -> Result<redis::aio::ConnectionManager, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let mut conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(conn)
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Looks up `key`; any error or miss is logged and surfaced as `None`.
    pub async fn get(&self, key: &str) -> Option<Answer> {
        let mut conn = self.conn.clone()?;

        let start = std::time::Instant::now();
        let raw: Option<String> = match redis::AsyncCommands::get(&mut conn, key).await {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(dep = "redis", op = "get", status = "FALLBACK", error = %err, "cache get failed");
                return None;
            }
        };
        let ms = start.elapsed().as_millis();

        let raw = raw?;
        match serde_json::from_str::<Answer>(&raw) {
            Ok(answer) => {
                tracing::debug!(dep = "redis", op = "get", status = "OK", ms, "cache hit");
                Some(answer)
            }
            Err(err) => {
                tracing::warn!(dep = "redis", op = "get", status = "FALLBACK", error = %err, "cache value corrupt");
                None
            }
        }
    }

    /// Stores `answer` under `key` with the configured TTL. Failures are
    /// logged and swallowed.
    pub async fn set(&self, key: &str, answer: &Answer) {
        let Some(mut conn) = self.conn.clone() else { return };

        let raw = match serde_json::to_string(answer) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(dep = "redis", op = "set", status = "FALLBACK", error = %err, "serialize failed");
                return;
            }
        };

        let start = std::time::Instant::now();
        let result: Result<(), redis::RedisError> =
            redis::AsyncCommands::set_ex(&mut conn, key, raw, self.ttl_s).await;
        let ms = start.elapsed().as_millis();

        match result {
            Ok(()) => tracing::debug!(dep = "redis", op = "set", status = "OK", ms),
            Err(err) => tracing::warn!(dep = "redis", op = "set", status = "FALLBACK", error = %err, "cache set failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_pure_function_of_language_and_query() {
        let a = cache_key("en", "  What is Climate Change?  ");
        let b = cache_key("en", "what is climate change?");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_by_language() {
        let a = cache_key("en", "what is climate change?");
        let b = cache_key("es", "what is climate change?");
        assert_ne!(a, b);
    }

    #[test]
    fn cache_key_has_expected_prefix() {
        let key = cache_key("en", "hello");
        assert!(key.starts_with("q:en:"));
    }

    #[tokio::test]
    async fn disabled_cache_returns_none_without_panicking() {
        let cache = ResponseCache { conn: None, ttl_s: 3600 };
        assert!(!cache.is_enabled());
        assert!(cache.get("q:en:anything").await.is_none());
    }
}
