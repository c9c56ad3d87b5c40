use crate::models::UserSession;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Per-user conversational memory keyed by session identity.
///
/// Callers read a copy, work on it, and write it back. There is no per-key
/// locking: two requests from the same identity racing here end with the
/// last writer's copy.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<UserSession>;

    async fn upsert(&self, key: &str, session: UserSession);

    async fn evict(&self, key: &str);

    fn backend_name(&self) -> &'static str;
}

// ==================== IN-MEMORY ====================

struct StoredSession {
    session: UserSession,
    last_seen: DateTime<Utc>,
}

const PURGE_INTERVAL_WRITES: usize = 256;

/// Process-local store with a capacity cap (least recently written goes
/// first) and lazy idle expiry.
///
/// Expired sessions are invisible to `get` at once; they are physically
/// dropped every `PURGE_INTERVAL_WRITES` writes or when the map is full.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    max_entries: usize,
    idle_ttl: Option<Duration>,
    writes_since_purge: AtomicUsize,
}

impl InMemorySessionStore {
    pub fn new(max_entries: usize, idle_ttl_secs: u64) -> Self {
        let idle_ttl = if idle_ttl_secs == 0 {
            None
        } else {
            Some(Duration::seconds(idle_ttl_secs.min(i64::MAX as u64) as i64))
        };
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            idle_ttl,
            writes_since_purge: AtomicUsize::new(0),
        }
    }

    fn is_expired(&self, stored: &StoredSession, now: DateTime<Utc>) -> bool {
        self.idle_ttl
            .map(|ttl| now - stored.last_seen > ttl)
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Option<UserSession> {
        let sessions = self.sessions.read().await;
        let stored = sessions.get(key)?;
        if self.is_expired(stored, Utc::now()) {
            return None;
        }
        Some(stored.session.clone())
    }

    async fn upsert(&self, key: &str, session: UserSession) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let purge_due =
            self.writes_since_purge.fetch_add(1, Ordering::Relaxed) + 1 >= PURGE_INTERVAL_WRITES;
        if self.idle_ttl.is_some() && (purge_due || sessions.len() >= self.max_entries) {
            self.writes_since_purge.store(0, Ordering::Relaxed);
            let before = sessions.len();
            sessions.retain(|_, stored| !self.is_expired(stored, now));
            let purged = before - sessions.len();
            if purged > 0 {
                tracing::debug!("Purged {} idle sessions", purged);
            }
        }

        if !sessions.contains_key(key) && sessions.len() >= self.max_entries {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, stored)| stored.last_seen)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                tracing::debug!("Session store at capacity; evicted least recently used session");
            }
        }

        sessions.insert(
            key.to_string(),
            StoredSession {
                session,
                last_seen: now,
            },
        );
    }

    async fn evict(&self, key: &str) {
        self.sessions.write().await.remove(key);
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ==================== REDIS ====================

const REDIS_KEY_PREFIX: &str = "coinchat:session:";

/// Redis-backed store; sessions expire via key TTL.
pub struct RedisSessionStore {
    redis: redis::aio::ConnectionManager,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(redis: redis::aio::ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    fn redis_key(key: &str) -> String {
        format!("{}{}", REDIS_KEY_PREFIX, key)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> Option<UserSession> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = match conn.get(Self::redis_key(key)).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!("Session read skipped err={}", err);
                return None;
            }
        };
        raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!("Discarding unreadable session err={}", err);
                None
            }
        })
    }

    async fn upsert(&self, key: &str, session: UserSession) {
        let json = match serde_json::to_string(&session) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!("Session serialize failed err={}", err);
                return;
            }
        };
        let mut conn = self.redis.clone();
        let redis_key = Self::redis_key(key);
        let result: redis::RedisResult<()> = if self.ttl_secs > 0 {
            conn.set_ex(redis_key, json, self.ttl_secs).await
        } else {
            conn.set(redis_key, json).await
        };
        if let Err(err) = result {
            tracing::warn!("Session write failed err={}", err);
        }
    }

    async fn evict(&self, key: &str) {
        let mut conn = self.redis.clone();
        let result: redis::RedisResult<()> = conn.del(Self::redis_key(key)).await;
        if let Err(err) = result {
            tracing::warn!("Session evict failed err={}", err);
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
