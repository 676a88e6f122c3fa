// SPDX-License-Identifier: EUPL-1.2

//! Optional Redis read-through cache for application records.
//!
//! The store stays authoritative: transitions always load from it, and every
//! committed transition writes the new record through. Writes only land when
//! the cached copy is absent or older, so a reader racing a commit cannot put
//! back a superseded record. Cache faults are logged and treated as misses.

use std::sync::OnceLock;

use redis::{aio::ConnectionManager, Script};
use uuid::Uuid;

use crate::models::Application;

const TTL_SECS: u64 = 300;

/// `SET key record EX ttl` unless the cached record carries a version >= ours.
const PUT_IF_NEWER: &str = r"
local cached = redis.call('GET', KEYS[1])
if cached then
    local ok, record = pcall(cjson.decode, cached)
    if ok and type(record) == 'table' and tonumber(record['version'])
        and tonumber(record['version']) >= tonumber(ARGV[2]) then
        return 0
    end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
return 1
";

fn put_if_newer() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| Script::new(PUT_IF_NEWER))
}

#[derive(Clone, Default)]
pub struct ApplicationCache {
    conn: Option<ConnectionManager>,
}

fn key(id: Uuid) -> String {
    format!("hosting-portal:application:{id}")
}

impl ApplicationCache {
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Connect if `redis_url` is set; any failure disables caching.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            tracing::info!("REDIS_URL not set — application cache disabled");
            return Self::disabled();
        };

        let conn = match redis::Client::open(url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(mgr) => {
                    tracing::info!("Redis cache connected: {}", url);
                    Some(mgr)
                }
                Err(e) => {
                    tracing::warn!("Redis connect failed (cache disabled): {e}");
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Redis URL invalid (cache disabled): {e}");
                None
            }
        };

        Self { conn }
    }

    pub async fn get(&self, id: Uuid) -> Option<Application> {
        let mut conn = self.conn.clone()?;
        let cached: Option<String> = match redis::cmd("GET")
            .arg(key(id))
            .query_async(&mut conn)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Redis GET failed for application {id}: {e}");
                return None;
            }
        };

        let app = serde_json::from_str(&cached?)
            .map_err(|e| tracing::warn!("Discarding undecodable cache entry for {id}: {e}"))
            .ok()?;
        tracing::debug!("Cache hit for application {id}");
        Some(app)
    }

    pub async fn put(&self, app: &Application) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let body = match serde_json::to_string(app) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Could not encode application {} for cache: {e}", app.id);
                return;
            }
        };
        let result: redis::RedisResult<i64> = put_if_newer()
            .key(key(app.id))
            .arg(body)
            .arg(app.version)
            .arg(TTL_SECS)
            .invoke_async(&mut conn)
            .await;
        match result {
            Ok(0) => tracing::debug!(
                "Cache already holds a newer copy of application {} than v{}",
                app.id,
                app.version
            ),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Redis SET failed for application {}: {e}", app.id);
                // Never leave an older copy behind a failed write-through.
                self.invalidate(app.id).await;
            }
        }
    }

    pub async fn invalidate(&self, id: Uuid) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let result: redis::RedisResult<()> =
            redis::cmd("DEL").arg(key(id)).query_async(&mut conn).await;
        if let Err(e) = result {
            tracing::warn!("Redis DEL failed for application {id}: {e}");
        }
    }
}
