use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};

use super::client::GeocodeClient;
use super::distance::Coordinate;

const GEO_CACHE_PREFIX: &str = "geo:"; // 城市坐标缓存前缀

// 会话级缓存条目：成功存坐标不过期，失败只存截止时间
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeoCacheEntry {
    Success {
        lat: f64,
        lon: f64,
    },
    Failure {
        #[serde(rename = "failUntil")]
        fail_until: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheDecision {
    Hit(Coordinate),
    NegativeHit,
    Retry,
}

impl GeoCacheEntry {
    // 失败条目绝不能当坐标用，先判形态再取值
    pub fn decide(&self, now_ms: i64) -> CacheDecision {
        match self {
            GeoCacheEntry::Success { lat, lon } => CacheDecision::Hit(Coordinate {
                lat: *lat,
                lon: *lon,
            }),
            GeoCacheEntry::Failure { fail_until } if *fail_until > now_ms => {
                CacheDecision::NegativeHit
            }
            GeoCacheEntry::Failure { .. } => CacheDecision::Retry,
        }
    }
}

pub fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}

/// 两级地理编码缓存：进程内Map + Redis，失败结果负缓存
pub struct GeoService {
    redis: Arc<RedisClient>,
    client: GeocodeClient,
    fail_ttl: Duration,
    memory: RwLock<HashMap<String, Coordinate>>,
    pending: Mutex<HashMap<String, broadcast::Sender<Option<Coordinate>>>>,
}

impl GeoService {
    pub fn new(redis: Arc<RedisClient>, client: GeocodeClient, fail_ttl: Duration) -> Self {
        Self {
            redis,
            client,
            fail_ttl,
            memory: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, city: &str) -> Option<Coordinate> {
        let key = normalize_city(city);
        if key.is_empty() {
            return None;
        }

        if let Some(coord) = self.memory.read().await.get(&key).copied() {
            return Some(coord);
        }

        // 同名并发查询合并为一次在途请求
        let owner = {
            let mut pending = self.pending.lock().await;
            match pending.get(&key) {
                Some(tx) => Err(tx.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    pending.insert(key.clone(), tx.clone());
                    Ok(tx)
                }
            }
        };

        let tx = match owner {
            Ok(tx) => tx,
            Err(mut rx) => {
                return match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => {
                        // 持有方请求被取消时清掉残留的在途标记
                        self.pending.lock().await.remove(&key);
                        None
                    }
                };
            }
        };

        let result = self.resolve_uncached(&key).await;

        let mut pending = self.pending.lock().await;
        pending.remove(&key);
        let _ = tx.send(result);
        result
    }

    async fn resolve_uncached(&self, key: &str) -> Option<Coordinate> {
        let now_ms = Utc::now().timestamp_millis();

        match self.read_session_entry(key).await.map(|e| e.decide(now_ms)) {
            Some(CacheDecision::Hit(coord)) => {
                self.memory.write().await.insert(key.to_string(), coord);
                return Some(coord);
            }
            // 未过期的失败条目直接短路，不发起网络请求
            Some(CacheDecision::NegativeHit) => return None,
            Some(CacheDecision::Retry) | None => {}
        }

        match self.client.forward_geocode(key).await {
            Some(coord) => {
                self.memory.write().await.insert(key.to_string(), coord);
                self.write_session_entry(
                    key,
                    &GeoCacheEntry::Success {
                        lat: coord.lat,
                        lon: coord.lon,
                    },
                    None,
                )
                .await;
                Some(coord)
            }
            None => {
                let fail_until = now_ms + self.fail_ttl.as_millis() as i64;
                self.write_session_entry(
                    key,
                    &GeoCacheEntry::Failure { fail_until },
                    Some(self.fail_ttl),
                )
                .await;
                None
            }
        }
    }

    async fn read_session_entry(&self, key: &str) -> Option<GeoCacheEntry> {
        let mut conn = self.redis.get_multiplexed_async_connection().await.ok()?;
        let cached: Option<String> = conn
            .get(format!("{}{}", GEO_CACHE_PREFIX, key))
            .await
            .ok()?;
        serde_json::from_str(&cached?).ok()
    }

    // 缓存写失败只降级，不影响本次解析结果
    async fn write_session_entry(&self, key: &str, entry: &GeoCacheEntry, ttl: Option<Duration>) {
        let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await else {
            return;
        };
        let Ok(json) = serde_json::to_string(entry) else {
            return;
        };

        let cache_key = format!("{}{}", GEO_CACHE_PREFIX, key);
        let result: Result<(), redis::RedisError> = match ttl {
            Some(ttl) => conn.set_ex(&cache_key, json, ttl.as_secs()).await,
            None => conn.set(&cache_key, json).await,
        };
        if let Err(e) = result {
            tracing::debug!("Failed to write geo cache entry {}: {}", cache_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_entry_parses_from_coordinate_json() {
        let entry: GeoCacheEntry = serde_json::from_str(r#"{"lat":48.8566,"lon":2.3522}"#).unwrap();
        match entry.decide(0) {
            CacheDecision::Hit(coord) => {
                assert_eq!(coord.lat, 48.8566);
                assert_eq!(coord.lon, 2.3522);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn failure_entry_round_trips_with_fail_until_key() {
        let json = serde_json::to_string(&GeoCacheEntry::Failure { fail_until: 1234 }).unwrap();
        assert_eq!(json, r#"{"failUntil":1234}"#);

        let entry: GeoCacheEntry = serde_json::from_str(&json).unwrap();
        assert!(matches!(entry, GeoCacheEntry::Failure { fail_until: 1234 }));
    }

    #[test]
    fn unexpired_failure_suppresses_lookup() {
        let now_ms = 1_700_000_000_000;
        let entry = GeoCacheEntry::Failure {
            fail_until: now_ms + 3_600_000,
        };

        assert_eq!(entry.decide(now_ms), CacheDecision::NegativeHit);
        assert_eq!(
            entry.decide(now_ms + 3_600_000 - 1),
            CacheDecision::NegativeHit
        );
    }

    #[test]
    fn expired_failure_permits_fresh_lookup() {
        let now_ms = 1_700_000_000_000;
        let entry = GeoCacheEntry::Failure {
            fail_until: now_ms,
        };

        // 截止时间一过即放行
        assert_eq!(entry.decide(now_ms), CacheDecision::Retry);
        assert_eq!(entry.decide(now_ms + 1), CacheDecision::Retry);
    }

    #[test]
    fn city_keys_are_normalized() {
        assert_eq!(normalize_city("  Paris "), "paris");
        assert_eq!(normalize_city("ROME"), normalize_city("rome"));
        assert_eq!(normalize_city("   "), "");
    }
}
