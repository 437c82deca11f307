use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub api_base_uri: String,
    pub server_host: String,
    pub server_port: u16,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub heartbeat_interval_secs: u64,
    pub presence_timeout_secs: u64,
    pub presence_sweep_interval_secs: u64,
    pub geocode_fail_ttl_secs: u64,
    pub geocode_base_url: String,
    pub message_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            // 客户端心跳间隔，协同面板按此节奏发送presence包
            heartbeat_interval_secs: env::var("HEARTBEAT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            // 超过此时长未心跳的成员会被清理
            presence_timeout_secs: env::var("PRESENCE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            presence_sweep_interval_secs: env::var("PRESENCE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            // 地理编码失败的负缓存时长
            geocode_fail_ttl_secs: env::var("GEOCODE_FAIL_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            geocode_base_url: env::var("GEOCODE_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/search".into()),
            message_cache_ttl_secs: env::var("MESSAGE_CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn presence_timeout(&self) -> Duration {
        Duration::from_secs(self.presence_timeout_secs)
    }

    pub fn presence_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.presence_sweep_interval_secs)
    }

    pub fn geocode_fail_ttl(&self) -> Duration {
        Duration::from_secs(self.geocode_fail_ttl_secs)
    }
}
