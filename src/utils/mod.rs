use axum::Json;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

// 令牌由独立的认证服务签发，这里只做校验
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // 用户ID
    pub exp: i64,      // 过期时间
    pub iat: i64,      // 签发时间
    pub is_temp: bool, // 临时标识
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub resp_data: Option<T>,
}

// 所有 handler 统一返回 Json<ApiResponse<T>>
pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: 0,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://localhost".into(),
            jwt_secret: "test-secret".into(),
            api_base_uri: "/api".into(),
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            heartbeat_interval_secs: 5,
            presence_timeout_secs: 10,
            presence_sweep_interval_secs: 4,
            geocode_fail_ttl_secs: 3600,
            geocode_base_url: "http://localhost/search".into(),
            message_cache_ttl_secs: 300,
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_token_signed_with_shared_secret() {
        let config = test_config();
        let claims = Claims {
            sub: "user-1".into(),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
            is_temp: false,
        };

        let verified = verify_token(&sign(&claims, "test-secret"), &config).unwrap();
        assert_eq!(verified.sub, "user-1");
        assert!(!verified.is_temp);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let config = test_config();
        let claims = Claims {
            sub: "user-1".into(),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
            is_temp: false,
        };

        assert!(verify_token(&sign(&claims, "wrong-secret"), &config).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let config = test_config();
        let claims = Claims {
            sub: "user-1".into(),
            exp: Utc::now().timestamp() - 120,
            iat: Utc::now().timestamp() - 3600,
            is_temp: true,
        };

        assert!(verify_token(&sign(&claims, "test-secret"), &config).is_err());
    }
}
