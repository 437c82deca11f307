use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub message_id: String,
    pub trip_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessageWithAuthor {
    pub message_id: String,
    pub trip_id: String,
    pub user_id: String,
    pub nickname: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub trip_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct GetMessagesRequest {
    pub trip_id: String,
    pub message_id: Option<String>,
    pub limit: Option<i64>,
}

// 缓存相关的常量
const MESSAGE_CACHE_PREFIX: &str = "msg:trip:"; // 最新消息页缓存前缀

impl ChatMessage {
    pub async fn create(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        trip_id: &str,
        content: &str,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        // 作者身份由存储边界校验，未入行程的写入一律拒绝
        let is_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM trip_members
                WHERE trip_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        if !is_member {
            return Err(sqlx::Error::Protocol(
                "User is not a member of this trip".into(),
            ));
        }

        let message_id = Uuid::new_v4().to_string();
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (message_id, trip_id, user_id, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING message_id, trip_id, user_id, content, created_at
            "#,
        )
        .bind(&message_id)
        .bind(trip_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        // 新消息落库后清掉最新页缓存
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cache_key = format!("{}{}", MESSAGE_CACHE_PREFIX, trip_id);
            let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
        }

        Ok(message)
    }

    pub async fn get_messages(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        req: GetMessagesRequest,
        user_id: &str,
        cache_ttl: u64,
    ) -> Result<Vec<ChatMessageWithAuthor>, sqlx::Error> {
        let is_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM trip_members
                WHERE trip_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(&req.trip_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        if !is_member {
            return Err(sqlx::Error::Protocol(
                "User is not a member of this trip".into(),
            ));
        }

        let limit = req
            .limit
            .map(|limit_value| limit_value.clamp(-100, 100))
            .unwrap_or(50);

        // 没有游标的最新页查询先看缓存
        if req.message_id.is_none() && limit.abs() <= 50 {
            let cache_key = format!("{}{}", MESSAGE_CACHE_PREFIX, req.trip_id);

            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

                if let Ok(json_str) = cached {
                    if let Ok(messages) =
                        serde_json::from_str::<Vec<ChatMessageWithAuthor>>(&json_str)
                    {
                        tracing::debug!("Get messages from cache: {}", cache_key);
                        return Ok(messages);
                    }
                }
            }
        }

        let messages = if let Some(message_id) = req.message_id {
            if limit >= 0 {
                Self::get_newer_messages(pool, &req.trip_id, &message_id, limit.abs()).await?
            } else {
                Self::get_older_messages(pool, &req.trip_id, &message_id, limit.abs()).await?
            }
        } else {
            let msgs = Self::get_latest_messages(pool, &req.trip_id, limit.abs()).await?;

            if limit.abs() <= 50 {
                if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                    let cache_key = format!("{}{}", MESSAGE_CACHE_PREFIX, req.trip_id);
                    if let Ok(json_str) = serde_json::to_string(&msgs) {
                        let _: Result<(), redis::RedisError> =
                            conn.set_ex(&cache_key, json_str, cache_ttl).await;
                        tracing::debug!("Set messages to cache: {}", cache_key);
                    }
                }
            }

            msgs
        };

        Ok(messages)
    }

    async fn get_older_messages(
        pool: &PgPool,
        trip_id: &str,
        message_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessageWithAuthor>(
            r#"
            SELECT
                m.message_id,
                m.trip_id,
                m.user_id,
                u.nickname,
                m.content,
                m.created_at
            FROM messages m
            JOIN users u ON m.user_id = u.user_id
            WHERE m.trip_id = $1
                AND m.created_at <= (
                    SELECT created_at
                    FROM messages
                    WHERE message_id = $2
                )
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(trip_id)
        .bind(message_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    async fn get_newer_messages(
        pool: &PgPool,
        trip_id: &str,
        message_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessageWithAuthor>(
            r#"
            SELECT
                m.message_id,
                m.trip_id,
                m.user_id,
                u.nickname,
                m.content,
                m.created_at
            FROM messages m
            JOIN users u ON m.user_id = u.user_id
            WHERE m.trip_id = $1
                AND m.created_at >= (
                    SELECT created_at
                    FROM messages
                    WHERE message_id = $2
                )
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(trip_id)
        .bind(message_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    async fn get_latest_messages(
        pool: &PgPool,
        trip_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessageWithAuthor>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessageWithAuthor>(
            r#"
            SELECT
                m.message_id,
                m.trip_id,
                m.user_id,
                u.nickname,
                m.content,
                m.created_at
            FROM messages m
            JOIN users u ON m.user_id = u.user_id
            WHERE m.trip_id = $1
            ORDER BY m.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(trip_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
