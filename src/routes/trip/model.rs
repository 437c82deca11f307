use sqlx::PgPool;

pub struct Trip;

impl Trip {
    // 行程成员校验，REST和WebSocket入口共用
    pub async fn is_member(
        pool: &PgPool,
        trip_id: &str,
        user_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
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
        .await
    }
}
