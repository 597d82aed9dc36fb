use redis::RedisResult;

/// Redis client for per-caller request throttling.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns whether this call is within `limit`.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// Rate-limit bucket for a caller in the window containing `unix_seconds`.
pub fn rate_limit_key(caller_id: &str, unix_seconds: i64, window_seconds: i64) -> String {
    let window = unix_seconds.div_euclid(window_seconds.max(1));
    format!("ratelimit:{}:{}", caller_id, window)
}
