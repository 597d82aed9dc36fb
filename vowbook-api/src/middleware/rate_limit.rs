use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use vowbook_core::Caller;
use vowbook_store::redis_repo::rate_limit_key;

use crate::error::AppError;
use crate::state::AppState;

const WINDOW_SECONDS: i64 = 60;

/// Per-caller fixed window in Redis. Fails open when Redis is missing or
/// unreachable.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let caller_id = req.extensions().get::<Caller>().map(|c| c.id.clone());
    let (Some(redis), Some(caller_id)) = (state.redis.clone(), caller_id) else {
        return Ok(next.run(req).await);
    };

    let key = rate_limit_key(&caller_id, chrono::Utc::now().timestamp(), WINDOW_SECONDS);
    match redis
        .check_rate_limit(&key, state.business_rules.rate_limit_per_minute, WINDOW_SECONDS)
        .await
    {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => Err(AppError::RateLimited),
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
            Ok(next.run(req).await)
        }
    }
}
