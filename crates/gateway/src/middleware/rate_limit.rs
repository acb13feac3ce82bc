//! Rate limiting middleware using token bucket algorithm
//!
//! One process-wide bucket sized from the rate-limit configuration. Order
//! builds are the expensive operation being protected; everything else
//! rides under the same quota.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use leadforge_common::config::RateLimitConfig;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Create a rate limiter from configuration
///
/// Zero values fall back to a quota of one to keep the bucket well-formed;
/// disabling rate limiting entirely is the router's decision.
pub fn create_rate_limiter(config: &RateLimitConfig) -> Arc<GlobalRateLimiter> {
    let per_second = NonZeroU32::new(config.requests_per_second.max(1))
        .expect("nonzero after max(1)");
    let burst = NonZeroU32::new(config.burst.max(1)).expect("nonzero after max(1)");

    let quota = Quota::per_second(per_second).allow_burst(burst);

    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<GlobalRateLimiter>,
) -> Result<Response, StatusCode> {
    match limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rate limit exceeded"
            );
            Err(StatusCode::TOO_MANY_REQUESTS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(requests_per_second: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second,
            burst,
            enabled: true,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = create_rate_limiter(&config(100, 200));
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_zero_config_falls_back_to_minimal_quota() {
        let limiter = create_rate_limiter(&config(0, 0));
        // One token available, the second immediate check is throttled
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
