//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max client commands per second on one connection
pub const COMMAND_RATE_LIMIT: u32 = 30;

/// Per-connection command limiter
#[derive(Clone)]
pub struct CommandRateLimiter {
    limiter: Arc<Limiter>,
}

impl CommandRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(COMMAND_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            limiter: create_limiter(per_second),
        }
    }

    /// Returns true if another command may be processed right now
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
