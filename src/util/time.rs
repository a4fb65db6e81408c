//! Time utilities and match timing constants

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Length of one round in seconds
pub const ROUND_SECONDS: u32 = 20;

/// Round clock cadence (one `TIMER` broadcast per period)
pub const CLOCK_PERIOD: Duration = Duration::from_secs(1);

/// Combat simulation cadence
pub const SIMULATION_PERIOD: Duration = Duration::from_millis(900);

/// Delay between the second player joining and `GAME_START`
pub const GAME_START_DELAY: Duration = Duration::from_millis(300);

/// Delay between `GAME_START` and the first `ROUND_START`
pub const FIRST_ROUND_DELAY: Duration = Duration::from_millis(500);

/// Pause between `ROUND_END` and the next `ROUND_START`
pub const NEXT_ROUND_DELAY: Duration = Duration::from_secs(3);

/// Pause between the deciding `ROUND_END` and `GAME_OVER`
pub const GAME_OVER_DELAY: Duration = Duration::from_millis(2500);

/// Grace period after a disconnect before an abandoned room is removed
pub const ROOM_CLEANUP_DELAY: Duration = Duration::from_secs(5);
