//! Small free-standing helpers shared across modules.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as signed seconds since the Unix epoch.
///
/// Pinned to a fixed width so volumes are portable across builds of this
/// crate on the same host (cross-host portability remains a non-goal).
pub fn now_secs() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

/// Ceiling integer division.
pub const fn ceil_div(n: usize, d: usize) -> usize {
	(n + d - 1) / d
}
