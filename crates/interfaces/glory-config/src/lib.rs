//! Central configuration constants for timers, windows and retry limits.

/// Default period between auto-save ticks (milliseconds). 10 seconds.
pub const DEFAULT_AUTOSAVE_PERIOD_MS: u64 = 10_000;

/// Minimum allowed auto-save period (milliseconds).
pub const MIN_AUTOSAVE_PERIOD_MS: u64 = 2_000;

/// Maximum allowed auto-save period (milliseconds).
pub const MAX_AUTOSAVE_PERIOD_MS: u64 = 120_000;

/// Window in which an unload following a navigation/reload marker is treated
/// as an in-app navigation rather than a tab close (milliseconds).
pub const SESSION_NAVIGATION_WINDOW_MS: i64 = 1_000;

/// Bounded wait for the identity provider before falling back to the
/// locally cached authentication marker (milliseconds).
pub const IDENTITY_CHECK_TIMEOUT_MS: u64 = 3_000;

/// Delay before a scheduled authentication re-check fires (milliseconds).
pub const AUTH_RECHECK_DELAY_MS: u64 = 1_500;

/// Maximum number of payment-approval polls before giving up.
pub const APPROVAL_MAX_ATTEMPTS: u32 = 8;

/// Delay before the first payment-approval poll (milliseconds).
pub const APPROVAL_INITIAL_DELAY_MS: u64 = 2_000;

/// Upper bound for the exponential payment-approval backoff (milliseconds).
pub const APPROVAL_MAX_DELAY_MS: u64 = 30_000;

/// Default capacity of the status event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Clamp an auto-save period into the allowed range.
pub fn clamp_autosave_period(ms: u64) -> u64 {
    ms.clamp(MIN_AUTOSAVE_PERIOD_MS, MAX_AUTOSAVE_PERIOD_MS)
}

/// Clamp a poll attempt budget to at least one attempt.
pub fn clamp_approval_attempts(v: u32) -> u32 {
    v.clamp(1, APPROVAL_MAX_ATTEMPTS * 4)
}
