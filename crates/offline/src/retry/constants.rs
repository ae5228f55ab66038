// Constants for the retry module
use std::time::Duration;

/// Default maximum number of attempts (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default additive jitter factor (0.0 = none, 1.0 = up to one extra delay).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.25;

/// Maximum exponent for exponential backoff calculation to prevent overflow.
pub const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Minimum allowed max_attempts value.
pub const MIN_MAX_ATTEMPTS: u32 = 1;

/// Maximum allowed max_attempts value.
pub const MAX_MAX_ATTEMPTS: u32 = 100;
