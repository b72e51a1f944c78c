//! Call-site defaults for waits and retries.
//!
//! The engine crates take every timeout and allow-list explicitly; these
//! are the values the CLI passes when neither flags nor config set them.

use std::time::Duration;

/// Deadline for retrying a read (describe) call
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Deadline for retrying a write (submit) call
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Overall deadline for a state-change wait
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive not-found observations tolerated with `--not-found tolerate`
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// Token a describe command prints when the resource does not exist
pub const DEFAULT_NOT_FOUND_TOKEN: &str = "NOT_FOUND";

/// Service error codes (or code families) worth retrying
pub const DEFAULT_RETRYABLE_CODES: &[&str] = &[
    "ClientError.NetworkError",
    "ClientError.HttpStatusCodeError",
    "InternalError",
    "FailedOperation",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceInsufficient",
    "ResourceUnavailable",
    "ResourceBusy",
    "TradeUnknownError",
];
