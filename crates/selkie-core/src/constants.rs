//! TigerStyle constants for Selkie
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Sync Loop Limits
// =============================================================================

/// Default interval between background reconciliation passes (30 sec)
pub const SYNC_INTERVAL_MS_DEFAULT: u64 = 30 * 1000;

/// Minimum sync interval in milliseconds
pub const SYNC_INTERVAL_MS_MIN: u64 = 100;

/// Maximum sync interval in milliseconds (10 min)
pub const SYNC_INTERVAL_MS_MAX: u64 = 10 * 60 * 1000;

/// Maximum number of cleanup attempts during shutdown
pub const SHUTDOWN_RETRY_COUNT_MAX: u32 = 3;

/// Backoff between shutdown cleanup attempts in milliseconds (1 sec)
pub const SHUTDOWN_RETRY_BACKOFF_MS: u64 = 1000;

// =============================================================================
// Identity Limits
// =============================================================================

/// Maximum length of a generated registration ID in bytes
///
/// Consul rejects IDs beyond 512 bytes; generated IDs must stay under this.
pub const SERVICE_ID_LENGTH_BYTES_MAX: usize = 512;

/// Maximum length of a namespace prefix in bytes
pub const SERVICE_PREFIX_LENGTH_BYTES_MAX: usize = 64;

// =============================================================================
// Agent Limits
// =============================================================================

/// Default request timeout against the discovery agent in milliseconds (5 sec)
pub const AGENT_TIMEOUT_MS_DEFAULT: u64 = 5 * 1000;

/// Default discovery agent address
pub const AGENT_ADDRESS_DEFAULT: &str = "127.0.0.1:8500";

/// Minimum health check interval in milliseconds (1 sec, agent-enforced)
pub const CHECK_INTERVAL_MS_MIN: u64 = 1000;

// Compile-time assertions for constant validity
const _: () = {
    assert!(SYNC_INTERVAL_MS_MIN < SYNC_INTERVAL_MS_DEFAULT);
    assert!(SYNC_INTERVAL_MS_DEFAULT < SYNC_INTERVAL_MS_MAX);
    assert!(SERVICE_PREFIX_LENGTH_BYTES_MAX < SERVICE_ID_LENGTH_BYTES_MAX);
    assert!(SHUTDOWN_RETRY_COUNT_MAX >= 1);
};
