//! Shared constants for the dactyl device stack.
//!
//! Centralizes the environment variable names, protocol limits, and
//! device defaults that the other crates rely on. Changing the wire or
//! format constants breaks compatibility with existing drivers and
//! stored prints.

// ============================================================================
// Environment configuration
// ============================================================================

/// Environment variable holding the filesystem path of the command
/// channel socket for the virtual device backend.
pub const ENV_VIRTUAL_DEVICE: &str = "DACTYL_VIRTUAL_DEVICE";

/// Environment variable naming the driver identifier that the
/// storage-focused conformance scenarios expect to find.
pub const ENV_TEST_DRIVER_NAME: &str = "DACTYL_TEST_DRIVER_NAME";

// ============================================================================
// Driver identifiers
// ============================================================================

/// Driver id of the plain virtual device (no on-device storage).
pub const DRIVER_VIRTUAL: &str = "virtual_device";

/// Driver id of the virtual device with storage and identification.
pub const DRIVER_VIRTUAL_STORAGE: &str = "virtual_device_storage";

// ============================================================================
// Device defaults
// ============================================================================

/// Number of capture stages a default enrollment goes through.
pub const DEFAULT_ENROLL_STAGES: u32 = 5;

// ============================================================================
// Command channel limits
// ============================================================================

/// Maximum accepted length of a single command line in bytes.
///
/// Lines longer than this fail the connection with a protocol error
/// instead of growing the receive buffer without bound.
pub const MAX_COMMAND_LINE: usize = 1024;

// ============================================================================
// Transport retry policy
// ============================================================================

/// Attempts made against the enrolled-count query before an empty
/// reply is surfaced as a transport error.
///
/// The empty reply is an instantaneous transient fault of the backend,
/// so attempts are immediate with no backoff.
pub const COUNT_QUERY_ATTEMPTS: u32 = 3;

// ============================================================================
// Serialized print format
// ============================================================================

/// Magic bytes opening every serialized print.
pub const PRINT_MAGIC: &[u8; 4] = b"DCTP";

/// Current serialized print format version.
pub const PRINT_FORMAT_VERSION: u8 = 1;

// ============================================================================
// Scenario exit codes
// ============================================================================

/// Exit code reserved for "missing optional dependency, skip".
///
/// External test frameworks treat this as a soft skip rather than a
/// failure; scenarios must never report it as a silent success.
pub const EXIT_SKIP: i32 = 77;
