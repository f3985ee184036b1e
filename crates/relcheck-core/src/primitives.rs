//! # Fixed Constants
//!
//! Diagnostic codes and tuning constants shared by the engine and the
//! composite checker.
//!
//! Codes are stable and documented: external reporting and fix tooling keys
//! on them, so a code is never reused for a different finding.

// =============================================================================
// DIAGNOSTIC CODES
// =============================================================================

/// Role '{0}' is not among expected values '{1}'.
pub const ROLE_UNKNOWN: u32 = 1701;

/// Empty role found when expecting one of '{0}'.
pub const ROLE_EMPTY: u32 = 1702;

/// Number of '{0}' roles too high ({1}).
pub const HIGH_COUNT: u32 = 1704;

/// Number of '{0}' roles too low ({1}).
pub const LOW_COUNT: u32 = 1705;

/// Role '{0}' missing.
pub const ROLE_MISSING: u32 = 1706;

/// Composite type is unknown.
pub const COMPOSITE_UNKNOWN: u32 = 1707;

/// Member does not match the role's member expression.
pub const WRONG_ROLE: u32 = 1708;

/// Member type does not match the role's accepted types.
pub const WRONG_TYPE: u32 = 1709;

/// Composites build a circular dependency.
pub const COMPOSITE_LOOP: u32 = 1710;

/// Composite is empty.
pub const COMPOSITE_EMPTY: u32 = 1711;

// =============================================================================
// ENGINE TUNING
// =============================================================================

/// Number of dispatched entities between two progress text updates.
///
/// Progress ticks are cheap; formatted text is not, so it is throttled.
pub const PROGRESS_TEXT_INTERVAL: usize = 1000;

/// Initial capacity of the run-scoped diagnostic list.
pub const DIAGNOSTICS_INITIAL_CAPACITY: usize = 30;

// =============================================================================
// CHECKER VOCABULARY
// =============================================================================

/// Group headline shared by every role-shape and member-shape diagnostic.
pub const ROLE_VERIFICATION_PROBLEM: &str = "Role verification problem";

/// Label rendered for the empty (default) role.
pub const EMPTY_ROLE_LABEL: &str = "<empty>";

/// `route=*` values of public transport routes that need a scheme version.
pub const PUBLIC_TRANSPORT_ROUTES: &[&str] = &[
    "train",
    "subway",
    "monorail",
    "tram",
    "bus",
    "trolleybus",
    "aerialway",
    "ferry",
];

/// Tag key announcing the public transport scheme version.
pub const PUBLIC_TRANSPORT_VERSION_KEY: &str = "public_transport:version";

// =============================================================================
// FORMAT LIMITS
// =============================================================================

/// Maximum size of a data set or grammar document, checked before parsing.
pub const MAX_DOCUMENT_SIZE: usize = 256 * 1024 * 1024;
