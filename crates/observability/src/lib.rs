//! Shared tracing setup for the stock ledger binaries.

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Initialize process-wide observability.
///
/// Both servers call this first thing in `main`; safe to call multiple
/// times, subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
