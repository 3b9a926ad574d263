//! Errors surfaced by the accounting core.

use core::fmt;

/// Errors that the ledger core can return to its caller.
///
/// Store failures are transient and left to the event driver to retry;
/// math failures indicate a contract violation upstream and are never
/// silently absorbed (the index resolver is the one deliberate exception,
/// see `resolver`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// Math operation overflowed the 256-bit working width
    MathOverflow,
    /// Division by zero in ray math (a liquidity index must never be zero)
    DivisionByZero,
    /// A store read or write failed; carries the store's reason
    Store(String),
}

impl LedgerError {
    /// Human-readable message for the error
    pub fn message(&self) -> &str {
        match self {
            LedgerError::MathOverflow => "Math operation overflow",
            LedgerError::DivisionByZero => "Division by zero in ray math",
            LedgerError::Store(_) => "Store operation failed",
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Store(reason) => write!(f, "{}: {}", self.message(), reason),
            _ => f.write_str(self.message()),
        }
    }
}

impl std::error::Error for LedgerError {}
