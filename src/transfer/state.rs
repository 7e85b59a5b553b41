//! Transfer Request States
//!
//! ```text
//! VALIDATING → IN_TRANSACTION → COMMITTED
//!      │            │  ▲
//!      │            │  └── retry after conflict
//!      ▼            ▼
//!   ROLLED_BACK ◀───┘
//! ```
//!
//! Only COMMITTED and ROLLED_BACK are ever reported to callers.

use std::fmt;

/// Per-request transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Checking amount, accounts and currencies; nothing opened yet
    Validating,

    /// Unit of work open against the store
    InTransaction,

    /// Terminal: all five writes visible
    Committed,

    /// Terminal: no writes visible
    RolledBack,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::RolledBack)
    }

    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (*self, next),
            (Validating, InTransaction)
                | (Validating, RolledBack)
                | (InTransaction, InTransaction)
                | (InTransaction, Committed)
                | (InTransaction, RolledBack)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Validating => "VALIDATING",
            TransferState::InTransaction => "IN_TRANSACTION",
            TransferState::Committed => "COMMITTED",
            TransferState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
