//! Transfer FSM State Definitions
//!
//! State IDs are stored in PostgreSQL as SMALLINT.

use std::fmt;

/// Transfer FSM States
///
/// Terminal states: COMMITTED (40), FAILED (-10), ROLLED_BACK (-30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransferState {
    /// Initial state - intent validated and recorded
    Init = 0,

    /// Source debit initiated (persist-before-call)
    DebitPending = 10,

    /// Source debit confirmed - funds are IN-FLIGHT
    /// CRITICAL: Must eventually reach CREDITED or ROLLED_BACK
    Debited = 20,

    /// Target credit initiated (persist-before-call)
    CreditPending = 30,

    /// Both balances moved; audit record outstanding
    Credited = 35,

    /// Terminal: Transfer completed and audited
    Committed = 40,

    /// Terminal: Source debit failed (no funds moved)
    Failed = -10,

    /// Compensation in progress (refunding source)
    Compensating = -20,

    /// Terminal: Source refund completed
    RolledBack = -30,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Committed | TransferState::Failed | TransferState::RolledBack
        )
    }

    /// Check if funds are in-flight (source debited, target not confirmed)
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            TransferState::Debited | TransferState::CreditPending | TransferState::Compensating
        )
    }

    /// Funds reached the target (audit may still be outstanding)
    #[inline]
    pub fn is_settled(&self) -> bool {
        matches!(self, TransferState::Credited | TransferState::Committed)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferState::Init),
            10 => Some(TransferState::DebitPending),
            20 => Some(TransferState::Debited),
            30 => Some(TransferState::CreditPending),
            35 => Some(TransferState::Credited),
            40 => Some(TransferState::Committed),
            -10 => Some(TransferState::Failed),
            -20 => Some(TransferState::Compensating),
            -30 => Some(TransferState::RolledBack),
            _ => None,
        }
    }

    /// Non-terminal state IDs, used by the recovery scan
    pub fn active_ids() -> [i16; 6] {
        [
            TransferState::Init.id(),
            TransferState::DebitPending.id(),
            TransferState::Debited.id(),
            TransferState::CreditPending.id(),
            TransferState::Credited.id(),
            TransferState::Compensating.id(),
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Init => "INIT",
            TransferState::DebitPending => "DEBIT_PENDING",
            TransferState::Debited => "DEBITED",
            TransferState::CreditPending => "CREDIT_PENDING",
            TransferState::Credited => "CREDITED",
            TransferState::Committed => "COMMITTED",
            TransferState::Failed => "FAILED",
            TransferState::Compensating => "COMPENSATING",
            TransferState::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransferState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransferState::from_id(value).ok_or(())
    }
}
