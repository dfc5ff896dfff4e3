//! The batch protocol state machine.

use crate::error::Error;

/// Lifecycle states of the batch protocol engine.
///
/// `Error` is absorbing: every state may move into it, and nothing leaves it.
/// `BatchCompleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BatchState {
    /// Nothing has been written yet.
    Start,
    /// The batch envelope is open.
    BatchStarted,
    /// A change-set is open.
    ChangesetStarted,
    /// An operation exists whose body stream has not been requested.
    OperationCreated,
    /// An operation body stream is detached; every other call is refused.
    OperationStreamOpen,
    /// The last operation's body stream has been closed again.
    OperationStreamClosed,
    /// The current change-set has been closed.
    ChangesetCompleted,
    /// The batch envelope has been closed; no further transitions.
    BatchCompleted,
    /// A failure latched the engine; only flushing buffered bytes remains legal.
    Error,
}

impl BatchState {
    /// Whether the protocol permits moving from `self` into `next`.
    ///
    /// Transitions into `Error` are always permitted; transitions out of it
    /// never are.
    fn allows(self, next: BatchState) -> bool {
        use BatchState as S;
        if next == S::Error {
            return true;
        }
        match self {
            S::Start => next == S::BatchStarted,
            S::BatchStarted => matches!(
                next,
                S::ChangesetStarted | S::OperationCreated | S::BatchCompleted
            ),
            S::ChangesetStarted => matches!(next, S::OperationCreated | S::ChangesetCompleted),
            S::OperationCreated => matches!(
                next,
                S::OperationCreated
                    | S::OperationStreamOpen
                    | S::ChangesetStarted
                    | S::ChangesetCompleted
                    | S::BatchCompleted
            ),
            S::OperationStreamOpen => next == S::OperationStreamClosed,
            S::OperationStreamClosed => matches!(
                next,
                S::OperationCreated | S::ChangesetStarted | S::ChangesetCompleted | S::BatchCompleted
            ),
            S::ChangesetCompleted => matches!(
                next,
                S::BatchCompleted | S::ChangesetStarted | S::OperationCreated
            ),
            S::BatchCompleted | S::Error => false,
        }
    }

    /// Validate a transition, producing the protocol-state error on refusal.
    pub(crate) fn check(self, next: BatchState) -> Result<(), Error> {
        if self.allows(next) {
            Ok(())
        } else {
            Err(Error::InvalidBatchProtocolState {
                current: self,
                attempted: next,
            })
        }
    }
}
