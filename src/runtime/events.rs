//! Operation lifecycle events delivered to subscribers.

use crate::{operation::Operation, types::OperationId};

/// Events emitted whenever the operation store changes visibly.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    /// A pending operation was created (also used for replay).
    Created(Operation),
    /// A pending operation reached its terminal state.
    Updated(Operation),
    /// The store was emptied on request.
    Cleared,
}

impl OperationEvent {
    /// Operation carried by the event, if any.
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Self::Created(op) | Self::Updated(op) => Some(op),
            Self::Cleared => None,
        }
    }

    /// Id of the operation carried by the event, if any.
    pub fn operation_id(&self) -> Option<&OperationId> {
        self.operation().map(|op| &op.id)
    }
}
