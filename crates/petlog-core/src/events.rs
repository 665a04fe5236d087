//! Core events emitted by the home model

use petlog_api::ActivityKind;

use crate::ActivityStatus;

/// Events emitted when the home model re-derives its cards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A scheduled card moved between upcoming, due and overdue
    StatusChanged {
        kind: ActivityKind,
        previous: ActivityStatus,
        current: ActivityStatus,
    },

    /// The server confirmed a locally completed activity
    CompletionConfirmed { kind: ActivityKind },

    /// The home bundle disappeared (group left or never joined)
    HomeCleared,
}

/// Whether two statuses fall in different buckets
pub fn bucket_changed(a: &ActivityStatus, b: &ActivityStatus) -> bool {
    std::mem::discriminant(a) != std::mem::discriminant(b)
}
