//! Typed failure taxonomy for the admission engine.
//!
//! Every rejected operation surfaces one of these values to the caller; the
//! API layer maps them to user-facing messages. Nothing here is ever coerced
//! into a silent default state.

use crate::types::{EventId, EventStatus, Role, VolunteerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by admission, lifecycle, and ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionError {
    /// The requested lifecycle edge is not in the transition table
    #[error("cannot transition event from {from} to {to}; legal targets: {allowed:?}")]
    InvalidTransition {
        /// Current status
        from: EventStatus,
        /// Requested status
        to: EventStatus,
        /// The full set of legal next states, for UI/error messaging
        allowed: Vec<EventStatus>,
    },

    /// The event's lifecycle status or deadline refuses registrations
    #[error("event {event_id} is not open for registration (status: {status})")]
    EventNotOpen {
        /// Event refused
        event_id: EventId,
        /// Status at the time of refusal
        status: EventStatus,
    },

    /// The volunteer already holds an active registration for this event
    #[error("volunteer {volunteer_id} is already registered for event {event_id}")]
    AlreadyRegistered {
        /// Event concerned
        event_id: EventId,
        /// Volunteer with the existing registration
        volunteer_id: VolunteerId,
    },

    /// All seats are taken and no waitlist is available
    #[error("event {event_id} is full")]
    EventFull {
        /// Full event
        event_id: EventId,
    },

    /// The waitlist has reached its configured bound
    #[error("waitlist for event {event_id} is full")]
    WaitlistFull {
        /// Event whose waitlist is full
        event_id: EventId,
    },

    /// The event does not form a waitlist
    #[error("event {event_id} has no waitlist")]
    WaitlistDisabled {
        /// Event without a waitlist
        event_id: EventId,
    },

    /// No such event
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// No active registration for the volunteer on this event.
    ///
    /// Also the answer to cancelling an already-cancelled registration:
    /// a no-op error, never a silent success.
    #[error("no active registration for volunteer {volunteer_id} on event {event_id}")]
    RegistrationNotFound {
        /// Event concerned
        event_id: EventId,
        /// Volunteer without an active registration
        volunteer_id: VolunteerId,
    },

    /// The actor's role does not permit the operation
    #[error("role {role:?} may not {operation}")]
    Unauthorized {
        /// Role the actor holds
        role: Role,
        /// Operation that was refused
        operation: String,
    },

    /// Capacity cannot drop below the number of seated participants
    #[error(
        "cannot set capacity of event {event_id} to {requested}: {seated} volunteers are seated"
    )]
    CapacityBelowRegistered {
        /// Event concerned
        event_id: EventId,
        /// Requested capacity
        requested: u32,
        /// Current seated count
        seated: u32,
    },

    /// Event creation input was rejected
    #[error("invalid event draft: {reason}")]
    InvalidDraft {
        /// Why the draft was refused
        reason: String,
    },

    /// A ledger invariant no longer holds.
    ///
    /// Indicates a concurrency bug inside the engine, never a caller mistake;
    /// logged at error level and surfaced, not masked.
    #[error("ledger invariant violated for event {event_id}: {detail}")]
    InvariantViolation {
        /// Event whose ledger is corrupt
        event_id: EventId,
        /// Which invariant failed
        detail: String,
    },
}

impl AdmissionError {
    /// Whether this error indicates an internal engine bug rather than a
    /// refused request
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
