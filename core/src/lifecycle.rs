//! Event lifecycle state machine.
//!
//! Owns the transition table for [`EventStatus`] and validates every
//! transition request. Illegal edges are rejected with the full set of legal
//! next states so callers can render precise errors; cancellation and
//! completion transitions carry a cascade instruction for the ledger and the
//! notification collaborator.

use crate::error::AdmissionError;
use crate::types::{Actor, Event, EventStatus, Role};
use serde::{Deserialize, Serialize};

/// What a transition requires of the registrations attached to the event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cascade {
    /// Registrations are untouched
    None,
    /// All active registrations are cancelled
    CancelRegistrations,
    /// Seated registrations complete; remaining waitlist entries are cancelled
    CompleteRegistrations,
}

/// Outcome of a permitted transition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    /// Status before the transition
    pub from: EventStatus,
    /// Status after the transition
    pub to: EventStatus,
    /// Required side effect on the event's registrations
    pub cascade: Cascade,
}

/// Legal next states for each status.
///
/// `Completed` and `Cancelled` are terminal; `Cancelled` is reachable from
/// every non-terminal state.
#[must_use]
pub const fn allowed_targets(from: EventStatus) -> &'static [EventStatus] {
    match from {
        EventStatus::Draft => &[EventStatus::Pending, EventStatus::Cancelled],
        EventStatus::Pending => &[
            EventStatus::Approved,
            EventStatus::Rejected,
            EventStatus::Cancelled,
        ],
        EventStatus::Approved => &[EventStatus::Active, EventStatus::Cancelled],
        EventStatus::Active => &[EventStatus::Ongoing, EventStatus::Cancelled],
        EventStatus::Ongoing => &[EventStatus::Completed, EventStatus::Cancelled],
        EventStatus::Rejected => &[EventStatus::Pending, EventStatus::Cancelled],
        EventStatus::Completed | EventStatus::Cancelled => &[],
    }
}

/// Validates a transition request against the table and the actor's role.
///
/// # Errors
///
/// - [`AdmissionError::Unauthorized`] when the actor's role may not drive the
///   requested edge: platform approval/rejection of an event takes
///   `Role::Admin`, every other transition takes organizer or admin.
/// - [`AdmissionError::InvalidTransition`] when the edge is not in the table;
///   the error carries the legal targets.
pub fn plan_transition(
    event: &Event,
    target: EventStatus,
    actor: &Actor,
) -> Result<TransitionResult, AdmissionError> {
    let required_admin = matches!(target, EventStatus::Approved | EventStatus::Rejected);
    let authorized = if required_admin {
        actor.role == Role::Admin
    } else {
        actor.role.can_manage_event()
    };
    if !authorized {
        return Err(AdmissionError::Unauthorized {
            role: actor.role,
            operation: format!("transition event to {target}"),
        });
    }

    let allowed = allowed_targets(event.status);
    if !allowed.contains(&target) {
        return Err(AdmissionError::InvalidTransition {
            from: event.status,
            to: target,
            allowed: allowed.to_vec(),
        });
    }

    let cascade = match target {
        EventStatus::Cancelled => Cascade::CancelRegistrations,
        EventStatus::Completed => Cascade::CompleteRegistrations,
        _ => Cascade::None,
    };

    Ok(TransitionResult {
        from: event.status,
        to: target,
        cascade,
    })
}
