//! Organizer approval workflow.
//!
//! Events with `requires_approval` hold incoming registrations in the
//! `PendingApproval` sub-state, which consumes no capacity slot. Approval is
//! a *re-admission*: the ledger is consulted as if the request had just
//! arrived, so a volunteer approved after capacity filled up lands on the
//! waitlist or is rejected. Rejection is terminal and releases nothing,
//! since pending registrations never held a seat. Decoupling "approved by
//! the organizer" from "has a guaranteed seat" keeps a stack of pending
//! approvals from overbooking the event.
//!
//! There is no automatic timeout: a pending registration stays pending until
//! the organizer decides (see `EngineConfig` for the advisory window).

use crate::error::AdmissionError;
use crate::types::{Actor, EventId, Registration, RegistrationState, VolunteerId};

/// Checks that the actor may decide on pending participants.
///
/// # Errors
///
/// [`AdmissionError::Unauthorized`] unless the actor is an organizer or admin.
pub fn authorize(actor: &Actor, operation: &str) -> Result<(), AdmissionError> {
    if actor.role.can_manage_event() {
        Ok(())
    } else {
        Err(AdmissionError::Unauthorized {
            role: actor.role,
            operation: operation.to_string(),
        })
    }
}

/// Checks that the volunteer has a registration the workflow can decide on.
///
/// # Errors
///
/// [`AdmissionError::RegistrationNotFound`] when there is no registration or
/// it is not in `PendingApproval`.
pub fn validate_pending(
    registration: Option<&Registration>,
    event_id: EventId,
    volunteer_id: VolunteerId,
) -> Result<(), AdmissionError> {
    match registration {
        Some(registration) if registration.state == RegistrationState::PendingApproval => Ok(()),
        _ => Err(AdmissionError::RegistrationNotFound {
            event_id,
            volunteer_id,
        }),
    }
}
