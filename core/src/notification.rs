//! Outbound notification instructions.
//!
//! The engine decides *what* to notify, never *how*: each admission decision,
//! promotion, and lifecycle change yields a [`Notification`] instruction that
//! an external collaborator (email, push, snackbar) delivers. Instructions are
//! published through the [`NotificationBus`] after the state change commits.

use crate::types::{EventId, EventStatus, VolunteerId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An instruction for the notification delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    /// The platform approved the event
    EventApproved {
        /// Approved event
        event_id: EventId,
    },

    /// The platform rejected the event
    EventRejected {
        /// Rejected event
        event_id: EventId,
    },

    /// The event was cancelled; registrations were cascaded
    EventCancelled {
        /// Cancelled event
        event_id: EventId,
    },

    /// The event moved to a new lifecycle status
    EventStatusChanged {
        /// Event concerned
        event_id: EventId,
        /// Previous status
        from: EventStatus,
        /// New status
        to: EventStatus,
    },

    /// A registration took a seat
    RegistrationAccepted {
        /// Event concerned
        event_id: EventId,
        /// Seated volunteer
        volunteer_id: VolunteerId,
    },

    /// A registration joined the waitlist
    RegistrationWaitlisted {
        /// Event concerned
        event_id: EventId,
        /// Waitlisted volunteer
        volunteer_id: VolunteerId,
        /// 1-based waitlist position at the time of joining
        position: u32,
    },

    /// A waitlisted volunteer was promoted into the registered set
    RegistrationPromoted {
        /// Event concerned
        event_id: EventId,
        /// Promoted volunteer
        volunteer_id: VolunteerId,
    },

    /// A registration was cancelled
    RegistrationCancelled {
        /// Event concerned
        event_id: EventId,
        /// Volunteer whose registration ended
        volunteer_id: VolunteerId,
    },

    /// A registration was rejected by the organizer or by re-admission
    RegistrationRejected {
        /// Event concerned
        event_id: EventId,
        /// Rejected volunteer
        volunteer_id: VolunteerId,
    },

    /// A registration awaits organizer approval
    ApprovalRequested {
        /// Event concerned
        event_id: EventId,
        /// Volunteer awaiting approval
        volunteer_id: VolunteerId,
    },
}

impl Notification {
    /// Wire form handed to out-of-process delivery collaborators.
    ///
    /// # Errors
    ///
    /// [`NotificationError::PublishFailed`] when the instruction cannot be
    /// serialized.
    pub fn to_json(&self) -> Result<String, NotificationError> {
        serde_json::to_string(self).map_err(|error| NotificationError::PublishFailed {
            kind: self.kind(),
            reason: error.to_string(),
        })
    }

    /// Stable label for routing and logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EventApproved { .. } => "event-approved",
            Self::EventRejected { .. } => "event-rejected",
            Self::EventCancelled { .. } => "event-cancelled",
            Self::EventStatusChanged { .. } => "event-status-changed",
            Self::RegistrationAccepted { .. } => "registration-accepted",
            Self::RegistrationWaitlisted { .. } => "registration-waitlisted",
            Self::RegistrationPromoted { .. } => "registration-promoted",
            Self::RegistrationCancelled { .. } => "registration-cancelled",
            Self::RegistrationRejected { .. } => "registration-rejected",
            Self::ApprovalRequested { .. } => "approval-requested",
        }
    }
}

/// Errors that can occur while handing instructions to the collaborator.
#[derive(Error, Debug, Clone)]
pub enum NotificationError {
    /// The collaborator refused the instruction
    #[error("publish failed for '{kind}': {reason}")]
    PublishFailed {
        /// Instruction kind that failed
        kind: &'static str,
        /// The reason for failure
        reason: String,
    },

    /// The collaborator is no longer accepting instructions
    #[error("notification bus closed")]
    Closed,
}

/// Transport for notification instructions.
///
/// Implementations must be `Send + Sync`; the engine publishes after it has
/// released the per-event state guard, so implementations are free to await.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Hand one instruction to the delivery collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] when the collaborator cannot accept the
    /// instruction. Delivery failures do not roll back admission state.
    async fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Bus that logs every instruction and delivers nothing.
///
/// Useful as a default collaborator in services that wire delivery up later.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBus;

#[async_trait]
impl NotificationBus for TracingBus {
    async fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(kind = notification.kind(), ?notification, "notification instruction");
        Ok(())
    }
}

/// Bus that forwards instructions onto a bounded channel for an in-process
/// delivery worker.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    sender: tokio::sync::mpsc::Sender<Notification>,
}

impl ChannelBus {
    /// Creates a bus and the receiver the delivery worker drains
    #[must_use]
    pub fn new(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<Notification>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(buffer);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotificationBus for ChannelBus {
    async fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender
            .send(notification)
            .await
            .map_err(|_| NotificationError::Closed)
    }
}
