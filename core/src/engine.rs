//! The admission engine facade.
//!
//! Owns every event's [`EventRecord`] and serializes access per event: the
//! records live in a [`DashMap`] keyed by event id, so the read-modify-write
//! of one event's ledger holds that event's shard lock while operations on
//! other events proceed in parallel. There is no global lock. The reducer
//! runs synchronously under the guard; notification effects are executed
//! only after the guard drops, so no await point ever holds a shard.

use crate::admission::{
    AdmissionAction, AdmissionDecision, AdmissionEnvironment, AdmissionReducer, EventRecord,
};
use crate::config::EngineConfig;
use crate::effect;
use crate::environment::{Clock, SystemClock};
use crate::error::AdmissionError;
use crate::lifecycle::{self, TransitionResult};
use crate::notification::{Notification, NotificationBus, TracingBus};
use crate::reducer::Reducer;
use crate::types::{Actor, Capacity, Event, EventDraft, EventId, Registration, VolunteerId};
use dashmap::DashMap;
use std::sync::Arc;

/// Read-only view of one event's admission state.
#[derive(Clone, Debug)]
pub struct EventSnapshot {
    /// The event and its policy
    pub event: Event,
    /// Seated volunteers in admission order
    pub seated: Vec<VolunteerId>,
    /// Waitlist in FIFO order, head first
    pub waitlisted: Vec<VolunteerId>,
}

/// Server-authoritative engine for event admission and lifecycle.
///
/// One instance serves every event; callers never supply participant counts,
/// they ask the engine per request.
pub struct AdmissionEngine {
    records: DashMap<EventId, EventRecord>,
    reducer: AdmissionReducer,
    env: AdmissionEnvironment,
    bus: Arc<dyn NotificationBus>,
    config: EngineConfig,
}

impl AdmissionEngine {
    /// Creates an engine with the given collaborators
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        bus: Arc<dyn NotificationBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            records: DashMap::new(),
            reducer: AdmissionReducer::new(),
            env: AdmissionEnvironment::new(clock),
            bus,
            config,
        }
    }

    /// Creates an engine on the system clock with a logging notification bus
    #[must_use]
    pub fn with_system_defaults() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(TracingBus),
            EngineConfig::default(),
        )
    }

    /// The advisory configuration hosts may use for expiry scheduling
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates an event in `Draft` status.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvalidDraft`] for an empty name or a non-positive
    /// capacity.
    pub fn create_event(&self, draft: EventDraft) -> Result<Event, AdmissionError> {
        if draft.name.trim().is_empty() {
            return Err(AdmissionError::InvalidDraft {
                reason: "event name cannot be empty".to_string(),
            });
        }
        if draft.max_participants.value() == 0 {
            return Err(AdmissionError::InvalidDraft {
                reason: "max participants must be positive".to_string(),
            });
        }

        let event = Event::from_draft(draft, self.env.clock.now());
        tracing::info!(event_id = %event.id, name = %event.name, "event created");
        self.records.insert(event.id, EventRecord::new(event.clone()));
        Ok(event)
    }

    /// Registers a volunteer: seat, waitlist, or hold for approval.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `EventNotOpen`, `AlreadyRegistered`, `EventFull`,
    /// `WaitlistFull`.
    pub async fn register(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<AdmissionDecision, AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::Register { volunteer_id },
            move |record| decision_of(record, volunteer_id),
        )
        .await
    }

    /// Cancels a volunteer's active registration, promoting from the
    /// waitlist when a seat frees up.
    ///
    /// # Errors
    ///
    /// `EventNotFound`; `RegistrationNotFound` when there is nothing active
    /// to cancel (cancelling twice is an error, not a silent success).
    pub async fn unregister(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<(), AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::Unregister { volunteer_id },
            |_record| Ok(()),
        )
        .await
    }

    /// Joins the waitlist explicitly, never taking a seat.
    ///
    /// Returns the 1-based waitlist position.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `EventNotOpen`, `AlreadyRegistered`,
    /// `WaitlistDisabled`, `WaitlistFull`.
    pub async fn join_waitlist(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<u32, AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::JoinWaitlist { volunteer_id },
            move |record| {
                record
                    .ledger
                    .waitlist_position(volunteer_id)
                    .ok_or_else(|| AdmissionError::InvariantViolation {
                        event_id,
                        detail: "waitlist position missing after join".to_string(),
                    })
            },
        )
        .await
    }

    /// Leaves the waitlist.
    ///
    /// # Errors
    ///
    /// `EventNotFound`; `RegistrationNotFound` when the volunteer is not
    /// waitlisted.
    pub async fn leave_waitlist(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<(), AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::LeaveWaitlist { volunteer_id },
            |_record| Ok(()),
        )
        .await
    }

    /// Approves a pending registration. Approval is a re-admission, so the
    /// returned decision may be `Accepted`, `Waitlisted`, or `Rejected`
    /// depending on the capacity consumed since the request arrived.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `Unauthorized`, `RegistrationNotFound`,
    /// `EventNotOpen`.
    pub async fn approve(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
        actor: Actor,
    ) -> Result<AdmissionDecision, AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::ApproveParticipant {
                volunteer_id,
                actor,
            },
            move |record| decision_of(record, volunteer_id),
        )
        .await
    }

    /// Rejects a pending registration. Terminal; no slot is released because
    /// none was held.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `Unauthorized`, `RegistrationNotFound`.
    pub async fn reject(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
        actor: Actor,
    ) -> Result<(), AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::RejectParticipant {
                volunteer_id,
                actor,
            },
            |_record| Ok(()),
        )
        .await
    }

    /// Drives the event lifecycle. Cancellation and completion cascade to the
    /// event's registrations inside the same call.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `Unauthorized`; `InvalidTransition` carrying the full
    /// set of legal next states.
    pub async fn transition(
        &self,
        event_id: EventId,
        target: crate::types::EventStatus,
        actor: Actor,
    ) -> Result<TransitionResult, AdmissionError> {
        let (result, notifications) = {
            let mut record = self
                .records
                .get_mut(&event_id)
                .ok_or(AdmissionError::EventNotFound(event_id))?;

            // Planned up front so the caller gets the from/to/cascade view;
            // the reducer re-validates on the same state under the guard.
            let planned = lifecycle::plan_transition(&record.event, target, &actor)?;
            let effects = self.reducer.reduce(
                record.value_mut(),
                AdmissionAction::RequestTransition { target, actor },
                &self.env,
            );
            if let Some(error) = record.last_error.take() {
                return Err(error);
            }
            record.check_invariants()?;
            (planned, effect::notifications(&effects))
        };

        self.publish_all(notifications).await;
        Ok(result)
    }

    /// Changes the seated capacity bound; an increase feeds the promotion
    /// engine with the freed delta. Returns the number of volunteers
    /// promoted by the change.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `Unauthorized`, `InvalidDraft` (zero capacity),
    /// `CapacityBelowRegistered`.
    pub async fn set_max_participants(
        &self,
        event_id: EventId,
        new_max: Capacity,
        actor: Actor,
    ) -> Result<u32, AdmissionError> {
        let (notifications, promoted) = {
            let mut record = self
                .records
                .get_mut(&event_id)
                .ok_or(AdmissionError::EventNotFound(event_id))?;
            let effects = self.reducer.reduce(
                record.value_mut(),
                AdmissionAction::SetMaxParticipants { new_max, actor },
                &self.env,
            );
            if let Some(error) = record.last_error.take() {
                return Err(error);
            }
            record.check_invariants()?;
            let notifications = effect::notifications(&effects);
            let promoted = notifications
                .iter()
                .filter(|n| matches!(n, Notification::RegistrationPromoted { .. }))
                .count();
            (notifications, promoted)
        };

        self.publish_all(notifications).await;
        Ok(u32::try_from(promoted).unwrap_or(u32::MAX))
    }

    /// Records a no-show for a seated volunteer, freeing the seat for the
    /// waitlist.
    ///
    /// # Errors
    ///
    /// `EventNotFound`, `Unauthorized`, `RegistrationNotFound`.
    pub async fn mark_no_show(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
        actor: Actor,
    ) -> Result<(), AdmissionError> {
        self.dispatch(
            event_id,
            AdmissionAction::MarkNoShow {
                volunteer_id,
                actor,
            },
            |_record| Ok(()),
        )
        .await
    }

    /// 1-based waitlist position; `None` when the volunteer is not waitlisted.
    ///
    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn waitlist_position(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<Option<u32>, AdmissionError> {
        let record = self
            .records
            .get(&event_id)
            .ok_or(AdmissionError::EventNotFound(event_id))?;
        Ok(record.ledger.waitlist_position(volunteer_id))
    }

    /// A volunteer's registration, in whatever state it settled.
    ///
    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn registration(
        &self,
        event_id: EventId,
        volunteer_id: VolunteerId,
    ) -> Result<Option<Registration>, AdmissionError> {
        let record = self
            .records
            .get(&event_id)
            .ok_or(AdmissionError::EventNotFound(event_id))?;
        Ok(record.registrations.get(&volunteer_id).cloned())
    }

    /// Read-only view of an event's admission state.
    ///
    /// # Errors
    ///
    /// `EventNotFound`.
    pub fn snapshot(&self, event_id: EventId) -> Result<EventSnapshot, AdmissionError> {
        let record = self
            .records
            .get(&event_id)
            .ok_or(AdmissionError::EventNotFound(event_id))?;
        Ok(EventSnapshot {
            event: record.event.clone(),
            seated: record.ledger.seated().to_vec(),
            waitlisted: record.ledger.waitlist(),
        })
    }

    /// Runs one command under the event's shard guard, surfaces the typed
    /// outcome, then publishes the notification instructions.
    async fn dispatch<T>(
        &self,
        event_id: EventId,
        action: AdmissionAction,
        outcome: impl FnOnce(&EventRecord) -> Result<T, AdmissionError>,
    ) -> Result<T, AdmissionError> {
        let (value, notifications) = {
            let mut record = self
                .records
                .get_mut(&event_id)
                .ok_or(AdmissionError::EventNotFound(event_id))?;
            let effects = self.reducer.reduce(record.value_mut(), action, &self.env);
            if let Some(error) = record.last_error.take() {
                return Err(error);
            }
            record.check_invariants()?;
            let value = outcome(record.value())?;
            (value, effect::notifications(&effects))
        };

        self.publish_all(notifications).await;
        Ok(value)
    }

    /// Best-effort hand-off to the delivery collaborator. Publish failures
    /// never roll back admission state.
    async fn publish_all(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            let kind = notification.kind();
            if let Err(error) = self.bus.publish(notification).await {
                tracing::warn!(kind, %error, "notification publish failed");
            }
        }
    }
}

/// Maps a volunteer's post-dispatch registration state to the caller-facing
/// decision.
fn decision_of(
    record: &EventRecord,
    volunteer_id: VolunteerId,
) -> Result<AdmissionDecision, AdmissionError> {
    record
        .decision_for(volunteer_id)
        .ok_or_else(|| AdmissionError::InvariantViolation {
            event_id: record.event.id,
            detail: format!("no decision recorded for volunteer {volunteer_id}"),
        })
}
