//! Admission controller.
//!
//! The entry point for registration, cancellation, waitlist, approval, and
//! lifecycle requests on a single event. The reducer consults the lifecycle
//! state machine (is the event open?), the ledger (is there capacity?), and
//! the approval workflow, applies the resulting facts to the per-event
//! record, and emits notification instructions as effects.
//!
//! Commands validate first and touch nothing on failure; the typed error is
//! recorded in `last_error` for the engine facade to surface. Facts are
//! applied through [`AdmissionReducer::apply_event`], the single mutation
//! path for the record.

use crate::approval;
use crate::effect::Effect;
use crate::environment::Clock;
use crate::error::AdmissionError;
use crate::ledger::{Admission, Ledger, Slot};
use crate::lifecycle::{self, Cascade};
use crate::notification::Notification;
use crate::promotion;
use crate::reducer::{Effects, Reducer};
use crate::types::{
    Actor, Capacity, Event, EventStatus, Registration, RegistrationState, VolunteerId,
};
use admission_macros::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Decisions
// ============================================================================

/// Outcome of an admission request, surfaced to the API collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    /// The volunteer holds a seat
    Accepted,
    /// The volunteer joined the waitlist
    Waitlisted {
        /// 1-based position at decision time
        position: u32,
    },
    /// Held for organizer approval; no capacity slot consumed
    PendingApproval,
    /// Terminally rejected (re-admission found the event full)
    Rejected,
}

// ============================================================================
// State
// ============================================================================

/// Everything the engine knows about one event: the entity, its ledger, and
/// the registrations keyed by volunteer.
#[derive(Clone, Debug)]
pub struct EventRecord {
    /// The event and its admission policy
    pub event: Event,
    /// Seated and waitlisted volunteers, in order
    pub ledger: Ledger,
    /// All registrations ever made for the event, active and settled
    pub registrations: HashMap<VolunteerId, Registration>,
    /// The typed failure of the most recent command, if it was refused
    pub last_error: Option<AdmissionError>,
}

impl EventRecord {
    /// Creates a record for a freshly created event
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event,
            ledger: Ledger::new(),
            registrations: HashMap::new(),
            last_error: None,
        }
    }

    /// The volunteer's active registration, if any
    #[must_use]
    pub fn active_registration(&self, volunteer_id: VolunteerId) -> Option<&Registration> {
        self.registrations
            .get(&volunteer_id)
            .filter(|registration| registration.is_active())
    }

    /// Maps a volunteer's registration state to the decision the caller sees
    #[must_use]
    pub fn decision_for(&self, volunteer_id: VolunteerId) -> Option<AdmissionDecision> {
        let registration = self.registrations.get(&volunteer_id)?;
        match registration.state {
            RegistrationState::Approved => Some(AdmissionDecision::Accepted),
            RegistrationState::Waitlisted => Some(AdmissionDecision::Waitlisted {
                position: self.ledger.waitlist_position(volunteer_id).unwrap_or(0),
            }),
            RegistrationState::PendingApproval => Some(AdmissionDecision::PendingApproval),
            RegistrationState::Rejected => Some(AdmissionDecision::Rejected),
            RegistrationState::Cancelled
            | RegistrationState::Completed
            | RegistrationState::NoShow => None,
        }
    }

    /// Verifies the ledger invariants and the ledger/registration agreement.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvariantViolation`]; see [`Ledger::check_invariants`].
    pub fn check_invariants(&self) -> Result<(), AdmissionError> {
        self.ledger.check_invariants(&self.event)?;

        for volunteer_id in self.ledger.seated() {
            let seated_state = self.registrations.get(volunteer_id).map(|r| r.state);
            if !matches!(
                seated_state,
                Some(RegistrationState::Approved | RegistrationState::Completed)
            ) {
                return Err(AdmissionError::InvariantViolation {
                    event_id: self.event.id,
                    detail: format!("seated volunteer {volunteer_id} has state {seated_state:?}"),
                });
            }
        }

        for volunteer_id in self.ledger.waitlist() {
            let waiting_state = self.registrations.get(&volunteer_id).map(|r| r.state);
            if waiting_state != Some(RegistrationState::Waitlisted) {
                return Err(AdmissionError::InvariantViolation {
                    event_id: self.event.id,
                    detail: format!(
                        "waitlisted volunteer {volunteer_id} has state {waiting_state:?}"
                    ),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for one event's admission record.
///
/// Commands express requests from the API collaborator; events record the
/// facts the reducer decided on.
#[derive(Action, Clone, Debug, Serialize, Deserialize)]
pub enum AdmissionAction {
    // Commands
    /// Register a volunteer, waitlisting or holding for approval as policy
    /// dictates
    #[command]
    Register {
        /// Registering volunteer
        volunteer_id: VolunteerId,
    },

    /// Cancel a volunteer's active registration
    #[command]
    Unregister {
        /// Volunteer withdrawing
        volunteer_id: VolunteerId,
    },

    /// Join the waitlist explicitly, without taking a seat
    #[command]
    JoinWaitlist {
        /// Joining volunteer
        volunteer_id: VolunteerId,
    },

    /// Leave the waitlist
    #[command]
    LeaveWaitlist {
        /// Leaving volunteer
        volunteer_id: VolunteerId,
    },

    /// Approve a pending registration (re-admission)
    #[command]
    ApproveParticipant {
        /// Volunteer awaiting approval
        volunteer_id: VolunteerId,
        /// Deciding organizer
        actor: Actor,
    },

    /// Reject a pending registration
    #[command]
    RejectParticipant {
        /// Volunteer awaiting approval
        volunteer_id: VolunteerId,
        /// Deciding organizer
        actor: Actor,
    },

    /// Drive the event lifecycle
    #[command]
    RequestTransition {
        /// Requested status
        target: EventStatus,
        /// Requesting actor
        actor: Actor,
    },

    /// Change the seated capacity bound
    #[command]
    SetMaxParticipants {
        /// New capacity
        new_max: Capacity,
        /// Requesting actor
        actor: Actor,
    },

    /// Record that a seated volunteer did not attend
    #[command]
    MarkNoShow {
        /// Absent volunteer
        volunteer_id: VolunteerId,
        /// Recording organizer
        actor: Actor,
    },

    // Events
    /// A volunteer took a seat
    #[event]
    VolunteerSeated {
        /// Seated volunteer
        volunteer_id: VolunteerId,
        /// When seated
        seated_at: DateTime<Utc>,
    },

    /// A volunteer joined the waitlist
    #[event]
    VolunteerWaitlisted {
        /// Waitlisted volunteer
        volunteer_id: VolunteerId,
        /// 1-based position at join time
        position: u32,
        /// When waitlisted
        waitlisted_at: DateTime<Utc>,
    },

    /// A registration was held for organizer approval
    #[event]
    ApprovalRequested {
        /// Volunteer awaiting approval
        volunteer_id: VolunteerId,
        /// When requested
        requested_at: DateTime<Utc>,
    },

    /// A registration was terminally rejected
    #[event]
    ParticipantRejected {
        /// Rejected volunteer
        volunteer_id: VolunteerId,
        /// When rejected
        rejected_at: DateTime<Utc>,
    },

    /// A registration was cancelled
    #[event]
    RegistrationCancelled {
        /// Volunteer whose registration ended
        volunteer_id: VolunteerId,
        /// When cancelled
        cancelled_at: DateTime<Utc>,
    },

    /// A volunteer left the waitlist
    #[event]
    VolunteerLeftWaitlist {
        /// Leaving volunteer
        volunteer_id: VolunteerId,
        /// When they left
        left_at: DateTime<Utc>,
    },

    /// A waitlisted volunteer was promoted into a freed seat
    #[event]
    VolunteerPromoted {
        /// Promoted volunteer
        volunteer_id: VolunteerId,
        /// When promoted
        promoted_at: DateTime<Utc>,
    },

    /// The event moved to a new lifecycle status
    #[event]
    StatusChanged {
        /// Previous status
        from: EventStatus,
        /// New status
        to: EventStatus,
        /// When changed
        changed_at: DateTime<Utc>,
    },

    /// The seated capacity bound changed
    #[event]
    CapacityChanged {
        /// Previous capacity
        previous: Capacity,
        /// New capacity
        new_max: Capacity,
        /// When changed
        changed_at: DateTime<Utc>,
    },

    /// A seated volunteer did not attend
    #[event]
    NoShowRecorded {
        /// Absent volunteer
        volunteer_id: VolunteerId,
        /// When recorded
        recorded_at: DateTime<Utc>,
    },

    /// A seated volunteer's participation completed with the event
    #[event]
    ParticipationCompleted {
        /// Participating volunteer
        volunteer_id: VolunteerId,
        /// When completed
        completed_at: DateTime<Utc>,
    },

    /// A command was refused with a typed error
    #[event]
    AdmissionFailed {
        /// Why the command was refused
        error: AdmissionError,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the admission reducer
#[derive(Clone)]
pub struct AdmissionEnvironment {
    /// Clock for decision timestamps
    pub clock: Arc<dyn Clock>,
}

impl AdmissionEnvironment {
    /// Creates a new `AdmissionEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for a single event's admission record.
#[derive(Clone, Debug, Default)]
pub struct AdmissionReducer;

impl AdmissionReducer {
    /// Creates a new `AdmissionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Records a refused command and returns no effects
    fn fail(state: &mut EventRecord, error: AdmissionError) -> Effects {
        tracing::warn!(event_id = %state.event.id, %error, "admission command refused");
        Self::apply_event(state, &AdmissionAction::AdmissionFailed { error });
        SmallVec::new()
    }

    /// Creates or replaces the volunteer's registration for an admission
    /// outcome. An active registration changes state in place (approval and
    /// promotion paths); a settled one is superseded by a fresh registration.
    fn upsert_registration(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        new_state: RegistrationState,
        at: DateTime<Utc>,
    ) {
        if let Some(existing) = state.registrations.get_mut(&volunteer_id) {
            if existing.is_active() {
                existing.state = new_state;
                existing.updated_at = at;
                return;
            }
        }
        state.registrations.insert(
            volunteer_id,
            Registration::new(state.event.id, volunteer_id, new_state, at),
        );
    }

    /// Settles the volunteer's registration into a terminal state
    fn settle_registration(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        new_state: RegistrationState,
        at: DateTime<Utc>,
    ) {
        if let Some(registration) = state.registrations.get_mut(&volunteer_id) {
            registration.state = new_state;
            registration.updated_at = at;
        }
    }

    /// Applies a fact to the record. The single mutation path.
    fn apply_event(state: &mut EventRecord, action: &AdmissionAction) {
        match action {
            AdmissionAction::VolunteerSeated {
                volunteer_id,
                seated_at,
            } => {
                state.ledger.seat(*volunteer_id);
                Self::upsert_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Approved,
                    *seated_at,
                );
                state.last_error = None;
            }
            AdmissionAction::VolunteerWaitlisted {
                volunteer_id,
                waitlisted_at,
                ..
            } => {
                state.ledger.enqueue(*volunteer_id);
                Self::upsert_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Waitlisted,
                    *waitlisted_at,
                );
                state.last_error = None;
            }
            AdmissionAction::ApprovalRequested {
                volunteer_id,
                requested_at,
            } => {
                Self::upsert_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::PendingApproval,
                    *requested_at,
                );
                state.last_error = None;
            }
            AdmissionAction::ParticipantRejected {
                volunteer_id,
                rejected_at,
            } => {
                Self::settle_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Rejected,
                    *rejected_at,
                );
                state.last_error = None;
            }
            AdmissionAction::RegistrationCancelled {
                volunteer_id,
                cancelled_at,
            } => {
                state.ledger.remove(*volunteer_id);
                Self::settle_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Cancelled,
                    *cancelled_at,
                );
                state.last_error = None;
            }
            AdmissionAction::VolunteerLeftWaitlist {
                volunteer_id,
                left_at,
            } => {
                state.ledger.remove(*volunteer_id);
                Self::settle_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Cancelled,
                    *left_at,
                );
                state.last_error = None;
            }
            AdmissionAction::VolunteerPromoted {
                volunteer_id,
                promoted_at,
            } => {
                state.ledger.remove(*volunteer_id);
                state.ledger.seat(*volunteer_id);
                Self::upsert_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Approved,
                    *promoted_at,
                );
                state.last_error = None;
            }
            AdmissionAction::StatusChanged { to, .. } => {
                state.event.status = *to;
                state.last_error = None;
            }
            AdmissionAction::CapacityChanged { new_max, .. } => {
                state.event.max_participants = *new_max;
                state.last_error = None;
            }
            AdmissionAction::NoShowRecorded {
                volunteer_id,
                recorded_at,
            } => {
                state.ledger.remove(*volunteer_id);
                Self::settle_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::NoShow,
                    *recorded_at,
                );
                state.last_error = None;
            }
            AdmissionAction::ParticipationCompleted {
                volunteer_id,
                completed_at,
            } => {
                Self::settle_registration(
                    state,
                    *volunteer_id,
                    RegistrationState::Completed,
                    *completed_at,
                );
                state.last_error = None;
            }
            AdmissionAction::AdmissionFailed { error } => {
                state.last_error = Some(error.clone());
            }
            // Commands don't modify state
            AdmissionAction::Register { .. }
            | AdmissionAction::Unregister { .. }
            | AdmissionAction::JoinWaitlist { .. }
            | AdmissionAction::LeaveWaitlist { .. }
            | AdmissionAction::ApproveParticipant { .. }
            | AdmissionAction::RejectParticipant { .. }
            | AdmissionAction::RequestTransition { .. }
            | AdmissionAction::SetMaxParticipants { .. }
            | AdmissionAction::MarkNoShow { .. } => {}
        }
    }

    /// Seats or waitlists each promotable volunteer after capacity freed
    fn promote_freed(
        state: &mut EventRecord,
        freed: u32,
        at: DateTime<Utc>,
        effects: &mut Effects,
    ) {
        let promoted = promotion::plan(&state.event, &state.ledger, &state.registrations, freed);
        for volunteer_id in promoted {
            Self::apply_event(
                state,
                &AdmissionAction::VolunteerPromoted {
                    volunteer_id,
                    promoted_at: at,
                },
            );
            tracing::info!(
                event_id = %state.event.id,
                %volunteer_id,
                "promoted from waitlist"
            );
            effects.push(Effect::notify(Notification::RegistrationPromoted {
                event_id: state.event.id,
                volunteer_id,
            }));
        }
    }

    fn handle_register(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if !state.event.registration_open(now) {
            return Self::fail(
                state,
                AdmissionError::EventNotOpen {
                    event_id: state.event.id,
                    status: state.event.status,
                },
            );
        }

        if state.active_registration(volunteer_id).is_some() {
            return Self::fail(
                state,
                AdmissionError::AlreadyRegistered {
                    event_id: state.event.id,
                    volunteer_id,
                },
            );
        }

        if state.event.requires_approval {
            Self::apply_event(
                state,
                &AdmissionAction::ApprovalRequested {
                    volunteer_id,
                    requested_at: now,
                },
            );
            tracing::info!(event_id = %state.event.id, %volunteer_id, "held for approval");
            return smallvec::smallvec![Effect::notify(Notification::ApprovalRequested {
                event_id: state.event.id,
                volunteer_id,
            })];
        }

        match state.ledger.plan_admission(&state.event, volunteer_id) {
            Ok(Admission::Seated) => {
                Self::apply_event(
                    state,
                    &AdmissionAction::VolunteerSeated {
                        volunteer_id,
                        seated_at: now,
                    },
                );
                tracing::info!(event_id = %state.event.id, %volunteer_id, "registration accepted");
                smallvec::smallvec![Effect::notify(Notification::RegistrationAccepted {
                    event_id: state.event.id,
                    volunteer_id,
                })]
            }
            Ok(Admission::Waitlisted { position }) => {
                Self::apply_event(
                    state,
                    &AdmissionAction::VolunteerWaitlisted {
                        volunteer_id,
                        position,
                        waitlisted_at: now,
                    },
                );
                tracing::info!(
                    event_id = %state.event.id,
                    %volunteer_id,
                    position,
                    "registration waitlisted"
                );
                smallvec::smallvec![Effect::notify(Notification::RegistrationWaitlisted {
                    event_id: state.event.id,
                    volunteer_id,
                    position,
                })]
            }
            Err(error) => Self::fail(state, error),
        }
    }

    fn handle_unregister(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if state.active_registration(volunteer_id).is_none() {
            return Self::fail(
                state,
                AdmissionError::RegistrationNotFound {
                    event_id: state.event.id,
                    volunteer_id,
                },
            );
        }

        let freed_slot = state.ledger.slot_of(volunteer_id);
        Self::apply_event(
            state,
            &AdmissionAction::RegistrationCancelled {
                volunteer_id,
                cancelled_at: now,
            },
        );
        tracing::info!(event_id = %state.event.id, %volunteer_id, "registration cancelled");

        let mut effects: Effects = smallvec::smallvec![Effect::notify(
            Notification::RegistrationCancelled {
                event_id: state.event.id,
                volunteer_id,
            }
        )];

        if freed_slot == Some(Slot::Seated) {
            Self::promote_freed(state, 1, now, &mut effects);
        }

        effects
    }

    fn handle_join_waitlist(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if !state.event.registration_open(now) {
            return Self::fail(
                state,
                AdmissionError::EventNotOpen {
                    event_id: state.event.id,
                    status: state.event.status,
                },
            );
        }

        if state.active_registration(volunteer_id).is_some() {
            return Self::fail(
                state,
                AdmissionError::AlreadyRegistered {
                    event_id: state.event.id,
                    volunteer_id,
                },
            );
        }

        match state.ledger.plan_waitlist_join(&state.event, volunteer_id) {
            Ok(position) => {
                Self::apply_event(
                    state,
                    &AdmissionAction::VolunteerWaitlisted {
                        volunteer_id,
                        position,
                        waitlisted_at: now,
                    },
                );
                tracing::info!(
                    event_id = %state.event.id,
                    %volunteer_id,
                    position,
                    "joined waitlist"
                );
                smallvec::smallvec![Effect::notify(Notification::RegistrationWaitlisted {
                    event_id: state.event.id,
                    volunteer_id,
                    position,
                })]
            }
            Err(error) => Self::fail(state, error),
        }
    }

    fn handle_leave_waitlist(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        let waitlisted = state
            .active_registration(volunteer_id)
            .is_some_and(|registration| registration.state == RegistrationState::Waitlisted);
        if !waitlisted {
            return Self::fail(
                state,
                AdmissionError::RegistrationNotFound {
                    event_id: state.event.id,
                    volunteer_id,
                },
            );
        }

        Self::apply_event(
            state,
            &AdmissionAction::VolunteerLeftWaitlist {
                volunteer_id,
                left_at: now,
            },
        );
        tracing::info!(event_id = %state.event.id, %volunteer_id, "left waitlist");
        smallvec::smallvec![Effect::notify(Notification::RegistrationCancelled {
            event_id: state.event.id,
            volunteer_id,
        })]
    }

    fn handle_approve(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        actor: Actor,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if let Err(error) = approval::authorize(&actor, "approve participants") {
            return Self::fail(state, error);
        }
        if let Err(error) = approval::validate_pending(
            state.registrations.get(&volunteer_id),
            state.event.id,
            volunteer_id,
        ) {
            return Self::fail(state, error);
        }

        // Re-admission: the approved volunteer goes through the ledger as if
        // the request just arrived, so capacity consumed by earlier approvals
        // is respected.
        if !state.event.registration_open(now) {
            return Self::fail(
                state,
                AdmissionError::EventNotOpen {
                    event_id: state.event.id,
                    status: state.event.status,
                },
            );
        }

        match state.ledger.plan_admission(&state.event, volunteer_id) {
            Ok(Admission::Seated) => {
                Self::apply_event(
                    state,
                    &AdmissionAction::VolunteerSeated {
                        volunteer_id,
                        seated_at: now,
                    },
                );
                tracing::info!(event_id = %state.event.id, %volunteer_id, "approval seated");
                smallvec::smallvec![Effect::notify(Notification::RegistrationAccepted {
                    event_id: state.event.id,
                    volunteer_id,
                })]
            }
            Ok(Admission::Waitlisted { position }) => {
                Self::apply_event(
                    state,
                    &AdmissionAction::VolunteerWaitlisted {
                        volunteer_id,
                        position,
                        waitlisted_at: now,
                    },
                );
                tracing::info!(
                    event_id = %state.event.id,
                    %volunteer_id,
                    position,
                    "approval waitlisted"
                );
                smallvec::smallvec![Effect::notify(Notification::RegistrationWaitlisted {
                    event_id: state.event.id,
                    volunteer_id,
                    position,
                })]
            }
            Err(
                AdmissionError::EventFull { .. } | AdmissionError::WaitlistFull { .. },
            ) => {
                // Capacity ran out between request and approval; the
                // registration settles as rejected rather than erroring the
                // organizer's call.
                Self::apply_event(
                    state,
                    &AdmissionAction::ParticipantRejected {
                        volunteer_id,
                        rejected_at: now,
                    },
                );
                tracing::info!(event_id = %state.event.id, %volunteer_id, "approval rejected: full");
                smallvec::smallvec![Effect::notify(Notification::RegistrationRejected {
                    event_id: state.event.id,
                    volunteer_id,
                })]
            }
            Err(error) => Self::fail(state, error),
        }
    }

    fn handle_reject(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        actor: Actor,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if let Err(error) = approval::authorize(&actor, "reject participants") {
            return Self::fail(state, error);
        }
        if let Err(error) = approval::validate_pending(
            state.registrations.get(&volunteer_id),
            state.event.id,
            volunteer_id,
        ) {
            return Self::fail(state, error);
        }

        Self::apply_event(
            state,
            &AdmissionAction::ParticipantRejected {
                volunteer_id,
                rejected_at: now,
            },
        );
        tracing::info!(event_id = %state.event.id, %volunteer_id, "participant rejected");
        smallvec::smallvec![Effect::notify(Notification::RegistrationRejected {
            event_id: state.event.id,
            volunteer_id,
        })]
    }

    fn handle_transition(
        state: &mut EventRecord,
        target: EventStatus,
        actor: Actor,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        let transition = match lifecycle::plan_transition(&state.event, target, &actor) {
            Ok(transition) => transition,
            Err(error) => return Self::fail(state, error),
        };

        Self::apply_event(
            state,
            &AdmissionAction::StatusChanged {
                from: transition.from,
                to: transition.to,
                changed_at: now,
            },
        );
        tracing::info!(
            event_id = %state.event.id,
            from = %transition.from,
            to = %transition.to,
            "event transitioned"
        );

        let mut effects: Effects = smallvec::smallvec![Effect::notify(match transition.to {
            EventStatus::Approved => Notification::EventApproved {
                event_id: state.event.id,
            },
            EventStatus::Rejected => Notification::EventRejected {
                event_id: state.event.id,
            },
            EventStatus::Cancelled => Notification::EventCancelled {
                event_id: state.event.id,
            },
            _ => Notification::EventStatusChanged {
                event_id: state.event.id,
                from: transition.from,
                to: transition.to,
            },
        })];

        match transition.cascade {
            Cascade::None => {}
            Cascade::CancelRegistrations => {
                for volunteer_id in Self::active_volunteers(state) {
                    Self::apply_event(
                        state,
                        &AdmissionAction::RegistrationCancelled {
                            volunteer_id,
                            cancelled_at: now,
                        },
                    );
                    effects.push(Effect::notify(Notification::RegistrationCancelled {
                        event_id: state.event.id,
                        volunteer_id,
                    }));
                }
            }
            Cascade::CompleteRegistrations => {
                for volunteer_id in state.ledger.seated().to_vec() {
                    Self::apply_event(
                        state,
                        &AdmissionAction::ParticipationCompleted {
                            volunteer_id,
                            completed_at: now,
                        },
                    );
                }
                for volunteer_id in Self::non_seated_active_volunteers(state) {
                    Self::apply_event(
                        state,
                        &AdmissionAction::RegistrationCancelled {
                            volunteer_id,
                            cancelled_at: now,
                        },
                    );
                    effects.push(Effect::notify(Notification::RegistrationCancelled {
                        event_id: state.event.id,
                        volunteer_id,
                    }));
                }
            }
        }

        effects
    }

    fn handle_set_capacity(
        state: &mut EventRecord,
        new_max: Capacity,
        actor: Actor,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if let Err(error) = approval::authorize(&actor, "change event capacity") {
            return Self::fail(state, error);
        }

        if new_max.value() == 0 {
            return Self::fail(
                state,
                AdmissionError::InvalidDraft {
                    reason: "max participants must be positive".to_string(),
                },
            );
        }

        let seated = state.ledger.seated_count();
        if (new_max.value() as usize) < seated {
            return Self::fail(
                state,
                AdmissionError::CapacityBelowRegistered {
                    event_id: state.event.id,
                    requested: new_max.value(),
                    seated: u32::try_from(seated).unwrap_or(u32::MAX),
                },
            );
        }

        let previous = state.event.max_participants;
        Self::apply_event(
            state,
            &AdmissionAction::CapacityChanged {
                previous,
                new_max,
                changed_at: now,
            },
        );
        tracing::info!(
            event_id = %state.event.id,
            %previous,
            %new_max,
            "capacity changed"
        );

        let mut effects = Effects::new();
        if new_max.value() > previous.value() {
            Self::promote_freed(state, new_max.value() - previous.value(), now, &mut effects);
        }
        effects
    }

    fn handle_mark_no_show(
        state: &mut EventRecord,
        volunteer_id: VolunteerId,
        actor: Actor,
        env: &AdmissionEnvironment,
    ) -> Effects {
        let now = env.clock.now();

        if let Err(error) = approval::authorize(&actor, "record attendance") {
            return Self::fail(state, error);
        }

        let seated = state
            .active_registration(volunteer_id)
            .is_some_and(|registration| registration.state == RegistrationState::Approved);
        if !seated {
            return Self::fail(
                state,
                AdmissionError::RegistrationNotFound {
                    event_id: state.event.id,
                    volunteer_id,
                },
            );
        }

        Self::apply_event(
            state,
            &AdmissionAction::NoShowRecorded {
                volunteer_id,
                recorded_at: now,
            },
        );
        tracing::info!(event_id = %state.event.id, %volunteer_id, "no-show recorded");

        let mut effects = Effects::new();
        Self::promote_freed(state, 1, now, &mut effects);
        effects
    }

    /// Active volunteers in deterministic cascade order: seated first, then
    /// the waitlist, then pending approvals by arrival time.
    fn active_volunteers(state: &EventRecord) -> Vec<VolunteerId> {
        let mut volunteers: Vec<VolunteerId> = state.ledger.seated().to_vec();
        volunteers.extend(state.ledger.waitlist());
        volunteers.extend(Self::pending_by_arrival(state));
        volunteers
    }

    /// Active volunteers holding no seat: the waitlist, then pending approvals
    fn non_seated_active_volunteers(state: &EventRecord) -> Vec<VolunteerId> {
        let mut volunteers: Vec<VolunteerId> = state.ledger.waitlist();
        volunteers.extend(Self::pending_by_arrival(state));
        volunteers
    }

    fn pending_by_arrival(state: &EventRecord) -> Vec<VolunteerId> {
        let mut pending: Vec<&Registration> = state
            .registrations
            .values()
            .filter(|registration| registration.state == RegistrationState::PendingApproval)
            .collect();
        pending.sort_by_key(|registration| {
            (registration.registered_at, *registration.volunteer_id.as_uuid())
        });
        pending
            .into_iter()
            .map(|registration| registration.volunteer_id)
            .collect()
    }
}

impl Reducer for AdmissionReducer {
    type State = EventRecord;
    type Action = AdmissionAction;
    type Environment = AdmissionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects {
        match action {
            // ========== Commands ==========
            AdmissionAction::Register { volunteer_id } => {
                Self::handle_register(state, volunteer_id, env)
            }
            AdmissionAction::Unregister { volunteer_id } => {
                Self::handle_unregister(state, volunteer_id, env)
            }
            AdmissionAction::JoinWaitlist { volunteer_id } => {
                Self::handle_join_waitlist(state, volunteer_id, env)
            }
            AdmissionAction::LeaveWaitlist { volunteer_id } => {
                Self::handle_leave_waitlist(state, volunteer_id, env)
            }
            AdmissionAction::ApproveParticipant {
                volunteer_id,
                actor,
            } => Self::handle_approve(state, volunteer_id, actor, env),
            AdmissionAction::RejectParticipant {
                volunteer_id,
                actor,
            } => Self::handle_reject(state, volunteer_id, actor, env),
            AdmissionAction::RequestTransition { target, actor } => {
                Self::handle_transition(state, target, actor, env)
            }
            AdmissionAction::SetMaxParticipants { new_max, actor } => {
                Self::handle_set_capacity(state, new_max, actor, env)
            }
            AdmissionAction::MarkNoShow {
                volunteer_id,
                actor,
            } => Self::handle_mark_no_show(state, volunteer_id, actor, env),

            // ========== Events ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::environment::Clock as _;
    use crate::types::{EventDraft, OrganizerId, WaitlistLimit};
    use admission_testing::mocks::test_clock;
    use admission_testing::{assertions, ReducerTest};

    fn record(capacity: u32, waitlist_enabled: bool, max_waitlist: u32) -> EventRecord {
        let mut event = Event::from_draft(
            EventDraft {
                name: "Park restoration".to_string(),
                organizer: OrganizerId::new(),
                max_participants: Capacity::new(capacity),
                waitlist_enabled,
                max_waitlist_size: WaitlistLimit::new(max_waitlist),
                requires_approval: false,
                registration_deadline: None,
            },
            test_clock().now(),
        );
        event.status = EventStatus::Approved;
        EventRecord::new(event)
    }

    fn env() -> AdmissionEnvironment {
        AdmissionEnvironment::new(Arc::new(test_clock()))
    }

    fn register(state: &mut EventRecord, volunteer_id: VolunteerId) -> Effects {
        AdmissionReducer::new().reduce(
            state,
            AdmissionAction::Register { volunteer_id },
            &env(),
        )
    }

    #[test]
    fn seats_then_waitlists_then_refuses() {
        let mut state = record(2, true, 1);
        let (v1, v2, v3, v4) = (
            VolunteerId::new(),
            VolunteerId::new(),
            VolunteerId::new(),
            VolunteerId::new(),
        );

        register(&mut state, v1);
        register(&mut state, v2);
        register(&mut state, v3);
        assert_eq!(state.ledger.seated(), &[v1, v2]);
        assert_eq!(state.ledger.waitlist(), vec![v3]);
        assert_eq!(
            state.decision_for(v3),
            Some(AdmissionDecision::Waitlisted { position: 1 })
        );

        register(&mut state, v4);
        assert_eq!(
            state.last_error,
            Some(AdmissionError::WaitlistFull {
                event_id: state.event.id
            })
        );
        assert!(state.registrations.get(&v4).is_none());
    }

    #[test]
    fn cancellation_promotes_the_waitlist_head() {
        let mut state = record(2, true, 1);
        let (v1, v2, v3) = (VolunteerId::new(), VolunteerId::new(), VolunteerId::new());
        register(&mut state, v1);
        register(&mut state, v2);
        register(&mut state, v3);

        let effects = AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::Unregister { volunteer_id: v1 },
            &env(),
        );

        assert_eq!(state.ledger.seated(), &[v2, v3]);
        assert!(state.ledger.waitlist().is_empty());
        assert_eq!(
            state.registrations.get(&v3).unwrap().state,
            RegistrationState::Approved
        );
        let notifications = crate::effect::notifications(&effects);
        assert!(notifications.iter().any(|n| matches!(
            n,
            Notification::RegistrationPromoted { volunteer_id, .. } if *volunteer_id == v3
        )));
    }

    #[test]
    fn draft_events_refuse_registration() {
        let mut given = record(5, true, 0);
        given.event.status = EventStatus::Draft;

        ReducerTest::new(AdmissionReducer::new())
            .with_env(env())
            .given_state(given)
            .when_action(AdmissionAction::Register {
                volunteer_id: VolunteerId::new(),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(AdmissionError::EventNotOpen { .. })
                ));
                assert!(state.registrations.is_empty());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn past_deadline_refuses_registration() {
        let mut state = record(5, true, 0);
        state.event.registration_deadline = Some(test_clock().now() - chrono::Duration::hours(1));

        register(&mut state, VolunteerId::new());

        assert!(matches!(
            state.last_error,
            Some(AdmissionError::EventNotOpen { .. })
        ));
    }

    #[test]
    fn second_registration_is_refused_loudly() {
        let mut state = record(5, true, 0);
        let volunteer = VolunteerId::new();
        register(&mut state, volunteer);
        register(&mut state, volunteer);

        assert!(matches!(
            state.last_error,
            Some(AdmissionError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn approval_gate_holds_without_consuming_capacity() {
        let mut state = record(1, true, 0);
        state.event.requires_approval = true;
        let (v1, v2) = (VolunteerId::new(), VolunteerId::new());

        register(&mut state, v1);
        register(&mut state, v2);

        assert_eq!(state.ledger.seated_count(), 0);
        assert_eq!(
            state.decision_for(v1),
            Some(AdmissionDecision::PendingApproval)
        );
        assert_eq!(
            state.decision_for(v2),
            Some(AdmissionDecision::PendingApproval)
        );
    }

    #[test]
    fn approvals_beyond_capacity_waitlist_or_reject() {
        // Two volunteers pending on a one-seat event: the first approval
        // takes the seat, the second lands on the waitlist.
        let mut state = record(1, true, 0);
        state.event.requires_approval = true;
        let (v1, v2) = (VolunteerId::new(), VolunteerId::new());
        register(&mut state, v1);
        register(&mut state, v2);

        let organizer = Actor::organizer();
        let reducer = AdmissionReducer::new();
        reducer.reduce(
            &mut state,
            AdmissionAction::ApproveParticipant {
                volunteer_id: v1,
                actor: organizer,
            },
            &env(),
        );
        reducer.reduce(
            &mut state,
            AdmissionAction::ApproveParticipant {
                volunteer_id: v2,
                actor: organizer,
            },
            &env(),
        );

        assert_eq!(state.decision_for(v1), Some(AdmissionDecision::Accepted));
        assert_eq!(
            state.decision_for(v2),
            Some(AdmissionDecision::Waitlisted { position: 1 })
        );
    }

    #[test]
    fn approvals_without_a_waitlist_reject_the_overflow() {
        let mut state = record(1, false, 0);
        state.event.requires_approval = true;
        let (v1, v2) = (VolunteerId::new(), VolunteerId::new());
        register(&mut state, v1);
        register(&mut state, v2);

        let organizer = Actor::organizer();
        let reducer = AdmissionReducer::new();
        reducer.reduce(
            &mut state,
            AdmissionAction::ApproveParticipant {
                volunteer_id: v1,
                actor: organizer,
            },
            &env(),
        );
        let effects = reducer.reduce(
            &mut state,
            AdmissionAction::ApproveParticipant {
                volunteer_id: v2,
                actor: organizer,
            },
            &env(),
        );

        assert_eq!(state.decision_for(v2), Some(AdmissionDecision::Rejected));
        assert!(state.last_error.is_none());
        let notifications = crate::effect::notifications(&effects);
        assert!(matches!(
            notifications.as_slice(),
            [Notification::RegistrationRejected { .. }]
        ));
    }

    #[test]
    fn cancelling_while_pending_frees_nothing() {
        let mut state = record(1, true, 0);
        state.event.requires_approval = true;
        let pending = VolunteerId::new();
        register(&mut state, pending);

        let effects = AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::Unregister {
                volunteer_id: pending,
            },
            &env(),
        );

        assert_eq!(
            state.registrations.get(&pending).unwrap().state,
            RegistrationState::Cancelled
        );
        // A cancellation that held no seat promotes nobody.
        let notifications = crate::effect::notifications(&effects);
        assert!(matches!(
            notifications.as_slice(),
            [Notification::RegistrationCancelled { .. }]
        ));
    }

    #[test]
    fn cancelling_twice_is_an_error_not_a_silent_success() {
        let mut state = record(2, true, 0);
        let volunteer = VolunteerId::new();
        register(&mut state, volunteer);

        let reducer = AdmissionReducer::new();
        reducer.reduce(
            &mut state,
            AdmissionAction::Unregister {
                volunteer_id: volunteer,
            },
            &env(),
        );
        reducer.reduce(
            &mut state,
            AdmissionAction::Unregister {
                volunteer_id: volunteer,
            },
            &env(),
        );

        assert!(matches!(
            state.last_error,
            Some(AdmissionError::RegistrationNotFound { .. })
        ));
    }

    #[test]
    fn event_cancellation_cascades_to_all_active_registrations() {
        let mut state = record(1, true, 0);
        let (seated, waiting) = (VolunteerId::new(), VolunteerId::new());
        register(&mut state, seated);
        register(&mut state, waiting);

        let effects = AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::RequestTransition {
                target: EventStatus::Cancelled,
                actor: Actor::organizer(),
            },
            &env(),
        );

        assert_eq!(state.event.status, EventStatus::Cancelled);
        assert_eq!(state.ledger.seated_count(), 0);
        assert_eq!(state.ledger.waitlist_len(), 0);
        for volunteer in [seated, waiting] {
            assert_eq!(
                state.registrations.get(&volunteer).unwrap().state,
                RegistrationState::Cancelled
            );
        }
        let notifications = crate::effect::notifications(&effects);
        assert!(matches!(
            notifications.first(),
            Some(Notification::EventCancelled { .. })
        ));
        assert_eq!(notifications.len(), 3);
    }

    #[test]
    fn completion_settles_seated_and_cancels_the_waitlist() {
        let mut state = record(1, true, 0);
        let (seated, waiting) = (VolunteerId::new(), VolunteerId::new());
        register(&mut state, seated);
        register(&mut state, waiting);
        state.event.status = EventStatus::Ongoing;

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::RequestTransition {
                target: EventStatus::Completed,
                actor: Actor::organizer(),
            },
            &env(),
        );

        assert_eq!(
            state.registrations.get(&seated).unwrap().state,
            RegistrationState::Completed
        );
        assert_eq!(
            state.registrations.get(&waiting).unwrap().state,
            RegistrationState::Cancelled
        );
    }

    #[test]
    fn capacity_increase_promotes_in_fifo_order() {
        let mut state = record(1, true, 0);
        let (v1, v2, v3) = (VolunteerId::new(), VolunteerId::new(), VolunteerId::new());
        register(&mut state, v1);
        register(&mut state, v2);
        register(&mut state, v3);

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::SetMaxParticipants {
                new_max: Capacity::new(3),
                actor: Actor::organizer(),
            },
            &env(),
        );

        assert_eq!(state.ledger.seated(), &[v1, v2, v3]);
        assert!(state.ledger.waitlist().is_empty());
    }

    #[test]
    fn capacity_below_seated_count_is_rejected() {
        let mut state = record(2, true, 0);
        register(&mut state, VolunteerId::new());
        register(&mut state, VolunteerId::new());

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::SetMaxParticipants {
                new_max: Capacity::new(1),
                actor: Actor::organizer(),
            },
            &env(),
        );

        assert!(matches!(
            state.last_error,
            Some(AdmissionError::CapacityBelowRegistered { seated: 2, .. })
        ));
        assert_eq!(state.event.max_participants, Capacity::new(2));
    }

    #[test]
    fn no_show_frees_the_seat_and_promotes() {
        let mut state = record(1, true, 0);
        let (absent, waiting) = (VolunteerId::new(), VolunteerId::new());
        register(&mut state, absent);
        register(&mut state, waiting);
        state.event.status = EventStatus::Ongoing;

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::MarkNoShow {
                volunteer_id: absent,
                actor: Actor::organizer(),
            },
            &env(),
        );

        assert_eq!(
            state.registrations.get(&absent).unwrap().state,
            RegistrationState::NoShow
        );
        assert_eq!(state.ledger.seated(), &[waiting]);
    }

    #[test]
    fn explicit_waitlist_join_leaves_seats_alone() {
        let volunteer = VolunteerId::new();

        ReducerTest::new(AdmissionReducer::new())
            .with_env(env())
            .given_state(record(5, true, 0))
            .when_action(AdmissionAction::JoinWaitlist {
                volunteer_id: volunteer,
            })
            .then_state(move |state| {
                assert_eq!(state.ledger.seated_count(), 0);
                assert_eq!(state.ledger.waitlist(), vec![volunteer]);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 1))
            .run();
    }

    #[test]
    fn leaving_the_waitlist_requires_being_on_it() {
        let mut state = record(5, true, 0);
        let seated = VolunteerId::new();
        register(&mut state, seated);

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::LeaveWaitlist {
                volunteer_id: seated,
            },
            &env(),
        );

        assert!(matches!(
            state.last_error,
            Some(AdmissionError::RegistrationNotFound { .. })
        ));
    }

    #[test]
    fn record_invariants_hold_through_a_busy_sequence() {
        let mut state = record(2, true, 3);
        let volunteers: Vec<VolunteerId> = (0..5).map(|_| VolunteerId::new()).collect();
        for volunteer in &volunteers {
            register(&mut state, *volunteer);
        }
        state.check_invariants().unwrap();

        AdmissionReducer::new().reduce(
            &mut state,
            AdmissionAction::Unregister {
                volunteer_id: volunteers[0],
            },
            &env(),
        );
        state.check_invariants().unwrap();
    }
}
