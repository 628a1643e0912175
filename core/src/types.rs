//! Domain types for the admission engine.
//!
//! Value objects, entities, and state enums shared by every component:
//! identifiers, capacity bounds, the event entity with its admission policy,
//! and per-volunteer registrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a volunteer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolunteerId(Uuid);

impl VolunteerId {
    /// Creates a new random `VolunteerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `VolunteerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VolunteerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VolunteerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for the organization that owns an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizerId(Uuid);

impl OrganizerId {
    /// Creates a new random `OrganizerId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OrganizerId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrganizerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrganizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Capacity Value Objects
// ============================================================================

/// Maximum number of seated participants for an event.
///
/// Always positive; zero-capacity events are rejected at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Creates a `Capacity` from a raw count
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw count
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upper bound on the waitlist length. Zero means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistLimit(u32);

impl WaitlistLimit {
    /// An unbounded waitlist
    pub const UNBOUNDED: Self = Self(0);

    /// Creates a `WaitlistLimit` from a raw bound (0 = unbounded)
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw bound
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Whether this limit admits a waitlist of the given current length
    #[must_use]
    pub fn admits(&self, current_len: usize) -> bool {
        self.0 == 0 || current_len < self.0 as usize
    }
}

impl Default for WaitlistLimit {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

// ============================================================================
// Lifecycle and Registration States
// ============================================================================

/// Coarse-grained lifecycle status of an event.
///
/// Distinct from a volunteer's [`RegistrationState`]; only changes through
/// transitions the lifecycle state machine permits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Being edited by the organizer, not yet submitted
    Draft,
    /// Submitted, awaiting platform approval
    Pending,
    /// Approved and open for registration
    Approved,
    /// Published and imminent, still open for registration
    Active,
    /// Currently running
    Ongoing,
    /// Finished normally (terminal)
    Completed,
    /// Cancelled by the organizer or platform (terminal)
    Cancelled,
    /// Rejected by the platform; may be resubmitted
    Rejected,
}

impl EventStatus {
    /// Whether volunteers may register while the event is in this status
    #[must_use]
    pub const fn accepts_registrations(&self) -> bool {
        matches!(self, Self::Approved | Self::Active)
    }

    /// Whether this status is terminal (no transitions out)
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        };
        write!(f, "{label}")
    }
}

/// State of a single volunteer's registration for one event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationState {
    /// Held by the approval workflow; consumes no capacity slot
    PendingApproval,
    /// Holds a seat in the registered set
    Approved,
    /// Queued on the waitlist, position derived from ledger order
    Waitlisted,
    /// Withdrawn by the volunteer or cascaded from an event cancellation (terminal)
    Cancelled,
    /// Rejected by the organizer or by re-admission (terminal)
    Rejected,
    /// Attended; set when the event completes (terminal)
    Completed,
    /// Held a seat but did not attend (terminal)
    NoShow,
}

impl RegistrationState {
    /// Whether this registration still occupies the volunteer's single
    /// active-registration slot for the event
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::PendingApproval | Self::Approved | Self::Waitlisted)
    }
}

// ============================================================================
// Actors
// ============================================================================

/// Role an actor holds when invoking the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// A regular volunteer acting on their own registration
    Volunteer,
    /// An organizer of the owning organization
    Organizer,
    /// A platform administrator
    Admin,
}

impl Role {
    /// Whether this role may manage participants and run the event lifecycle
    #[must_use]
    pub const fn can_manage_event(&self) -> bool {
        matches!(self, Self::Organizer | Self::Admin)
    }
}

/// The authenticated principal behind a request.
///
/// Identity resolution is the caller's concern; the engine only checks roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Principal identity, for audit trails
    pub id: Uuid,
    /// Role granted by the caller's auth layer
    pub role: Role,
}

impl Actor {
    /// Creates an actor with the given role
    #[must_use]
    pub const fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Convenience constructor for an organizer actor
    #[must_use]
    pub fn organizer() -> Self {
        Self::new(Uuid::new_v4(), Role::Organizer)
    }

    /// Convenience constructor for an admin actor
    #[must_use]
    pub fn admin() -> Self {
        Self::new(Uuid::new_v4(), Role::Admin)
    }

    /// Convenience constructor for a volunteer actor
    #[must_use]
    pub fn volunteer() -> Self {
        Self::new(Uuid::new_v4(), Role::Volunteer)
    }
}

// ============================================================================
// Event Entity
// ============================================================================

/// Input for creating a new event in `Draft` status
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventDraft {
    /// Human-readable event name
    pub name: String,
    /// Owning organization
    pub organizer: OrganizerId,
    /// Seated capacity bound
    pub max_participants: Capacity,
    /// Whether a waitlist forms once seats run out
    pub waitlist_enabled: bool,
    /// Waitlist bound (0 = unbounded); ignored when the waitlist is disabled
    pub max_waitlist_size: WaitlistLimit,
    /// Whether registrations are held for organizer approval
    pub requires_approval: bool,
    /// Registrations received after this instant are refused
    pub registration_deadline: Option<DateTime<Utc>>,
}

/// An event and its admission policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Human-readable event name
    pub name: String,
    /// Owning organization
    pub organizer: OrganizerId,
    /// Seated capacity bound
    pub max_participants: Capacity,
    /// Whether a waitlist forms once seats run out
    pub waitlist_enabled: bool,
    /// Waitlist bound (0 = unbounded)
    pub max_waitlist_size: WaitlistLimit,
    /// Whether registrations are held for organizer approval
    pub requires_approval: bool,
    /// Current lifecycle status
    pub status: EventStatus,
    /// Registrations received after this instant are refused
    pub registration_deadline: Option<DateTime<Utc>>,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Materializes a draft into a `Draft`-status event
    #[must_use]
    pub fn from_draft(draft: EventDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            name: draft.name,
            organizer: draft.organizer,
            max_participants: draft.max_participants,
            waitlist_enabled: draft.waitlist_enabled,
            max_waitlist_size: draft.max_waitlist_size,
            requires_approval: draft.requires_approval,
            status: EventStatus::Draft,
            registration_deadline: draft.registration_deadline,
            created_at,
        }
    }

    /// Whether the event accepts registrations at the given instant,
    /// considering both lifecycle status and the registration deadline
    #[must_use]
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        self.status.accepts_registrations()
            && self.registration_deadline.is_none_or(|deadline| now <= deadline)
    }
}

// ============================================================================
// Registration Entity
// ============================================================================

/// A volunteer's registration for one event.
///
/// Unique per `(event, volunteer)` pair while active. The waitlist position
/// is never stored here; it is recomputed from ledger order on demand.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registration {
    /// Event registered for
    pub event_id: EventId,
    /// Registering volunteer
    pub volunteer_id: VolunteerId,
    /// Current registration state
    pub state: RegistrationState,
    /// Arrival timestamp, audit and FIFO tie-break only
    pub registered_at: DateTime<Utc>,
    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Creates a registration in the given initial state
    #[must_use]
    pub const fn new(
        event_id: EventId,
        volunteer_id: VolunteerId,
        state: RegistrationState,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            volunteer_id,
            state,
            registered_at,
            updated_at: registered_at,
        }
    }

    /// Whether this registration still occupies the volunteer's single
    /// active slot for the event
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waitlist_limit_zero_is_unbounded() {
        let limit = WaitlistLimit::UNBOUNDED;
        assert!(limit.admits(0));
        assert!(limit.admits(10_000));
    }

    #[test]
    fn waitlist_limit_bounds_length() {
        let limit = WaitlistLimit::new(2);
        assert!(limit.admits(0));
        assert!(limit.admits(1));
        assert!(!limit.admits(2));
        assert!(!limit.admits(3));
    }

    #[test]
    fn registration_window_honors_deadline() {
        let now = Utc::now();
        let mut event = Event::from_draft(
            EventDraft {
                name: "Food drive".to_string(),
                organizer: OrganizerId::new(),
                max_participants: Capacity::new(5),
                waitlist_enabled: true,
                max_waitlist_size: WaitlistLimit::UNBOUNDED,
                requires_approval: false,
                registration_deadline: Some(now),
            },
            now,
        );
        event.status = EventStatus::Approved;

        assert!(event.registration_open(now));
        assert!(!event.registration_open(now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn draft_events_do_not_accept_registrations() {
        assert!(!EventStatus::Draft.accepts_registrations());
        assert!(!EventStatus::Pending.accepts_registrations());
        assert!(EventStatus::Approved.accepts_registrations());
        assert!(EventStatus::Active.accepts_registrations());
        assert!(!EventStatus::Ongoing.accepts_registrations());
    }

    #[test]
    fn terminal_states() {
        assert!(EventStatus::Completed.is_terminal());
        assert!(EventStatus::Cancelled.is_terminal());
        assert!(!EventStatus::Rejected.is_terminal());
    }
}
