//! Capacity and waitlist ledger.
//!
//! The per-event authoritative record of who is seated and who is waiting.
//! The seated sequence keeps insertion order for audit; the waitlist order is
//! load-bearing: position = index, FIFO, never reordered. All counts are
//! integers and every capacity comparison is strict.
//!
//! The ledger owns its two sequences outright. Other components admit,
//! cancel, and promote exclusively through the methods here.

use crate::error::AdmissionError;
use crate::types::{Event, VolunteerId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Where an admission landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    /// The volunteer took a seat in the registered set
    Seated,
    /// The volunteer joined the waitlist at the given 1-based position
    Waitlisted {
        /// 1-based position at the time of joining
        position: u32,
    },
}

/// Which sequence held a volunteer that was removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// The registered set; removal frees one capacity slot
    Seated,
    /// The waitlist; removal frees nothing
    Waitlisted,
}

/// Ordered record of seated and waitlisted volunteers for one event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    registered: Vec<VolunteerId>,
    waitlisted: VecDeque<VolunteerId>,
}

impl Ledger {
    /// Creates an empty ledger
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registered: Vec::new(),
            waitlisted: VecDeque::new(),
        }
    }

    /// The seated volunteers in admission order
    #[must_use]
    pub fn seated(&self) -> &[VolunteerId] {
        &self.registered
    }

    /// The waitlist in FIFO order, head first
    #[must_use]
    pub fn waitlist(&self) -> Vec<VolunteerId> {
        self.waitlisted.iter().copied().collect()
    }

    /// Number of seated volunteers
    #[must_use]
    pub fn seated_count(&self) -> usize {
        self.registered.len()
    }

    /// Current waitlist length
    #[must_use]
    pub fn waitlist_len(&self) -> usize {
        self.waitlisted.len()
    }

    /// Remaining free seats under the given event's capacity
    #[must_use]
    pub fn free_seats(&self, event: &Event) -> u32 {
        let capacity = event.max_participants.value();
        let seated = u32::try_from(self.registered.len()).unwrap_or(u32::MAX);
        capacity.saturating_sub(seated)
    }

    /// Whether either sequence holds the volunteer
    #[must_use]
    pub fn contains(&self, volunteer_id: VolunteerId) -> bool {
        self.slot_of(volunteer_id).is_some()
    }

    /// Which sequence holds the volunteer, if any
    #[must_use]
    pub fn slot_of(&self, volunteer_id: VolunteerId) -> Option<Slot> {
        if self.registered.contains(&volunteer_id) {
            Some(Slot::Seated)
        } else if self.waitlisted.contains(&volunteer_id) {
            Some(Slot::Waitlisted)
        } else {
            None
        }
    }

    /// 1-based waitlist position; `None` when the volunteer is not waitlisted
    #[must_use]
    pub fn waitlist_position(&self, volunteer_id: VolunteerId) -> Option<u32> {
        self.waitlisted
            .iter()
            .position(|entry| *entry == volunteer_id)
            .and_then(|index| u32::try_from(index + 1).ok())
    }

    /// Decides where an admission would land without mutating anything.
    ///
    /// Assumes the caller already verified the event's lifecycle status and
    /// the volunteer's other registrations; the ledger still guards its own
    /// sequences against duplicates.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::AlreadyRegistered`] when a sequence holds the volunteer
    /// - [`AdmissionError::EventFull`] when seats and waitlist are unavailable
    /// - [`AdmissionError::WaitlistFull`] when the waitlist bound is reached
    pub fn plan_admission(
        &self,
        event: &Event,
        volunteer_id: VolunteerId,
    ) -> Result<Admission, AdmissionError> {
        if self.contains(volunteer_id) {
            return Err(AdmissionError::AlreadyRegistered {
                event_id: event.id,
                volunteer_id,
            });
        }

        if self.registered.len() < event.max_participants.value() as usize {
            return Ok(Admission::Seated);
        }

        if !event.waitlist_enabled {
            return Err(AdmissionError::EventFull { event_id: event.id });
        }

        if !event.max_waitlist_size.admits(self.waitlisted.len()) {
            return Err(AdmissionError::WaitlistFull { event_id: event.id });
        }

        Ok(Admission::Waitlisted {
            position: self.next_waitlist_position(),
        })
    }

    /// Decides where an explicit waitlist join would land, never taking a
    /// seat even when capacity is free.
    ///
    /// # Errors
    ///
    /// - [`AdmissionError::AlreadyRegistered`] when a sequence holds the volunteer
    /// - [`AdmissionError::WaitlistDisabled`] when the event forms no waitlist
    /// - [`AdmissionError::WaitlistFull`] when the waitlist bound is reached
    pub fn plan_waitlist_join(
        &self,
        event: &Event,
        volunteer_id: VolunteerId,
    ) -> Result<u32, AdmissionError> {
        if self.contains(volunteer_id) {
            return Err(AdmissionError::AlreadyRegistered {
                event_id: event.id,
                volunteer_id,
            });
        }

        if !event.waitlist_enabled {
            return Err(AdmissionError::WaitlistDisabled { event_id: event.id });
        }

        if !event.max_waitlist_size.admits(self.waitlisted.len()) {
            return Err(AdmissionError::WaitlistFull { event_id: event.id });
        }

        Ok(self.next_waitlist_position())
    }

    /// Admits a volunteer: seat if a slot is free, else waitlist, else refuse.
    ///
    /// # Errors
    ///
    /// See [`Ledger::plan_admission`].
    pub fn try_register(
        &mut self,
        event: &Event,
        volunteer_id: VolunteerId,
    ) -> Result<Admission, AdmissionError> {
        let admission = self.plan_admission(event, volunteer_id)?;
        match admission {
            Admission::Seated => self.seat(volunteer_id),
            Admission::Waitlisted { .. } => self.enqueue(volunteer_id),
        }
        Ok(admission)
    }

    /// Appends a volunteer to the registered set.
    ///
    /// Callers decide eligibility first via [`Ledger::plan_admission`]; the
    /// capacity bound is re-checked by [`Ledger::check_invariants`] after
    /// every mutation batch.
    pub fn seat(&mut self, volunteer_id: VolunteerId) {
        self.registered.push(volunteer_id);
    }

    /// Appends a volunteer to the waitlist tail.
    pub fn enqueue(&mut self, volunteer_id: VolunteerId) {
        self.waitlisted.push_back(volunteer_id);
    }

    /// Removes a volunteer from whichever sequence holds them.
    ///
    /// Returns the slot that was freed; a `Slot::Seated` result means one
    /// capacity slot opened and the promotion engine should run.
    pub fn remove(&mut self, volunteer_id: VolunteerId) -> Option<Slot> {
        if let Some(index) = self.registered.iter().position(|v| *v == volunteer_id) {
            self.registered.remove(index);
            return Some(Slot::Seated);
        }
        if let Some(index) = self.waitlisted.iter().position(|v| *v == volunteer_id) {
            self.waitlisted.remove(index);
            return Some(Slot::Waitlisted);
        }
        None
    }

    /// Pops the waitlist head, if any. Promotion consumes the waitlist
    /// strictly through this method so FIFO order cannot be bypassed.
    pub fn pop_waitlist_head(&mut self) -> Option<VolunteerId> {
        self.waitlisted.pop_front()
    }

    /// Verifies the ledger invariants against the event's policy.
    ///
    /// A violation indicates a concurrency bug inside the engine; it is
    /// logged loudly and surfaced as a fatal error, never masked.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::InvariantViolation`] naming the broken invariant.
    pub fn check_invariants(&self, event: &Event) -> Result<(), AdmissionError> {
        let violation = |detail: String| {
            tracing::error!(event_id = %event.id, detail, "ledger invariant violated");
            Err(AdmissionError::InvariantViolation {
                event_id: event.id,
                detail,
            })
        };

        if self.registered.len() > event.max_participants.value() as usize {
            return violation(format!(
                "{} seated exceeds capacity {}",
                self.registered.len(),
                event.max_participants
            ));
        }

        if !event.waitlist_enabled && !self.waitlisted.is_empty() {
            return violation(format!(
                "{} waitlisted on an event without a waitlist",
                self.waitlisted.len()
            ));
        }

        if let Some(volunteer_id) = self
            .registered
            .iter()
            .find(|v| self.waitlisted.contains(v))
        {
            return violation(format!("volunteer {volunteer_id} is both seated and waitlisted"));
        }

        Ok(())
    }

    fn next_waitlist_position(&self) -> u32 {
        u32::try_from(self.waitlisted.len() + 1).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capacity, EventDraft, EventStatus, OrganizerId, WaitlistLimit};
    use chrono::Utc;

    fn open_event(capacity: u32, waitlist_enabled: bool, max_waitlist: u32) -> Event {
        let mut event = Event::from_draft(
            EventDraft {
                name: "River cleanup".to_string(),
                organizer: OrganizerId::new(),
                max_participants: Capacity::new(capacity),
                waitlist_enabled,
                max_waitlist_size: WaitlistLimit::new(max_waitlist),
                requires_approval: false,
                registration_deadline: None,
            },
            Utc::now(),
        );
        event.status = EventStatus::Approved;
        event
    }

    #[test]
    fn fills_seats_then_waitlist_then_refuses() {
        let event = open_event(2, true, 1);
        let mut ledger = Ledger::new();
        let (v1, v2, v3, v4) = (
            VolunteerId::new(),
            VolunteerId::new(),
            VolunteerId::new(),
            VolunteerId::new(),
        );

        assert_eq!(ledger.try_register(&event, v1), Ok(Admission::Seated));
        assert_eq!(ledger.try_register(&event, v2), Ok(Admission::Seated));
        assert_eq!(
            ledger.try_register(&event, v3),
            Ok(Admission::Waitlisted { position: 1 })
        );
        assert_eq!(
            ledger.try_register(&event, v4),
            Err(AdmissionError::WaitlistFull { event_id: event.id })
        );
        assert_eq!(ledger.seated(), &[v1, v2]);
        assert_eq!(ledger.waitlist(), vec![v3]);
    }

    #[test]
    fn no_waitlist_means_full_is_full() {
        let event = open_event(1, false, 0);
        let mut ledger = Ledger::new();
        let winner = VolunteerId::new();

        assert_eq!(ledger.try_register(&event, winner), Ok(Admission::Seated));
        assert_eq!(
            ledger.try_register(&event, VolunteerId::new()),
            Err(AdmissionError::EventFull { event_id: event.id })
        );
        assert_eq!(ledger.waitlist_len(), 0);
    }

    #[test]
    fn duplicate_admission_is_refused_not_silently_accepted() {
        let event = open_event(3, true, 0);
        let mut ledger = Ledger::new();
        let volunteer = VolunteerId::new();

        assert!(ledger.try_register(&event, volunteer).is_ok());
        assert_eq!(
            ledger.try_register(&event, volunteer),
            Err(AdmissionError::AlreadyRegistered {
                event_id: event.id,
                volunteer_id: volunteer,
            })
        );
    }

    #[test]
    fn waitlist_positions_are_one_based_and_fifo() {
        let event = open_event(0, true, 0);
        let mut ledger = Ledger::new();
        let (a, b, c) = (VolunteerId::new(), VolunteerId::new(), VolunteerId::new());

        for volunteer in [a, b, c] {
            ledger.enqueue(volunteer);
        }

        assert_eq!(ledger.waitlist_position(a), Some(1));
        assert_eq!(ledger.waitlist_position(b), Some(2));
        assert_eq!(ledger.waitlist_position(c), Some(3));
        assert_eq!(ledger.waitlist_position(VolunteerId::new()), None);

        ledger.remove(b);
        assert_eq!(ledger.waitlist_position(c), Some(2));
    }

    #[test]
    fn removing_a_seated_volunteer_frees_a_slot() {
        let event = open_event(1, true, 0);
        let mut ledger = Ledger::new();
        let seated = VolunteerId::new();
        let waiting = VolunteerId::new();

        assert!(ledger.try_register(&event, seated).is_ok());
        assert!(ledger.try_register(&event, waiting).is_ok());

        assert_eq!(ledger.remove(seated), Some(Slot::Seated));
        assert_eq!(ledger.remove(waiting), Some(Slot::Waitlisted));
        assert_eq!(ledger.remove(waiting), None);
    }

    #[test]
    fn explicit_join_never_takes_a_seat() {
        let event = open_event(5, true, 0);
        let mut ledger = Ledger::new();
        let volunteer = VolunteerId::new();

        let position = ledger.plan_waitlist_join(&event, volunteer);
        assert_eq!(position, Ok(1));
    }

    #[test]
    fn explicit_join_requires_a_waitlist() {
        let event = open_event(5, false, 0);
        let ledger = Ledger::new();

        assert_eq!(
            ledger.plan_waitlist_join(&event, VolunteerId::new()),
            Err(AdmissionError::WaitlistDisabled { event_id: event.id })
        );
    }

    #[test]
    fn invariant_check_catches_overfull_ledger() {
        let event = open_event(1, true, 0);
        let mut ledger = Ledger::new();
        ledger.seat(VolunteerId::new());
        ledger.seat(VolunteerId::new());

        let result = ledger.check_invariants(&event);
        assert!(matches!(
            result,
            Err(AdmissionError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn invariant_check_catches_waitlist_on_disabled_event() {
        let event = open_event(1, false, 0);
        let mut ledger = Ledger::new();
        ledger.enqueue(VolunteerId::new());

        assert!(ledger.check_invariants(&event).is_err());
    }
}
