//! Property tests for the ledger invariants: the capacity bound, sequence
//! disjointness, waitlist emptiness when disabled, and FIFO stability.

#![allow(clippy::unwrap_used)]

use admission_core::ledger::{Admission, Ledger};
use admission_core::types::{
    Capacity, Event, EventDraft, EventStatus, OrganizerId, Registration, RegistrationState,
    VolunteerId, WaitlistLimit,
};
use admission_core::{promotion, AdmissionError};
use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashMap;

fn open_event(capacity: u32, waitlist_enabled: bool, max_waitlist: u32) -> Event {
    let mut event = Event::from_draft(
        EventDraft {
            name: "Donation sorting".to_string(),
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

/// One step of a randomized ledger workout: admit or remove a volunteer from
/// a small shared pool.
#[derive(Clone, Copy, Debug)]
enum Op {
    Register(usize),
    Remove(usize),
}

fn op_strategy(pool: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..pool).prop_map(Op::Register),
        (0..pool).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn capacity_bound_holds_under_any_op_sequence(
        capacity in 1u32..5,
        waitlist_enabled in any::<bool>(),
        max_waitlist in 0u32..4,
        ops in proptest::collection::vec(op_strategy(10), 0..60),
    ) {
        let event = open_event(capacity, waitlist_enabled, max_waitlist);
        let pool: Vec<VolunteerId> = (0..10).map(|_| VolunteerId::new()).collect();
        let mut ledger = Ledger::new();

        for op in ops {
            match op {
                Op::Register(i) => {
                    let _ = ledger.try_register(&event, pool[i]);
                }
                Op::Remove(i) => {
                    let _ = ledger.remove(pool[i]);
                }
            }

            // The invariants hold after every single step, not just at the end.
            prop_assert!(ledger.check_invariants(&event).is_ok());
            prop_assert!(ledger.seated_count() <= capacity as usize);
            if !waitlist_enabled {
                prop_assert_eq!(ledger.waitlist_len(), 0);
            }
            if max_waitlist > 0 {
                prop_assert!(ledger.waitlist_len() <= max_waitlist as usize);
            }
        }
    }

    #[test]
    fn waitlist_order_is_join_order(
        capacity in 1u32..3,
        ops in proptest::collection::vec(op_strategy(8), 0..50),
    ) {
        let event = open_event(capacity, true, 0);
        let pool: Vec<VolunteerId> = (0..8).map(|_| VolunteerId::new()).collect();
        let mut ledger = Ledger::new();
        let mut join_order: Vec<VolunteerId> = Vec::new();

        for op in ops {
            match op {
                Op::Register(i) => {
                    if let Ok(Admission::Waitlisted { .. }) = ledger.try_register(&event, pool[i]) {
                        join_order.push(pool[i]);
                    }
                }
                Op::Remove(i) => {
                    ledger.remove(pool[i]);
                    join_order.retain(|v| *v != pool[i]);
                }
            }

            // FIFO stability: the waitlist is exactly the surviving joins in
            // their original order, never reordered.
            prop_assert_eq!(ledger.waitlist(), join_order.clone());
        }
    }

    #[test]
    fn promotion_takes_the_earliest_joiners_first(
        seated_count in 0u32..4,
        slack in 0u32..4,
        waiting_count in 0usize..8,
        freed in 0u32..8,
    ) {
        let capacity = seated_count + slack;
        prop_assume!(capacity >= 1);
        let event = open_event(capacity, true, 0);

        let mut ledger = Ledger::new();
        for _ in 0..seated_count {
            ledger.seat(VolunteerId::new());
        }
        let mut registrations: HashMap<VolunteerId, Registration> = HashMap::new();
        let mut waiting = Vec::new();
        for _ in 0..waiting_count {
            let volunteer = VolunteerId::new();
            ledger.enqueue(volunteer);
            registrations.insert(
                volunteer,
                Registration::new(event.id, volunteer, RegistrationState::Waitlisted, Utc::now()),
            );
            waiting.push(volunteer);
        }

        let promoted = promotion::plan(&event, &ledger, &registrations, freed);

        let expected_len = (freed.min(slack) as usize).min(waiting.len());
        prop_assert_eq!(promoted, waiting[..expected_len].to_vec());
    }

    #[test]
    fn duplicate_admissions_are_always_refused(
        capacity in 1u32..4,
        max_waitlist in 0u32..3,
    ) {
        let event = open_event(capacity, true, max_waitlist);
        let mut ledger = Ledger::new();
        let volunteer = VolunteerId::new();

        let first = ledger.try_register(&event, volunteer);
        prop_assert!(first.is_ok());

        let second = ledger.try_register(&event, volunteer);
        prop_assert_eq!(
            second,
            Err(AdmissionError::AlreadyRegistered {
                event_id: event.id,
                volunteer_id: volunteer,
            })
        );
    }
}
