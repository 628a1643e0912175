//! Waitlist promotion engine.
//!
//! Runs whenever seated capacity frees up: a cancellation, a no-show, or a
//! capacity increase. Drains the waitlist strictly head-first; the earliest
//! joiner wins, with no reordering and no priority by role or attribute.
//! Promotion runs synchronously inside the call that freed the capacity.

use crate::ledger::Ledger;
use crate::types::{Event, Registration, RegistrationState, VolunteerId};
use std::collections::HashMap;

/// Plans which waitlisted volunteers to seat after `freed` slots opened.
///
/// Pure: inspects the ledger without mutating it, so callers can turn the
/// plan into applied facts one promotion at a time. Entries whose
/// registration is no longer `Waitlisted` are stale and are skipped without
/// consuming a freed slot (compaction). The plan never exceeds the free
/// seats actually available, regardless of the reported `freed` count.
#[must_use]
pub fn plan(
    event: &Event,
    ledger: &Ledger,
    registrations: &HashMap<VolunteerId, Registration>,
    freed: u32,
) -> Vec<VolunteerId> {
    let mut scratch = ledger.clone();
    let mut slots = freed.min(scratch.free_seats(event));
    let mut promoted = Vec::new();

    while slots > 0 {
        let Some(head) = scratch.pop_waitlist_head() else {
            break;
        };
        let still_waiting = registrations
            .get(&head)
            .is_some_and(|registration| registration.state == RegistrationState::Waitlisted);
        if !still_waiting {
            // Stale entry; compact without spending a slot.
            continue;
        }
        scratch.seat(head);
        slots -= 1;
        promoted.push(head);
    }

    promoted
}
