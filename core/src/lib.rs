//! # Admission Core
//!
//! Event admission and lifecycle engine for capacity-bounded volunteer
//! events: the single authority deciding whether a registration request is
//! seated, waitlisted, held for approval, or refused, and how capacity
//! changes ripple through the waitlist.
//!
//! ## Core Concepts
//!
//! - **State**: one [`admission::EventRecord`] per event — the event entity,
//!   its [`ledger::Ledger`], and the registrations
//! - **Action**: commands (requests) and events (facts) in
//!   [`admission::AdmissionAction`]
//! - **Reducer**: pure function `(State, Action, Environment) → Effects`
//! - **Effect**: notification instructions for the delivery collaborator
//! - **Environment**: injected dependencies via traits ([`environment::Clock`],
//!   [`notification::NotificationBus`])
//!
//! ## Architecture
//!
//! ```text
//! API collaborator
//!     │ register / cancel / waitlist / approve / transition
//!     ▼
//! AdmissionEngine ── per-event shard lock ──┐
//!     │                                     │
//!     ▼                                     │
//! AdmissionReducer                          │
//!     ├─► lifecycle  (is the event open?)   │
//!     ├─► ledger     (is there capacity?)   │
//!     ├─► approval   (held for organizer?)  │
//!     └─► promotion  (drain freed seats)    │
//!     │                                     │
//!     ▼ effects                             │
//! NotificationBus ◄── published after the guard drops
//! ```
//!
//! ## Key Invariants
//!
//! 1. `seated ≤ max_participants`, always
//! 2. Waitlist order is FIFO and never reordered; promotion is head-first
//! 3. A volunteer holds at most one active registration per event
//! 4. Events without a waitlist never have waitlisted volunteers
//! 5. Failed requests surface typed errors, never silent defaults

// Core abstractions
pub mod effect;
pub mod environment;
pub mod reducer;

// Domain
pub mod admission;
pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod notification;
pub mod promotion;
pub mod types;

// Re-export the facade and the types its signatures use
pub use admission::{AdmissionAction, AdmissionDecision, AdmissionReducer, EventRecord};
pub use config::EngineConfig;
pub use effect::Effect;
pub use engine::{AdmissionEngine, EventSnapshot};
pub use environment::{Clock, SystemClock};
pub use error::AdmissionError;
pub use ledger::{Admission, Ledger};
pub use lifecycle::{Cascade, TransitionResult};
pub use notification::{ChannelBus, Notification, NotificationBus, NotificationError, TracingBus};
pub use reducer::{Effects, Reducer};
pub use types::{
    Actor, Capacity, Event, EventDraft, EventId, EventStatus, OrganizerId, Registration,
    RegistrationState, Role, VolunteerId, WaitlistLimit,
};
