//! The core reducer abstraction.
//!
//! Reducers are pure functions `(State, Action, Environment) → Effects`:
//! they validate the action, update state in place, and return descriptions
//! of side effects for the runtime to execute. All business logic lives in
//! reducers, which makes it deterministic and directly testable.

use crate::effect::Effect;
use smallvec::SmallVec;

/// Inline capacity for reducer effect batches; most steps emit at most a
/// handful of notifications.
pub type Effects = SmallVec<[Effect; 4]>;

/// The core abstraction for business logic.
///
/// # Type Parameters
///
/// - `State`: the domain state this reducer operates on
/// - `Action`: the action type this reducer processes
/// - `Environment`: the injected dependencies this reducer needs
pub trait Reducer {
    /// The state type this reducer operates on
    type State;

    /// The action type this reducer processes
    type Action;

    /// The environment type with injected dependencies
    type Environment;

    /// Reduce an action into state changes and effects.
    ///
    /// Validates the action, updates state in place, and returns effect
    /// descriptions to be executed by the runtime.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects;
}
