//! Builder state: the single source of truth and how it changes

mod history;
mod manager;
mod mutation;

pub use history::History;
pub use manager::{ChangeCause, StateChange, StateManager, SubscriptionId};
pub use mutation::{Direction, Mutation, Outcome};
