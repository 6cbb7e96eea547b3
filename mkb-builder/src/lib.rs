//! # Media Kit Builder (mkb-builder)
//!
//! Component/state synchronization core of the media kit builder.
//!
//! **Purpose:** Hold the media kit state, project it onto a document tree with
//! minimal changes, turn control clicks into state mutations, place
//! components in their sections, and persist through WordPress.
//!
//! **Architecture:** A single session actor owns the state manager; state
//! changes flow one way into the renderer and section integration. The
//! document tree is a projection and is never read back into state.

pub mod autosave;
pub mod bridge;
pub mod builder;
pub mod components;
pub mod controls;
pub mod dom;
pub mod error;
pub mod registry;
pub mod render;
pub mod sections;
pub mod session;
pub mod state;

pub use builder::{Builder, PassReport};
pub use error::{Error, Result};
pub use registry::ComponentRegistry;
pub use session::{spawn_session, SessionHandle};
pub use state::StateManager;
