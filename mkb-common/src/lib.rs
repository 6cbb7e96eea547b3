//! # Media Kit Builder Common Library
//!
//! Shared code for the builder crates including:
//! - Data model (state, components, sections) and its persisted JSON shape
//! - Component and section identifiers
//! - Event types (BuilderEvent enum) and the EventBus
//! - Configuration loading
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod time;

pub use error::{Error, Result};
