//! Error types for mkb-builder
//!
//! Every variant is recoverable: a failed mutation leaves the state untouched
//! and a failed save leaves the session running.

use mkb_common::ids::{ComponentId, SectionId};
use thiserror::Error;

/// Main error type for the builder
#[derive(Error, Debug)]
pub enum Error {
    /// A component with this ID already exists
    #[error("Component already exists: {0}")]
    DuplicateId(ComponentId),

    /// No component with this ID
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    /// No section with this ID
    #[error("Section not found: {0}")]
    SectionNotFound(SectionId),

    /// A section with this ID already exists
    #[error("Section already exists: {0}")]
    DuplicateSectionId(SectionId),

    /// Column outside the section's `1..=columns`
    #[error("Section {section_id} has no column {column}")]
    InvalidColumn { section_id: SectionId, column: u8 },

    /// Component already occupies this exact slot
    #[error("Component {component_id} is already in section {section_id}")]
    AlreadyInSection {
        component_id: ComponentId,
        section_id: SectionId,
    },

    /// Reorder index outside the layout
    #[error("Layout position {index} out of range (layout has {len} components)")]
    PositionOutOfRange { index: usize, len: usize },

    /// Component data rejected by its schema
    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    /// A save is already in flight
    #[error("A save is already in progress")]
    AlreadySaving,

    /// WordPress could not be reached or answered with a server error or
    /// garbled payload
    #[error("WordPress error: {0}")]
    Bridge(String),

    /// WordPress refused the request (bad nonce, missing permission, unknown
    /// post). Sending it again will not help.
    #[error("WordPress rejected the request: {0}")]
    Rejected(String),

    /// Transport failure talking to WordPress
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the shared model or configuration layer
    #[error(transparent)]
    Common(mkb_common::Error),

    /// Document tree operation on a missing or misplaced node
    #[error("Document error: {0}")]
    Dom(#[from] crate::dom::DomError),

    /// The session actor has shut down
    #[error("Builder session is closed")]
    SessionClosed,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mkb_common::Error> for Error {
    fn from(err: mkb_common::Error) -> Self {
        match err {
            mkb_common::Error::InvalidComponent { .. } => Error::InvalidComponent(err.to_string()),
            other => Error::Common(other),
        }
    }
}

impl Error {
    /// Short toast text for the editor UI
    pub fn user_message(&self) -> String {
        match self {
            Error::DuplicateId(_) => "That component already exists.".to_string(),
            Error::ComponentNotFound(_) => "That component no longer exists.".to_string(),
            Error::SectionNotFound(_) => "That section no longer exists.".to_string(),
            Error::DuplicateSectionId(_) => "That section already exists.".to_string(),
            Error::InvalidColumn { .. } => "That column does not exist in this section.".to_string(),
            Error::AlreadyInSection { .. } => "The component is already in that section.".to_string(),
            Error::PositionOutOfRange { .. } => "The component cannot be moved there.".to_string(),
            Error::InvalidComponent(reason) => format!("Invalid component data: {}", reason),
            Error::AlreadySaving => "A save is already in progress.".to_string(),
            Error::Bridge(_) | Error::Http(_) => "Could not reach WordPress. Changes will be saved again shortly.".to_string(),
            Error::Rejected(_) => "WordPress refused the request. Reload the editor and sign in again.".to_string(),
            Error::Json(_) => "The media kit data could not be read.".to_string(),
            Error::Common(_) | Error::Io(_) | Error::Dom(_) => "Something went wrong. Please try again.".to_string(),
            Error::SessionClosed => "The builder has stopped. Please reload the page.".to_string(),
        }
    }

    /// Whether trying the same operation again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::AlreadySaving | Error::Bridge(_) | Error::Io(_) => true,
            Error::Http(e) => !e.is_builder() && !e.is_decode(),
            _ => false,
        }
    }
}

/// Convenience Result type using the builder Error
pub type Result<T> = std::result::Result<T, Error>;
