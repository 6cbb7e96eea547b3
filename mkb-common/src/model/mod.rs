//! Media kit data model
//!
//! `MediaKitState` is the root aggregate. It is plain data: the builder's
//! state manager is the only code that mutates a live instance.

mod component;
mod legacy;
mod section;
mod state;

pub use component::{
    BiographyProps, CallToActionProps, ComponentProps, ComponentRecord, ContactProps, HeroLayout,
    HeroProps, QuestionsProps, SocialLink, SocialProps, TopicsProps, VideoIntroProps, BIOGRAPHY,
    BUILTIN_TYPES, CALL_TO_ACTION, CONTACT, HERO, QUESTIONS, SOCIAL, TOPICS, VIDEO_INTRO,
};
pub use legacy::decode_wordpress_state;
pub use section::{Section, SectionSlot, SectionType};
pub use state::{MediaKitState, Violation, STATE_VERSION};
