//! Component records and their typed per-type payloads
//!
//! Each built-in component type has its own props struct, validated when the
//! record is constructed or patched. Types that are not built in (third-party
//! or retired components) are carried as [`ComponentProps::Opaque`] so they
//! survive a load/save round trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::ComponentId;
use crate::{Error, Result};

pub const HERO: &str = "hero";
pub const BIOGRAPHY: &str = "biography";
pub const TOPICS: &str = "topics";
pub const CONTACT: &str = "contact";
pub const SOCIAL: &str = "social";
pub const QUESTIONS: &str = "questions";
pub const VIDEO_INTRO: &str = "video-intro";
pub const CALL_TO_ACTION: &str = "call-to-action";

/// Every component type with a typed schema
pub const BUILTIN_TYPES: &[&str] = &[
    HERO,
    BIOGRAPHY,
    TOPICS,
    CONTACT,
    SOCIAL,
    QUESTIONS,
    VIDEO_INTRO,
    CALL_TO_ACTION,
];

const MAX_TOPICS: usize = 20;
const MAX_QUESTIONS: usize = 25;
const MAX_TEXT_LEN: usize = 5000;

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn check_url(component_type: &str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() || is_http_url(value) {
        Ok(())
    } else {
        Err(Error::invalid_component(
            component_type,
            format!("{} must be an http(s) URL, got {:?}", field, value),
        ))
    }
}

fn check_len(component_type: &str, field: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_TEXT_LEN {
        Err(Error::invalid_component(
            component_type,
            format!("{} exceeds {} characters", field, MAX_TEXT_LEN),
        ))
    } else {
        Ok(())
    }
}

/// Horizontal alignment of the hero block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroLayout {
    #[default]
    LeftAligned,
    CenterAligned,
    RightAligned,
}

impl HeroLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeroLayout::LeftAligned => "left_aligned",
            HeroLayout::CenterAligned => "center_aligned",
            HeroLayout::RightAligned => "right_aligned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroProps {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub image_url: String,
    pub layout: HeroLayout,
    /// Keys without a typed field, written back unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BiographyProps {
    pub name: String,
    pub title: String,
    pub biography: String,
    pub show_title: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for BiographyProps {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            biography: String::new(),
            show_title: true,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicsProps {
    pub title: String,
    pub topics: Vec<String>,
    /// How many topics are displayed (1-20)
    pub max_topics: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TopicsProps {
    fn default() -> Self {
        Self {
            title: "Speaking Topics".to_string(),
            topics: Vec::new(),
            max_topics: 6,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactProps {
    pub email: String,
    pub phone: String,
    pub website: String,
    pub location: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialProps {
    pub title: String,
    pub links: Vec<SocialLink>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionsProps {
    pub title: String,
    pub questions: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoIntroProps {
    pub title: String,
    pub video_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallToActionProps {
    pub title: String,
    pub button_text: String,
    pub button_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Typed payload of a component, keyed by its registry type name
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentProps {
    Hero(HeroProps),
    Biography(BiographyProps),
    Topics(TopicsProps),
    Contact(ContactProps),
    Social(SocialProps),
    Questions(QuestionsProps),
    VideoIntro(VideoIntroProps),
    CallToAction(CallToActionProps),
    /// Data that has no typed schema: a type that is not built in, or a
    /// built-in type whose persisted data failed validation on load.
    Opaque {
        component_type: String,
        data: Map<String, Value>,
    },
}

fn decode<T: serde::de::DeserializeOwned>(component_type: &str, data: Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| Error::invalid_component(component_type, e.to_string()))
}

fn encode<T: Serialize>(props: &T) -> Map<String, Value> {
    match serde_json::to_value(props) {
        Ok(Value::Object(map)) => map,
        // Props structs always serialize to JSON objects
        _ => Map::new(),
    }
}

impl ComponentProps {
    /// Build typed props from a type name and a raw data object, validating
    /// the data against the type's schema.
    ///
    /// Unknown types are accepted as `Opaque` as long as `data` is an object.
    pub fn from_parts(component_type: &str, data: Value) -> Result<Self> {
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(Error::invalid_component(
                    component_type,
                    format!("data must be a JSON object, got {}", other),
                ))
            }
        };

        let props = match component_type {
            "" => return Err(Error::invalid_component("(empty)", "component type is required")),
            HERO => ComponentProps::Hero(decode(component_type, data)?),
            BIOGRAPHY => ComponentProps::Biography(decode(component_type, data)?),
            TOPICS => ComponentProps::Topics(decode(component_type, data)?),
            CONTACT => ComponentProps::Contact(decode(component_type, data)?),
            SOCIAL => ComponentProps::Social(decode(component_type, data)?),
            QUESTIONS => ComponentProps::Questions(decode(component_type, data)?),
            VIDEO_INTRO => ComponentProps::VideoIntro(decode(component_type, data)?),
            CALL_TO_ACTION => ComponentProps::CallToAction(decode(component_type, data)?),
            other => {
                let data = match data {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                ComponentProps::Opaque {
                    component_type: other.to_string(),
                    data,
                }
            }
        };

        props.validate()?;
        Ok(props)
    }

    /// Like [`from_parts`](Self::from_parts) but never fails: data that does
    /// not fit its schema is kept verbatim as `Opaque` so nothing is lost.
    pub fn from_parts_lenient(component_type: &str, data: Value) -> Self {
        match Self::from_parts(component_type, data.clone()) {
            Ok(props) => props,
            Err(e) => {
                tracing::warn!("Keeping {} component data unvalidated: {}", component_type, e);
                let data = match data {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                ComponentProps::Opaque {
                    component_type: component_type.to_string(),
                    data,
                }
            }
        }
    }

    /// Default props for a built-in type (empty object data for others)
    pub fn default_for(component_type: &str) -> Result<Self> {
        Self::from_parts(component_type, Value::Object(Map::new()))
    }

    /// Registry type name
    pub fn component_type(&self) -> &str {
        match self {
            ComponentProps::Hero(_) => HERO,
            ComponentProps::Biography(_) => BIOGRAPHY,
            ComponentProps::Topics(_) => TOPICS,
            ComponentProps::Contact(_) => CONTACT,
            ComponentProps::Social(_) => SOCIAL,
            ComponentProps::Questions(_) => QUESTIONS,
            ComponentProps::VideoIntro(_) => VIDEO_INTRO,
            ComponentProps::CallToAction(_) => CALL_TO_ACTION,
            ComponentProps::Opaque { component_type, .. } => component_type,
        }
    }

    /// Raw data object, as persisted
    pub fn to_data(&self) -> Map<String, Value> {
        match self {
            ComponentProps::Hero(p) => encode(p),
            ComponentProps::Biography(p) => encode(p),
            ComponentProps::Topics(p) => encode(p),
            ComponentProps::Contact(p) => encode(p),
            ComponentProps::Social(p) => encode(p),
            ComponentProps::Questions(p) => encode(p),
            ComponentProps::VideoIntro(p) => encode(p),
            ComponentProps::CallToAction(p) => encode(p),
            ComponentProps::Opaque { data, .. } => data.clone(),
        }
    }

    /// Shallow-merge `patch` into the data object and re-validate.
    ///
    /// The type never changes; the original props are untouched on failure.
    pub fn patched(&self, patch: &Map<String, Value>) -> Result<Self> {
        let mut data = self.to_data();
        for (key, value) in patch {
            data.insert(key.clone(), value.clone());
        }
        Self::from_parts(self.component_type(), Value::Object(data))
    }

    /// Value-level checks beyond what deserialization enforces
    pub fn validate(&self) -> Result<()> {
        let ty = self.component_type();
        match self {
            ComponentProps::Hero(p) => {
                check_len(ty, "title", &p.title)?;
                check_len(ty, "description", &p.description)?;
                check_url(ty, "imageUrl", &p.image_url)
            }
            ComponentProps::Biography(p) => check_len(ty, "biography", &p.biography),
            ComponentProps::Topics(p) => {
                if !(1..=MAX_TOPICS).contains(&p.max_topics) {
                    return Err(Error::invalid_component(
                        ty,
                        format!("maxTopics must be between 1 and {}", MAX_TOPICS),
                    ));
                }
                if p.topics.len() > MAX_TOPICS {
                    return Err(Error::invalid_component(
                        ty,
                        format!("at most {} topics are allowed", MAX_TOPICS),
                    ));
                }
                Ok(())
            }
            ComponentProps::Contact(p) => {
                if !p.email.is_empty() && (!p.email.contains('@') || p.email.contains(char::is_whitespace)) {
                    return Err(Error::invalid_component(ty, format!("invalid email {:?}", p.email)));
                }
                check_url(ty, "website", &p.website)
            }
            ComponentProps::Social(p) => {
                for link in &p.links {
                    if link.platform.trim().is_empty() {
                        return Err(Error::invalid_component(ty, "social link is missing its platform"));
                    }
                    check_url(ty, "url", &link.url)?;
                }
                Ok(())
            }
            ComponentProps::Questions(p) => {
                if p.questions.len() > MAX_QUESTIONS {
                    return Err(Error::invalid_component(
                        ty,
                        format!("at most {} questions are allowed", MAX_QUESTIONS),
                    ));
                }
                Ok(())
            }
            ComponentProps::VideoIntro(p) => check_url(ty, "videoUrl", &p.video_url),
            ComponentProps::CallToAction(p) => check_url(ty, "buttonUrl", &p.button_url),
            ComponentProps::Opaque { .. } => Ok(()),
        }
    }
}

/// A single content block
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub props: ComponentProps,
}

impl ComponentRecord {
    pub fn new(id: ComponentId, props: ComponentProps) -> Self {
        Self { id, props }
    }

    pub fn component_type(&self) -> &str {
        self.props.component_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hero_from_parts() {
        let props = ComponentProps::from_parts("hero", json!({"title": "A"})).unwrap();
        match &props {
            ComponentProps::Hero(p) => {
                assert_eq!(p.title, "A");
                assert_eq!(p.layout, HeroLayout::LeftAligned);
            }
            other => panic!("expected hero, got {:?}", other),
        }
        assert_eq!(props.component_type(), "hero");
    }

    #[test]
    fn test_unknown_type_is_opaque() {
        let props = ComponentProps::from_parts("nonexistent", json!({"x": 1})).unwrap();
        assert_eq!(props.component_type(), "nonexistent");
        assert_eq!(props.to_data().get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_non_object_data_rejected() {
        let err = ComponentProps::from_parts("hero", json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::InvalidComponent { .. }));
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(ComponentProps::from_parts("", json!({})).is_err());
    }

    #[test]
    fn test_contact_validation() {
        assert!(ComponentProps::from_parts("contact", json!({"email": "me@example.com"})).is_ok());
        assert!(ComponentProps::from_parts("contact", json!({"email": "not-an-email"})).is_err());
        assert!(ComponentProps::from_parts("contact", json!({"website": "ftp://x"})).is_err());
    }

    #[test]
    fn test_topics_bounds() {
        assert!(ComponentProps::from_parts("topics", json!({"maxTopics": 0})).is_err());
        assert!(ComponentProps::from_parts("topics", json!({"maxTopics": 21})).is_err());
        let many: Vec<String> = (0..21).map(|i| format!("t{}", i)).collect();
        assert!(ComponentProps::from_parts("topics", json!({"topics": many})).is_err());
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let err = ComponentProps::from_parts("topics", json!({"topics": "one"})).unwrap_err();
        assert!(err.to_string().contains("topics"));
    }

    #[test]
    fn test_patch_merges_and_keeps_type() {
        let props = ComponentProps::from_parts("hero", json!({"title": "A", "subtitle": "S"})).unwrap();
        let mut patch = Map::new();
        patch.insert("title".into(), json!("B"));
        let patched = props.patched(&patch).unwrap();
        match patched {
            ComponentProps::Hero(p) => {
                assert_eq!(p.title, "B");
                assert_eq!(p.subtitle, "S");
            }
            other => panic!("expected hero, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_patch_is_rejected() {
        let props = ComponentProps::from_parts("video-intro", json!({})).unwrap();
        let mut patch = Map::new();
        patch.insert("videoUrl".into(), json!("javascript:alert(1)"));
        assert!(props.patched(&patch).is_err());
    }

    #[test]
    fn test_lenient_keeps_invalid_data() {
        let props = ComponentProps::from_parts_lenient("contact", json!({"email": "broken"}));
        match props {
            ComponentProps::Opaque { component_type, data } => {
                assert_eq!(component_type, "contact");
                assert_eq!(data.get("email"), Some(&json!("broken")));
            }
            other => panic!("expected opaque, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_for_every_builtin_type_validate() {
        for ty in BUILTIN_TYPES {
            let props = ComponentProps::default_for(ty).unwrap();
            assert_eq!(props.component_type(), *ty);
        }
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let raw = json!({
            "biography": "x",
            "alignment": "center",
            "fontSize": "large",
            "preserveLineBreaks": false
        });
        let props = ComponentProps::from_parts("biography", raw.clone()).unwrap();
        let data = props.to_data();
        for (key, value) in raw.as_object().unwrap() {
            assert_eq!(data.get(key), Some(value), "{}", key);
        }

        let reloaded = ComponentProps::from_parts("biography", Value::Object(data)).unwrap();
        assert_eq!(reloaded, props);
    }

    #[test]
    fn test_patch_keeps_unknown_keys() {
        let props = ComponentProps::from_parts("hero", json!({"title": "A", "backgroundColor": "#123"})).unwrap();
        let mut patch = Map::new();
        patch.insert("title".into(), json!("B"));
        let data = props.patched(&patch).unwrap().to_data();
        assert_eq!(data["title"], json!("B"));
        assert_eq!(data["backgroundColor"], json!("#123"));
    }
}
