//! Built-in component renderers
//!
//! Each renderer produces the inner markup of a component; the wrapper
//! element with `data-component-id` and the controls block are added by the
//! renderer module.

use mkb_common::model::{
    BiographyProps, CallToActionProps, ComponentProps, ComponentRecord, ContactProps, HeroProps,
    QuestionsProps, SocialProps, TopicsProps, VideoIntroProps, BIOGRAPHY, CALL_TO_ACTION, CONTACT,
    HERO, QUESTIONS, SOCIAL, TOPICS, VIDEO_INTRO,
};

use crate::dom::{VElement, VNode};
use crate::registry::{ComponentRegistry, ComponentRenderer, ComponentSchema, FieldKind, FieldSchema, RenderError};

/// Register every built-in type
pub fn register_builtin(registry: &mut ComponentRegistry) {
    registry.register(HERO, HeroRenderer);
    registry.register(BIOGRAPHY, BiographyRenderer);
    registry.register(TOPICS, TopicsRenderer);
    registry.register(CONTACT, ContactRenderer);
    registry.register(SOCIAL, SocialRenderer);
    registry.register(QUESTIONS, QuestionsRenderer);
    registry.register(VIDEO_INTRO, VideoIntroRenderer);
    registry.register(CALL_TO_ACTION, CallToActionRenderer);
}

fn mismatch(expected: &str, record: &ComponentRecord) -> RenderError {
    RenderError::PropsMismatch {
        expected: expected.to_string(),
        found: record.component_type().to_string(),
    }
}

fn schema(component_type: &str, name: &str, description: &str, fields: Vec<FieldSchema>) -> ComponentSchema {
    ComponentSchema {
        component_type: component_type.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        fields,
    }
}

/// `<tag class="{block}__{element}">text</tag>`, skipped when `text` is empty
fn text_el(parent: VElement, tag: &str, class: &str, text: &str) -> VElement {
    parent.child_if(!text.is_empty(), || VNode::element(tag).class(class).text(text).into())
}

// ========================================
// Hero
// ========================================

pub struct HeroRenderer;

impl HeroRenderer {
    fn markup(p: &HeroProps) -> VNode {
        let root = VNode::element("div")
            .class("hero")
            .class(format!("hero--{}", p.layout.as_str()));
        let root = root.child_if(!p.image_url.is_empty(), || {
            VNode::element("img")
                .class("hero__image")
                .attr("src", &p.image_url)
                .attr("alt", &p.title)
                .into()
        });
        let root = text_el(root, "h1", "hero__title", &p.title);
        let root = text_el(root, "h2", "hero__subtitle", &p.subtitle);
        text_el(root, "p", "hero__description", &p.description).into()
    }
}

impl ComponentRenderer for HeroRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        match &record.props {
            ComponentProps::Hero(p) => Ok(Self::markup(p)),
            _ => Err(mismatch(HERO, record)),
        }
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            HERO,
            "Hero",
            "Name, tagline and headshot at the top of the media kit",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("subtitle", "Subtitle", FieldKind::Text),
                FieldSchema::new("description", "Description", FieldKind::TextArea),
                FieldSchema::new("imageUrl", "Image URL", FieldKind::Url),
                FieldSchema::new(
                    "layout",
                    "Layout",
                    FieldKind::Select {
                        options: vec![
                            "left_aligned".into(),
                            "center_aligned".into(),
                            "right_aligned".into(),
                        ],
                    },
                ),
            ],
        ))
    }
}

// ========================================
// Biography
// ========================================

pub struct BiographyRenderer;

impl BiographyRenderer {
    fn markup(p: &BiographyProps) -> VNode {
        let mut root = VNode::element("div").class("biography");
        if p.show_title {
            root = text_el(root, "h2", "biography__title", &p.title);
        }
        root = text_el(root, "h3", "biography__name", &p.name);
        // Blank lines separate paragraphs
        let paragraphs = p
            .biography
            .split("\n\n")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| VNode::element("p").text(s));
        root.child(VNode::element("div").class("biography__content").children(paragraphs))
            .into()
    }
}

impl ComponentRenderer for BiographyRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        match &record.props {
            ComponentProps::Biography(p) => Ok(Self::markup(p)),
            _ => Err(mismatch(BIOGRAPHY, record)),
        }
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            BIOGRAPHY,
            "Biography",
            "Long-form professional biography",
            vec![
                FieldSchema::new("name", "Name", FieldKind::Text),
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("biography", "Biography", FieldKind::TextArea),
                FieldSchema::new("showTitle", "Show title", FieldKind::Boolean),
            ],
        ))
    }
}

// ========================================
// Topics
// ========================================

pub struct TopicsRenderer;

impl TopicsRenderer {
    fn markup(p: &TopicsProps) -> VNode {
        let root = text_el(VNode::element("div").class("topics"), "h2", "topics__title", &p.title);
        if p.topics.is_empty() {
            return root
                .child(VNode::element("p").class("topics__empty").text("No topics added yet"))
                .into();
        }
        let items = p
            .topics
            .iter()
            .take(p.max_topics)
            .map(|t| VNode::element("li").class("topics__item").text(t));
        root.child(VNode::element("ul").class("topics__list").children(items))
            .into()
    }
}

impl ComponentRenderer for TopicsRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        match &record.props {
            ComponentProps::Topics(p) => Ok(Self::markup(p)),
            _ => Err(mismatch(TOPICS, record)),
        }
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            TOPICS,
            "Speaking Topics",
            "List of topics the speaker covers",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("topics", "Topics", FieldKind::List),
                FieldSchema::new("maxTopics", "Topics shown", FieldKind::Number { min: 1, max: 20 }),
            ],
        ))
    }
}

// ========================================
// Contact
// ========================================

pub struct ContactRenderer;

impl ContactRenderer {
    fn markup(p: &ContactProps) -> VNode {
        let mut list = VNode::element("ul").class("contact__list");
        if !p.email.is_empty() {
            list = list.child(
                VNode::element("li").class("contact__email").child(
                    VNode::element("a")
                        .attr("href", format!("mailto:{}", p.email))
                        .text(&p.email),
                ),
            );
        }
        if !p.phone.is_empty() {
            list = list.child(VNode::element("li").class("contact__phone").text(&p.phone));
        }
        if !p.website.is_empty() {
            list = list.child(
                VNode::element("li").class("contact__website").child(
                    VNode::element("a")
                        .attr("href", &p.website)
                        .attr("rel", "noopener")
                        .text(&p.website),
                ),
            );
        }
        list = text_el(list, "li", "contact__location", &p.location);
        VNode::element("div").class("contact").child(list).into()
    }
}

impl ComponentRenderer for ContactRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        match &record.props {
            ComponentProps::Contact(p) => Ok(Self::markup(p)),
            _ => Err(mismatch(CONTACT, record)),
        }
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            CONTACT,
            "Contact",
            "How bookers can reach the speaker",
            vec![
                FieldSchema::new("email", "Email", FieldKind::Email),
                FieldSchema::new("phone", "Phone", FieldKind::Text),
                FieldSchema::new("website", "Website", FieldKind::Url),
                FieldSchema::new("location", "Location", FieldKind::Text),
            ],
        ))
    }
}

// ========================================
// Social
// ========================================

pub struct SocialRenderer;

impl SocialRenderer {
    fn markup(p: &SocialProps) -> VNode {
        let links = p.links.iter().map(|link| {
            VNode::element("li").class("social__item").child(
                VNode::element("a")
                    .class(format!("social__link social__link--{}", link.platform.to_lowercase()))
                    .attr("href", &link.url)
                    .attr("rel", "noopener")
                    .text(&link.platform),
            )
        });
        text_el(VNode::element("div").class("social"), "h2", "social__title", &p.title)
            .child(VNode::element("ul").class("social__list").children(links))
            .into()
    }
}

impl ComponentRenderer for SocialRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        match &record.props {
            ComponentProps::Social(p) => Ok(Self::markup(p)),
            _ => Err(mismatch(SOCIAL, record)),
        }
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            SOCIAL,
            "Social Links",
            "Links to social media profiles",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("links", "Links", FieldKind::List),
            ],
        ))
    }
}

// ========================================
// Questions
// ========================================

pub struct QuestionsRenderer;

impl ComponentRenderer for QuestionsRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        let ComponentProps::Questions(p) = &record.props else {
            return Err(mismatch(QUESTIONS, record));
        };
        Ok(questions_markup(p))
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            QUESTIONS,
            "Interview Questions",
            "Suggested questions for hosts",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("questions", "Questions", FieldKind::List),
            ],
        ))
    }
}

fn questions_markup(p: &QuestionsProps) -> VNode {
    let items = p
        .questions
        .iter()
        .map(|q| VNode::element("li").class("questions__item").text(q));
    text_el(VNode::element("div").class("questions"), "h2", "questions__title", &p.title)
        .child(VNode::element("ol").class("questions__list").children(items))
        .into()
}

// ========================================
// Video intro
// ========================================

pub struct VideoIntroRenderer;

impl ComponentRenderer for VideoIntroRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        let ComponentProps::VideoIntro(p) = &record.props else {
            return Err(mismatch(VIDEO_INTRO, record));
        };
        Ok(video_markup(p))
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            VIDEO_INTRO,
            "Video Introduction",
            "Embedded introduction video",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("videoUrl", "Video URL", FieldKind::Url),
            ],
        ))
    }
}

fn video_markup(p: &VideoIntroProps) -> VNode {
    let root = text_el(VNode::element("div").class("video-intro"), "h2", "video-intro__title", &p.title);
    if p.video_url.is_empty() {
        return root
            .child(VNode::element("p").class("video-intro__empty").text("No video selected"))
            .into();
    }
    root.child(
        VNode::element("iframe")
            .class("video-intro__player")
            .attr("src", &p.video_url)
            .attr("allowfullscreen", "true"),
    )
    .into()
}

// ========================================
// Call to action
// ========================================

pub struct CallToActionRenderer;

impl ComponentRenderer for CallToActionRenderer {
    fn render(&self, record: &ComponentRecord) -> Result<VNode, RenderError> {
        let ComponentProps::CallToAction(p) = &record.props else {
            return Err(mismatch(CALL_TO_ACTION, record));
        };
        Ok(cta_markup(p))
    }

    fn schema(&self) -> Option<ComponentSchema> {
        Some(schema(
            CALL_TO_ACTION,
            "Call to Action",
            "Booking prompt with a single button",
            vec![
                FieldSchema::new("title", "Title", FieldKind::Text),
                FieldSchema::new("buttonText", "Button text", FieldKind::Text),
                FieldSchema::new("buttonUrl", "Button URL", FieldKind::Url),
            ],
        ))
    }
}

fn cta_markup(p: &CallToActionProps) -> VNode {
    let root = text_el(VNode::element("div").class("call-to-action"), "h2", "call-to-action__title", &p.title);
    let label = if p.button_text.is_empty() { "Book Now" } else { p.button_text.as_str() };
    let href = if p.button_url.is_empty() { "#" } else { p.button_url.as_str() };
    root.child(
        VNode::element("a")
            .class("call-to-action__button")
            .attr("href", href)
            .text(label),
    )
    .into()
}
