//! Detached element trees produced by component renderers
//!
//! Renderers are pure: they describe markup as a `VNode` and the renderer
//! mounts it into the [`Document`](super::Document).

/// Element or text node description
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VNode {
    Element(VElement),
    Text(String),
}

impl VNode {
    /// Start an element builder
    pub fn element(tag: impl Into<String>) -> VElement {
        VElement {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> VNode {
        VNode::Text(text.into())
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            VNode::Text(t) => out.push_str(t),
            VNode::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
        }
    }
}

/// Element description, built fluently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<VNode>,
}

impl VElement {
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
        self
    }

    /// Append a class to the `class` attribute
    pub fn class(mut self, class: impl AsRef<str>) -> Self {
        let class = class.as_ref();
        match self.attrs.iter_mut().find(|(n, _)| n == "class") {
            Some((_, existing)) if existing.is_empty() => existing.push_str(class),
            Some((_, existing)) => {
                existing.push(' ');
                existing.push_str(class);
            }
            None => self.attrs.push(("class".to_string(), class.to_string())),
        }
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, N>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Append a text child
    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(VNode::Text(text.into()))
    }

    /// Append `child` only when `cond` holds
    pub fn child_if(self, cond: bool, child: impl FnOnce() -> VNode) -> Self {
        if cond {
            self.child(child())
        } else {
            self
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl From<VElement> for VNode {
    fn from(el: VElement) -> Self {
        VNode::Element(el)
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(text)
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::Text(text.to_string())
    }
}
