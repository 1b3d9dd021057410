//! Output tree descriptions produced by render functions

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node in a rendered tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VNode {
    /// Renders nothing
    Empty,
    Text(String),
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
        children: Vec<VNode>,
    },
}

impl VNode {
    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text(text.into())
    }

    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute; ignored on non-element nodes
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let VNode::Element { attrs, .. } = &mut self {
            attrs.insert(key.into(), value.into());
        }
        self
    }

    /// Builder-style child; ignored on non-element nodes
    pub fn child(mut self, node: VNode) -> Self {
        if let VNode::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    /// Concatenated text of this node and its descendants
    pub fn text_content(&self) -> String {
        match self {
            VNode::Empty => String::new(),
            VNode::Text(text) => text.clone(),
            VNode::Element { children, .. } => children.iter().map(VNode::text_content).collect(),
        }
    }
}

impl fmt::Display for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNode::Empty => Ok(()),
            VNode::Text(text) => write!(f, "{}", text),
            VNode::Element {
                tag,
                attrs,
                children,
            } => {
                write!(f, "<{}", tag)?;
                for (k, v) in attrs {
                    write!(f, " {}=\"{}\"", k, v)?;
                }
                write!(f, ">")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                write!(f, "</{}>", tag)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let node = VNode::element("p")
            .attr("class", "greeting")
            .child(VNode::text("hello "))
            .child(VNode::element("b").child(VNode::text("ada")));
        assert_eq!(node.tag(), Some("p"));
        assert_eq!(node.text_content(), "hello ada");
        assert_eq!(
            node.to_string(),
            "<p class=\"greeting\">hello <b>ada</b></p>"
        );
    }

    #[test]
    fn test_ron_roundtrip() {
        let node = VNode::element("ul").child(VNode::element("li").child(VNode::text("one")));
        let text = ron::to_string(&node).expect("serialize");
        let back: VNode = ron::from_str(&text).expect("deserialize");
        assert_eq!(back, node);
    }
}
