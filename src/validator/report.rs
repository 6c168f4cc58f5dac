//! Validation report tree
//!
//! Validation results render as an indented tree so an operator can see
//! at a glance which selector produced what. Nodes carry a pass/fail
//! status, an optional extracted sample, and an optional error; the same
//! tree serializes to JSON for tooling.

use crate::validator::{FieldCheck, PageValidation};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Failure,
    None,
}

impl NodeStatus {
    fn glyph(self) -> &'static str {
        match self {
            NodeStatus::Success => "✓",
            NodeStatus::Failure => "⨯",
            NodeStatus::None => " ",
        }
    }
}

/// One node of the validation report
#[derive(Debug, Clone, Serialize)]
pub struct ValidationNode {
    pub name: String,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ValidationNode>,
}

impl ValidationNode {
    fn new(name: impl Into<String>) -> ValidationNode {
        ValidationNode {
            name: name.into(),
            status: NodeStatus::None,
            sample: None,
            error: None,
            count: None,
            url: None,
            children: Vec::new(),
        }
    }

    fn with_status(name: impl Into<String>, status: NodeStatus) -> ValidationNode {
        let mut node = ValidationNode::new(name);
        node.status = status;
        node
    }

    /// True when this node or any descendant failed
    pub fn has_failures(&self) -> bool {
        self.status == NodeStatus::Failure
            || self.error.is_some()
            || self.children.iter().any(ValidationNode::has_failures)
    }
}

/// Assembles the report tree from both page validations
pub fn build_tree(
    source_name: &str,
    index: &PageValidation,
    resource: &PageValidation,
) -> ValidationNode {
    let mut root = ValidationNode::new(format!("{} Configuration Validation", source_name));
    root.children.push(page_subtree("Index Page", index));
    root.children.push(page_subtree("Resource Page", resource));
    root
}

fn page_subtree(name: &str, page: &PageValidation) -> ValidationNode {
    let status = if page.errors.is_empty() {
        NodeStatus::Success
    } else {
        NodeStatus::Failure
    };
    let mut node = ValidationNode::with_status(name, status);
    node.url = Some(page.start_url.clone());
    if !page.errors.is_empty() {
        node.error = Some(page.errors.join("; "));
    }

    let mut items = ValidationNode::with_status("Items Selector", NodeStatus::Success);
    items.sample = Some(format!("({})", page.items_selector));
    items.count = Some(page.items_count);
    for (field_name, check) in &page.fields {
        items.children.push(field_node(field_name, check));
    }
    node.children.push(items);

    let mut pagination = ValidationNode::with_status("Pagination", NodeStatus::Success);
    pagination.sample = Some(format!(
        "({})",
        page.pagination_selector.as_deref().unwrap_or("none")
    ));
    let mut chain = ValidationNode::new(format!(
        "Chain: {} pages validated",
        page.pages_validated
    ));
    for (position, url) in page.page_urls.iter().enumerate() {
        let mut page_node = ValidationNode::new(format!("Page {}", position + 1));
        page_node.url = Some(url.clone());
        chain.children.push(page_node);
    }
    pagination.children.push(chain);
    node.children.push(pagination);

    node
}

fn field_node(field_name: &str, check: &FieldCheck) -> ValidationNode {
    let status = if check.error.is_some() {
        NodeStatus::Failure
    } else {
        NodeStatus::Success
    };
    let mut node = ValidationNode::with_status(capitalize(field_name), status);
    node.sample = check.sample.clone();
    node.error = check.error.clone();
    node
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Renders the tree with box-drawing connectors
pub fn render(node: &ValidationNode) -> String {
    render_node(node, "", true)
}

fn render_node(node: &ValidationNode, prefix: &str, is_last: bool) -> String {
    let connector = if is_last { "└── " } else { "├── " };

    let mut text = node.name.clone();
    if node.status != NodeStatus::None {
        text.push_str(&format!(" ({})", node.status.glyph()));
    }
    if let Some(sample) = &node.sample {
        text.push_str(&format!(" {sample}"));
    }
    if let Some(count) = node.count {
        text.push_str(&format!(" [{count} items found]"));
    }
    if let Some(error) = &node.error {
        text.push_str(&format!(": {error}"));
    }
    if let Some(url) = &node.url {
        text.push_str(&format!("\n{prefix}     URL: {url}"));
    }

    let mut lines = vec![format!("{prefix}{connector}{text}")];

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
    for (position, child) in node.children.iter().enumerate() {
        let last_child = position == node.children.len() - 1;
        lines.push(render_node(child, &child_prefix, last_child));
    }

    lines.join("\n")
}
