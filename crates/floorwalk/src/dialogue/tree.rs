use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub(crate) const START_NODE_KEY: &str = "start";
pub(crate) const END_NODE_KEY: &str = "end";
pub(crate) const MISSING_TEXT: &str = "(No text defined for this node.)";
pub(crate) const END_FALLBACK_TEXT: &str = "Goodbye!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DialogueChoice {
    pub(crate) text: String,
    pub(crate) next: String,
}

/// Decided once at validation; choices win over `next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Dialogue { next: String },
    Choice { choices: Vec<DialogueChoice> },
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DialogueNode {
    pub(crate) text: String,
    pub(crate) kind: NodeKind,
}

impl DialogueNode {
    pub(crate) fn choice_labels(&self) -> Vec<String> {
        match &self.kind {
            NodeKind::Choice { choices } => {
                choices.iter().map(|choice| choice.text.clone()).collect()
            }
            NodeKind::Dialogue { .. } | NodeKind::Terminal => Vec::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DialogueTreeError {
    #[error("dialogue tree must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
    #[error("dialogue tree has {node_count} node(s) but no 'start' node")]
    MissingStart { node_count: usize },
    #[error("dialogue node '{key}' is malformed at {path}: {message}")]
    MalformedNode {
        key: String,
        path: String,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireNode {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    choices: Option<Vec<WireChoice>>,
    #[serde(default, alias = "nextNodeKey")]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    text: String,
    #[serde(alias = "nextNodeKey")]
    next: String,
}

/// Immutable node map for one NPC. An empty tree is valid; it just has no
/// `start` to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DialogueTree {
    nodes: BTreeMap<String, DialogueNode>,
}

impl DialogueTree {
    #[cfg(test)]
    pub(crate) fn from_json_str(raw: &str) -> Result<Self, DialogueTreeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|error| DialogueTreeError::MalformedNode {
                key: String::new(),
                path: ".".to_string(),
                message: error.to_string(),
            })?;
        Self::from_value(&value)
    }

    /// `null` is read as an empty tree; anything else must be an object of nodes.
    pub(crate) fn from_value(value: &Value) -> Result<Self, DialogueTreeError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(DialogueTreeError::NotAnObject {
                    found: json_kind(other),
                })
            }
        };

        let mut nodes = BTreeMap::new();
        for (key, raw_node) in object {
            let wire = serde_path_to_error::deserialize::<_, WireNode>(raw_node).map_err(
                |error| {
                    let path = error.path().to_string();
                    DialogueTreeError::MalformedNode {
                        key: key.clone(),
                        path,
                        message: error.into_inner().to_string(),
                    }
                },
            )?;
            nodes.insert(key.clone(), validate_node(key, wire));
        }

        if !nodes.is_empty() && !nodes.contains_key(START_NODE_KEY) {
            return Err(DialogueTreeError::MissingStart {
                node_count: nodes.len(),
            });
        }
        Ok(Self { nodes })
    }

    pub(crate) fn node(&self, key: &str) -> Option<&DialogueNode> {
        self.nodes.get(key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(from, to)` pairs whose target key has no node. The session closes
    /// when it reaches one of these, so they are only worth a warning.
    pub(crate) fn dangling_targets(&self) -> Vec<(String, String)> {
        let mut dangling = Vec::new();
        for (key, node) in &self.nodes {
            let targets: Vec<&str> = match &node.kind {
                NodeKind::Dialogue { next } => vec![next.as_str()],
                NodeKind::Choice { choices } => {
                    choices.iter().map(|choice| choice.next.as_str()).collect()
                }
                NodeKind::Terminal => Vec::new(),
            };
            for target in targets {
                if !self.nodes.contains_key(target) {
                    dangling.push((key.clone(), target.to_string()));
                }
            }
        }
        dangling
    }
}

fn validate_node(key: &str, wire: WireNode) -> DialogueNode {
    let text = match wire.text {
        Some(text) if !text.is_empty() => text,
        _ if key == END_NODE_KEY => END_FALLBACK_TEXT.to_string(),
        _ => MISSING_TEXT.to_string(),
    };

    let choices = wire.choices.unwrap_or_default();
    let kind = if !choices.is_empty() {
        NodeKind::Choice {
            choices: choices
                .into_iter()
                .map(|choice| DialogueChoice {
                    text: choice.text,
                    next: choice.next,
                })
                .collect(),
        }
    } else {
        match wire.next {
            Some(next) if !next.is_empty() => NodeKind::Dialogue { next },
            _ => NodeKind::Terminal,
        }
    };
    DialogueNode { text, kind }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
