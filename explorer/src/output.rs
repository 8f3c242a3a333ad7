//! Messages emitted by the driver and their rendering.
//!
//! JSON output is one object per line with a `type` field. Text output is
//! meant for a person at a terminal.

use std::fmt;

use serde::Serialize;

use crate::btree::{InvariantViolation, TreeStats};
use crate::layout::{Edge, LeafLink, PositionedNode};
use crate::narration::VisualizationStep;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Step(VisualizationStep),
    Stats(TreeStats),
    Layout {
        root: Option<PositionedNode>,
        edges: Vec<Edge>,
        leaf_chain: Vec<LeafLink>,
    },
    Log {
        entries: Vec<String>,
    },
    Check {
        violations: Vec<InvariantViolation>,
    },
    /// Informational message such as a config change.
    Notice {
        message: String,
    },
    /// A request could not be carried out.
    Error {
        message: String,
    },
}

impl Output {
    #[must_use]
    pub fn layout(root: Option<PositionedNode>) -> Self {
        let (edges, leaf_chain) = root
            .as_ref()
            .map(|r| (r.edges(), r.leaf_chain()))
            .unwrap_or_default();
        Self::Layout {
            root,
            edges,
            leaf_chain,
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// Render as a single line of JSON or as text.
    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Json => serde_json::to_string(self),
            OutputFormat::Text => Ok(self.to_string()),
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "[{}] {}", step.operation, step.message),
            Self::Stats(stats) => write!(
                f,
                "height {}, keys {}, nodes {}, fill {:.1}%, max keys/node {}",
                stats.height,
                stats.total_keys,
                stats.total_nodes,
                stats.fill_ratio,
                stats.max_keys_per_node
            ),
            Self::Layout { root: None, .. } => write!(f, "(empty tree)"),
            Self::Layout {
                root: Some(root), ..
            } => {
                let lines: Vec<String> = root
                    .nodes()
                    .iter()
                    .map(|node| {
                        format!(
                            "{}{} {:?} at ({:.0}, {:.0})",
                            "  ".repeat(node.depth),
                            node.id,
                            node.keys,
                            node.x,
                            node.y
                        )
                    })
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Self::Log { entries } => write!(f, "{}", entries.join("\n")),
            Self::Check { violations } if violations.is_empty() => {
                write!(f, "ok: no invariant violations")
            }
            Self::Check { violations } => {
                let lines: Vec<String> = violations.iter().map(ToString::to_string).collect();
                write!(f, "{}", lines.join("\n"))
            }
            Self::Notice { message } => write!(f, "{message}"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    /// Parse a format name (`json` or `text`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}
