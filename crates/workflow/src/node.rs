//! Workflow nodes.

use serde::{Deserialize, Serialize};

/// A state of the workflow state machine that runs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Route,
    Retrieve,
    GradeDocuments,
    WebSearch,
    Generate,
    TransformQuery,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Route => "route",
            Node::Retrieve => "retrieve",
            Node::GradeDocuments => "grade_documents",
            Node::WebSearch => "web_search",
            Node::Generate => "generate",
            Node::TransformQuery => "transform_query",
        }
    }

    /// User-facing progress text. Routing happens before any visible work.
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            Node::Route => None,
            Node::Retrieve => Some("Retrieving relevant documents..."),
            Node::GradeDocuments => Some("Evaluating document relevance..."),
            Node::WebSearch => Some("Searching the web for information..."),
            Node::Generate => Some("Generating your answer..."),
            Node::TransformQuery => Some("Refining search query..."),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the machine goes after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(Node),
    Done,
}
