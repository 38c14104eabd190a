//! Workflow state and the partial updates nodes return.

use arag_core::{AppError, AppResult};
use arag_knowledge::EvidenceChunk;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(AppError::Other(format!("Unknown message role: {}", s))),
        }
    }
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The generator's current draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Evidence source picked for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Vectorstore,
    WebSearch,
    Direct,
}

impl Route {
    /// Map a router token to a route. Anything unrecognised answers directly.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "vectorstore" => Route::Vectorstore,
            "web_search" => Route::WebSearch,
            "direct" => Route::Direct,
            other => {
                tracing::warn!("Unrecognised route '{}', answering directly", other);
                Route::Direct
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Vectorstore => "vectorstore",
            Route::WebSearch => "web_search",
            Route::Direct => "direct",
        }
    }
}

/// Outcome of self-critique on the latest draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationGrade {
    /// Grounded and addresses the question
    Useful,
    /// Grounded but does not address the question
    NotUseful,
    /// Not supported by the evidence
    NotSupported,
    /// No evidence, graders skipped
    Unchecked,
}

/// The single record threaded through every node of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub question: String,
    pub evidence: Vec<EvidenceChunk>,
    pub answer: Option<Answer>,
    pub history: Vec<Message>,

    /// Router decision, set once by the route node
    pub route: Option<Route>,

    /// Self-critique of `answer`
    pub grade: Option<GenerationGrade>,

    /// Evidence present when `answer` was generated
    pub answer_evidence: Vec<EvidenceChunk>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, history: Vec<Message>) -> Self {
        Self {
            question: question.into(),
            evidence: Vec::new(),
            answer: None,
            history,
            route: None,
            grade: None,
            answer_evidence: Vec::new(),
        }
    }

    /// Merge a node's partial update. Fields left `None` are unchanged.
    ///
    /// A new answer snapshots the evidence it was generated from.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(question) = update.question {
            self.question = question;
        }
        if let Some(evidence) = update.evidence {
            self.evidence = evidence;
        }
        if let Some(route) = update.route {
            self.route = Some(route);
        }
        if let Some(answer) = update.answer {
            self.answer = Some(answer);
            self.answer_evidence = self.evidence.clone();
            self.grade = None;
        }
        if let Some(grade) = update.grade {
            self.grade = Some(grade);
        }
    }
}

/// Partial update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub question: Option<String>,
    pub evidence: Option<Vec<EvidenceChunk>>,
    pub answer: Option<Answer>,
    pub route: Option<Route>,
    pub grade: Option<GenerationGrade>,
}

impl StateUpdate {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
            ..Default::default()
        }
    }

    pub fn evidence(evidence: Vec<EvidenceChunk>) -> Self {
        Self {
            evidence: Some(evidence),
            ..Default::default()
        }
    }

    pub fn route(route: Route) -> Self {
        Self {
            route: Some(route),
            ..Default::default()
        }
    }

    pub fn answer(answer: Answer, grade: Option<GenerationGrade>) -> Self {
        Self {
            answer: Some(answer),
            grade,
            ..Default::default()
        }
    }
}
