//! Workflow engine: drives the node state machine to completion.
//!
//! The engine is a trampoline. Each iteration executes one node, merges its
//! partial update into the state, and asks the edge function where to go
//! next. A hop ceiling bounds the loop.

use std::sync::Arc;

use arag_core::{AppError, AppResult, WorkflowSettings};
use arag_knowledge::{web_evidence, EvidenceChunk, EvidenceStore, WebSearcher};
use futures::stream::{self, Stream};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::edges;
use crate::expander::{expand_question, retrieve_union, rewrite_question};
use crate::generator::generate_answer;
use crate::grading::{filter_relevant, grade_generation};
use crate::node::{Node, Transition};
use crate::prompting::PromptRunner;
use crate::router::route_question;
use crate::state::{Answer, Message, Route, StateUpdate, WorkflowState};

/// Number of web results folded into the web evidence chunk by default.
const DEFAULT_WEB_RESULTS: usize = 3;

/// State after a node ran.
#[derive(Debug, Clone)]
pub struct Step {
    pub node: Node,
    pub state: WorkflowState,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The answer was accepted by the graders or the direct path
    Accepted,
    /// The loop stopped before acceptance, at the hop ceiling or because
    /// the question could not be rewritten; the answer is best effort
    HopLimit,
}

/// Final result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub answer: Answer,

    /// Evidence the answer was generated from
    pub evidence: Vec<EvidenceChunk>,

    pub route: Route,
    pub question: String,
    pub hops: u32,
    pub termination: Termination,
}

/// Event emitted by a streaming run.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    Progress { node: Node, status: String },
    Finished(WorkflowOutcome),
}

/// The adaptive retrieval-and-generation control loop.
pub struct WorkflowEngine {
    runner: PromptRunner,
    store: Arc<EvidenceStore>,
    web: Option<Arc<dyn WebSearcher>>,
    settings: WorkflowSettings,
    web_results: usize,
}

impl WorkflowEngine {
    pub fn new(runner: PromptRunner, store: Arc<EvidenceStore>, settings: WorkflowSettings) -> Self {
        Self {
            runner,
            store,
            web: None,
            settings,
            web_results: DEFAULT_WEB_RESULTS,
        }
    }

    /// Enable the web search route.
    pub fn with_web_search(mut self, searcher: Arc<dyn WebSearcher>, max_results: usize) -> Self {
        self.web = Some(searcher);
        self.web_results = max_results.max(1);
        self
    }

    /// Run to completion and return the accepted (or best-effort) answer.
    pub async fn run(&self, question: &str, history: Vec<Message>) -> AppResult<WorkflowOutcome> {
        let mut run = Run::new(self, question, history);
        while run.advance().await?.is_some() {}
        run.into_outcome()
    }

    /// Lazy sequence of node executions with the state after each.
    ///
    /// Single pass; issue a new call to restart.
    pub fn steps(
        &self,
        question: &str,
        history: Vec<Message>,
    ) -> impl Stream<Item = AppResult<Step>> + '_ {
        let run = Run::new(self, question, history);
        stream::try_unfold(run, |mut run| async move {
            let step = run.advance().await?;
            Ok::<_, AppError>(step.map(|step| (step, run)))
        })
    }

    /// Progress events followed by exactly one `Finished` event.
    ///
    /// Consecutive executions of the same node produce one progress event.
    pub fn run_streaming(
        &self,
        question: &str,
        history: Vec<Message>,
    ) -> impl Stream<Item = AppResult<WorkflowEvent>> + '_ {
        let run = Run::new(self, question, history);
        stream::try_unfold(Some((run, None::<Node>)), |cursor| async move {
            let Some((mut run, mut last)) = cursor else {
                return Ok::<_, AppError>(None);
            };

            loop {
                match run.advance().await? {
                    Some(step) if last == Some(step.node) => continue,
                    Some(step) => {
                        last = Some(step.node);
                        if let Some(status) = step.node.status_message() {
                            let event = WorkflowEvent::Progress {
                                node: step.node,
                                status: status.to_string(),
                            };
                            return Ok(Some((event, Some((run, last)))));
                        }
                    }
                    None => {
                        let outcome = run.into_outcome()?;
                        return Ok(Some((WorkflowEvent::Finished(outcome), None)));
                    }
                }
            }
        })
    }

    /// Execute one node against the current state.
    async fn execute(&self, node: Node, state: &WorkflowState) -> AppResult<StateUpdate> {
        info!("---{}---", node.name().to_uppercase());

        match node {
            Node::Route => {
                let route = route_question(&self.runner, &state.question, &self.store.topic_hint())
                    .await
                    .map_err(AppError::into_generation)?;
                Ok(StateUpdate::route(route))
            }

            Node::Retrieve => {
                let queries = expand_question(
                    &self.runner,
                    &state.question,
                    self.settings.fan_out_queries as usize,
                )
                .await
                .map_err(AppError::into_generation)?;
                let evidence =
                    retrieve_union(&self.store, &queries, self.settings.top_k as usize).await?;
                Ok(StateUpdate::evidence(evidence))
            }

            Node::GradeDocuments => {
                let relevant = filter_relevant(&self.runner, &state.question, state.evidence.clone())
                    .await
                    .map_err(AppError::into_generation)?;
                info!(
                    "{} of {} chunks relevant",
                    relevant.len(),
                    state.evidence.len()
                );
                Ok(StateUpdate::evidence(relevant))
            }

            Node::WebSearch => {
                let searcher = self.web.as_ref().ok_or_else(|| {
                    AppError::Retrieval("Web search is not configured".to_string())
                })?;
                let chunk = web_evidence(searcher.as_ref(), &state.question, self.web_results)
                    .await
                    .map_err(|e| match e {
                        e @ AppError::Retrieval(_) => e,
                        other => AppError::Retrieval(other.to_string()),
                    })?;
                Ok(StateUpdate::evidence(vec![chunk]))
            }

            Node::Generate => {
                let answer = self.draft(state).await?;
                let grade =
                    grade_generation(&self.runner, &state.question, &state.evidence, &answer.text)
                        .await
                        .map_err(AppError::into_generation)?;
                Ok(StateUpdate::answer(answer, Some(grade)))
            }

            Node::TransformQuery => {
                let question = rewrite_question(
                    &self.runner,
                    &state.question,
                    self.settings.max_parse_attempts,
                )
                .await
                .map_err(AppError::into_generation)?;
                Ok(StateUpdate::question(question))
            }
        }
    }

    async fn draft(&self, state: &WorkflowState) -> AppResult<Answer> {
        generate_answer(
            &self.runner,
            &state.question,
            &state.evidence,
            &state.history,
            self.settings.history_turns as usize,
        )
        .await
        .map_err(AppError::into_generation)
    }
}

/// One in-flight execution: owns its state exclusively.
struct Run<'a> {
    engine: &'a WorkflowEngine,
    state: WorkflowState,
    next: Option<Node>,
    hops: u32,
    termination: Option<Termination>,
    span: Span,
}

impl<'a> Run<'a> {
    fn new(engine: &'a WorkflowEngine, question: &str, history: Vec<Message>) -> Self {
        let span = info_span!("workflow", run_id = %Uuid::new_v4());
        Self {
            engine,
            state: WorkflowState::new(question, history),
            next: Some(Node::Route),
            hops: 0,
            termination: None,
            span,
        }
    }

    /// Execute the next node; `None` once the run has terminated.
    async fn advance(&mut self) -> AppResult<Option<Step>> {
        let span = self.span.clone();
        self.advance_inner().instrument(span).await
    }

    async fn advance_inner(&mut self) -> AppResult<Option<Step>> {
        let Some(node) = self.next else {
            return Ok(None);
        };

        if self.hops >= self.engine.settings.max_hops {
            warn!(
                hops = self.hops,
                "Hop limit reached before acceptance, returning best-effort answer"
            );
            self.next = None;
            self.termination = Some(Termination::HopLimit);

            if self.state.answer.is_none() {
                // Freshly retrieved evidence has not been filtered yet
                if node == Node::GradeDocuments {
                    let update = self.engine.execute(Node::GradeDocuments, &self.state).await?;
                    self.state.apply(update);
                }

                // Final ungraded generation from the vetted evidence
                let answer = self.engine.draft(&self.state).await?;
                self.state.apply(StateUpdate::answer(answer, None));
                return Ok(Some(self.step(Node::Generate)));
            }
            return Ok(None);
        }

        self.hops += 1;
        let update = match self.engine.execute(node, &self.state).await {
            Ok(update) => update,
            Err(AppError::Generation(reason))
                if node == Node::TransformQuery && self.state.answer.is_some() =>
            {
                warn!(
                    "Query rewrite failed, returning best-effort answer: {}",
                    reason
                );
                self.next = None;
                self.termination = Some(Termination::HopLimit);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        self.state.apply(update);

        match edges::next(node, &self.state) {
            Transition::To(next) => self.next = Some(next),
            Transition::Done => {
                info!(hops = self.hops, "---DONE---");
                self.next = None;
                self.termination = Some(Termination::Accepted);
            }
        }

        Ok(Some(self.step(node)))
    }

    fn step(&self, node: Node) -> Step {
        Step {
            node,
            state: self.state.clone(),
        }
    }

    fn into_outcome(self) -> AppResult<WorkflowOutcome> {
        let answer = self
            .state
            .answer
            .ok_or_else(|| AppError::Generation("Workflow ended without an answer".to_string()))?;

        Ok(WorkflowOutcome {
            answer,
            evidence: self.state.answer_evidence,
            route: self.state.route.unwrap_or(Route::Direct),
            question: self.state.question,
            hops: self.hops,
            termination: self.termination.unwrap_or(Termination::HopLimit),
        })
    }
}
