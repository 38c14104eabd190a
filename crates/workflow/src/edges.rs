//! Transitions between nodes.
//!
//! Every edge is a pure function of the node just executed and the state
//! it produced.

use crate::node::{Node, Transition};
use crate::state::{GenerationGrade, Route, WorkflowState};

/// Pick the next node.
pub fn next(node: Node, state: &WorkflowState) -> Transition {
    match node {
        Node::Route => after_route(state),
        Node::Retrieve => Transition::To(Node::GradeDocuments),
        Node::GradeDocuments => after_grade_documents(state),
        Node::WebSearch => Transition::To(Node::Generate),
        Node::TransformQuery => Transition::To(Node::Retrieve),
        Node::Generate => after_generate(state),
    }
}

fn after_route(state: &WorkflowState) -> Transition {
    match state.route.unwrap_or(Route::Direct) {
        Route::Vectorstore => Transition::To(Node::Retrieve),
        Route::WebSearch => Transition::To(Node::WebSearch),
        Route::Direct => Transition::To(Node::Generate),
    }
}

fn after_grade_documents(state: &WorkflowState) -> Transition {
    if state.evidence.is_empty() {
        Transition::To(Node::TransformQuery)
    } else {
        Transition::To(Node::Generate)
    }
}

fn after_generate(state: &WorkflowState) -> Transition {
    // Direct answers are accepted as-is
    if state.evidence.is_empty() {
        return Transition::Done;
    }

    match state.grade {
        Some(GenerationGrade::Useful) | Some(GenerationGrade::Unchecked) => Transition::Done,
        Some(GenerationGrade::NotUseful) => Transition::To(Node::TransformQuery),
        Some(GenerationGrade::NotSupported) | None => Transition::To(Node::Generate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Answer, StateUpdate};
    use arag_knowledge::EvidenceChunk;

    fn state_with(evidence: usize, grade: Option<GenerationGrade>) -> WorkflowState {
        let mut state = WorkflowState::new("q", Vec::new());
        state.apply(StateUpdate::evidence(
            (0..evidence)
                .map(|i| EvidenceChunk::new(format!("chunk {}", i), None))
                .collect(),
        ));
        state.apply(StateUpdate::answer(Answer::new("a"), grade));
        state
    }

    #[test]
    fn test_route_edges() {
        let mut state = WorkflowState::new("q", Vec::new());
        assert_eq!(next(Node::Route, &state), Transition::To(Node::Generate));

        state.apply(StateUpdate::route(Route::Vectorstore));
        assert_eq!(next(Node::Route, &state), Transition::To(Node::Retrieve));

        state.apply(StateUpdate::route(Route::WebSearch));
        assert_eq!(next(Node::Route, &state), Transition::To(Node::WebSearch));

        state.apply(StateUpdate::route(Route::Direct));
        assert_eq!(next(Node::Route, &state), Transition::To(Node::Generate));
    }

    #[test]
    fn test_unconditional_edges() {
        let state = WorkflowState::new("q", Vec::new());
        assert_eq!(next(Node::Retrieve, &state), Transition::To(Node::GradeDocuments));
        assert_eq!(next(Node::WebSearch, &state), Transition::To(Node::Generate));
        assert_eq!(next(Node::TransformQuery, &state), Transition::To(Node::Retrieve));
    }

    #[test]
    fn test_grade_documents_edges() {
        let empty = WorkflowState::new("q", Vec::new());
        assert_eq!(
            next(Node::GradeDocuments, &empty),
            Transition::To(Node::TransformQuery)
        );

        let kept = state_with(1, None);
        assert_eq!(next(Node::GradeDocuments, &kept), Transition::To(Node::Generate));
    }

    #[test]
    fn test_generate_edges() {
        assert_eq!(next(Node::Generate, &state_with(0, None)), Transition::Done);
        assert_eq!(
            next(Node::Generate, &state_with(0, Some(GenerationGrade::NotSupported))),
            Transition::Done
        );
        assert_eq!(
            next(Node::Generate, &state_with(2, Some(GenerationGrade::Useful))),
            Transition::Done
        );
        assert_eq!(
            next(Node::Generate, &state_with(2, Some(GenerationGrade::NotUseful))),
            Transition::To(Node::TransformQuery)
        );
        assert_eq!(
            next(Node::Generate, &state_with(2, Some(GenerationGrade::NotSupported))),
            Transition::To(Node::Generate)
        );
        assert_eq!(
            next(Node::Generate, &state_with(2, None)),
            Transition::To(Node::Generate)
        );
    }
}
