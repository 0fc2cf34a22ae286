// Coordinator regression: the working document is mutated only by
// successful operations, and the stage gate never reverts.

use cppalchemist::error::WorkflowError;
use cppalchemist::machine::{
    apply_event, can_trigger, parse_outputs, precondition_error, Op, WorkflowEvent,
    GENERATE_CONFIRMATION,
};
use cppalchemist::state::{SessionState, Stage, WorkingDocument};

fn complete(op: Op, reply: &str) -> WorkflowEvent {
    let (tests, analysis) = parse_outputs(op, reply).expect("reply should satisfy the contract");
    WorkflowEvent::Completed { op, tests, analysis }
}

#[test]
fn generate_on_empty_document_is_validation_error() {
    let doc = WorkingDocument::empty();

    let err = precondition_error(&doc, Op::Generate).expect("empty document must be rejected");
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[test]
fn successful_generate_yields_tests_and_generated_stage() {
    let mut doc = WorkingDocument::empty();
    doc.source_code = "int add(int a,int b){return a+b;}".to_string();
    doc.instructions = "framework: \"GoogleTest\"".to_string();
    let mut state = SessionState::new(doc);

    assert!(can_trigger(&state, Op::Generate));
    state.pending = Some(Op::Generate);

    apply_event(
        &mut state,
        complete(
            Op::Generate,
            r#"{"generatedTests": "TEST(Add, Positive) { EXPECT_EQ(add(2, 3), 5); }"}"#,
        ),
    );

    assert!(!state.document.generated_tests.is_empty());
    assert_eq!(state.document.stage, Stage::Generated);
    assert_eq!(state.document.analysis, GENERATE_CONFIRMATION);
    assert!(state.pending.is_none());
}

#[test]
fn downstream_operations_unreachable_while_initial() {
    let state = SessionState::new(WorkingDocument::seeded());

    assert!(!can_trigger(&state, Op::Refine));
    assert!(!can_trigger(&state, Op::FixBuild));
    assert!(!can_trigger(&state, Op::Optimize));
}

#[test]
fn fix_disabled_without_build_logs_and_optimize_without_coverage() {
    let mut doc = WorkingDocument::seeded();
    doc.generated_tests = "TEST(A, B) {}".to_string();
    doc.stage = Stage::Generated;
    let state = SessionState::new(doc);

    assert!(!can_trigger(&state, Op::FixBuild));
    assert!(!can_trigger(&state, Op::Optimize));
    assert!(can_trigger(&state, Op::Refine));
}

#[test]
fn refine_overwrites_suite_and_reports() {
    let mut doc = WorkingDocument::seeded();
    doc.generated_tests = "TEST(A, B) {}".to_string();
    doc.stage = Stage::Generated;
    let mut state = SessionState::new(doc);

    state.pending = Some(Op::Refine);
    apply_event(
        &mut state,
        complete(Op::Refine, r#"{"refinedTests": "T2", "report": "R2"}"#),
    );

    assert_eq!(state.document.generated_tests, "T2");
    assert!(state.document.analysis.contains("R2"));
    assert_eq!(state.document.stage, Stage::Generated);
}

#[test]
fn failed_operation_leaves_document_identical() {
    let mut doc = WorkingDocument::seeded();
    doc.generated_tests = "TEST(A, B) {}".to_string();
    doc.build_logs = "error: expected ';'".to_string();
    doc.stage = Stage::Generated;
    let mut state = SessionState::new(doc);

    let before = state.document.clone();

    for (op, error) in [
        (Op::Refine, WorkflowError::upstream("model call timed out")),
        (Op::FixBuild, WorkflowError::schema("no JSON object in model reply")),
        (Op::Optimize, WorkflowError::upstream("model endpoint returned 500")),
        (Op::Generate, WorkflowError::schema("model returned an empty test suite")),
    ] {
        state.pending = Some(op);
        apply_event(&mut state, WorkflowEvent::Failed { op, error });

        assert_eq!(state.document, before);
        assert!(state.pending.is_none());
    }
}

#[test]
fn stage_transitions_once_and_never_reverts() {
    let mut state = SessionState::new(WorkingDocument::seeded());
    assert_eq!(state.document.stage, Stage::Initial);

    // a failed generate does not advance the stage
    state.pending = Some(Op::Generate);
    apply_event(
        &mut state,
        WorkflowEvent::Failed {
            op: Op::Generate,
            error: WorkflowError::upstream("connection refused"),
        },
    );
    assert_eq!(state.document.stage, Stage::Initial);

    state.pending = Some(Op::Generate);
    apply_event(
        &mut state,
        complete(Op::Generate, r#"{"generatedTests": "TEST(A, B) {}"}"#),
    );
    assert_eq!(state.document.stage, Stage::Generated);

    // no later outcome moves the stage back
    state.pending = Some(Op::Refine);
    apply_event(
        &mut state,
        WorkflowEvent::Failed {
            op: Op::Refine,
            error: WorkflowError::schema("reply does not match output contract"),
        },
    );
    assert_eq!(state.document.stage, Stage::Generated);

    state.pending = Some(Op::Generate);
    apply_event(
        &mut state,
        complete(Op::Generate, r#"{"generatedTests": "TEST(C, D) {}"}"#),
    );
    assert_eq!(state.document.stage, Stage::Generated);
}
