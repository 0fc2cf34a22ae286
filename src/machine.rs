//! machine.rs
//!
//! Workflow coordinator: gates the four AI operations on the working
//! document, dispatches them to a worker thread, and merges results back
//! atomically.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::error::WorkflowError;
use crate::llm::client::LlmClient;
use crate::llm::prompt::{self, LlmPrompt};
use crate::llm::schema::{self, FixBuildOutput, GenerateOutput, OptimizeOutput, RefineOutput};
use crate::state::{change_summary, LogLevel, SessionState, Stage, WorkingDocument};

pub const GENERATE_CONFIRMATION: &str =
    "Generated initial tests. You can now refine them or run a build.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Generate,
    Refine,
    FixBuild,
    Optimize,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Generate => "generate",
            Op::Refine => "refine",
            Op::FixBuild => "fix",
            Op::Optimize => "optimize",
        }
    }
}

/* ---------- events ---------- */

#[derive(Debug)]
pub enum WorkflowEvent {
    Log(LogLevel, String),
    Completed {
        op: Op,
        tests: String,
        analysis: String,
    },
    Failed {
        op: Op,
        error: WorkflowError,
    },
}

/* ---------- preconditions ---------- */

/// Precondition check for one operation, ignoring the in-flight marker.
/// Returns the validation error a trigger would surface.
pub fn precondition_error(doc: &WorkingDocument, op: Op) -> Option<WorkflowError> {
    match op {
        Op::Generate => {
            if doc.source_code.trim().is_empty() {
                return Some(WorkflowError::validation("source code is empty"));
            }
            if doc.instructions.trim().is_empty() {
                return Some(WorkflowError::validation("instructions are empty"));
            }
            None
        }

        Op::Refine => (doc.stage == Stage::Initial)
            .then(|| WorkflowError::validation("no generated tests yet; run generate first")),

        Op::FixBuild => {
            if doc.stage == Stage::Initial {
                return Some(WorkflowError::validation(
                    "no generated tests yet; run generate first",
                ));
            }
            if doc.build_logs.trim().is_empty() {
                return Some(WorkflowError::validation("build logs are empty"));
            }
            None
        }

        Op::Optimize => {
            if doc.stage == Stage::Initial {
                return Some(WorkflowError::validation(
                    "no generated tests yet; run generate first",
                ));
            }
            if doc.coverage_report.trim().is_empty() {
                return Some(WorkflowError::validation("coverage report is empty"));
            }
            None
        }
    }
}

/// Whether the presentation layer should enable the trigger for `op`.
pub fn can_trigger(state: &SessionState, op: Op) -> bool {
    state.pending.is_none() && precondition_error(&state.document, op).is_none()
}

/* ---------- coordinator ---------- */

pub struct Workflow {
    client: LlmClient,
    tx: Sender<WorkflowEvent>,
    rx: Receiver<WorkflowEvent>,
}

impl Workflow {
    pub fn new(client: LlmClient) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { client, tx, rx }
    }

    /// Validate, mark pending, and dispatch `op` to a worker thread.
    /// Exactly one operation may be in flight; later triggers are rejected.
    pub fn trigger(&self, state: &mut SessionState, op: Op) -> Result<(), WorkflowError> {
        if let Some(running) = state.pending {
            return Err(WorkflowError::validation(format!(
                "{} is still running; one operation at a time",
                running.name()
            )));
        }

        if let Some(err) = precondition_error(&state.document, op) {
            return Err(err);
        }

        let prompt = build_op_prompt(&state.document, op);
        state.pending = Some(op);

        let tx = self.tx.clone();
        let client = self.client.clone();
        thread::spawn(move || run_operation(tx, client, op, prompt));

        Ok(())
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<WorkflowEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Apply any events already queued without blocking.
    pub fn drain(&self, state: &mut SessionState) {
        while let Ok(event) = self.rx.try_recv() {
            apply_event(state, event);
        }
    }
}

/// Render the operation's prompt from a snapshot of the document.
fn build_op_prompt(doc: &WorkingDocument, op: Op) -> LlmPrompt {
    match op {
        Op::Generate => prompt::generate(&prompt::GenerateRequest {
            cpp_code: &doc.source_code,
            yaml_instructions: &doc.instructions,
            tests_folder: prompt::DEFAULT_TESTS_FOLDER,
        }),

        Op::Refine => prompt::refine(&prompt::RefineRequest {
            cpp_code: &doc.source_code,
            generated_tests: &doc.generated_tests,
            yaml_config: &doc.instructions,
            build_logs: if doc.build_logs.trim().is_empty() {
                None
            } else {
                Some(&doc.build_logs)
            },
        }),

        // the suite under repair, not the original source
        Op::FixBuild => prompt::fix_build(&prompt::FixBuildRequest {
            cpp_code: &doc.generated_tests,
            build_logs: &doc.build_logs,
            yaml_guidelines: &doc.instructions,
        }),

        Op::Optimize => prompt::optimize(&prompt::OptimizeRequest {
            cpp_code: &doc.source_code,
            coverage_report: &doc.coverage_report,
            yaml_instructions: &doc.instructions,
        }),
    }
}

/* ---------- worker ---------- */

fn run_operation(tx: Sender<WorkflowEvent>, client: LlmClient, op: Op, prompt: LlmPrompt) {
    let _ = tx.send(WorkflowEvent::Log(
        LogLevel::Info,
        format!("{}: calling model…", op.name()),
    ));

    let run = match client.run(&prompt) {
        Ok(r) => r,
        Err(error) => {
            let _ = tx.send(WorkflowEvent::Failed { op, error });
            return;
        }
    };

    if let Some(cached) = run.cached_tokens {
        let _ = tx.send(WorkflowEvent::Log(
            LogLevel::Info,
            format!("prompt cache hit: {cached} tokens"),
        ));
    }

    match parse_outputs(op, &run.text) {
        Ok((tests, analysis)) => {
            let _ = tx.send(WorkflowEvent::Completed { op, tests, analysis });
        }
        Err(error) => {
            let _ = tx.send(WorkflowEvent::Failed { op, error });
        }
    }
}

/// Validate the model reply against the operation's output contract and
/// shape it into the (tests, narrative) pair the merge applies.
pub fn parse_outputs(op: Op, reply: &str) -> Result<(String, String), WorkflowError> {
    let (tests, analysis) = match op {
        Op::Generate => {
            let out: GenerateOutput = schema::parse(reply)?;
            (out.generated_tests, GENERATE_CONFIRMATION.to_string())
        }

        Op::Refine => {
            let out: RefineOutput = schema::parse(reply)?;
            let report = out.report.unwrap_or_else(|| "No report provided.".to_string());
            (out.refined_tests, format!("## Refinement Report\n\n{report}"))
        }

        Op::FixBuild => {
            let out: FixBuildOutput = schema::parse(reply)?;
            (
                out.fixed_code,
                format!("## Build Fix Explanation\n\n{}", out.explanation),
            )
        }

        Op::Optimize => {
            let out: OptimizeOutput = schema::parse(reply)?;
            (
                out.formatted_tests,
                format!("## Coverage Optimization Suggestions\n\n{}", out.suggestions),
            )
        }
    };

    if tests.trim().is_empty() {
        return Err(WorkflowError::schema("model returned an empty test suite"));
    }

    Ok((tests, analysis))
}

/* ---------- event application ---------- */

/// Apply one worker event to the session. A `Completed` merge is
/// all-or-nothing: suite, narrative, and stage move together. A `Failed`
/// event only clears the pending marker and logs; the document is untouched.
pub fn apply_event(state: &mut SessionState, event: WorkflowEvent) {
    match event {
        WorkflowEvent::Log(level, text) => state.push_log(level, text),

        WorkflowEvent::Completed { op, tests, analysis } => {
            let (added, removed) = change_summary(&state.document.generated_tests, &tests);

            state.document.generated_tests = tests;
            state.document.analysis = analysis;

            if op == Op::Generate && state.document.stage == Stage::Initial {
                state.document.stage = Stage::Generated;
            }

            state.pending = None;
            state.push_log(
                LogLevel::Success,
                format!("{} completed (+{added} -{removed} lines)", op.name()),
            );
        }

        WorkflowEvent::Failed { op, error } => {
            state.pending = None;
            state.push_log(LogLevel::Error, format!("{} failed: {error}", op.name()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkingDocument;

    fn generated_state() -> SessionState {
        let mut doc = WorkingDocument::seeded();
        doc.generated_tests = "TEST(Calc, Add) { EXPECT_EQ(add(2, 3), 5); }\n".to_string();
        doc.stage = Stage::Generated;
        SessionState::new(doc)
    }

    #[test]
    fn generate_requires_source_and_instructions() {
        let doc = WorkingDocument::empty();
        assert!(matches!(
            precondition_error(&doc, Op::Generate),
            Some(WorkflowError::Validation(_))
        ));

        let mut doc = WorkingDocument::empty();
        doc.source_code = "int add(int a, int b) { return a + b; }".into();
        assert!(precondition_error(&doc, Op::Generate).is_some());

        doc.instructions = "framework: GoogleTest".into();
        assert!(precondition_error(&doc, Op::Generate).is_none());
    }

    #[test]
    fn downstream_ops_unreachable_while_initial() {
        let doc = WorkingDocument::seeded();

        for op in [Op::Refine, Op::FixBuild, Op::Optimize] {
            assert!(matches!(
                precondition_error(&doc, op),
                Some(WorkflowError::Validation(_))
            ));
        }
    }

    #[test]
    fn fix_requires_build_logs_and_optimize_requires_coverage() {
        let state = generated_state();

        assert!(precondition_error(&state.document, Op::FixBuild).is_some());
        assert!(precondition_error(&state.document, Op::Optimize).is_some());

        let mut state = generated_state();
        state.document.build_logs = "error: expected ';'".into();
        state.document.coverage_report = "lines: 61%".into();

        assert!(precondition_error(&state.document, Op::FixBuild).is_none());
        assert!(precondition_error(&state.document, Op::Optimize).is_none());
    }

    #[test]
    fn pending_operation_disables_every_trigger() {
        let mut state = generated_state();
        state.document.build_logs = "error".into();
        state.document.coverage_report = "lines: 61%".into();

        for op in [Op::Generate, Op::Refine, Op::FixBuild, Op::Optimize] {
            assert!(can_trigger(&state, op));
        }

        state.pending = Some(Op::Refine);

        for op in [Op::Generate, Op::Refine, Op::FixBuild, Op::Optimize] {
            assert!(!can_trigger(&state, op));
        }
    }

    #[test]
    fn fix_prompt_sends_suite_as_code_under_repair() {
        let mut state = generated_state();
        state.document.build_logs = "undefined reference".into();

        let prompt = build_op_prompt(&state.document, Op::FixBuild);

        assert!(prompt.user.contains("TEST(Calc, Add)"));
        assert!(!prompt.user.contains("class Calculator"));
    }

    #[test]
    fn parse_outputs_formats_narratives() {
        let (tests, analysis) =
            parse_outputs(Op::Refine, r#"{"refinedTests": "T2", "report": "R2"}"#).unwrap();
        assert_eq!(tests, "T2");
        assert!(analysis.contains("## Refinement Report"));
        assert!(analysis.contains("R2"));

        let (_, analysis) = parse_outputs(
            Op::FixBuild,
            r#"{"fixedCode": "int x;", "explanation": "declared x"}"#,
        )
        .unwrap();
        assert!(analysis.contains("## Build Fix Explanation"));

        let (_, analysis) = parse_outputs(
            Op::Optimize,
            r#"{"formattedTests": "T3", "suggestions": "cover divide"}"#,
        )
        .unwrap();
        assert!(analysis.contains("## Coverage Optimization Suggestions"));

        let (_, analysis) =
            parse_outputs(Op::Generate, r#"{"generatedTests": "TEST(A, B) {}"}"#).unwrap();
        assert_eq!(analysis, GENERATE_CONFIRMATION);
    }

    #[test]
    fn empty_suite_in_reply_is_schema_error() {
        let err = parse_outputs(Op::Generate, r#"{"generatedTests": "  "}"#).unwrap_err();
        assert!(matches!(err, WorkflowError::Schema(_)));
    }

    #[test]
    fn completed_generate_merges_and_transitions_once() {
        let mut state = SessionState::new(WorkingDocument::seeded());
        state.pending = Some(Op::Generate);

        apply_event(
            &mut state,
            WorkflowEvent::Completed {
                op: Op::Generate,
                tests: "TEST(A, B) {}".into(),
                analysis: GENERATE_CONFIRMATION.into(),
            },
        );

        assert_eq!(state.document.stage, Stage::Generated);
        assert_eq!(state.document.generated_tests, "TEST(A, B) {}");
        assert_eq!(state.document.analysis, GENERATE_CONFIRMATION);
        assert!(state.pending.is_none());

        // later successes never move the stage back
        apply_event(
            &mut state,
            WorkflowEvent::Completed {
                op: Op::Refine,
                tests: "T2".into(),
                analysis: "## Refinement Report\n\nR2".into(),
            },
        );
        assert_eq!(state.document.stage, Stage::Generated);
        assert_eq!(state.document.generated_tests, "T2");
    }

    #[test]
    fn failed_event_leaves_document_unchanged() {
        let mut state = generated_state();
        state.pending = Some(Op::Refine);
        let before = state.document.clone();

        apply_event(
            &mut state,
            WorkflowEvent::Failed {
                op: Op::Refine,
                error: WorkflowError::upstream("timeout"),
            },
        );

        assert!(state.pending.is_none());
        assert_eq!(state.document.generated_tests, before.generated_tests);
        assert_eq!(state.document.analysis, before.analysis);
        assert_eq!(state.document.stage, before.stage);
        assert!(state
            .logs
            .back()
            .is_some_and(|l| l.level == LogLevel::Error && l.text.contains("timeout")));
    }
}
