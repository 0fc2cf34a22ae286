use std::collections::VecDeque;
use std::time::Instant;

use similar::{ChangeTag, TextDiff};

pub const MAX_LOGS: usize = 1000;

/* ---------- lifecycle ---------- */

/// Coarse progress marker. Moves Initial -> Generated on the first
/// successful generate and never reverts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Initial,
    Generated,
}

/* ---------- logging ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
    pub at: Instant,
}

/* ---------- working document ---------- */

/// The shared mutable record for one session: code, instructions, tests,
/// logs, coverage, and the latest analysis narrative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkingDocument {
    pub source_code: String,
    pub instructions: String,
    pub generated_tests: String,
    pub build_logs: String,
    pub coverage_report: String,
    pub analysis: String,
    pub stage: Stage,
}

impl WorkingDocument {
    pub fn empty() -> Self {
        Self {
            source_code: String::new(),
            instructions: String::new(),
            generated_tests: String::new(),
            build_logs: String::new(),
            coverage_report: String::new(),
            analysis: String::new(),
            stage: Stage::Initial,
        }
    }

    /// Document pre-seeded with the sample calculator and its GoogleTest
    /// instructions, so a fresh session has something to generate from.
    pub fn seeded() -> Self {
        Self {
            source_code: SAMPLE_CPP_CODE.to_string(),
            instructions: SAMPLE_YAML_INSTRUCTIONS.to_string(),
            ..Self::empty()
        }
    }
}

/* ---------- session state ---------- */

/// Session container owned by the session loop. Only the workflow
/// coordinator mutates the document; the presentation layer reads fields
/// and writes direct user edits.
pub struct SessionState {
    pub document: WorkingDocument,

    /// Operation currently in flight, if any. At most one.
    pub pending: Option<crate::machine::Op>,

    /* logs (ring buffer) */
    pub logs: VecDeque<LogLine>,
    printed: usize,

    pub quit: bool,
}

impl SessionState {
    pub fn new(document: WorkingDocument) -> Self {
        Self {
            document,
            pending: None,
            logs: VecDeque::new(),
            printed: 0,
            quit: false,
        }
    }

    pub fn push_log(&mut self, level: LogLevel, text: impl Into<String>) {
        if self.logs.len() >= MAX_LOGS {
            self.logs.pop_front();
            self.printed = self.printed.saturating_sub(1);
        }

        self.logs.push_back(LogLine {
            level,
            text: text.into(),
            at: Instant::now(),
        });
    }

    /// Log lines pushed since the last call. The session loop prints these
    /// after each command and while draining worker events.
    pub fn unprinted(&mut self) -> Vec<LogLine> {
        let out: Vec<LogLine> = self.logs.iter().skip(self.printed).cloned().collect();
        self.printed = self.logs.len();
        out
    }
}

/* ---------- change summary ---------- */

/// Added/removed line counts between two versions of the test suite.
pub fn change_summary(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);

    let mut added = 0;
    let mut removed = 0;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }

    (added, removed)
}

/* ---------- sample document ---------- */

pub const SAMPLE_CPP_CODE: &str = r#"// calculator.h
class Calculator {
public:
    int add(int a, int b);
    int subtract(int a, int b);
    int multiply(int a, int b);
    int divide(int a, int b);
};

// calculator.cpp
#include "calculator.h"
#include <stdexcept>

int Calculator::add(int a, int b) {
    return a + b;
}

int Calculator::subtract(int a, int b) {
    return a - b;
}

int Calculator::multiply(int a, int b) {
    return a * b;
}

int Calculator::divide(int a, int b) {
    if (b == 0) {
        throw std::invalid_argument("Division by zero");
    }
    return a / b;
}
"#;

pub const SAMPLE_YAML_INSTRUCTIONS: &str = r#"framework: "GoogleTest"
tests:
  - function: "add"
    cases:
      - name: "test_add_positive"
        inputs: [2, 3]
        expected: 5
      - name: "test_add_negative"
        inputs: [-2, -3]
        expected: -5
  - function: "subtract"
    cases:
      - name: "test_subtract_positive"
        inputs: [5, 3]
        expected: 2
  - function: "divide"
    cases:
      - name: "test_divide_by_zero"
        inputs: [5, 0]
        expect_throw: true
"#;
