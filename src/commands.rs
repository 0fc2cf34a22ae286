//! commands.rs
//!
//! Command interpretation layer.
//!
//! Responsibilities:
//! - Parse and validate session commands
//! - Translate commands into explicit state mutations or workflow triggers
//! - Emit informational logs
//!
//! Non-responsibilities:
//! - Operation orchestration
//! - Model invocation
//! - Result merging

use std::fs;

use crate::llm::client::LlmClient;
use crate::machine::{can_trigger, Op, Workflow};
use crate::state::{LogLevel, SessionState, WorkingDocument};

/* ============================================================
   Command Handling
   ============================================================ */

pub fn handle_command(
    state: &mut SessionState,
    workflow: &Workflow,
    client: &LlmClient,
    cmd: &str,
) {
    match cmd {
        "help" => help(state),
        "status" => status(state, client),
        "sample" => load_sample(state),

        "generate" => trigger(state, workflow, Op::Generate),
        "refine" => trigger(state, workflow, Op::Refine),
        "fix" => trigger(state, workflow, Op::FixBuild),
        "optimize" => trigger(state, workflow, Op::Optimize),

        cmd if cmd.starts_with("show ") => show_field(state, &cmd[5..]),
        cmd if cmd.starts_with("load ") => load_field(state, &cmd[5..]),
        cmd if cmd.starts_with("set ") => set_field(state, &cmd[4..]),
        cmd if cmd.starts_with("clear ") => clear_field(state, &cmd[6..]),
        cmd if cmd.starts_with("save tests ") => save_tests(state, &cmd[11..]),

        cmd if cmd.starts_with("key ") => configure_key(state, client, &cmd[4..]),

        "quit" | "exit" => {
            log(state, LogLevel::Info, "Exiting.");
            state.quit = true;
        }

        "" => {}

        _ => {
            log(state, LogLevel::Warn, "Unknown command. Type `help`.");
        }
    }
}

/* ============================================================
   Command Implementations
   ============================================================ */

fn help(state: &mut SessionState) {
    use LogLevel::Info;

    log(state, Info, "Commands:");
    log(state, Info, "  generate                    — generate initial tests");
    log(state, Info, "  refine                      — refine the current suite");
    log(state, Info, "  fix                         — fix build issues in the suite");
    log(state, Info, "  optimize                    — optimize test coverage");
    log(state, Info, "  show <field>                — print a document field");
    log(state, Info, "  load <field> <path>         — load a field from a file");
    log(state, Info, "  set <field> <text>          — set a field inline");
    log(state, Info, "  clear <field>               — empty a field");
    log(state, Info, "  save tests <path>           — write the suite to a file");
    log(state, Info, "  key <provider> <model> <api-key> [base-url]");
    log(state, Info, "  status                      — session overview");
    log(state, Info, "  sample                      — load the sample document");
    log(state, Info, "  quit                        — exit");
    log(
        state,
        Info,
        "Fields: code, instructions, tests, logs, coverage, analysis",
    );
}

fn status(state: &mut SessionState, client: &LlmClient) {
    let cfg = client.current_config();
    let doc = &state.document;

    let summary = format!(
        "stage: {:?} | pending: {} | provider: {:?}/{}{}",
        doc.stage,
        state
            .pending
            .map(Op::name)
            .unwrap_or("none"),
        cfg.provider,
        cfg.model,
        if client.is_configured() { "" } else { " (no API key)" },
    );
    log(state, LogLevel::Info, summary);

    let sizes = format!(
        "code: {}B | instructions: {}B | tests: {}B | logs: {}B | coverage: {}B",
        state.document.source_code.len(),
        state.document.instructions.len(),
        state.document.generated_tests.len(),
        state.document.build_logs.len(),
        state.document.coverage_report.len(),
    );
    log(state, LogLevel::Info, sizes);

    let ops = [Op::Generate, Op::Refine, Op::FixBuild, Op::Optimize]
        .into_iter()
        .map(|op| {
            format!(
                "{}{}",
                op.name(),
                if can_trigger(state, op) { "" } else { "✗" }
            )
        })
        .collect::<Vec<_>>()
        .join(" | ");
    log(state, LogLevel::Info, format!("available: {ops}"));
}

fn load_sample(state: &mut SessionState) {
    let sample = WorkingDocument::seeded();
    state.document.source_code = sample.source_code;
    state.document.instructions = sample.instructions;

    log(
        state,
        LogLevel::Success,
        "Sample calculator code and instructions loaded.",
    );
}

fn trigger(state: &mut SessionState, workflow: &Workflow, op: Op) {
    match workflow.trigger(state, op) {
        Ok(()) => {}
        Err(e) => log(state, LogLevel::Error, format!("{} rejected: {e}", op.name())),
    }
}

fn show_field(state: &mut SessionState, name: &str) {
    let content = match field(&state.document, name) {
        Some(c) => c.clone(),
        None => {
            log(state, LogLevel::Warn, "Unknown field. Type `help`.");
            return;
        }
    };

    if content.is_empty() {
        log(state, LogLevel::Info, format!("{name} is empty."));
        return;
    }

    println!("─── {name} ───");
    println!("{content}");
    println!("──────────────");
}

fn load_field(state: &mut SessionState, rest: &str) {
    let Some((name, path)) = rest.split_once(' ') else {
        log(state, LogLevel::Warn, "Usage: load <field> <path>");
        return;
    };

    if field_mut(&mut state.document, name).is_none() {
        log(state, LogLevel::Warn, "Unknown field. Type `help`.");
        return;
    }

    match fs::read_to_string(path.trim()) {
        Ok(text) => {
            let bytes = text.len();
            if let Some(slot) = field_mut(&mut state.document, name) {
                *slot = text;
            }
            log(
                state,
                LogLevel::Success,
                format!("Loaded {bytes}B into {name}."),
            );
        }
        Err(e) => log(state, LogLevel::Error, format!("Failed to read {path}: {e}")),
    }
}

fn set_field(state: &mut SessionState, rest: &str) {
    let Some((name, text)) = rest.split_once(' ') else {
        log(state, LogLevel::Warn, "Usage: set <field> <text>");
        return;
    };

    match field_mut(&mut state.document, name) {
        Some(slot) => {
            *slot = text.to_string();
            log(state, LogLevel::Success, format!("{name} updated."));
        }
        None => log(state, LogLevel::Warn, "Unknown field. Type `help`."),
    }
}

fn clear_field(state: &mut SessionState, name: &str) {
    match field_mut(&mut state.document, name) {
        Some(slot) => {
            slot.clear();
            log(state, LogLevel::Success, format!("{name} cleared."));
        }
        None => log(state, LogLevel::Warn, "Unknown field. Type `help`."),
    }
}

fn save_tests(state: &mut SessionState, path: &str) {
    let path = path.trim();

    if state.document.generated_tests.is_empty() {
        log(state, LogLevel::Warn, "No generated tests to save.");
        return;
    }

    match fs::write(path, &state.document.generated_tests) {
        Ok(()) => log(state, LogLevel::Success, format!("Tests written to {path}.")),
        Err(e) => log(state, LogLevel::Error, format!("Failed to write {path}: {e}")),
    }
}

fn configure_key(state: &mut SessionState, client: &LlmClient, rest: &str) {
    let parts: Vec<&str> = rest.split_whitespace().collect();

    let (provider, model, api_key, base_url) = match parts.as_slice() {
        [provider, model, api_key] => (*provider, *model, *api_key, None),
        [provider, model, api_key, base_url] => {
            (*provider, *model, *api_key, Some(base_url.to_string()))
        }
        _ => {
            log(
                state,
                LogLevel::Warn,
                "Usage: key <provider> <model> <api-key> [base-url]",
            );
            return;
        }
    };

    match client.configure(provider, model.to_string(), api_key.to_string(), base_url) {
        Ok(()) => log(
            state,
            LogLevel::Success,
            format!("Provider set to {provider}/{model}."),
        ),
        Err(e) => log(state, LogLevel::Error, e.to_string()),
    }
}

/* ============================================================
   Helpers
   ============================================================ */

fn log(state: &mut SessionState, level: LogLevel, msg: impl Into<String>) {
    state.push_log(level, msg);
}

fn field<'a>(doc: &'a WorkingDocument, name: &str) -> Option<&'a String> {
    match name {
        "code" => Some(&doc.source_code),
        "instructions" => Some(&doc.instructions),
        "tests" => Some(&doc.generated_tests),
        "logs" => Some(&doc.build_logs),
        "coverage" => Some(&doc.coverage_report),
        "analysis" => Some(&doc.analysis),
        _ => None,
    }
}

/// Fields the user may edit directly. `analysis` is operation output only.
fn field_mut<'a>(doc: &'a mut WorkingDocument, name: &str) -> Option<&'a mut String> {
    match name {
        "code" => Some(&mut doc.source_code),
        "instructions" => Some(&mut doc.instructions),
        "tests" => Some(&mut doc.generated_tests),
        "logs" => Some(&mut doc.build_logs),
        "coverage" => Some(&mut doc.coverage_report),
        _ => None,
    }
}
