use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use cppalchemist::commands::handle_command;
use cppalchemist::llm::client::LlmClient;
use cppalchemist::machine::{apply_event, Workflow};
use cppalchemist::state::{LogLevel, LogLine, SessionState, WorkingDocument};

#[derive(Parser)]
#[command(
    name = "cppalchemist",
    version,
    about = "Generate, refine, and optimize C++ unit tests with a hosted LLM."
)]
struct Cli {
    /// Seed the session with the sample calculator and its instructions
    #[arg(long)]
    sample: bool,

    /// Load C++ source code from a file at startup
    #[arg(long, value_name = "PATH")]
    code: Option<PathBuf>,

    /// Load YAML instructions from a file at startup
    #[arg(long, value_name = "PATH")]
    instructions: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let document = if cli.sample {
        WorkingDocument::seeded()
    } else {
        WorkingDocument::empty()
    };
    let mut state = SessionState::new(document);

    preload(&mut state, cli.code.as_deref(), "code");
    preload(&mut state, cli.instructions.as_deref(), "instructions");

    let client = LlmClient::new();
    let workflow = Workflow::new(client.clone());

    println!("cppalchemist — type `help` for commands.");
    if !client.is_configured() {
        state.push_log(
            LogLevel::Warn,
            "No API key configured. Use `key <provider> <model> <api-key>`.",
        );
    }
    flush_logs(&mut state);

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        handle_command(&mut state, &workflow, &client, line.trim());
        flush_logs(&mut state);

        // one operation in flight at most; drain its events to completion
        while state.pending.is_some() {
            if let Ok(event) = workflow.recv_timeout(Duration::from_millis(200)) {
                apply_event(&mut state, event);
                flush_logs(&mut state);
            }
        }

        if state.quit {
            break;
        }
    }

    Ok(())
}

fn preload(state: &mut SessionState, path: Option<&std::path::Path>, field: &str) {
    let Some(path) = path else { return };

    match std::fs::read_to_string(path) {
        Ok(text) => {
            match field {
                "code" => state.document.source_code = text,
                _ => state.document.instructions = text,
            }
            state.push_log(
                LogLevel::Info,
                format!("Loaded {field} from {}.", path.display()),
            );
        }
        Err(e) => state.push_log(
            LogLevel::Error,
            format!("Failed to read {}: {e}", path.display()),
        ),
    }
}

fn flush_logs(state: &mut SessionState) {
    for line in state.unprinted() {
        print_log(&line);
    }
}

fn print_log(line: &LogLine) {
    let tag = match line.level {
        LogLevel::Info => "·",
        LogLevel::Success => "✓",
        LogLevel::Warn => "!",
        LogLevel::Error => "✗",
    };

    println!("[{tag}] {}", line.text);
}
