//! Interactive question loop.
//!
//! By default we use `rustyline` for line editing and history.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use crate::print_answer;
use anyhow::Result;
#[cfg(feature = "repl-rustyline")]
use anyhow::anyhow;
use colored::Colorize;
use ontorag_core::QueryEngine;
use tokio::runtime::Runtime;

const PROMPT: &str = "ontorag> ";

struct ReplState {
    show_context: bool,
}

enum ReplControl {
    Continue,
    Exit,
}

pub fn cmd_repl(rt: &Runtime, engine: &QueryEngine) -> Result<()> {
    println!("{}", "ontorag REPL".green().bold());
    println!("Ask a question. Type `help` for commands, `exit` to quit.\n");
    let mut state = ReplState { show_context: false };

    #[cfg(feature = "repl-rustyline")]
    {
        use rustyline::error::ReadlineError;

        let mut rl = rustyline::DefaultEditor::new()
            .map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
        loop {
            let line = match rl.readline(PROMPT) {
                Ok(l) => l,
                Err(ReadlineError::Eof) => break,
                Err(ReadlineError::Interrupted) => continue,
                Err(e) => return Err(anyhow!("readline error: {e}")),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            rl.add_history_entry(line)
                .map_err(|e| anyhow!("failed to record history: {e}"))?;
            if let ReplControl::Exit = dispatch(rt, engine, &mut state, line) {
                break;
            }
        }
    }

    #[cfg(not(feature = "repl-rustyline"))]
    {
        use std::io::{BufRead, Write};

        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("{PROMPT}");
            std::io::stdout().flush()?;
            let Some(line) = lines.next() else { break };
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let ReplControl::Exit = dispatch(rt, engine, &mut state, line) {
                break;
            }
        }
    }

    Ok(())
}

fn dispatch(rt: &Runtime, engine: &QueryEngine, state: &mut ReplState, line: &str) -> ReplControl {
    match line {
        "exit" | "quit" | ":q" => return ReplControl::Exit,
        "help" => {
            println!("  <question>     retrieve evidence and answer");
            println!("  context on|off show the composed context with each answer");
            println!("  exit           leave the REPL");
        }
        "context on" => state.show_context = true,
        "context off" => state.show_context = false,
        question => match rt.block_on(engine.ask(question)) {
            Ok(answer) => print_answer(&answer, state.show_context),
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        },
    }
    ReplControl::Continue
}
