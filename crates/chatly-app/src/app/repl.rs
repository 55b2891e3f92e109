use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use chatly_chat::{ConversationSession, InputOutcome, TurnError};

/// Cancellation token of the turn in flight, if any
#[derive(Clone, Default)]
struct ActiveTurn {
    token: Arc<Mutex<Option<CancellationToken>>>,
}

impl ActiveTurn {
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.clone());
        }
        token
    }

    fn end(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
    }

    /// Cancel the turn in flight; returns false when there is none
    fn interrupt(&self) -> bool {
        match self.token.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Run interactive REPL mode
pub async fn run_repl_mode(session: &mut ConversationSession) -> Result<()> {
    println!("{}", "Chatly".bright_cyan().bold());
    println!(
        "{}",
        format!("Write '{}' to quit the application.\n", session.config().exit_keyword).bright_black()
    );

    // One Ctrl-C handler for the whole session; it only acts while a turn runs
    let active = ActiveTurn::default();
    let handler_view = active.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_ok() && handler_view.interrupt() {
                println!("\n{}", "^C - Interrupting...".bright_yellow());
            }
        }
    });

    let mut rl = DefaultEditor::new().context("Failed to initialise line editor")?;

    loop {
        let line = match rl.readline(&format!("{} ", "You:".bright_green().bold())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(e) => return Err(e).context("Failed to read input"),
        };

        match session.submit_user_input(&line)? {
            InputOutcome::Ignored => continue,
            InputOutcome::Ended => {
                println!("{}", "Goodbye!".bright_cyan());
                break;
            }
            InputOutcome::Accepted => {}
        }
        rl.add_history_entry(line.trim())?;

        let cancel = active.begin();
        let result = session.advance(&cancel).await;
        active.end();

        match result {
            Ok(answer) => {
                println!("{} {}\n", "Assistant:".bright_blue().bold(), answer.content);
                session.complete_display();
            }
            Err(TurnError::Cancelled) => {
                println!("{}", "Turn cancelled".bright_yellow());
            }
            Err(e) => {
                eprintln!("{} {}\n", "Error:".bright_red().bold(), e);
            }
        }
    }

    log::info!(
        "Session {} finished after {} turns",
        session.session_id(),
        session.turn_count()
    );
    Ok(())
}
