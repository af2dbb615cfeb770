//! Operator console: the text menu on stdin/stdout.
//!
//! Stdin lines are forwarded by a tokio task into an mpsc channel, which
//! gives the two input shapes the controller needs: a blocking read (await
//! the next line) and a non-blocking check while a mode runs (drain with
//! `try_recv`). Whole lines are consumed, so nothing is left buffered after
//! a number is parsed.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::warn;

use crate::board::sim::SimButton;
use crate::board::Board;
use crate::controller::Step;
use crate::dispatcher::{Dispatcher, MenuChoice};

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Commands accepted while a mode loop is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    /// Back to the menu.
    Return,
    /// Inject a button press (simulated board only).
    Press,
    Status,
    Unknown(String),
}

pub fn parse_event(line: &str) -> Option<OperatorEvent> {
    let s = line.trim().to_ascii_lowercase();
    match s.as_str() {
        "" => None,
        "r" => Some(OperatorEvent::Return),
        "b" => Some(OperatorEvent::Press),
        "s" | "status" => Some(OperatorEvent::Status),
        _ => Some(OperatorEvent::Unknown(s)),
    }
}

pub fn parse_number(line: &str) -> Option<i64> {
    line.trim().parse().ok()
}

/// `history <plot>` views any plot's thresholds from a menu prompt.
pub fn parse_history_request(line: &str) -> Option<i64> {
    let rest = line.trim().strip_prefix("history")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    parse_number(rest)
}

fn is_status(line: &str) -> bool {
    parse_event(line) == Some(OperatorEvent::Status)
}

// ---------------------------------------------------------------------------
// Input channel
// ---------------------------------------------------------------------------

pub struct OperatorInput {
    rx: mpsc::UnboundedReceiver<String>,
}

impl OperatorInput {
    pub fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self { rx }
    }

    /// Forward stdin lines from a background task.
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        });
        Self::new(rx)
    }

    /// Wait for the next line. `None` once input is closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain whatever arrived since the last poll without waiting. Stops
    /// after a `Return` so later lines are left for the menu. Closed input
    /// reads as `Return`.
    pub fn poll_events(&mut self) -> Vec<OperatorEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(line) => {
                    if let Some(ev) = parse_event(&line) {
                        let done = ev == OperatorEvent::Return;
                        events.push(ev);
                        if done {
                            break;
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    events.push(OperatorEvent::Return);
                    break;
                }
            }
        }
        events
    }
}

// ---------------------------------------------------------------------------
// Menu
// ---------------------------------------------------------------------------

enum Prompt {
    Number(i64),
    NotANumber(String),
    Closed,
}

/// Run the menu until input closes.
pub async fn run<B: Board, W: Write>(
    dispatcher: &mut Dispatcher<B>,
    input: &mut OperatorInput,
    out: &mut W,
    button: Option<&SimButton>,
    sensor_max: i32,
) -> Result<()> {
    loop {
        let ids: Vec<String> = dispatcher.plots().map(|p| format!("{}={}", p.id, p.name)).collect();
        writeln!(out, "\nSelect plot [{}]:", ids.join(", "))?;
        let n = match prompt(dispatcher, input, out).await? {
            Prompt::Number(n) => n,
            Prompt::NotANumber(s) => {
                writeln!(out, "'{s}' is not a number")?;
                continue;
            }
            Prompt::Closed => return Ok(()),
        };
        if let Err(e) = dispatcher.select_plot(n) {
            writeln!(out, "{e}")?;
            continue;
        }

        writeln!(out, "Mode: 1) manual  2) auto  3) view history")?;
        let choice = match prompt(dispatcher, input, out).await? {
            Prompt::Number(n) => MenuChoice::from_selection(n),
            Prompt::NotANumber(s) => {
                writeln!(out, "'{s}' is not a number")?;
                continue;
            }
            Prompt::Closed => return Ok(()),
        };
        let choice = match choice {
            Ok(c) => c,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        };

        match choice {
            MenuChoice::Manual => {
                dispatcher.enter_manual()?;
                writeln!(out, "Manual mode: press the button to toggle watering, 'r' to return")?;
                run_mode(dispatcher, input, out, button).await?;
            }
            MenuChoice::Auto => {
                match dispatcher.active_plot().and_then(|p| p.history.latest()) {
                    Some(last) => writeln!(out, "Threshold (0-{sensor_max}, last {last}):")?,
                    None => writeln!(out, "Threshold (0-{sensor_max}):")?,
                }
                let threshold = match prompt(dispatcher, input, out).await? {
                    Prompt::Number(n) => i32::try_from(n).ok(),
                    Prompt::NotANumber(_) => None,
                    Prompt::Closed => return Ok(()),
                };
                let Some(threshold) = threshold else {
                    writeln!(out, "threshold must be an integer")?;
                    continue;
                };
                let applied = dispatcher.enter_auto(threshold)?;
                writeln!(out, "Auto mode at threshold {applied}, 'r' to return")?;
                run_mode(dispatcher, input, out, button).await?;
            }
            MenuChoice::ViewHistory => {
                print_history(out, &dispatcher.view_history()?)?;
            }
        }
    }
}

/// Blocking read of one number; `status` lines are answered in place.
async fn prompt<B: Board, W: Write>(
    dispatcher: &Dispatcher<B>,
    input: &mut OperatorInput,
    out: &mut W,
) -> Result<Prompt> {
    loop {
        let Some(line) = input.next_line().await else {
            return Ok(Prompt::Closed);
        };
        if is_status(&line) {
            print_status(dispatcher, out)?;
            continue;
        }
        if let Some(id) = parse_history_request(&line) {
            match dispatcher.view_directory(id) {
                Ok(history) => print_history(out, &history)?,
                Err(e) => writeln!(out, "{e}")?,
            }
            continue;
        }
        return Ok(match parse_number(&line) {
            Some(n) => Prompt::Number(n),
            None => Prompt::NotANumber(line.trim().to_string()),
        });
    }
}

async fn run_mode<B: Board, W: Write>(
    dispatcher: &mut Dispatcher<B>,
    input: &mut OperatorInput,
    out: &mut W,
    button: Option<&SimButton>,
) -> Result<()> {
    loop {
        let mut return_requested = false;
        for ev in input.poll_events() {
            match ev {
                OperatorEvent::Return => return_requested = true,
                OperatorEvent::Press => match button {
                    Some(b) => b.press(),
                    None => warn!("button presses can only be injected on the simulated board"),
                },
                OperatorEvent::Status => print_status(dispatcher, out)?,
                OperatorEvent::Unknown(s) => warn!(line = %s, "ignored input while mode runs"),
            }
        }

        match dispatcher.tick(return_requested)? {
            Step::Continue(delay) => tokio::time::sleep(delay).await,
            Step::Idle => {
                writeln!(out, "back to menu")?;
                return Ok(());
            }
        }
    }
}

fn print_history<W: Write>(out: &mut W, history: &[i32]) -> Result<()> {
    if history.is_empty() {
        writeln!(out, "no thresholds recorded")?;
    }
    for (i, v) in history.iter().enumerate() {
        writeln!(out, "  {}. {v}", i + 1)?;
    }
    Ok(())
}

fn print_status<B: Board, W: Write>(dispatcher: &Dispatcher<B>, out: &mut W) -> Result<()> {
    let json = serde_json::to_string_pretty(&dispatcher.status())?;
    writeln!(out, "{json}")?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
