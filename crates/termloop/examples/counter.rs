//! Counter example demonstrating the termloop runtime.
//!
//! This example shows:
//! - A model that handles keyboard messages
//! - A ticking command that re-arms itself
//! - Handing the terminal to `$EDITOR` (or `vi`) and resuming afterwards
//!
//! Controls:
//! - Up/Down: Increment/decrement counter
//! - Space: Toggle auto-increment
//! - e: Open an editor
//! - q/Ctrl+C: Quit
//!
//! Set `TERMLOOP_LOG=path` to write trace logs to a file.

use std::fs::File;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use termloop::{command, Command, ExecError, KeyCode, Model, Msg, ProgramBuilder};
use tracing_subscriber::EnvFilter;

/// Message produced by the ticker command.
#[derive(Debug, Clone, Copy)]
struct Tick(Instant);

/// Message produced when the editor exits.
#[derive(Debug)]
struct EditorClosed(Result<(), String>);

struct Counter {
    count: i64,
    auto: bool,
    status: String,
}

fn tick() -> Command {
    command::tick(Duration::from_millis(500), |at| Msg::custom(Tick(at)))
}

fn editor() -> Command {
    let program = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    command::exec_process(Some(process::Command::new(program)), |result: Result<(), ExecError>| {
        Msg::custom(EditorClosed(result.map_err(|e| e.to_string())))
    })
}

impl Model for Counter {
    fn update(mut self, msg: Msg) -> (Self, Option<Command>) {
        if msg.is_key(KeyCode::Char('q')) {
            return (self, Some(command::quit()));
        }
        if msg.is_key(KeyCode::Up) {
            self.count += 1;
        } else if msg.is_key(KeyCode::Down) {
            self.count -= 1;
        } else if msg.is_key(KeyCode::Space) {
            self.auto = !self.auto;
            if self.auto {
                return (self, Some(tick()));
            }
        } else if msg.is_key(KeyCode::Char('e')) {
            return (self, Some(editor()));
        } else if msg.downcast_ref::<Tick>().is_some() {
            // Ticks still in flight after toggling off are dropped here.
            if self.auto {
                self.count += 1;
                return (self, Some(tick()));
            }
        } else if let Some(EditorClosed(result)) = msg.downcast_ref::<EditorClosed>() {
            self.status = match result {
                Ok(()) => "editor closed".to_string(),
                Err(err) => format!("editor failed: {err}"),
            };
        }
        (self, None)
    }

    fn view(&self) -> String {
        format!(
            "Counter: {}\nAuto-increment: {}\n{}\n\nUp/Down: change  Space: auto  e: editor  q: quit",
            self.count,
            if self.auto { "on" } else { "off" },
            self.status,
        )
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let Ok(path) = std::env::var("TERMLOOP_LOG") else {
        return Ok(());
    };
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termloop=debug")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let model = ProgramBuilder::new()
        .model(Counter {
            count: 0,
            auto: false,
            status: String::new(),
        })
        .build()?
        .run()?;

    println!("Final count: {}", model.count);
    Ok(())
}
