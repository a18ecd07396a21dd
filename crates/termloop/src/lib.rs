//! # termloop
//!
//! A message-driven terminal application runtime built on crossterm and tokio.
//!
//! Applications describe their state as a [`Model`]. The runtime decodes
//! terminal input into [`Msg`] values, feeds them through `update`, runs the
//! returned [`Command`]s in the background and redraws `view` after every
//! message.
//!
//! ## Features
//!
//! - **Input decoding**: keys, modifiers, UTF-8, focus reports and SGR, X10
//!   and URxvt mouse reports from any byte stream
//! - **Commands**: background work composed with [`batch`] and [`sequence`]
//! - **Terminal handoff**: [`exec_process`] suspends the UI around a child
//!   process and restores every mode afterwards
//! - **Mouse interactions**: hover, click counting and drag tracking over
//!   named screen areas
//! - **Testable**: swap stdin, stdout and the terminal control for
//!   in-memory doubles from [`testing`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use termloop::{command, Command, KeyCode, Model, Msg, Program};
//!
//! struct Counter(i64);
//!
//! impl Model for Counter {
//!     fn update(self, msg: Msg) -> (Self, Option<Command>) {
//!         if msg.is_key(KeyCode::Up) {
//!             return (Counter(self.0 + 1), None);
//!         }
//!         if msg.is_key(KeyCode::Char('q')) {
//!             return (self, Some(command::quit()));
//!         }
//!         (self, None)
//!     }
//!
//!     fn view(&self) -> String {
//!         format!("count: {}\n(up to increment, q to quit)", self.0)
//!     }
//! }
//!
//! fn main() -> Result<(), termloop::ProgramError> {
//!     let model = Program::new(Counter(0)).run()?;
//!     println!("final count: {}", model.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Mouse areas
//!
//! Models that return [`NamedArea`]s from [`Model::hit_areas`] also receive
//! [`Msg::Interaction`] messages for hover, clicks and drags:
//!
//! ```ignore
//! fn hit_areas(&self) -> Vec<NamedArea> {
//!     vec![NamedArea::new("ok", BoundingBox::new(2, 4, 6, 1))]
//! }
//!
//! fn update(self, msg: Msg) -> (Self, Option<Command>) {
//!     if let Msg::Interaction(Interaction::Click { target: Some(id), .. }) = &msg {
//!         // ...
//!     }
//!     (self, None)
//! }
//! ```

pub mod command;
pub mod decoder;
pub mod event;
pub mod interaction;
pub mod mouse;
pub mod program;
pub mod reader;
mod renderer;
pub mod sender;
pub mod terminal;
pub mod testing;

// Re-export main types at crate root for convenience
pub use command::{batch, exec_process, quit, sequence, tick, Command, ExecRequest};
pub use decoder::{DecodeError, InputDecoder};
pub use event::{
    CustomMsg, Key, KeyCode, KeyModifiers, MouseAction, MouseButton, MouseEvent, Msg, WindowSize,
};
pub use interaction::{
    calculate_menu_position, hit_test, BoundingBox, ClickCount, ClickTracker, DragDelta,
    DragTracker, HoverEvent, HoverTracker, Interaction, InteractionConfig, MouseInteraction,
    NamedArea, Position,
};
pub use mouse::{parse_mouse_sequence, MouseParseError, MouseProtocol};
pub use program::{BuildError, Model, Program, ProgramBuilder, ProgramError};
pub use reader::InputSource;
pub use sender::{ProgramSender, SendError};
pub use terminal::{
    install_panic_hook, CrosstermControl, ExecError, MouseTracking, TerminalConfig,
    TerminalControl, TerminalError, TerminalSession,
};
