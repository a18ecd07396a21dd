//! Cross-thread handle for injecting messages into a running program.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::event::Msg;

/// Error returned when sending to a program that is not running.
///
/// Carries the message back to the caller.
#[derive(Error, Debug)]
#[error("program is not running")]
pub struct SendError(pub Msg);

/// Injects messages into a program's event loop from any thread.
///
/// Messages from one sender arrive in the order they were sent.
#[derive(Debug, Clone)]
pub struct ProgramSender {
    tx: mpsc::UnboundedSender<Msg>,
    running: Arc<AtomicBool>,
}

impl ProgramSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Msg>, running: Arc<AtomicBool>) -> Self {
        Self { tx, running }
    }

    /// Queue `msg` for the event loop.
    pub fn send(&self, msg: impl Into<Msg>) -> Result<(), SendError> {
        let msg = msg.into();
        if !self.is_running() {
            return Err(SendError(msg));
        }
        self.tx.send(msg).map_err(|e| SendError(e.0))
    }

    /// Ask the program to quit.
    pub fn quit(&self) -> Result<(), SendError> {
        self.send(Msg::Quit)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Key, KeyCode};

    #[test]
    fn test_send_requires_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(false));
        let sender = ProgramSender::new(tx, Arc::clone(&running));

        let err = sender.send(Key::new(KeyCode::Enter)).unwrap_err();
        assert!(matches!(err.0, Msg::Key(_)));
        assert_eq!(err.to_string(), "program is not running");

        running.store(true, Ordering::SeqCst);
        sender.send(Key::new(KeyCode::Enter)).unwrap();
        sender.clone().quit().unwrap();
        assert!(matches!(rx.try_recv(), Ok(Msg::Key(_))));
        assert!(matches!(rx.try_recv(), Ok(Msg::Quit)));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = ProgramSender::new(tx, Arc::new(AtomicBool::new(true)));
        drop(rx);
        assert!(matches!(sender.quit(), Err(SendError(Msg::Quit))));
    }
}
