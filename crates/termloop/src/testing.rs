//! Test doubles for driving a program without a real terminal.
//!
//! [`RecordingControl`] logs every mode switch instead of performing it, and
//! [`CaptureWriter`] collects rendered output. Both are cheap to clone and
//! share their state between clones, so a test can keep one handle and hand
//! the other to a [`TerminalSession`](crate::terminal::TerminalSession) or
//! [`ProgramBuilder`](crate::program::ProgramBuilder).

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::event::WindowSize;
use crate::terminal::{MouseTracking, TerminalControl};

/// One mode switch performed through a [`TerminalControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    EnableRawMode,
    DisableRawMode,
    EnterAltScreen,
    ExitAltScreen,
    ShowCursor,
    HideCursor,
    EnableMouse(MouseTracking),
    DisableMouse,
    EnableFocus,
    DisableFocus,
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`TerminalControl`] that records transitions.
#[derive(Debug, Clone)]
pub struct RecordingControl {
    log: Arc<Mutex<Vec<Transition>>>,
    size: WindowSize,
    fail_on: Option<Transition>,
}

impl RecordingControl {
    /// A recorder reporting an 80x24 terminal.
    pub fn new() -> Self {
        Self::with_size(WindowSize::new(80, 24))
    }

    pub fn with_size(size: WindowSize) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            size,
            fail_on: None,
        }
    }

    /// Make `transition` fail with an I/O error instead of being recorded.
    pub fn failing_on(mut self, transition: Transition) -> Self {
        self.fail_on = Some(transition);
        self
    }

    /// Transitions recorded so far.
    pub fn transitions(&self) -> Vec<Transition> {
        lock(&self.log).clone()
    }

    /// Drain the recorded transitions.
    pub fn take(&self) -> Vec<Transition> {
        std::mem::take(&mut *lock(&self.log))
    }

    fn record(&self, transition: Transition) -> io::Result<()> {
        if self.fail_on == Some(transition) {
            return Err(io::Error::other(format!("{transition:?} refused")));
        }
        lock(&self.log).push(transition);
        Ok(())
    }
}

impl Default for RecordingControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalControl for RecordingControl {
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        self.record(Transition::EnableRawMode)
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        self.record(Transition::DisableRawMode)
    }

    fn enter_alt_screen(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::EnterAltScreen)
    }

    fn exit_alt_screen(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::ExitAltScreen)
    }

    fn show_cursor(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::ShowCursor)
    }

    fn hide_cursor(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::HideCursor)
    }

    fn enable_mouse_tracking(
        &mut self,
        _out: &mut dyn Write,
        mode: MouseTracking,
    ) -> io::Result<()> {
        self.record(Transition::EnableMouse(mode))
    }

    fn disable_mouse_tracking(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::DisableMouse)
    }

    fn enable_focus_reporting(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::EnableFocus)
    }

    fn disable_focus_reporting(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        self.record(Transition::DisableFocus)
    }

    fn size(&self) -> io::Result<WindowSize> {
        Ok(self.size)
    }
}

/// Thread-safe writer that captures output.
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&lock(&self.buf)).into_owned()
    }

    pub fn clear(&self) {
        lock(&self.buf).clear();
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.buf).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
