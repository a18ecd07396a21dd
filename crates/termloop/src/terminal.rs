//! Terminal mode management.
//!
//! [`TerminalControl`] is the seam through which every mode switch (raw
//! mode, alternate screen, cursor visibility, mouse tracking) reaches the
//! device. [`TerminalSession`] owns one control together with the output
//! stream, remembers which modes are active so each switch happens at most
//! once, and restores everything on drop.

use std::io::{self, Write};
use std::process;
use std::sync::Once;

use crossterm::{
    cursor::{Hide, Show},
    event::{DisableFocusChange, EnableFocusChange},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::WindowSize;

/// Error type for terminal operations.
#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("failed to {action}: {source}")]
    Mode {
        action: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("terminal io error: {0}")]
    Io(#[from] io::Error),
}

/// Error type for running a child process with the terminal released.
#[derive(Error, Debug)]
pub enum ExecError {
    /// No child process was supplied. The terminal was not touched.
    #[error("no command given to exec")]
    MissingCommand,
    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] io::Error),
    #[error("child process exited with {0}")]
    ExitStatus(process::ExitStatus),
    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

/// Which pointer movements the terminal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseTracking {
    /// Presses, releases and motion while a button is held (mode 1002).
    CellMotion,
    /// Every movement, with or without a button held (mode 1003).
    AllMotion,
}

impl MouseTracking {
    /// DECSET sequence enabling this mode plus URxvt and SGR extended reports.
    pub fn enable_sequence(self) -> &'static str {
        match self {
            MouseTracking::CellMotion => "\x1b[?1002h\x1b[?1015h\x1b[?1006h",
            MouseTracking::AllMotion => "\x1b[?1003h\x1b[?1015h\x1b[?1006h",
        }
    }

    /// DECRST sequence turning every mouse mode off.
    pub fn disable_sequence() -> &'static str {
        "\x1b[?1006l\x1b[?1015l\x1b[?1003l\x1b[?1002l\x1b[?1000l"
    }
}

/// Low-level terminal mode switches.
///
/// Implementations perform the switch unconditionally;
/// [`TerminalSession`] takes care of calling each one only when the mode
/// actually changes.
pub trait TerminalControl: Send {
    fn enable_raw_mode(&mut self) -> io::Result<()>;
    fn disable_raw_mode(&mut self) -> io::Result<()>;
    fn enter_alt_screen(&mut self, out: &mut dyn Write) -> io::Result<()>;
    fn exit_alt_screen(&mut self, out: &mut dyn Write) -> io::Result<()>;
    fn show_cursor(&mut self, out: &mut dyn Write) -> io::Result<()>;
    fn hide_cursor(&mut self, out: &mut dyn Write) -> io::Result<()>;
    fn enable_mouse_tracking(&mut self, out: &mut dyn Write, mode: MouseTracking)
        -> io::Result<()>;
    fn disable_mouse_tracking(&mut self, out: &mut dyn Write) -> io::Result<()>;

    fn enable_focus_reporting(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(EnableFocusChange).map(|_| ())
    }

    fn disable_focus_reporting(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(DisableFocusChange).map(|_| ())
    }

    /// Current size of the terminal in cells.
    fn size(&self) -> io::Result<WindowSize>;
}

/// [`TerminalControl`] backed by crossterm and the process's controlling
/// terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermControl;

impl TerminalControl for CrosstermControl {
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        terminal::disable_raw_mode()
    }

    fn enter_alt_screen(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(EnterAlternateScreen).map(|_| ())
    }

    fn exit_alt_screen(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(LeaveAlternateScreen).map(|_| ())
    }

    fn show_cursor(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(Show).map(|_| ())
    }

    fn hide_cursor(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(Hide).map(|_| ())
    }

    #[cfg(not(windows))]
    fn enable_mouse_tracking(
        &mut self,
        out: &mut dyn Write,
        mode: MouseTracking,
    ) -> io::Result<()> {
        out.write_all(mode.enable_sequence().as_bytes())?;
        out.flush()
    }

    #[cfg(windows)]
    fn enable_mouse_tracking(
        &mut self,
        out: &mut dyn Write,
        _mode: MouseTracking,
    ) -> io::Result<()> {
        out.execute(crossterm::event::EnableMouseCapture).map(|_| ())
    }

    #[cfg(not(windows))]
    fn disable_mouse_tracking(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(MouseTracking::disable_sequence().as_bytes())?;
        out.flush()
    }

    #[cfg(windows)]
    fn disable_mouse_tracking(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.execute(crossterm::event::DisableMouseCapture).map(|_| ())
    }

    fn size(&self) -> io::Result<WindowSize> {
        terminal::size().map(|(width, height)| WindowSize::new(width, height))
    }
}

/// Configuration for terminal initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    /// Render in the alternate screen buffer. Default: `false`.
    pub alt_screen: bool,
    /// Mouse reporting mode, if any. Default: `None`.
    pub mouse: Option<MouseTracking>,
    /// Put the terminal in raw mode. Default: `true`.
    pub raw_mode: bool,
    /// Ask for focus in/out reports. Default: `false`.
    pub report_focus: bool,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            alt_screen: false,
            mouse: None,
            raw_mode: true,
            report_focus: false,
        }
    }
}

/// Owned terminal state: one control, one output stream, and the modes
/// currently in effect.
pub struct TerminalSession {
    control: Box<dyn TerminalControl>,
    out: Box<dyn Write + Send>,
    config: TerminalConfig,
    raw_mode: bool,
    alt_screen: bool,
    cursor_hidden: bool,
    mouse: Option<MouseTracking>,
    focus_reporting: bool,
}

impl TerminalSession {
    pub fn new(
        control: Box<dyn TerminalControl>,
        out: Box<dyn Write + Send>,
        config: TerminalConfig,
    ) -> Self {
        Self {
            control,
            out,
            config,
            raw_mode: false,
            alt_screen: false,
            cursor_hidden: false,
            mouse: None,
            focus_reporting: false,
        }
    }

    /// A session on stdout driven by crossterm.
    pub fn stdout(config: TerminalConfig) -> Self {
        Self::new(Box::new(CrosstermControl), Box::new(io::stdout()), config)
    }

    /// Apply every mode the configuration asks for.
    pub fn setup(&mut self) -> Result<(), TerminalError> {
        debug!(target: "termloop::terminal", config = ?self.config, "setting up terminal");
        if self.config.raw_mode {
            self.set_raw_mode(true)?;
        }
        if self.config.alt_screen {
            self.set_alt_screen(true)?;
        }
        self.set_cursor_hidden(true)?;
        if let Some(mode) = self.config.mouse {
            self.set_mouse_tracking(Some(mode))?;
        }
        if self.config.report_focus {
            self.set_focus_reporting(true)?;
        }
        Ok(())
    }

    /// Undo every active mode. Safe to call repeatedly.
    pub fn restore(&mut self) -> Result<(), TerminalError> {
        self.release()
    }

    /// Leave every active mode, in the order a child process expects.
    fn release(&mut self) -> Result<(), TerminalError> {
        self.set_focus_reporting(false)?;
        self.set_mouse_tracking(None)?;
        self.set_alt_screen(false)?;
        self.set_cursor_hidden(false)?;
        self.set_raw_mode(false)
    }

    pub fn set_raw_mode(&mut self, enabled: bool) -> Result<(), TerminalError> {
        if self.raw_mode == enabled {
            return Ok(());
        }
        if enabled {
            self.control.enable_raw_mode().map_err(mode("enable raw mode"))?;
        } else {
            self.control.disable_raw_mode().map_err(mode("disable raw mode"))?;
        }
        self.raw_mode = enabled;
        Ok(())
    }

    pub fn set_alt_screen(&mut self, enabled: bool) -> Result<(), TerminalError> {
        if self.alt_screen == enabled {
            return Ok(());
        }
        if enabled {
            self.control
                .enter_alt_screen(&mut self.out)
                .map_err(mode("enter alternate screen"))?;
        } else {
            self.control
                .exit_alt_screen(&mut self.out)
                .map_err(mode("leave alternate screen"))?;
        }
        self.alt_screen = enabled;
        Ok(())
    }

    pub fn set_cursor_hidden(&mut self, hidden: bool) -> Result<(), TerminalError> {
        if self.cursor_hidden == hidden {
            return Ok(());
        }
        if hidden {
            self.control
                .hide_cursor(&mut self.out)
                .map_err(mode("hide cursor"))?;
        } else {
            self.control
                .show_cursor(&mut self.out)
                .map_err(mode("show cursor"))?;
        }
        self.cursor_hidden = hidden;
        Ok(())
    }

    /// Switch mouse reporting. Changing between two tracking modes turns
    /// the old one off first.
    pub fn set_mouse_tracking(
        &mut self,
        tracking: Option<MouseTracking>,
    ) -> Result<(), TerminalError> {
        if self.mouse == tracking {
            return Ok(());
        }
        if self.mouse.is_some() {
            self.control
                .disable_mouse_tracking(&mut self.out)
                .map_err(mode("disable mouse tracking"))?;
            self.mouse = None;
        }
        if let Some(tracking) = tracking {
            self.control
                .enable_mouse_tracking(&mut self.out, tracking)
                .map_err(mode("enable mouse tracking"))?;
            self.mouse = Some(tracking);
        }
        Ok(())
    }

    pub fn set_focus_reporting(&mut self, enabled: bool) -> Result<(), TerminalError> {
        if self.focus_reporting == enabled {
            return Ok(());
        }
        if enabled {
            self.control
                .enable_focus_reporting(&mut self.out)
                .map_err(mode("enable focus reporting"))?;
        } else {
            self.control
                .disable_focus_reporting(&mut self.out)
                .map_err(mode("disable focus reporting"))?;
        }
        self.focus_reporting = enabled;
        Ok(())
    }

    #[inline]
    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode
    }

    #[inline]
    pub fn is_alt_screen(&self) -> bool {
        self.alt_screen
    }

    #[inline]
    pub fn is_cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    #[inline]
    pub fn mouse_tracking(&self) -> Option<MouseTracking> {
        self.mouse
    }

    /// The output stream frames are written to.
    #[inline]
    pub fn writer(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    pub fn size(&self) -> Result<WindowSize, TerminalError> {
        self.control.size().map_err(mode("query terminal size"))
    }

    /// Hand the terminal to `child` until it exits, then take it back.
    ///
    /// Leaves mouse tracking and the alternate screen, shows the cursor and
    /// drops raw mode; runs the child with inherited stdio; then re-enters
    /// whichever of those modes were active. Restoration happens whether or
    /// not the child succeeded, and a child failure takes precedence over a
    /// restoration failure in the returned error.
    pub fn exec_process(
        &mut self,
        child: Option<&mut process::Command>,
    ) -> Result<(), ExecError> {
        let Some(child) = child else {
            return Err(ExecError::MissingCommand);
        };

        let raw_mode = self.raw_mode;
        let alt_screen = self.alt_screen;
        let cursor_hidden = self.cursor_hidden;
        let mouse = self.mouse;
        let focus_reporting = self.focus_reporting;

        debug!(target: "termloop::terminal", program = ?child.get_program(), "releasing terminal for child");
        if let Err(err) = self.release() {
            if let Err(resume_err) =
                self.resume(raw_mode, alt_screen, cursor_hidden, mouse, focus_reporting)
            {
                warn!(target: "termloop::terminal", %resume_err, "failed to resume terminal after failed release");
            }
            return Err(err.into());
        }

        let outcome = match child.status() {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ExecError::ExitStatus(status)),
            Err(err) => Err(ExecError::Spawn(err)),
        };

        let resumed = self.resume(raw_mode, alt_screen, cursor_hidden, mouse, focus_reporting);
        debug!(target: "termloop::terminal", ok = outcome.is_ok(), "terminal resumed after child");

        match (outcome, resumed) {
            (Err(child_err), Err(term_err)) => {
                warn!(target: "termloop::terminal", %term_err, "failed to resume terminal after child failure");
                Err(child_err)
            }
            (Err(child_err), Ok(())) => Err(child_err),
            (Ok(()), Err(term_err)) => Err(term_err.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn resume(
        &mut self,
        raw_mode: bool,
        alt_screen: bool,
        cursor_hidden: bool,
        mouse: Option<MouseTracking>,
        focus_reporting: bool,
    ) -> Result<(), TerminalError> {
        self.set_raw_mode(raw_mode)?;
        self.set_alt_screen(alt_screen)?;
        self.set_cursor_hidden(cursor_hidden)?;
        self.set_mouse_tracking(mouse)?;
        self.set_focus_reporting(focus_reporting)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        // Best effort to restore terminal state
        if let Err(err) = self.restore() {
            warn!(target: "termloop::terminal", %err, "failed to restore terminal on drop");
        }
    }
}

#[inline]
fn mode(action: &'static str) -> impl FnOnce(io::Error) -> TerminalError {
    move |source| TerminalError::Mode { action, source }
}

static PANIC_HOOK: Once = Once::new();

/// Install a panic hook that restores the terminal before printing the panic message.
///
/// Only writes reset sequences to stdout and drops raw mode; it does not
/// know which modes were active, so it resets all of them. The hook is
/// installed once per process; returns whether this call installed it.
pub fn install_panic_hook() -> bool {
    let mut installed = false;
    PANIC_HOOK.call_once(|| {
        chain_panic_hook();
        installed = true;
    });
    installed
}

fn chain_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Best effort to restore terminal
        let mut stdout = io::stdout();
        let _ = stdout.write_all(MouseTracking::disable_sequence().as_bytes());
        let _ = stdout.execute(DisableFocusChange);
        let _ = stdout.execute(LeaveAlternateScreen);
        let _ = stdout.execute(Show);
        let _ = terminal::disable_raw_mode();

        original_hook(panic_info);
    }));
}
