//! Background input thread.
//!
//! Runs an [`InputDecoder`] on a dedicated OS thread and forwards every
//! decoded message to the event loop through a bounded tokio channel.
//! When reading the real stdin on unix, reads are gated so the thread can
//! be parked while a child process owns the terminal and shut down without
//! waiting for another keystroke.

use std::fmt;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::decoder::{DecodeError, InputDecoder};
use crate::event::Msg;

/// Default channel buffer size for decoded input.
pub const DEFAULT_CHANNEL_SIZE: usize = 32;

/// How long `pause` waits for the reader to acknowledge.
const PAUSE_TIMEOUT: Duration = Duration::from_millis(200);

/// Where a program reads its input from.
#[derive(Default)]
pub enum InputSource {
    /// The process's stdin. Raw mode is enabled for it.
    #[default]
    Stdin,
    /// Any byte stream, decoded exactly like a terminal.
    Reader(Box<dyn Read + Send>),
    /// No input at all; messages arrive only through `send` and commands.
    None,
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => f.write_str("Stdin"),
            InputSource::Reader(_) => f.write_str("Reader(..)"),
            InputSource::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Default)]
struct Gate {
    paused: AtomicBool,
    parked: AtomicBool,
    shutdown: AtomicBool,
}

/// Shared switches between the event loop and the reader thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReaderControl {
    gate: Arc<Gate>,
    gated: bool,
}

impl ReaderControl {
    /// Stop consuming input and wait until the reader has parked.
    ///
    /// Ungated readers cannot be parked; for them this returns immediately.
    pub(crate) fn pause(&self) {
        self.gate.paused.store(true, Ordering::SeqCst);
        if !self.gated {
            return;
        }
        let deadline = Instant::now() + PAUSE_TIMEOUT;
        while !self.gate.parked.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        trace!(target: "termloop::input", parked = self.gate.parked.load(Ordering::SeqCst), "reader paused");
    }

    pub(crate) fn resume(&self) {
        self.gate.paused.store(false, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.gate.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown(&self) -> bool {
        self.gate.shutdown.load(Ordering::SeqCst)
    }
}

/// Handle to the running input thread.
pub(crate) struct InputReader {
    control: ReaderControl,
    handle: Option<JoinHandle<()>>,
}

pub(crate) type InputReceiver = mpsc::Receiver<Result<Msg, DecodeError>>;

impl InputReader {
    /// Start reading `source`. Returns `None` for [`InputSource::None`].
    pub(crate) fn spawn(source: InputSource) -> io::Result<Option<(Self, InputReceiver)>> {
        let (control, reader): (ReaderControl, Box<dyn Read + Send>) = match source {
            InputSource::None => return Ok(None),
            InputSource::Reader(reader) => (ReaderControl::default(), reader),
            InputSource::Stdin => stdin_reader(),
        };

        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
        let thread_control = control.clone();
        let handle = thread::Builder::new()
            .name("termloop-input".to_string())
            .spawn(move || read_loop(InputDecoder::new(reader), tx, thread_control))?;

        Ok(Some((
            Self {
                control,
                handle: Some(handle),
            },
            rx,
        )))
    }

    pub(crate) fn control(&self) -> &ReaderControl {
        &self.control
    }

    /// Signal the thread to exit.
    ///
    /// Gated readers are joined, since they notice the signal within one
    /// poll interval. Ungated readers may be blocked in `read` indefinitely
    /// and are detached; they exit on their next read once the receiver is
    /// gone.
    pub(crate) fn shutdown(mut self) {
        self.control.shutdown();
        if let Some(handle) = self.handle.take() {
            if self.control.gated {
                let _ = handle.join();
            }
        }
    }
}

fn read_loop<R: Read>(
    mut decoder: InputDecoder<R>,
    tx: mpsc::Sender<Result<Msg, DecodeError>>,
    control: ReaderControl,
) {
    debug!(target: "termloop::input", "input reader started");
    loop {
        let result = decoder.read();
        if control.is_shutdown() {
            break;
        }
        let fatal = result.is_err();
        if tx.blocking_send(result).is_err() || fatal {
            break;
        }
    }
    debug!(target: "termloop::input", "input reader stopped");
}

#[cfg(unix)]
fn stdin_reader() -> (ReaderControl, Box<dyn Read + Send>) {
    let control = ReaderControl {
        gate: Arc::default(),
        gated: true,
    };
    let reader = unix::GatedStdin::new(Arc::clone(&control.gate));
    (control, Box::new(reader))
}

#[cfg(not(unix))]
fn stdin_reader() -> (ReaderControl, Box<dyn Read + Send>) {
    (ReaderControl::default(), Box::new(io::stdin()))
}

#[cfg(unix)]
mod unix {
    use std::io::{self, Read};
    use std::os::fd::{AsRawFd, RawFd};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Gate;

    /// How often the gate flags are checked while idle.
    const POLL_INTERVAL_MS: libc::c_int = 50;

    /// How long to wait for the rest of an escape sequence after a read
    /// that ended in `ESC`, `ESC [` or `ESC O`.
    const ESC_TIMEOUT_MS: libc::c_int = 10;

    const ESC: u8 = 0x1b;

    /// Whether `bytes` ends in something that may start a longer sequence.
    fn ends_with_escape_prefix(bytes: &[u8]) -> bool {
        matches!(bytes, [.., ESC] | [.., ESC, b'[' | b'O'])
    }

    /// Stdin read straight from the file descriptor, bypassing std's
    /// buffering so `poll` sees every pending byte.
    pub(super) struct GatedStdin {
        fd: RawFd,
        gate: Arc<Gate>,
        escape_pending: bool,
    }

    impl GatedStdin {
        pub(super) fn new(gate: Arc<Gate>) -> Self {
            Self::with_fd(io::stdin().as_raw_fd(), gate)
        }

        pub(super) fn with_fd(fd: RawFd, gate: Arc<Gate>) -> Self {
            Self {
                fd,
                gate,
                escape_pending: false,
            }
        }

        fn poll_readable(&self, timeout_ms: libc::c_int) -> io::Result<bool> {
            let mut fds = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let rc = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(rc > 0)
        }

        fn read_fd(&self, buf: &mut [u8]) -> io::Result<usize> {
            let rc = unsafe { libc::read(self.fd, buf.as_mut_ptr().cast(), buf.len()) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(rc as usize)
        }

        fn wait_readable(&self) -> io::Result<bool> {
            loop {
                if self.gate.shutdown.load(Ordering::SeqCst) {
                    return Ok(false);
                }
                if self.gate.paused.load(Ordering::SeqCst) {
                    self.gate.parked.store(true, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(POLL_INTERVAL_MS as u64));
                    continue;
                }
                self.gate.parked.store(false, Ordering::SeqCst);
                match self.poll_readable(POLL_INTERVAL_MS) {
                    // A pause that raced the poll leaves the bytes for the child.
                    Ok(true) if self.gate.paused.load(Ordering::SeqCst) => continue,
                    Ok(true) => return Ok(true),
                    Ok(false) => continue,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    impl Read for GatedStdin {
        /// Reports [`io::ErrorKind::TimedOut`] when the previous read ended in
        /// an escape prefix and nothing followed it within the escape
        /// timeout, so the decoder can settle the prefix as a key.
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            if std::mem::take(&mut self.escape_pending) && !self.poll_readable(ESC_TIMEOUT_MS)? {
                return Err(io::ErrorKind::TimedOut.into());
            }
            if !self.wait_readable()? {
                return Ok(0);
            }
            let n = self.read_fd(buf)?;
            self.escape_pending = ends_with_escape_prefix(&buf[..n]);
            Ok(n)
        }
    }

}
