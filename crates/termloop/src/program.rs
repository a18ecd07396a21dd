//! Program builder and main event loop.
//!
//! This module provides the [`ProgramBuilder`] for configuring a program
//! and the [`Program`] that owns the application [`Model`] and drives the
//! read → update → render cycle on a dedicated thread.

use std::fmt;
use std::io::{self, Read, Write};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::decoder::DecodeError;
use crate::event::Msg;
use crate::interaction::{InteractionConfig, MouseInteraction, NamedArea};
use crate::reader::{InputReader, InputReceiver, InputSource};
use crate::renderer::Renderer;
use crate::sender::ProgramSender;
use crate::terminal::{
    install_panic_hook, CrosstermControl, ExecError, MouseTracking, TerminalConfig,
    TerminalControl, TerminalError, TerminalSession,
};

/// Application state driven by a [`Program`].
///
/// `update` consumes the current state and returns its replacement along
/// with any work to run in the background. Work results come back as
/// messages.
///
/// # Example
///
/// ```ignore
/// use termloop::{command, Key, KeyCode, Model, Msg, Command};
///
/// struct Counter(i64);
///
/// impl Model for Counter {
///     fn update(self, msg: Msg) -> (Self, Option<Command>) {
///         match msg {
///             Msg::Key(Key { code: KeyCode::Char('+'), .. }) => (Counter(self.0 + 1), None),
///             Msg::Key(Key { code: KeyCode::Char('q'), .. }) => (self, Some(command::quit())),
///             _ => (self, None),
///         }
///     }
///
///     fn view(&self) -> String {
///         format!("count: {}", self.0)
///     }
/// }
/// ```
pub trait Model: Send + Sized + 'static {
    /// Work to start as soon as the program is running.
    fn init(&self) -> Option<Command> {
        None
    }

    fn update(self, msg: Msg) -> (Self, Option<Command>);

    fn view(&self) -> String;

    /// Interactive regions of the current view, first match wins.
    ///
    /// Mouse reports are run through the interaction engine only when this
    /// is non-empty.
    fn hit_areas(&self) -> Vec<NamedArea> {
        Vec::new()
    }
}

/// Error type for program operations.
#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("program is already running")]
    AlreadyRunning,
    #[error("program has already stopped")]
    AlreadyStopped,
    #[error("program is not running")]
    NotRunning,
    /// The input stream reached its end.
    #[error("input stream closed")]
    InputClosed,
    #[error("input error: {0}")]
    Input(#[source] DecodeError),
    #[error(transparent)]
    Terminal(#[from] TerminalError),
    #[error("failed to render view: {0}")]
    Render(#[source] io::Error),
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("event loop panicked")]
    Panicked,
}

/// Error type for building a program.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("no model provided")]
    NoModel,
}

struct Options {
    input: InputSource,
    output: Box<dyn Write + Send>,
    control: Box<dyn TerminalControl>,
    terminal: TerminalConfig,
    interaction: InteractionConfig,
    catch_panics: bool,
    resize_signals: bool,
}

/// Builder for constructing a [`Program`].
///
/// # Example
///
/// ```ignore
/// let mut program = ProgramBuilder::new()
///     .model(Counter(0))
///     .alt_screen(true)
///     .mouse_cell_motion()
///     .build()?;
///
/// let model = program.run()?;
/// ```
pub struct ProgramBuilder<M: Model> {
    model: Option<M>,
    input: InputSource,
    output: Option<Box<dyn Write + Send>>,
    control: Option<Box<dyn TerminalControl>>,
    alt_screen: bool,
    mouse: Option<MouseTracking>,
    report_focus: bool,
    interaction: InteractionConfig,
    catch_panics: bool,
    resize_signals: bool,
}

impl<M: Model> ProgramBuilder<M> {
    /// Create a new program builder.
    pub fn new() -> Self {
        Self {
            model: None,
            input: InputSource::Stdin,
            output: None,
            control: None,
            alt_screen: false,
            mouse: None,
            report_focus: false,
            interaction: InteractionConfig::default(),
            catch_panics: true,
            resize_signals: true,
        }
    }

    /// Set the initial model.
    ///
    /// This is required before building the program.
    pub fn model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    /// Render in the alternate screen buffer.
    pub fn alt_screen(mut self, enabled: bool) -> Self {
        self.alt_screen = enabled;
        self
    }

    /// Report presses, releases and motion while a button is held.
    pub fn mouse_cell_motion(mut self) -> Self {
        self.mouse = Some(MouseTracking::CellMotion);
        self
    }

    /// Report all pointer motion, including hover without a button held.
    pub fn mouse_motion(mut self) -> Self {
        self.mouse = Some(MouseTracking::AllMotion);
        self
    }

    /// Deliver [`Msg::Focus`] and [`Msg::Blur`] when the terminal window
    /// gains or loses focus.
    pub fn report_focus(mut self, enabled: bool) -> Self {
        self.report_focus = enabled;
        self
    }

    /// Read input from `reader` instead of stdin. Raw mode is not touched.
    pub fn input(mut self, reader: impl Read + Send + 'static) -> Self {
        self.input = InputSource::Reader(Box::new(reader));
        self
    }

    /// Read no input at all.
    pub fn without_input(mut self) -> Self {
        self.input = InputSource::None;
        self
    }

    /// Write frames and control sequences to `writer` instead of stdout.
    pub fn output(mut self, writer: impl Write + Send + 'static) -> Self {
        self.output = Some(Box::new(writer));
        self
    }

    /// Perform terminal mode switches through `control` instead of
    /// crossterm.
    pub fn terminal_control(mut self, control: impl TerminalControl + 'static) -> Self {
        self.control = Some(Box::new(control));
        self
    }

    /// Tune click and drag detection.
    pub fn interaction_config(mut self, config: InteractionConfig) -> Self {
        self.interaction = config;
        self
    }

    /// Restore the terminal before the panic message is printed. Default:
    /// `true`. Only applies with the default terminal control.
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Deliver [`Msg::Resize`] on `SIGWINCH`. Default: `true`.
    pub fn resize_signals(mut self, enabled: bool) -> Self {
        self.resize_signals = enabled;
        self
    }

    /// Build the program.
    ///
    /// Returns an error if no model was provided.
    pub fn build(mut self) -> Result<Program<M>, BuildError> {
        let model = self.model.take().ok_or(BuildError::NoModel)?;
        Ok(Program::with_options(model, self.into_options()))
    }

    fn into_options(self) -> Options {
        let raw_mode = matches!(self.input, InputSource::Stdin);
        let catch_panics = self.catch_panics && self.control.is_none();

        Options {
            input: self.input,
            output: self.output.unwrap_or_else(|| Box::new(io::stdout())),
            control: self.control.unwrap_or_else(|| Box::new(CrosstermControl)),
            terminal: TerminalConfig {
                alt_screen: self.alt_screen,
                mouse: self.mouse,
                raw_mode,
                report_focus: self.report_focus,
            },
            interaction: self.interaction,
            catch_panics,
            resize_signals: self.resize_signals,
        }
    }
}

impl<M: Model> Default for ProgramBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

struct Pending<M> {
    model: M,
    rx: mpsc::UnboundedReceiver<Msg>,
    options: Options,
}

enum State<M> {
    Created(Box<Pending<M>>),
    Running {
        handle: JoinHandle<Result<M, ProgramError>>,
        stop: watch::Sender<bool>,
    },
    Stopped {
        model: Option<M>,
    },
}

/// A configured program.
///
/// Lifecycle: created → running → stopped. A stopped program cannot be
/// started again.
pub struct Program<M: Model> {
    state: State<M>,
    tx: mpsc::UnboundedSender<Msg>,
    running: Arc<AtomicBool>,
}

impl<M: Model> Program<M> {
    /// A program on stdin/stdout with default options.
    pub fn new(model: M) -> Self {
        Self::with_options(model, ProgramBuilder::<M>::new().into_options())
    }

    fn with_options(model: M, options: Options) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: State::Created(Box::new(Pending { model, rx, options })),
            tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the event loop on its own thread.
    ///
    /// Returns once the terminal is set up and `init` has been called.
    pub fn start(&mut self) -> Result<(), ProgramError> {
        let pending = match std::mem::replace(&mut self.state, State::Stopped { model: None }) {
            State::Created(pending) => pending,
            state @ State::Running { .. } => {
                self.state = state;
                return Err(ProgramError::AlreadyRunning);
            }
            state @ State::Stopped { .. } => {
                self.state = state;
                return Err(ProgramError::AlreadyStopped);
            }
        };
        let Pending { model, rx, options } = *pending;

        if options.catch_panics {
            install_panic_hook();
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("termloop-event-loop".to_string())
            .spawn(move || event_loop_thread(model, rx, options, stop_rx, ready_tx, running))
            .map_err(ProgramError::Spawn)?;

        if ready_rx.recv().is_ok() {
            debug!(target: "termloop::program", "program started");
            self.state = State::Running {
                handle,
                stop: stop_tx,
            };
            return Ok(());
        }

        // The loop exited before it was ready.
        let model = join(handle)?;
        self.state = State::Stopped { model: Some(model) };
        Ok(())
    }

    /// Inject a message from any thread.
    pub fn send(&self, msg: impl Into<Msg>) -> Result<(), ProgramError> {
        if !self.is_running() {
            return Err(ProgramError::NotRunning);
        }
        self.tx.send(msg.into()).map_err(|_| ProgramError::NotRunning)
    }

    /// A clonable handle for sending from other threads.
    pub fn sender(&self) -> ProgramSender {
        ProgramSender::new(self.tx.clone(), Arc::clone(&self.running))
    }

    /// Whether the event loop is running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the loop to exit and wait for it.
    ///
    /// Returns the loop's fatal error, if any, the first time; afterwards,
    /// and on a program that never started, returns `Ok`.
    pub fn stop(&mut self) -> Result<(), ProgramError> {
        if let State::Running { stop, .. } = &self.state {
            let _ = stop.send(true);
        }
        self.wait()
    }

    /// Block until the loop exits on its own.
    pub fn wait(&mut self) -> Result<(), ProgramError> {
        match std::mem::replace(&mut self.state, State::Stopped { model: None }) {
            State::Created(pending) => {
                self.state = State::Stopped {
                    model: Some(pending.model),
                };
                Ok(())
            }
            State::Running { handle, stop } => {
                let result = join(handle);
                drop(stop);
                debug!(target: "termloop::program", ok = result.is_ok(), "program stopped");
                let model = result?;
                self.state = State::Stopped { model: Some(model) };
                Ok(())
            }
            stopped @ State::Stopped { .. } => {
                self.state = stopped;
                Ok(())
            }
        }
    }

    /// Start, wait for the loop to finish and return the final model.
    pub fn run(mut self) -> Result<M, ProgramError> {
        self.start()?;
        self.wait()?;
        self.into_model().ok_or(ProgramError::AlreadyStopped)
    }

    /// The final model of a program that stopped cleanly.
    pub fn into_model(mut self) -> Option<M> {
        match std::mem::replace(&mut self.state, State::Stopped { model: None }) {
            State::Stopped { model } => model,
            State::Created(pending) => Some(pending.model),
            state @ State::Running { .. } => {
                self.state = state;
                None
            }
        }
    }
}

impl<M: Model> Drop for Program<M> {
    fn drop(&mut self) {
        if matches!(self.state, State::Running { .. }) {
            if let Err(err) = self.stop() {
                warn!(target: "termloop::program", %err, "program stopped with error on drop");
            }
        }
    }
}

impl<M: Model> fmt::Debug for Program<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Created(_) => "created",
            State::Running { .. } => "running",
            State::Stopped { .. } => "stopped",
        };
        f.debug_struct("Program").field("state", &state).finish()
    }
}

fn join<M>(handle: JoinHandle<Result<M, ProgramError>>) -> Result<M, ProgramError> {
    handle.join().unwrap_or(Err(ProgramError::Panicked))
}

/// Clears the running flag however the loop thread exits.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn event_loop_thread<M: Model>(
    model: M,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    options: Options,
    stop_rx: watch::Receiver<bool>,
    ready: std_mpsc::SyncSender<()>,
    running: Arc<AtomicBool>,
) -> Result<M, ProgramError> {
    let _guard = RunningGuard(Arc::clone(&running));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ProgramError::Runtime)?;

    let Options {
        input,
        output,
        control,
        terminal,
        interaction,
        resize_signals,
        ..
    } = options;

    let mut session = TerminalSession::new(control, output, terminal);
    session.setup()?;
    let input = InputReader::spawn(input).map_err(ProgramError::Spawn)?;

    running.store(true, Ordering::SeqCst);
    let _ = ready.send(());
    drop(ready);

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let mut event_loop = EventLoop {
        session,
        renderer: Renderer::new(),
        interaction: MouseInteraction::new(interaction),
        input,
        msg_rx,
        cmd_tx,
        cmd_rx,
        stop_rx,
    };

    let result = runtime.block_on(async {
        let mut resize = ResizeSignals::new(resize_signals);
        event_loop.run(model, &mut resize).await
    });
    running.store(false, Ordering::SeqCst);
    let finished = event_loop.finish();

    // Commands still in flight keep running on the blocking pool.
    runtime.shutdown_background();

    let model = result?;
    finished?;
    Ok(model)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct EventLoop {
    session: TerminalSession,
    renderer: Renderer,
    interaction: MouseInteraction,
    input: Option<(InputReader, InputReceiver)>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    cmd_tx: mpsc::UnboundedSender<Msg>,
    cmd_rx: mpsc::UnboundedReceiver<Msg>,
    stop_rx: watch::Receiver<bool>,
}

impl EventLoop {
    async fn run<M: Model>(
        &mut self,
        model: M,
        resize: &mut ResizeSignals,
    ) -> Result<M, ProgramError> {
        self.schedule(model.init());
        self.render(&model)?;

        let mut model = model;
        match self.session.size() {
            Ok(size) if size.is_valid() => {
                let (next, flow) = self.dispatch(model, Msg::Resize(size))?;
                model = next;
                if flow == Flow::Quit {
                    return Ok(model);
                }
                self.render(&model)?;
            }
            Ok(size) => debug!(target: "termloop::program", ?size, "ignoring unusable initial size"),
            Err(err) => debug!(target: "termloop::program", %err, "no initial size"),
        }

        loop {
            let msg = tokio::select! {
                biased;

                // Stop requested, or the program handle went away
                _ = self.stop_rx.changed() => {
                    debug!(target: "termloop::program", "stop requested");
                    break;
                }

                // Terminal input
                input = recv_input(&mut self.input) => match input {
                    Some(Ok(msg)) => msg,
                    Some(Err(DecodeError::EndOfStream)) | None => {
                        return Err(ProgramError::InputClosed);
                    }
                    Some(Err(err)) => return Err(ProgramError::Input(err)),
                },

                // Messages injected with `send`
                Some(msg) = self.msg_rx.recv() => msg,

                // Command results
                Some(msg) = self.cmd_rx.recv() => msg,

                // Window size changes
                Some(()) = resize.recv() => match self.session.size() {
                    Ok(size) => Msg::Resize(size),
                    Err(err) => {
                        debug!(target: "termloop::program", %err, "failed to read size after resize");
                        continue;
                    }
                },
            };

            trace!(target: "termloop::program", ?msg, "dispatching");
            let (next, flow) = self.dispatch(model, msg)?;
            model = next;
            if flow == Flow::Quit {
                break;
            }
            self.render(&model)?;
        }

        Ok(model)
    }

    /// Route one message. Composite messages are unpacked in order.
    fn dispatch<M: Model>(&mut self, model: M, msg: Msg) -> Result<(M, Flow), ProgramError> {
        if msg.is_quit() || msg.is_interrupt() {
            debug!(target: "termloop::program", ?msg, "quitting");
            return Ok((model, Flow::Quit));
        }

        match msg {
            Msg::Batch(msgs) | Msg::Sequence(msgs) => {
                let mut model = model;
                for msg in msgs {
                    let (next, flow) = self.dispatch(model, msg)?;
                    model = next;
                    if flow == Flow::Quit {
                        return Ok((model, Flow::Quit));
                    }
                }
                Ok((model, Flow::Continue))
            }
            Msg::Exec(request) => {
                let (child, on_exit) = request.into_parts();
                let result = self.exec(child);
                self.dispatch(model, on_exit(result))
            }
            Msg::Mouse(event) => {
                let areas = model.hit_areas();
                let mut model = self.update(model, Msg::Mouse(event));
                if !areas.is_empty() {
                    for interaction in self.interaction.process(&event, &areas, Instant::now()) {
                        model = self.update(model, Msg::Interaction(interaction));
                    }
                }
                Ok((model, Flow::Continue))
            }
            Msg::Resize(size) => {
                self.renderer.invalidate();
                Ok((self.update(model, Msg::Resize(size)), Flow::Continue))
            }
            msg => Ok((self.update(model, msg), Flow::Continue)),
        }
    }

    fn update<M: Model>(&mut self, model: M, msg: Msg) -> M {
        let (model, cmd) = model.update(msg);
        self.schedule(cmd);
        model
    }

    /// Run a command on the blocking pool and feed its result back.
    fn schedule(&self, cmd: Option<Command>) {
        let Some(cmd) = cmd else {
            return;
        };
        let tx = self.cmd_tx.clone();
        let handle = tokio::task::spawn_blocking(move || {
            // The loop may already be gone.
            let _ = tx.send(cmd.run());
        });
        tokio::spawn(async move {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    warn!(target: "termloop::command", "command panicked");
                }
            }
        });
    }

    fn exec(&mut self, child: Option<process::Command>) -> Result<(), ExecError> {
        let Some(mut child) = child else {
            return Err(ExecError::MissingCommand);
        };

        if let Some((reader, _)) = &self.input {
            reader.control().pause();
        }
        let result = self.session.exec_process(Some(&mut child));
        if let Some((reader, _)) = &self.input {
            reader.control().resume();
        }
        self.renderer.reset();

        if let Err(err) = &result {
            debug!(target: "termloop::program", %err, "exec failed");
        }
        result
    }

    fn render<M: Model>(&mut self, model: &M) -> Result<(), ProgramError> {
        let view = model.view();
        let alt_screen = self.session.is_alt_screen();
        let written = self
            .renderer
            .render(self.session.writer(), &view, alt_screen)
            .map_err(ProgramError::Render)?;
        if written {
            trace!(target: "termloop::program", bytes = view.len(), "rendered frame");
        }
        Ok(())
    }

    /// Restore the terminal and stop the input thread.
    fn finish(&mut self) -> Result<(), ProgramError> {
        let inline = !self.session.is_alt_screen();
        let restored = self.session.restore();
        if inline {
            let out = self.session.writer();
            let _ = out.write_all(b"\r\n").and_then(|()| out.flush());
        }
        if let Some((reader, rx)) = self.input.take() {
            drop(rx);
            reader.shutdown();
        }
        restored.map_err(ProgramError::from)
    }
}

async fn recv_input(
    input: &mut Option<(InputReader, InputReceiver)>,
) -> Option<Result<Msg, DecodeError>> {
    match input {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// `SIGWINCH` listener; never fires where unsupported or disabled.
struct ResizeSignals {
    #[cfg(unix)]
    inner: Option<tokio::signal::unix::Signal>,
}

impl ResizeSignals {
    #[cfg(unix)]
    fn new(enabled: bool) -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let inner = if enabled {
            match signal(SignalKind::window_change()) {
                Ok(sig) => Some(sig),
                Err(err) => {
                    warn!(target: "termloop::program", %err, "cannot listen for resize signals");
                    None
                }
            }
        } else {
            None
        };
        Self { inner }
    }

    #[cfg(not(unix))]
    fn new(_enabled: bool) -> Self {
        Self {}
    }

    async fn recv(&mut self) -> Option<()> {
        #[cfg(unix)]
        if let Some(sig) = self.inner.as_mut() {
            return sig.recv().await;
        }
        std::future::pending().await
    }
}
