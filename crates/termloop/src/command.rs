//! Deferred work returned from [`Model::update`].
//!
//! A [`Command`] is a one-shot closure that runs off the event loop and
//! produces a single [`Msg`], which is then fed back into `update`.
//! `Option<Command>` is the "maybe some work" currency used throughout:
//! `None` means nothing to do.
//!
//! [`Model::update`]: crate::program::Model::update

use std::fmt;
use std::process;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::event::Msg;
use crate::terminal::ExecError;

/// A unit of deferred work producing one message.
///
/// Invoked at most once.
pub struct Command(Box<dyn FnOnce() -> Msg + Send + 'static>);

impl Command {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> Msg + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// A command that immediately yields `msg`.
    pub fn message(msg: Msg) -> Self {
        Self::new(move || msg)
    }

    /// Run the work on the current thread.
    #[inline]
    pub fn run(self) -> Msg {
        (self.0)()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Command(..)")
    }
}

/// Drop `None`s; zero left is `None`, exactly one is returned untouched.
fn normalize<I>(units: I) -> Result<Vec<Command>, Option<Command>>
where
    I: IntoIterator<Item = Option<Command>>,
{
    let mut units: Vec<Command> = units.into_iter().flatten().collect();
    match units.len() {
        0 => Err(None),
        1 => Err(units.pop()),
        _ => Ok(units),
    }
}

/// Run commands concurrently, one thread each.
///
/// The composed command blocks until every unit has reported and yields
/// [`Msg::Batch`] with the results in completion order.
pub fn batch<I>(units: I) -> Option<Command>
where
    I: IntoIterator<Item = Option<Command>>,
{
    let units = match normalize(units) {
        Ok(units) => units,
        Err(single) => return single,
    };

    Some(Command::new(move || {
        let count = units.len();
        let (tx, rx) = mpsc::sync_channel(count);
        let mut handles = Vec::with_capacity(count);

        for unit in units {
            let tx = tx.clone();
            let worker = move || {
                // The receiver outlives every worker.
                let _ = tx.send(unit.run());
            };
            // A worker that fails to spawn contributes no result.
            match thread::Builder::new()
                .name("termloop-batch".to_string())
                .spawn(worker)
            {
                Ok(handle) => handles.push(handle),
                Err(err) => warn!(target: "termloop::command", %err, "failed to spawn batch worker"),
            }
        }
        drop(tx);

        let results: Vec<Msg> = rx.iter().collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!(target: "termloop::command", "batch worker panicked");
            }
        }
        debug!(target: "termloop::command", count = results.len(), "batch complete");
        Msg::Batch(results)
    }))
}

/// Run commands one after another on the invoking thread.
///
/// The composed command yields [`Msg::Sequence`] with the results in input
/// order.
pub fn sequence<I>(units: I) -> Option<Command>
where
    I: IntoIterator<Item = Option<Command>>,
{
    let units = match normalize(units) {
        Ok(units) => units,
        Err(single) => return single,
    };

    Some(Command::new(move || {
        Msg::Sequence(units.into_iter().map(Command::run).collect())
    }))
}

/// A command that asks the program to quit.
pub fn quit() -> Command {
    Command::message(Msg::Quit)
}

/// A command that sleeps for `duration` and then calls `f` with the time
/// it woke up.
///
/// For a repeating timer, return another `tick` when handling the message.
pub fn tick<F>(duration: Duration, f: F) -> Command
where
    F: FnOnce(Instant) -> Msg + Send + 'static,
{
    Command::new(move || {
        thread::sleep(duration);
        f(Instant::now())
    })
}

/// Callback invoked with the outcome of an exec request.
type ExecCallback = Box<dyn FnOnce(Result<(), ExecError>) -> Msg + Send + 'static>;

/// A pending request to hand the terminal to a child process.
///
/// Produced by [`exec_process`] and consumed by the event loop.
pub struct ExecRequest {
    child: Option<process::Command>,
    on_exit: ExecCallback,
}

impl ExecRequest {
    pub(crate) fn into_parts(self) -> (Option<process::Command>, ExecCallback) {
        (self.child, self.on_exit)
    }
}

impl fmt::Debug for ExecRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecRequest")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

/// A command that suspends the UI, runs `child` with the real terminal,
/// then resumes and delivers `on_exit(result)`.
///
/// A `None` child is reported through `on_exit` as
/// [`ExecError::MissingCommand`] without touching the terminal.
pub fn exec_process<F>(child: Option<process::Command>, on_exit: F) -> Command
where
    F: FnOnce(Result<(), ExecError>) -> Msg + Send + 'static,
{
    Command::new(move || {
        Msg::Exec(ExecRequest {
            child,
            on_exit: Box::new(on_exit),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn value(n: u32) -> Option<Command> {
        Some(Command::new(move || Msg::custom(n)))
    }

    fn values(msg: Msg) -> Vec<u32> {
        let inner = match msg {
            Msg::Batch(inner) | Msg::Sequence(inner) => inner,
            other => panic!("expected a composite message, got {other:?}"),
        };
        inner
            .iter()
            .map(|m| *m.downcast_ref::<u32>().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_compositions_are_none() {
        assert!(batch(Vec::new()).is_none());
        assert!(batch([None, None]).is_none());
        assert!(sequence(Vec::new()).is_none());
        assert!(sequence([None]).is_none());
    }

    #[test]
    fn test_single_unit_is_returned_unchanged() {
        let msg = batch([None, value(7), None]).unwrap().run();
        assert_eq!(msg.downcast_ref::<u32>(), Some(&7));

        let msg = sequence([value(9)]).unwrap().run();
        assert_eq!(msg.downcast_ref::<u32>(), Some(&9));
    }

    #[test]
    fn test_sequence_preserves_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let step = |expected: usize, n: u32| {
            let order = Arc::clone(&order);
            Some(Command::new(move || {
                assert_eq!(order.fetch_add(1, Ordering::SeqCst), expected);
                Msg::custom(n)
            }))
        };

        let msg = sequence([step(0, 1), None, step(1, 2), step(2, 3)])
            .unwrap()
            .run();
        assert_eq!(values(msg), vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_runs_concurrently_and_collects_all() {
        // Each unit waits for the other, so this only completes if both run
        // at the same time.
        let barrier = Arc::new(Barrier::new(2));
        let unit = |n: u32| {
            let barrier = Arc::clone(&barrier);
            Some(Command::new(move || {
                barrier.wait();
                Msg::custom(n)
            }))
        };

        let mut results = values(batch([unit(1), unit(2)]).unwrap().run());
        results.sort_unstable();
        assert_eq!(results, vec![1, 2]);
    }

    #[test]
    fn test_batch_survives_panicking_unit() {
        let msg = batch([
            value(1),
            Some(Command::new(|| panic!("boom"))),
            value(3),
        ])
        .unwrap()
        .run();
        let mut results = values(msg);
        results.sort_unstable();
        assert_eq!(results, vec![1, 3]);
    }

    #[test]
    fn test_quit_and_tick() {
        assert!(quit().run().is_quit());

        let start = Instant::now();
        let msg = tick(Duration::from_millis(10), move |at| {
            Msg::custom(at.duration_since(start))
        })
        .run();
        assert!(*msg.downcast_ref::<Duration>().unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn test_exec_process_produces_request() {
        let msg = exec_process(None, |_| Msg::Quit).run();
        let Msg::Exec(request) = msg else {
            panic!("expected exec request");
        };
        let (child, on_exit) = request.into_parts();
        assert!(child.is_none());
        assert!(on_exit(Err(ExecError::MissingCommand)).is_quit());
    }
}
