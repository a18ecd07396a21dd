//! Writes `view` output to the terminal.

use std::io::{self, Write};

use crossterm::{
    cursor::{MoveTo, MoveToColumn, MoveToPreviousLine},
    terminal::{Clear, ClearType},
    QueueableCommand,
};

/// Redraws the whole frame in place, skipping frames identical to the
/// last one written.
#[derive(Debug, Default)]
pub(crate) struct Renderer {
    last: Option<String>,
    lines: usize,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Write `view`. Returns whether anything was written.
    ///
    /// In the alternate screen the frame starts at the top-left corner;
    /// inline, it overwrites the previous frame starting from its first
    /// line. Every line is cleared to its end and everything below the
    /// frame is erased, so shorter frames leave no stale text behind.
    pub(crate) fn render(
        &mut self,
        out: &mut dyn Write,
        view: &str,
        alt_screen: bool,
    ) -> io::Result<bool> {
        if self.last.as_deref() == Some(view) {
            return Ok(false);
        }

        if alt_screen {
            out.queue(MoveTo(0, 0))?;
        } else if self.lines > 1 {
            let up = u16::try_from(self.lines - 1).unwrap_or(u16::MAX);
            out.queue(MoveToPreviousLine(up))?;
        } else {
            out.queue(MoveToColumn(0))?;
        }

        let mut lines = 0;
        for (i, line) in view.split('\n').enumerate() {
            if i > 0 {
                out.write_all(b"\r\n")?;
            }
            out.write_all(line.trim_end_matches('\r').as_bytes())?;
            out.queue(Clear(ClearType::UntilNewLine))?;
            lines += 1;
        }
        out.queue(Clear(ClearType::FromCursorDown))?;
        out.flush()?;

        self.lines = lines;
        self.last = Some(view.to_owned());
        Ok(true)
    }

    /// Forget the last frame, so the next render always writes.
    pub(crate) fn invalidate(&mut self) {
        self.last = None;
    }

    /// Forget the last frame and where it was drawn. The next frame starts
    /// at the current cursor position.
    pub(crate) fn reset(&mut self) {
        self.last = None;
        self.lines = 0;
    }
}
