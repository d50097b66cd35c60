//! Status stream rendering.
//!
//! All progress output (spinner frames and terminal status lines) goes
//! through a [`StatusStream`]. It defaults to stderr so the primary output
//! stream stays free for returned data; tests swap in an in-memory buffer.

use std::fmt::{Display, Formatter};
use std::io::{self, stderr, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

/// Final state reported when an indicator stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Warning,
    Error,
    Other,
}

impl Status {
    pub fn glyph(self) -> &'static str {
        match self {
            Status::Success => "✓",
            Status::Warning => "⚠",
            Status::Error => "✗",
            Status::Other => "●",
        }
    }

    /// Message used when a stop request carries an empty message.
    pub fn default_message(self) -> &'static str {
        match self {
            Status::Success => "Done",
            Status::Warning => "Warning",
            Status::Error => "Failed",
            Status::Other => "Finished",
        }
    }

    fn color(self) -> Color {
        match self {
            Status::Success => Color::Green,
            Status::Warning => Color::Yellow,
            Status::Error => Color::Red,
            Status::Other => Color::Blue,
        }
    }
}

impl Display for Status {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.glyph())
    }
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Cloneable handle on the line-oriented status output.
#[derive(Clone)]
pub struct StatusStream {
    writer: SharedWriter,
    color: bool,
}

impl StatusStream {
    pub fn stderr(color: bool) -> Self {
        Self::from_writer(Box::new(stderr()), color)
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, color: bool) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            color,
        }
    }

    /// Creates an uncolored stream backed by memory, plus a handle to read it.
    pub fn memory() -> (Self, MemoryBuffer) {
        let buffer = MemoryBuffer::default();
        (Self::from_writer(Box::new(buffer.clone()), false), buffer)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        // A panic while holding the lock can only leave a half-written line.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites the current line with one animation frame.
    pub fn draw_frame(&self, frame: &str, label: &str) -> io::Result<()> {
        let mut out = self.lock();
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        if self.color {
            queue!(out, SetForegroundColor(Color::Cyan), Print(frame), ResetColor)?;
        } else {
            queue!(out, Print(frame))?;
        }
        queue!(out, Print(" "), Print(label))?;
        out.flush()
    }

    pub fn clear_line(&self) -> io::Result<()> {
        let mut out = self.lock();
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        out.flush()
    }

    /// Clears the current line and writes one terminated status line.
    pub fn finish_line(&self, status: Status, message: &str) -> io::Result<()> {
        let message = if message.is_empty() {
            status.default_message()
        } else {
            message
        };

        let mut out = self.lock();
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        if self.color {
            queue!(
                out,
                SetForegroundColor(status.color()),
                Print(status.glyph()),
                ResetColor
            )?;
        } else {
            queue!(out, Print(status.glyph()))?;
        }
        queue!(out, Print(" "), Print(message), Print("\n"))?;
        out.flush()
    }
}

/// In-memory status sink, shared between the stream and the reader.
#[derive(Clone, Default)]
pub struct MemoryBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Terminated lines written so far, with cursor escape codes stripped.
    pub fn finished_lines(&self) -> Vec<String> {
        let contents = self.contents();
        let mut lines: Vec<&str> = contents.split('\n').collect();
        // Whatever follows the last newline is an unterminated frame.
        lines.pop();
        lines.into_iter().map(strip_line_controls).collect()
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps only what follows the last cursor reset sequence on a line.
fn strip_line_controls(line: &str) -> String {
    let clear = "\x1b[2K";
    match line.rfind(clear) {
        Some(index) => line[index + clear.len()..].to_string(),
        None => line.to_string(),
    }
}
