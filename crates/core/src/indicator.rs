//! Animated status indicator running on a background thread.
//!
//! The indicator is purely cosmetic: every failure to draw, spawn or join is
//! logged at debug level and otherwise ignored, so it can never change the
//! outcome of the operation it accompanies.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::config::SupervisorConfig;
use crate::status::{Status, StatusStream};

/// Braille spinner frames, drawn in order and wrapped around.
pub const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const ELLIPSIS: &str = "...";

struct ActiveIndicator {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owner of at most one running spinner loop.
pub struct Indicator {
    stream: StatusStream,
    delay: Duration,
    max_label_width: usize,
    active: Option<ActiveIndicator>,
}

impl Indicator {
    pub fn new(stream: StatusStream, delay: Duration, max_label_width: usize) -> Self {
        Self {
            stream,
            delay,
            max_label_width,
            active: None,
        }
    }

    pub fn from_config(config: &SupervisorConfig, stream: StatusStream) -> Self {
        Self::new(stream, config.spinner_delay, config.max_label_width)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Starts animating `label`, halting any loop that is already running.
    pub fn start(&mut self, label: &str) {
        self.halt();

        let label = truncate_label(label, self.max_label_width);
        let stream = self.stream.clone();
        let delay = self.delay;
        let (stop, stop_receiver) = mpsc::channel::<()>();

        let spawned = thread::Builder::new()
            .name("tcad-indicator".to_string())
            .spawn(move || {
                let mut frame_index = 0;
                loop {
                    let _ = stream.draw_frame(FRAMES[frame_index], &label);
                    frame_index = (frame_index + 1) % FRAMES.len();

                    // A stop message or a dropped sender both end the loop.
                    match stop_receiver.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            });

        match spawned {
            Ok(handle) => self.active = Some(ActiveIndicator { stop, handle }),
            Err(e) => debug!("Could not start the indicator thread: {e}"),
        }
    }

    /// Stops the loop and writes one terminated status line.
    ///
    /// Writes the line even if no loop was running.
    pub fn stop(&mut self, status: Status, message: &str) {
        self.halt();

        if let Err(e) = self.stream.finish_line(status, message) {
            debug!("Could not write the status line: {e}");
        }
    }

    /// Stops the loop and clears its line without reporting anything.
    fn halt(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        // The loop may already be gone, which is fine.
        let _ = active.stop.send(());
        if active.handle.join().is_err() {
            debug!("The indicator thread panicked");
        }

        if let Err(e) = self.stream.clear_line() {
            debug!("Could not clear the indicator line: {e}");
        }
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Cuts `label` to `max_width` chars, ending it with `...` when cut.
///
/// Widths too narrow for the ellipsis get a plain cut.
pub fn truncate_label(label: &str, max_width: usize) -> String {
    if label.chars().count() <= max_width {
        return label.to_string();
    }

    if max_width <= ELLIPSIS.len() {
        return label.chars().take(max_width).collect();
    }

    let keep = max_width.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = label.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
