//! Ordered record of what a scenario printed.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared, append-only list of output lines.
///
/// Cloning yields another handle to the same list, so finalizers can write
/// into the transcript of the scenario that created their instance.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line and mirrors it to the `info` log.
    pub fn say(&self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        self.lines.borrow_mut().push(line);
    }

    /// Returns a finalizer that appends `line` when it runs.
    pub fn on_finalize(&self, line: impl Into<String>) -> impl FnOnce() + 'static {
        let transcript = self.clone();
        let line = line.into();
        move || transcript.say(line)
    }

    /// Returns a copy of the lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Returns true if any line equals `line`.
    pub fn contains(&self, line: &str) -> bool {
        self.lines.borrow().iter().any(|l| l == line)
    }
}
