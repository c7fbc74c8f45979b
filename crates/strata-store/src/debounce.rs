use std::time::{Duration, Instant};

/// One-shot deadline that is armed by the first event and not extended by
/// later ones, so a steady stream of events still fires once per window.
#[derive(Clone, Copy, Debug)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arms the deadline unless it is already armed. Returns true if this call armed it.
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    /// Returns true exactly once when the armed deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
