//! Single-shot cancellable timers as explicit state machines
//!
//! A timer is either idle or pending with a deadline. Re-arming replaces the
//! deadline; the owner polls it with the current time and gets the payload
//! back exactly once when the deadline has passed.

#[derive(Debug, Clone, PartialEq)]
enum TimerState<T> {
    Idle,
    Pending { deadline: i64, payload: T },
}

/// Deadline timer carrying a payload delivered on expiry
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineTimer<T> {
    state: TimerState<T>,
}

impl<T> Default for DeadlineTimer<T> {
    fn default() -> Self {
        Self {
            state: TimerState::Idle,
        }
    }
}

impl<T> DeadlineTimer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule expiry at `now + delay`, replacing any pending deadline
    pub fn arm(&mut self, now: i64, delay: i64, payload: T) {
        self.state = TimerState::Pending {
            deadline: now.saturating_add(delay.max(0)),
            payload,
        };
    }

    /// Drop any pending deadline
    pub fn cancel(&mut self) {
        self.state = TimerState::Idle;
    }

    /// Deadline of the pending expiry
    pub fn deadline(&self) -> Option<i64> {
        match self.state {
            TimerState::Pending { deadline, .. } => Some(deadline),
            TimerState::Idle => None,
        }
    }

    /// Fire if `now` has reached the deadline, returning `(deadline, payload)`
    pub fn poll(&mut self, now: i64) -> Option<(i64, T)> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                match std::mem::replace(&mut self.state, TimerState::Idle) {
                    TimerState::Pending { deadline, payload } => Some((deadline, payload)),
                    TimerState::Idle => None,
                }
            }
            _ => None,
        }
    }
}
