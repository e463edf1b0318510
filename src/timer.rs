// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Retransmission timer.
//!
//! The timer is a monotonic deadline polled by the connection after every
//! channel read. Nothing runs in the background: once cancelled there is no
//! deadline left, so a cancelled timer cannot fire.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    Disarmed,
    At(Instant),
    /// Timeout too large to represent as an `Instant`
    Never,
}

#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    deadline: Deadline,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration) -> Self {
        RetransmitTimer {
            timeout,
            deadline: Deadline::Disarmed,
        }
    }

    /// Start (or restart) the countdown from now.
    pub fn arm(&mut self) {
        self.deadline = match Instant::now().checked_add(self.timeout) {
            Some(deadline) => Deadline::At(deadline),
            None => Deadline::Never,
        };
    }

    pub fn cancel(&mut self) {
        self.deadline = Deadline::Disarmed;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline != Deadline::Disarmed
    }

    /// Report an elapsed deadline once. The timer is disarmed afterwards and
    /// must be rearmed by the caller.
    pub fn expired(&mut self) -> bool {
        match self.deadline {
            Deadline::At(deadline) if Instant::now() >= deadline => {
                self.deadline = Deadline::Disarmed;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_once() {
        let mut timer = RetransmitTimer::new(Duration::ZERO);
        assert!(!timer.expired());

        timer.arm();
        assert!(timer.expired());
        assert!(!timer.expired());
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_cancel_prevents_late_fire() {
        let mut timer = RetransmitTimer::new(Duration::from_millis(5));
        timer.arm();
        timer.cancel();
        std::thread::sleep(Duration::from_millis(10));
        assert!(!timer.expired());
    }

    #[test]
    fn test_not_expired_before_deadline() {
        let mut timer = RetransmitTimer::new(Duration::from_secs(60));
        timer.arm();
        assert!(timer.is_armed());
        assert!(!timer.expired());
    }

    #[test]
    fn test_huge_timeout_never_fires() {
        let mut timer = RetransmitTimer::new(Duration::from_secs(u64::MAX));
        timer.arm();
        assert!(timer.is_armed());
        assert!(!timer.expired());

        timer.cancel();
        assert!(!timer.is_armed());
    }
}
