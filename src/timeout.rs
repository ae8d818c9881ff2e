// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A synchronous deadline a caller polls explicitly, for operations that
//! don't block (and so can't be interrupted from outside, unlike
//! [`crate::watchdog::AsyncTimeout`]).

use std::time::{Duration, Instant};
use crate::stream::error::{Error, OperationKind};

/// A deadline and/or duration limit that a long-running, CPU-bound loop polls
/// between steps. Unlike [`crate::watchdog::AsyncTimeout`], nothing enforces
/// this automatically; the caller must call [`Timeout::throw_if_reached`].
#[derive(Clone, Debug)]
pub struct Timeout {
	deadline: Option<Instant>,
	duration: Option<Duration>,
}

impl Timeout {
	/// No limit: every check succeeds.
	pub const NONE: Timeout = Timeout { deadline: None, duration: None };

	/// A limit that expires `duration` from now.
	pub fn after(duration: Duration) -> Self {
		Self { deadline: Some(Instant::now() + duration), duration: Some(duration) }
	}

	/// A limit that expires at a fixed point in time.
	pub fn at(deadline: Instant) -> Self {
		Self { deadline: Some(deadline), duration: None }
	}

	pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Whether the deadline (if any) has passed.
	pub fn has_expired(&self) -> bool {
		self.deadline.is_some_and(|d| Instant::now() >= d)
	}

	/// The time remaining before the deadline, or `None` if there is none.
	/// Saturates to `Duration::ZERO` once the deadline has passed.
	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}

	/// Returns a timed-out error if the deadline has passed.
	pub fn throw_if_reached(&self, op: OperationKind) -> Result<(), Error> {
		if self.has_expired() {
			Err(Error::timed_out(op))
		} else {
			Ok(())
		}
	}
}

impl Default for Timeout {
	fn default() -> Self { Self::NONE }
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn none_never_expires() {
		assert!(!Timeout::NONE.has_expired());
		assert!(Timeout::NONE.throw_if_reached(OperationKind::Unknown).is_ok());
	}

	#[test]
	fn after_expires_once_elapsed() {
		let t = Timeout::after(Duration::from_millis(1));
		sleep(Duration::from_millis(20));
		assert!(t.has_expired());
		assert!(t.throw_if_reached(OperationKind::Unknown).is_err());
	}
}
