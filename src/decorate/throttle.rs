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

//! [`Throttler`] is a rate-limited gate shareable between multiple
//! [`ThrottledSink`]/[`ThrottledSource`] decorators so they can be made to
//! enforce one combined rate, the same mutex-plus-condvar shape
//! [`crate::watchdog::Watchdog`] and [`crate::pipe::Pipe`] use for their own
//! shared, blocking state.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use crate::buffer::Buffer;
use crate::stream::error::Result;
use crate::stream::{Sink, Source};

struct State {
	bytes_per_second: u64,
	max_byte_count: usize,
	/// The instant at which every byte granted so far will have finished
	/// "draining" at the configured rate; `take` blocks until this passes.
	allocated_until: Instant,
}

/// A shared rate limiter: `take(n)` either returns a grant (up to
/// `max_byte_count`) immediately, or parks the caller until enough of the
/// previous grant has notionally drained, or until [`Throttler::reconfigure`]
/// wakes it early.
pub struct Throttler {
	state: Mutex<State>,
	reconfigured: Condvar,
}

impl Throttler {
	pub fn new(bytes_per_second: u64, max_byte_count: usize) -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(State { bytes_per_second, max_byte_count, allocated_until: Instant::now() }),
			reconfigured: Condvar::new(),
		})
	}

	/// Changes the rate and burst size, waking any caller currently parked
	/// in [`Self::take`] so it can re-evaluate against the new limits.
	pub fn reconfigure(&self, bytes_per_second: u64, max_byte_count: usize) {
		let mut state = self.state.lock().unwrap();
		state.bytes_per_second = bytes_per_second;
		state.max_byte_count = max_byte_count;
		self.reconfigured.notify_all();
	}

	/// Requests up to `want` bytes of "permission", blocking until some is
	/// available. Returns the granted count, which may be less than `want`
	/// but is always at least 1 once it returns.
	pub fn take(&self, want: usize) -> usize {
		let mut state = self.state.lock().unwrap();
		loop {
			let now = Instant::now();
			if state.allocated_until <= now {
				let grant = want.min(state.max_byte_count.max(1));
				let seconds = grant as f64 / state.bytes_per_second.max(1) as f64;
				state.allocated_until = now + Duration::from_secs_f64(seconds);
				return grant;
			}
			let wait = state.allocated_until - now;
			let (s, _) = self.reconfigured.wait_timeout(state, wait).unwrap();
			state = s;
		}
	}
}

/// A [`Sink`] that asks a shared [`Throttler`] for permission before each
/// write, so its rate (and that of any sibling sink/source sharing the same
/// throttler) stays under the configured limit.
pub struct ThrottledSink<S> {
	throttler: Arc<Throttler>,
	sink: S,
}

impl<S: Sink> ThrottledSink<S> {
	pub fn new(throttler: Arc<Throttler>, sink: S) -> Self { Self { throttler, sink } }
}

impl<S: Sink> Sink for ThrottledSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let want = byte_count.min(source.size());
		if want == 0 {
			return Ok(0);
		}
		let granted = self.throttler.take(want);
		self.sink.write(source, granted)
	}

	fn flush(&mut self) -> Result { self.sink.flush() }

	fn close_sink(&mut self) -> Result { self.sink.close_sink() }
}

/// A [`Source`] that asks a shared [`Throttler`] for permission before each
/// read.
pub struct ThrottledSource<S> {
	throttler: Arc<Throttler>,
	source: S,
}

impl<S: Source> ThrottledSource<S> {
	pub fn new(throttler: Arc<Throttler>, source: S) -> Self { Self { throttler, source } }
}

impl<S: Source> Source for ThrottledSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let granted = self.throttler.take(byte_count);
		self.source.read(sink, granted)
	}

	fn close_source(&mut self) -> Result { self.source.close_source() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn take_grants_up_to_the_burst_size_immediately() {
		let throttler = Throttler::new(1_000_000, 64);
		assert_eq!(throttler.take(1000), 64);
	}

	#[test]
	fn reconfigure_raises_the_burst_size_for_the_next_take() {
		let throttler = Throttler::new(1_000_000, 16);
		assert_eq!(throttler.take(16), 16);
		throttler.reconfigure(1_000_000, 128);
		// The prior grant's drain window is ~instant at this rate, so this
		// take should see the new, larger burst size rather than blocking.
		std::thread::sleep(Duration::from_millis(5));
		assert_eq!(throttler.take(128), 128);
	}

	#[test]
	fn throttled_sink_forwards_bytes_through_the_gate() {
		let throttler = Throttler::new(1_000_000, 1024);
		let mut sink = ThrottledSink::new(throttler, Buffer::new());
		let mut data = Buffer::new();
		data.write_from_slice(b"hello");
		sink.write_all(&mut data).unwrap();
		assert_eq!(sink.sink.size(), 5);
	}
}
