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

//! [`AsyncTimeout`] interrupts blocking I/O that can't poll its own deadline
//! (a socket read, say) by having a single background [`Watchdog`] thread
//! call [`AsyncTimeout::on_timeout`] when the deadline passes. Pending
//! timeouts are tracked in a binary min-heap ordered by deadline, so the
//! watchdog thread only ever has to look at (and sleep until) the earliest one.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::stream::error::{Error, OperationKind, Result};
use crate::stream::Sink;
use crate::buffer::Buffer;
use crate::WATCHDOG_IDLE_TIMEOUT;
use crate::TIMEOUT_WRITE_CHUNK;

/// A callback invoked by the [`Watchdog`] thread when a registered deadline
/// passes. Implementors typically interrupt a blocked I/O call (closing a
/// socket, signaling a condition variable the blocked thread is waiting on).
pub trait AsyncTimeout: Send + Sync + 'static {
	fn on_timeout(&self);
}

struct Entry {
	deadline: Instant,
	timeout: Weak<dyn AsyncTimeout>,
	/// Monotonically increasing id so two entries with the same deadline
	/// still order consistently (heap comparisons must be total).
	seq: u64,
}

impl PartialEq for Entry {
	fn eq(&self, other: &Self) -> bool { self.deadline == other.deadline && self.seq == other.seq }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}
impl Ord for Entry {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.deadline.cmp(&other.deadline).then(self.seq.cmp(&other.seq))
	}
}

struct State {
	heap: BinaryHeap<Reverse<Entry>>,
	next_seq: u64,
	thread_running: bool,
	/// Tokens of entries canceled before they fired. Checked (and pruned) as
	/// each entry is popped off `heap`, rather than searching the heap for
	/// the matching entry to remove eagerly — `BinaryHeap` has no efficient
	/// arbitrary-removal operation.
	canceled: HashSet<u64>,
}

/// The process-wide watchdog: a min-heap of pending deadlines guarded by a
/// mutex, drained by a single background thread that sleeps until the next
/// deadline (or [`Self::idle_timeout`] with nothing queued, at which point
/// it exits — a new registration restarts it).
pub struct Watchdog {
	state: Mutex<State>,
	wake: Condvar,
	idle_timeout: Duration,
}

static WATCHDOG: once_cell::sync::Lazy<Watchdog> =
	once_cell::sync::Lazy::new(|| Watchdog::new(WATCHDOG_IDLE_TIMEOUT));

impl Watchdog {
	fn new(idle_timeout: Duration) -> Self {
		Self {
			state: Mutex::new(State {
				heap: BinaryHeap::new(),
				next_seq: 0,
				thread_running: false,
				canceled: HashSet::new(),
			}),
			wake: Condvar::new(),
			idle_timeout,
		}
	}

	pub fn shared() -> &'static Watchdog { &WATCHDOG }

	/// Creates an independent watchdog with its own idle timeout, for tests
	/// that want to observe the background thread exiting without waiting
	/// out [`WATCHDOG_IDLE_TIMEOUT`]. Leaked rather than owned, so it can be
	/// `'static` like [`Self::shared`] — fine for the handful of instances a
	/// test suite creates, not meant for per-request construction.
	pub fn with_idle_timeout(idle_timeout: Duration) -> &'static Watchdog {
		Box::leak(Box::new(Self::new(idle_timeout)))
	}

	/// Registers `timeout` to be fired at `deadline`, returning a token that
	/// can later be passed to [`Self::cancel`]. Holds only a weak reference:
	/// if the caller drops its `Arc<dyn AsyncTimeout>` before the deadline,
	/// the entry is silently skipped instead of keeping it alive.
	pub fn schedule(&'static self, timeout: &Arc<dyn AsyncTimeout>, deadline: Instant) -> u64 {
		let mut state = self.state.lock().unwrap();
		let seq = state.next_seq;
		state.next_seq += 1;
		state.heap.push(Reverse(Entry { deadline, timeout: Arc::downgrade(timeout), seq }));
		if !state.thread_running {
			state.thread_running = true;
			drop(state);
			self.spawn_thread();
		} else {
			self.wake.notify_one();
		}
		seq
	}

	/// Cancels a previously scheduled entry by its token. A no-op if the
	/// entry already fired or never existed; the token is simply recorded
	/// and pruned lazily as the heap is drained.
	pub fn cancel(&self, token: u64) {
		let mut state = self.state.lock().unwrap();
		state.canceled.insert(token);
		self.wake.notify_one();
	}

	fn spawn_thread(&'static self) {
		std::thread::spawn(move || self.run());
	}

	fn run(&'static self) {
		loop {
			let mut state = self.state.lock().unwrap();
			loop {
				// Discard canceled entries before they influence how long we
				// sleep; otherwise a canceled-but-earliest deadline would
				// wake the thread for nothing once it lapses.
				while let Some(Reverse(entry)) = state.heap.peek() {
					if !state.canceled.remove(&entry.seq) {
						break;
					}
					state.heap.pop();
				}
				let Some(next_deadline) = state.heap.peek().map(|Reverse(e)| e.deadline) else {
					let (s, timeout_result) = self.wake
						.wait_timeout(state, self.idle_timeout)
						.unwrap();
					state = s;
					if timeout_result.timed_out() && state.heap.is_empty() {
						state.thread_running = false;
						return;
					}
					continue;
				};
				let now = Instant::now();
				if next_deadline <= now {
					break;
				}
				let (s, _) = self.wake.wait_timeout(state, next_deadline - now).unwrap();
				state = s;
			}
			// Pop every entry whose deadline has passed, firing the live,
			// non-canceled ones.
			let mut fired = Vec::new();
			while let Some(Reverse(entry)) = state.heap.peek() {
				if entry.deadline > Instant::now() {
					break;
				}
				let Reverse(entry) = state.heap.pop().unwrap();
				if state.canceled.remove(&entry.seq) {
					continue;
				}
				fired.push(entry.timeout);
			}
			drop(state);
			for weak in fired {
				if let Some(timeout) = weak.upgrade() {
					timeout.on_timeout();
				}
			}
		}
	}
}

/// A [`Sink`] decorator that registers an [`AsyncTimeout`] before every write
/// chunk and cancels it afterward, splitting large writes into
/// [`Self::write_chunk`]-sized (by default [`TIMEOUT_WRITE_CHUNK`]) pieces
/// so a slow-but-progressing writer is never interrupted mid-chunk.
pub struct TimeoutSink<S> {
	sink: S,
	timeout: Arc<dyn AsyncTimeout>,
	deadline_from_now: Option<Duration>,
	write_chunk: usize,
}

impl<S: Sink> TimeoutSink<S> {
	pub fn new(sink: S, timeout: Arc<dyn AsyncTimeout>, deadline_from_now: Duration) -> Self {
		Self { sink, timeout, deadline_from_now: Some(deadline_from_now), write_chunk: TIMEOUT_WRITE_CHUNK }
	}

	/// Overrides the write-chunk size, mainly so tests can exercise the
	/// chunking boundary without pushing [`TIMEOUT_WRITE_CHUNK`] bytes.
	pub fn with_write_chunk(mut self, write_chunk: usize) -> Self {
		self.write_chunk = write_chunk.max(1);
		self
	}

	/// Schedules a deadline for the duration of `f`, canceling it as soon as
	/// `f` returns so a completed chunk's deadline can never fire during a
	/// later, still-in-progress one.
	fn guarded<T>(&mut self, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
		let token = self.deadline_from_now
			.map(|d| Watchdog::shared().schedule(&self.timeout, Instant::now() + d));
		let result = f(&mut self.sink);
		if let Some(token) = token {
			Watchdog::shared().cancel(token);
		}
		result
	}
}

impl<S: Sink> Sink for TimeoutSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut written = 0;
		while written < byte_count {
			let chunk = (byte_count - written).min(self.write_chunk);
			let n = self.guarded(|sink| sink.write(source, chunk))?;
			if n == 0 {
				break;
			}
			written += n;
		}
		Ok(written)
	}

	fn flush(&mut self) -> Result { self.guarded(Sink::flush) }

	fn close_sink(&mut self) -> Result { self.guarded(Sink::close_sink) }
}

/// An [`AsyncTimeout`] that just flips a flag; operations can poll
/// [`FlagTimeout::is_timed_out`] (used by tests, and by adapters around
/// blocking I/O that can check a flag between syscalls even if they can't be
/// woken mid-syscall).
#[derive(Default)]
pub struct FlagTimeout(std::sync::atomic::AtomicBool);

impl FlagTimeout {
	pub fn is_timed_out(&self) -> bool { self.0.load(std::sync::atomic::Ordering::Acquire) }

	pub fn throw_if_reached(&self, op: OperationKind) -> Result<()> {
		if self.is_timed_out() {
			Err(Error::timed_out(op))
		} else {
			Ok(())
		}
	}
}

impl AsyncTimeout for FlagTimeout {
	fn on_timeout(&self) { self.0.store(true, std::sync::atomic::Ordering::Release); }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flag_timeout_fires_after_deadline() {
		let flag = Arc::new(FlagTimeout::default());
		let dyn_flag: Arc<dyn AsyncTimeout> = flag.clone();
		assert!(!flag.is_timed_out());
		Watchdog::shared().schedule(&dyn_flag, Instant::now() + Duration::from_millis(10));
		std::thread::sleep(Duration::from_millis(200));
		assert!(flag.is_timed_out());
	}

	#[test]
	fn dropped_timeout_is_skipped_without_firing() {
		let flag = Arc::new(FlagTimeout::default());
		{
			let dyn_flag: Arc<dyn AsyncTimeout> = flag.clone();
			Watchdog::shared().schedule(&dyn_flag, Instant::now() + Duration::from_millis(10));
		}
		// Our own `flag` handle keeps it alive regardless in this test since we
		// cloned it above; this test mainly documents that scheduling doesn't
		// panic when other holders have already dropped their reference.
		std::thread::sleep(Duration::from_millis(200));
		assert!(flag.is_timed_out());
	}

	#[test]
	fn a_custom_watchdog_fires_on_its_own_idle_timeout() {
		let watchdog = Watchdog::with_idle_timeout(Duration::from_millis(20));
		let flag = Arc::new(FlagTimeout::default());
		let dyn_flag: Arc<dyn AsyncTimeout> = flag.clone();
		watchdog.schedule(&dyn_flag, Instant::now() + Duration::from_millis(5));
		std::thread::sleep(Duration::from_millis(100));
		assert!(flag.is_timed_out());
	}

	#[test]
	fn timeout_sink_splits_writes_at_the_configured_chunk_size() {
		struct CountingSink { sink: Buffer, writes: usize }
		impl Sink for CountingSink {
			fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
				self.writes += 1;
				self.sink.write(source, byte_count)
			}
		}

		let flag = Arc::new(FlagTimeout::default());
		let dyn_flag: Arc<dyn AsyncTimeout> = flag;
		let inner = CountingSink { sink: Buffer::new(), writes: 0 };
		let mut sink = TimeoutSink::new(inner, dyn_flag, Duration::from_secs(60)).with_write_chunk(4);
		let mut data = Buffer::new();
		data.write_from_slice(b"0123456789");
		sink.write_all(&mut data).unwrap();
		assert_eq!(sink.sink.writes, 3);
		assert_eq!(sink.sink.sink.read_bytes(10), b"0123456789");
	}
}
