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

//! A bounded in-memory [`Pipe`] connecting a producer thread to a consumer
//! thread: its [`PipeSink`] half blocks once the shared buffer reaches a
//! capacity limit, its [`PipeSource`] half blocks while the buffer is empty
//! and the sink is still open.

use std::sync::{Arc, Condvar, Mutex};
use crate::buffer::Buffer;
use crate::stream::error::{Error, OperationKind, Result};
use crate::stream::{Sink, Source};

struct Shared {
	buffer: Buffer,
	sink_closed: bool,
	source_closed: bool,
	/// Set by [`Pipe::cancel`]; makes both halves fail instead of blocking.
	canceled: bool,
}

struct Inner {
	state: Mutex<Shared>,
	/// Signaled when the source has consumed data (room freed for the sink)
	/// or when either half closes or the pipe is canceled.
	room_available: Condvar,
	/// Signaled when the sink has written data, closed, or the pipe was
	/// canceled.
	data_available: Condvar,
	max_buffer_size: usize,
}

/// A bounded, in-memory byte pipe with independent [`Sink`] and [`Source`]
/// halves, suitable for handing one half to a producer thread and the other
/// to a consumer.
pub struct Pipe {
	inner: Arc<Inner>,
}

impl Pipe {
	/// Creates a connected pipe whose buffer never exceeds `max_buffer_size`
	/// bytes: writes past that block until the source drains some.
	pub fn new(max_buffer_size: usize) -> (PipeSink, PipeSource) {
		let inner = Arc::new(Inner {
			state: Mutex::new(Shared {
				buffer: Buffer::new(),
				sink_closed: false,
				source_closed: false,
				canceled: false,
			}),
			room_available: Condvar::new(),
			data_available: Condvar::new(),
			max_buffer_size,
		});
		(PipeSink { inner: inner.clone() }, PipeSource { inner })
	}

	/// Cancels both halves of the pipe: pending and future reads/writes on
	/// either half fail immediately instead of blocking or succeeding.
	pub fn cancel(sink: &PipeSink, source: &PipeSource) {
		assert!(Arc::ptr_eq(&sink.inner, &source.inner), "halves belong to different pipes");
		let mut state = sink.inner.state.lock().unwrap();
		state.canceled = true;
		sink.inner.room_available.notify_all();
		sink.inner.data_available.notify_all();
	}
}

fn check_canceled(state: &Shared, op: OperationKind) -> Result {
	if state.canceled {
		Err(Error::new(op, crate::stream::error::ErrorKind::Other("pipe canceled"), None))
	} else {
		Ok(())
	}
}

/// The writable half of a [`Pipe`].
pub struct PipeSink {
	inner: Arc<Inner>,
}

impl Sink for PipeSink {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut written = 0;
		let mut state = self.inner.state.lock().unwrap();
		while written < byte_count {
			check_canceled(&state, OperationKind::BufWrite)?;
			if state.source_closed {
				return Err(Error::closed(OperationKind::BufWrite));
			}
			let room = self.inner.max_buffer_size.saturating_sub(state.buffer.size());
			if room == 0 {
				state = self.inner.room_available.wait(state).unwrap();
				continue;
			}
			let n = state.buffer.write_from(source, (byte_count - written).min(room));
			written += n;
			self.inner.data_available.notify_all();
		}
		Ok(written)
	}

	fn close_sink(&mut self) -> Result {
		let mut state = self.inner.state.lock().unwrap();
		if !state.sink_closed {
			state.sink_closed = true;
			self.inner.data_available.notify_all();
		}
		Ok(())
	}
}

impl Drop for PipeSink {
	fn drop(&mut self) { let _ = self.close_sink(); }
}

/// The readable half of a [`Pipe`].
pub struct PipeSource {
	inner: Arc<Inner>,
}

impl Source for PipeSource {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut state = self.inner.state.lock().unwrap();
		loop {
			check_canceled(&state, OperationKind::BufRead)?;
			if !state.buffer.is_empty() {
				let n = state.buffer.read_into(sink, byte_count);
				self.inner.room_available.notify_all();
				return Ok(n);
			}
			if state.sink_closed {
				return Ok(0);
			}
			state = self.inner.data_available.wait(state).unwrap();
		}
	}

	fn close_source(&mut self) -> Result {
		let mut state = self.inner.state.lock().unwrap();
		if !state.source_closed {
			state.source_closed = true;
			state.buffer.clear();
			self.inner.room_available.notify_all();
		}
		Ok(())
	}
}

impl Drop for PipeSource {
	fn drop(&mut self) { let _ = self.close_source(); }
}

impl PipeSource {
	/// Reads every chunk written to the paired [`PipeSink`] until it closes,
	/// calling `f` with each one as it arrives, and returns the total byte
	/// count folded. Useful for consuming a producer thread's output without
	/// buffering the whole thing up front.
	pub fn fold(&mut self, mut f: impl FnMut(&[u8])) -> Result<usize> {
		let mut total = 0;
		let mut chunk = Buffer::new();
		loop {
			let n = self.read(&mut chunk, usize::MAX)?;
			if n == 0 {
				break;
			}
			let bytes = chunk.read_bytes(n);
			f(&bytes);
			total += n;
		}
		Ok(total)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread;

	#[test]
	fn writes_block_until_source_drains() {
		let (mut sink, mut source) = Pipe::new(8192);
		let producer = thread::spawn(move || {
			let mut data = Buffer::new();
			data.write_from_slice(&vec![7u8; 4096]);
			sink.write_all(&mut data).unwrap();
			sink.close_sink().unwrap();
		});
		let mut out = Buffer::new();
		source.read_all(&mut out).unwrap();
		producer.join().unwrap();
		assert_eq!(out.size(), 4096);
	}

	#[test]
	fn fold_sees_every_byte() {
		let (mut sink, mut source) = Pipe::new(4096);
		let producer = thread::spawn(move || {
			let mut data = Buffer::new();
			data.write_from_slice(b"abcdef");
			sink.write_all(&mut data).unwrap();
			sink.close_sink().unwrap();
		});
		let mut seen = Vec::new();
		let total = source.fold(|chunk| seen.extend_from_slice(chunk)).unwrap();
		producer.join().unwrap();
		assert_eq!(total, 6);
		assert_eq!(seen, b"abcdef");
	}

	#[test]
	fn cancel_unblocks_both_halves() {
		let (sink, source) = Pipe::new(16);
		Pipe::cancel(&sink, &source);
		let mut out = Buffer::new();
		let mut src = source;
		assert!(src.read(&mut out, 1).is_err());
	}
}
