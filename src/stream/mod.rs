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

//! The [`Source`]/[`Sink`] stream contracts and the [`BufferedSource`]/
//! [`BufferedSink`] decorators that give them typed read/write primitives by
//! pairing them with an owned [`Buffer`].

pub mod error;

use std::cmp::max;
use crate::buffer::Buffer;
use crate::pattern::Pattern;
use crate::SEGMENT_SIZE;
use error::{ErrorKind, OperationKind, Result};
use OperationKind::{BufRead, BufWrite, Flush};

/// A producer of bytes: a file, socket, or another buffer.
pub trait Source {
	/// Reads up to `byte_count` bytes into `sink`, returning the number read,
	/// or `0` at end-of-stream.
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize>;

	/// Reads every remaining byte into `sink`.
	fn read_all(&mut self, sink: &mut Buffer) -> Result<usize> {
		let mut total = 0;
		loop {
			let n = self.read(sink, usize::MAX)?;
			if n == 0 {
				return Ok(total);
			}
			total += n;
		}
	}

	/// Closes the source. Idempotent; streams also close on drop.
	fn close_source(&mut self) -> Result { Ok(()) }
}

/// A consumer of bytes: a file, socket, or another buffer.
pub trait Sink {
	/// Writes `byte_count` bytes (clamped to `source.size()`) from `source`.
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize>;

	/// Writes every byte currently in `source`.
	fn write_all(&mut self, source: &mut Buffer) -> Result<usize> {
		self.write(source, source.size())
	}

	/// Pushes any buffered data to its final destination.
	fn flush(&mut self) -> Result { Ok(()) }

	/// Flushes and closes the sink. Idempotent; streams also close on drop.
	fn close_sink(&mut self) -> Result { self.flush() }
}

impl Source for Buffer {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.is_empty() && byte_count > 0 {
			return Ok(0);
		}
		Ok(self.read_into(sink, byte_count))
	}
}

impl Sink for Buffer {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		Ok(self.write_from(source, byte_count))
	}
}

/// Rounds `byte_count` up to the number of additional bytes [`BufferedSource`]
/// should pull from its underlying source at once, so small requests don't
/// cause one-segment-at-a-time reads from a slow source.
fn fill_request(buffered: usize, requested: usize) -> usize {
	let total = buffered.saturating_add(requested);
	let segments = (total + SEGMENT_SIZE - 1) / SEGMENT_SIZE.max(1);
	(segments * SEGMENT_SIZE).saturating_sub(buffered).max(requested)
}

/// Decorates a [`Source`] with an owned [`Buffer`] and typed read primitives.
pub struct BufferedSource<S> {
	buffer: Buffer,
	source: S,
	closed: bool,
}

impl<S: Source> BufferedSource<S> {
	pub fn new(source: S) -> Self {
		Self { buffer: Buffer::new(), source, closed: false }
	}

	pub fn buffer(&self) -> &Buffer { &self.buffer }

	/// Reads at least `byte_count` additional bytes from the underlying
	/// source into the buffer, short-circuiting once enough is already
	/// buffered. Returns `false` at end-of-stream before satisfying it.
	pub fn request(&mut self, byte_count: usize) -> Result<bool> {
		if self.closed {
			return Ok(false);
		}
		while self.buffer.size() < byte_count {
			let want = fill_request(self.buffer.size(), byte_count - self.buffer.size());
			let n = self.source.read(&mut self.buffer, want)?;
			if n == 0 {
				return Ok(false);
			}
		}
		Ok(true)
	}

	/// Like [`Self::request`], but returns an end-of-stream error instead of
	/// `false`.
	pub fn require(&mut self, byte_count: usize) -> Result {
		if self.request(byte_count)? {
			Ok(())
		} else {
			Err(error::Error::eos(BufRead))
		}
	}

	pub fn read_u8(&mut self) -> Result<u8> {
		self.require(1)?;
		Ok(self.buffer.read_u8().expect("require guaranteed a byte"))
	}

	pub fn read_i8(&mut self) -> Result<i8> { self.read_u8().map(|n| n as i8) }

	pub fn read_into_slice(&mut self, dst: &mut [u8]) -> Result<usize> {
		let mut off = 0;
		while off < dst.len() {
			if !self.request(dst.len() - off)? {
				break;
			}
			let n = self.buffer.read_into_slice(&mut dst[off..]);
			if n == 0 {
				break;
			}
			off += n;
		}
		Ok(off)
	}

	pub fn read_exact(&mut self, dst: &mut [u8]) -> Result {
		self.require(dst.len())?;
		let n = self.buffer.read_into_slice(dst);
		debug_assert_eq!(n, dst.len());
		Ok(())
	}

	pub fn read_bytes(&mut self, byte_count: usize) -> Result<Vec<u8>> {
		self.require(byte_count)?;
		Ok(self.buffer.read_bytes(byte_count))
	}

	pub fn read_byte_str(&mut self, byte_count: usize) -> Result<crate::ByteString> {
		self.read_bytes(byte_count).map(crate::ByteString::from)
	}

	/// Reads UTF-8 text up to the next `\n` (a preceding `\r` is stripped),
	/// returning `true` if a terminator was found, `false` if end-of-stream
	/// was hit first (everything remaining is still appended to `out`).
	pub fn read_utf8_line(&mut self, out: &mut String) -> Result<bool> {
		let mut scanned = 0;
		loop {
			if let Some(pos) = self.buffer.index_of(b"\n", scanned) {
				let mut len = pos;
				if pos > 0 && self.buffer.get(pos - 1) == Some(b'\r') {
					len -= 1;
				}
				self.buffer.read_utf8(out, len).map_err(|e| error::Error::invalid_utf8(BufRead, e))?;
				self.buffer.skip((pos + 1) - len);
				return Ok(true);
			}
			scanned = self.buffer.size();
			if !self.request(scanned + 1)? {
				let remaining = self.buffer.size();
				self.buffer.read_utf8(out, remaining).map_err(|e| error::Error::invalid_utf8(BufRead, e))?;
				return Ok(false);
			}
		}
	}

	/// A strict variant that returns an end-of-stream error instead of `false`
	/// when no terminator is ever found.
	pub fn read_utf8_line_strict(&mut self, out: &mut String) -> Result {
		if self.read_utf8_line(out)? {
			Ok(())
		} else {
			Err(error::Error::eos(BufRead))
		}
	}

	/// Parses an ASCII decimal integer (with an optional leading `-`),
	/// scanning consecutive digits directly off the buffered segment data
	/// (à la [`Self::read_utf8_line`]) and requesting more from the source
	/// only as the scan needs it. The terminating non-digit byte, if any, is
	/// left unconsumed. Fails with an overflow error rather than wrapping if
	/// the value doesn't fit in an `i64`, or if no digits are found at all.
	pub fn read_decimal_long(&mut self) -> Result<i64> {
		self.require(1)?;
		let negative = self.buffer.get(0) == Some(b'-');
		let mut pos = if negative { 1 } else { 0 };
		let mut value: i64 = 0;
		let mut digits = 0usize;
		loop {
			if !self.request(pos + 1)? {
				break;
			}
			let Some(b) = self.buffer.get(pos) else { break };
			if !b.is_ascii_digit() {
				break;
			}
			value = value
				.checked_mul(10)
				.and_then(|v| v.checked_add((b - b'0') as i64))
				.ok_or_else(|| error::Error::new(BufRead, ErrorKind::Other("decimal value overflows i64"), None))?;
			digits += 1;
			pos += 1;
		}
		if digits == 0 {
			return Err(error::Error::new(BufRead, ErrorKind::Other("no decimal digits found"), None));
		}
		self.buffer.skip(pos);
		Ok(if negative { -value } else { value })
	}

	/// Parses an ASCII hexadecimal integer, scanning consecutive hex digits
	/// directly off the buffered segment data and requesting more from the
	/// source only as the scan needs it. The terminating non-hex-digit byte,
	/// if any, is left unconsumed. Fails if the value would take more than 16
	/// hex digits (more than fits in a `u64`), or if no digits are found.
	pub fn read_hex_unsigned_long(&mut self) -> Result<u64> {
		let mut pos = 0;
		let mut value: u64 = 0;
		let mut digits = 0usize;
		loop {
			if !self.request(pos + 1)? {
				break;
			}
			let Some(b) = self.buffer.get(pos) else { break };
			let Some(digit) = (b as char).to_digit(16) else { break };
			digits += 1;
			if digits > 16 {
				return Err(error::Error::new(BufRead, ErrorKind::Other("hex value exceeds 16 digits"), None));
			}
			value = (value << 4) | digit as u64;
			pos += 1;
		}
		if digits == 0 {
			return Err(error::Error::new(BufRead, ErrorKind::Other("no hex digits found"), None));
		}
		self.buffer.skip(pos);
		Ok(value)
	}

	/// The offset of the first occurrence of `needle` at or after `start`,
	/// pulling in more data from the source as needed.
	pub fn index_of(&mut self, needle: &[u8], start: usize) -> Result<Option<usize>> {
		let mut scanned = start;
		loop {
			if let Some(pos) = self.buffer.index_of(needle, start) {
				return Ok(Some(pos));
			}
			scanned = self.buffer.size();
			if !self.request(scanned + needle.len())? {
				return Ok(None);
			}
		}
	}

	/// Returns the index of the option in `options` that's the longest prefix
	/// of the remaining stream, consuming it, or `None` if none match. Walks
	/// every option byte-by-byte in lockstep (as if following a shared trie),
	/// so a short option that's itself a prefix of a longer matching one
	/// doesn't win just for appearing first; ties at the same length resolve
	/// to the earlier option in `options`. Stops pulling more input as soon
	/// as no remaining option could still match.
	pub fn select(&mut self, options: &[&[u8]]) -> Result<Option<usize>> {
		let mut best = options.iter().position(|opt| opt.is_empty());
		let mut live: Vec<usize> = (0..options.len()).collect();
		let mut depth = 0;
		loop {
			live.retain(|&i| options[i].len() > depth);
			if live.is_empty() {
				break;
			}
			if !self.request(depth + 1)? {
				break;
			}
			let Some(byte) = self.buffer.get(depth) else { break };
			live.retain(|&i| options[i][depth] == byte);
			depth += 1;
			if let Some(&i) = live.iter().find(|&&i| options[i].len() == depth) {
				best = Some(i);
			}
		}
		if let Some(i) = best {
			self.buffer.skip(options[i].len());
		}
		Ok(best)
	}

	/// Returns a non-consuming copy of the next `byte_count` bytes, pulling
	/// in more data as needed without advancing the read position.
	pub fn peek(&mut self, byte_count: usize) -> Result<Buffer> {
		self.require(byte_count)?;
		let mut out = Buffer::new();
		self.buffer.copy_to(&mut out, 0, byte_count);
		Ok(out)
	}

	/// Finds the first match of `pattern` at or after `start`, pulling in
	/// more data from the source as needed. Unlike [`Self::index_of`], this
	/// also returns the match length, since patterns like
	/// [`crate::pattern::Whitespace`] can match more than one byte.
	pub fn find(&mut self, pattern: impl Pattern, start: usize) -> Result<Option<(usize, usize)>> {
		let mut scanned = start;
		loop {
			if let Some(m) = crate::pattern::find(&self.buffer, &pattern, start) {
				return Ok(Some(m));
			}
			scanned = self.buffer.size();
			if !self.request(scanned + 1)? {
				return Ok(None);
			}
		}
	}

	/// Reads UTF-8 text up to the first match of `pattern`, consuming the
	/// match itself, and returns whether one was found (mirroring
	/// [`Self::read_utf8_line`], which is this specialized to
	/// [`crate::pattern::LineTerminator`]).
	pub fn read_utf8_until(&mut self, out: &mut String, pattern: impl Pattern) -> Result<bool> {
		match self.find(pattern, 0)? {
			Some((pos, len)) => {
				self.buffer.read_utf8(out, pos).map_err(|e| error::Error::invalid_utf8(BufRead, e))?;
				self.buffer.skip(len);
				Ok(true)
			}
			None => {
				let remaining = self.buffer.size();
				self.buffer.read_utf8(out, remaining).map_err(|e| error::Error::invalid_utf8(BufRead, e))?;
				Ok(false)
			}
		}
	}
}

impl<S: Source> Source for BufferedSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(error::Error::closed(BufRead));
		}
		if self.buffer.is_empty() {
			let n = self.source.read(&mut self.buffer, max(byte_count, SEGMENT_SIZE))?;
			if n == 0 {
				return Ok(0);
			}
		}
		Ok(self.buffer.read_into(sink, byte_count))
	}

	fn close_source(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		self.buffer.clear();
		self.source.close_source()
	}
}

/// Decorates a [`Sink`] with an owned [`Buffer`] and typed write primitives.
pub struct BufferedSink<S> {
	buffer: Buffer,
	sink: S,
	closed: bool,
}

impl<S: Sink> BufferedSink<S> {
	pub fn new(sink: S) -> Self {
		Self { buffer: Buffer::new(), sink, closed: false }
	}

	pub fn buffer(&self) -> &Buffer { &self.buffer }

	pub fn write_from_slice(&mut self, bytes: &[u8]) -> Result {
		if self.closed {
			return Err(error::Error::closed(BufWrite));
		}
		self.buffer.write_from_slice(bytes);
		self.emit_complete_segments()
	}

	pub fn write_u8(&mut self, value: u8) -> Result { self.write_from_slice(&[value]) }

	pub fn write_i8(&mut self, value: i8) -> Result { self.write_u8(value as u8) }

	pub fn write_utf8(&mut self, s: &str) -> Result { self.write_from_slice(s.as_bytes()) }

	/// Writes any whole segments downstream, keeping only a fragment of the
	/// tail buffered. Called automatically after every typed write so the
	/// buffer doesn't grow without bound under steady writing.
	pub fn emit_complete_segments(&mut self) -> Result {
		let complete = self.buffer.size().saturating_sub(SEGMENT_SIZE - 1) / SEGMENT_SIZE * SEGMENT_SIZE;
		if complete > 0 {
			self.sink.write(&mut self.buffer, complete)?;
		}
		Ok(())
	}

	/// Writes everything buffered downstream, without flushing the sink
	/// itself.
	pub fn emit(&mut self) -> Result {
		self.sink.write_all(&mut self.buffer)?;
		Ok(())
	}
}

impl<S: Sink> Sink for BufferedSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.closed {
			return Err(error::Error::closed(BufWrite));
		}
		let n = self.buffer.write_from(source, byte_count);
		self.emit_complete_segments()?;
		Ok(n)
	}

	fn flush(&mut self) -> Result {
		if self.closed {
			return Err(error::Error::closed(Flush));
		}
		self.emit()?;
		self.sink.flush()
	}

	fn close_sink(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		let emit = self.emit();
		let close = self.sink.close_sink();
		emit?;
		close
	}
}

pub use ErrorKind as StreamErrorKind;
pub use OperationKind as StreamOperationKind;
