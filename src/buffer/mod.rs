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

//! A [`Buffer`] is a mutable queue of bytes backed by a ring of [`Segment`]s.
//! It's both a [`Source`](crate::stream::Source) and a [`Sink`](crate::stream::Sink):
//! moving bytes between two buffers is the zero-copy core of this crate,
//! relinking whole segments and aliasing partial ones instead of copying.

mod options;

use std::collections::VecDeque;
use std::cmp::min;
use std::fmt::{self, Debug, Formatter};
use simdutf8::compat::from_utf8;

use crate::error::OffsetUtf8Error;
use crate::pool::SegmentPool;
use crate::segment::Segment;
use crate::SEGMENT_SIZE;

pub use options::BufferOptions;

macro_rules! gen_int_writes {
	($($name:ident $le_name:ident $ty:ident),+ $(,)?) => {$(
		pub fn $name(&mut self, value: $ty) {
			self.write_from_slice(&value.to_be_bytes());
		}
		pub fn $le_name(&mut self, value: $ty) {
			self.write_from_slice(&value.to_le_bytes());
		}
	)+};
}

macro_rules! gen_int_reads {
	($($s_name:ident $s_le_name:ident $s_ty:ident $u_name:ident $u_le_name:ident $u_ty:ident),+ $(,)?) => {$(
		pub fn $u_name(&mut self) -> Option<$u_ty> {
			self.read_array().map($u_ty::from_be_bytes)
		}
		pub fn $u_le_name(&mut self) -> Option<$u_ty> {
			self.read_array().map($u_ty::from_le_bytes)
		}
		pub fn $s_name(&mut self) -> Option<$s_ty> {
			self.$u_name().map(|n| n as $s_ty)
		}
		pub fn $s_le_name(&mut self) -> Option<$s_ty> {
			self.$u_le_name().map(|n| n as $s_ty)
		}
	)+};
}

/// A growable queue of bytes, the in-memory implementation of both
/// [`Source`](crate::stream::Source) and [`Sink`](crate::stream::Sink).
pub struct Buffer {
	segments: VecDeque<Segment>,
	size: usize,
	options: BufferOptions,
}

impl Buffer {
	pub fn new() -> Self { Self::with_options(BufferOptions::default()) }

	pub fn with_options(options: BufferOptions) -> Self {
		Self { segments: VecDeque::new(), size: 0, options }
	}

	pub fn options(&self) -> &BufferOptions { &self.options }

	/// The number of bytes currently buffered.
	pub fn size(&self) -> usize { self.size }

	pub fn is_empty(&self) -> bool { self.size == 0 }

	/// Drops every segment, recycling them into the shared pool.
	pub fn clear(&mut self) {
		let pool = SegmentPool::shared();
		while let Some(seg) = self.segments.pop_front() {
			pool.recycle(seg);
		}
		self.size = 0;
	}

	/// A snapshot of each segment's length, outermost (head) first. Exposed for
	/// tests and diagnostics that need to observe fragmentation without
	/// depending on segment internals.
	pub fn debug_segments(&self) -> Vec<usize> {
		self.segments.iter().map(Segment::len).collect()
	}

	/// Captures every currently buffered byte into an immutable
	/// [`crate::ByteString`], without consuming it from `self`.
	pub fn snapshot(&mut self) -> crate::ByteString {
		let mut copy = Buffer::new();
		self.copy_to(&mut copy, 0, self.size);
		let size = copy.size();
		crate::ByteString::from(copy.read_bytes(size))
	}

	// -- segment bookkeeping --------------------------------------------

	/// Returns a mutable reference to a tail segment with at least
	/// `min_capacity` bytes free, claiming a fresh one from the pool if the
	/// current tail can't take it (full, or not owner).
	fn writable_segment(&mut self, min_capacity: usize) -> &mut Segment {
		debug_assert!(min_capacity > 0 && min_capacity <= SEGMENT_SIZE);
		let need_fresh = match self.segments.back() {
			Some(tail) => !tail.is_owner() || tail.limit_free() < min_capacity,
			None => true,
		};
		if need_fresh {
			self.segments.push_back(SegmentPool::shared().take());
		}
		self.segments.back_mut().expect("just pushed a segment")
	}

	/// Opportunistically merges the head segment forward if doing so clears
	/// an empty segment, and recycles any segment left fully consumed at the
	/// front. Called after every read so exhausted segments don't linger.
	fn tidy(&mut self) {
		while let Some(front) = self.segments.front() {
			if !front.is_empty() {
				break;
			}
			let seg = self.segments.pop_front().unwrap();
			SegmentPool::shared().recycle(seg);
		}
		if self.fragmentation() > self.options.compact_threshold {
			self.compact();
		}
	}

	/// Total free space trapped in non-tail segments: bytes that can't be
	/// written to because something was read from (or written after) them,
	/// but they aren't the tail.
	fn fragmentation(&self) -> usize {
		let len = self.segments.len();
		if len <= 1 {
			return 0;
		}
		self.segments.iter().take(len - 1).map(Segment::limit_free).sum()
	}

	/// Walks the segment ring merging each segment into its predecessor where
	/// it fits, recycling the ones that empty out completely.
	fn compact(&mut self) {
		let mut i = 1;
		while i < self.segments.len() {
			let (left, right) = self.segments.make_contiguous().split_at_mut(i);
			let prev = left.last_mut().unwrap();
			let cur = &mut right[0];
			if cur.compact_into(prev) {
				let seg = self.segments.remove(i).unwrap();
				SegmentPool::shared().recycle(seg);
			} else {
				i += 1;
			}
		}
	}

	// -- zero-copy transfer -----------------------------------------------

	/// Moves `byte_count` bytes from the front of `self` into the back of
	/// `dst`, relinking whole segments, aliasing shared prefixes, and only
	/// copying when a segment must be split at a non-segment boundary.
	///
	/// Panics if `self` has fewer than `byte_count` bytes; callers clamp to
	/// [`Buffer::size`] first (that's what makes this infallible and why it's
	/// private — the public `Source`/`Sink` surface does the clamping).
	fn move_to(&mut self, dst: &mut Buffer, byte_count: usize) {
		assert!(byte_count <= self.size, "not enough bytes to move");
		let mut remaining = byte_count;
		while remaining > 0 {
			let head_len = self.segments.front().unwrap().len();
			if remaining < head_len {
				let fits = dst.segments.back().map_or(false, |tail| {
					tail.is_owner() && remaining <= tail.effective_free()
				});
				if fits {
					let head = self.segments.front_mut().unwrap();
					let tail = dst.segments.back_mut().unwrap();
					let moved = head.write_to(tail, remaining);
					self.size -= moved;
					dst.size += moved;
					remaining -= moved;
					continue;
				}
				let head = self.segments.front_mut().unwrap();
				let prefix = head.split(remaining);
				self.segments.push_front(prefix);
				continue;
			}

			let mut seg = self.segments.pop_front().unwrap();
			let moved = seg.len();
			self.size -= moved;
			if let Some(tail) = dst.segments.back_mut() {
				if seg.compact_into(tail) {
					SegmentPool::shared().recycle(seg);
					dst.size += moved;
					remaining -= moved;
					continue;
				}
			}
			dst.segments.push_back(seg);
			dst.size += moved;
			remaining -= moved;
		}
		self.tidy();
		dst.tidy();
	}

	/// Moves all of `self`'s bytes to `dst`.
	pub fn move_all_to(&mut self, dst: &mut Buffer) {
		let n = self.size;
		self.move_to(dst, n);
	}

	/// Moves up to `byte_count` bytes to `dst`, clamped to `self.size`, and
	/// returns the number moved.
	pub fn read_into(&mut self, dst: &mut Buffer, byte_count: usize) -> usize {
		let n = min(byte_count, self.size);
		self.move_to(dst, n);
		n
	}

	/// Appends `byte_count` bytes (clamped to `source.size`) from `source`,
	/// consuming them. Returns the number written.
	pub fn write_from(&mut self, source: &mut Buffer, byte_count: usize) -> usize {
		let n = min(byte_count, source.size);
		source.move_to(self, n);
		n
	}

	/// Appends a non-consuming copy of `byte_count` bytes starting `offset`
	/// bytes into `self`, to `dst`. Shares large ranges by aliasing rather
	/// than copying; `self` is left with every byte it had.
	pub fn copy_to(&mut self, dst: &mut Buffer, offset: usize, byte_count: usize) {
		assert!(offset + byte_count <= self.size, "range out of bounds");
		let mut skip = offset;
		let mut remaining = byte_count;
		for seg in self.segments.make_contiguous().iter_mut() {
			if remaining == 0 {
				break;
			}
			let len = seg.len();
			if skip >= len {
				skip -= len;
				continue;
			}
			let take = min(len - skip, remaining);
			let shared = seg.share_range(skip, take);
			dst.segments.push_back(shared);
			dst.size += take;
			remaining -= take;
			skip = 0;
		}
		dst.tidy();
	}

	// -- primitive writes ---------------------------------------------------

	/// Writes as much of `bytes` as fits into the current writable segment and
	/// returns the count actually written; callers loop until all is written.
	fn write_chunk(&mut self, bytes: &[u8]) -> usize {
		let seg = self.writable_segment(min(bytes.len(), SEGMENT_SIZE).max(1));
		seg.push_slice(bytes)
	}

	/// Appends every byte of `bytes`.
	pub fn write_from_slice(&mut self, mut bytes: &[u8]) {
		while !bytes.is_empty() {
			let n = self.write_chunk(bytes);
			self.size += n;
			bytes = &bytes[n..];
		}
	}

	pub fn write_u8(&mut self, value: u8) {
		self.write_from_slice(&[value]);
	}

	pub fn write_i8(&mut self, value: i8) {
		self.write_u8(value as u8);
	}

	gen_int_writes! {
		write_i16 write_i16_le i16,
		write_u16 write_u16_le u16,
		write_i32 write_i32_le i32,
		write_u32 write_u32_le u32,
		write_i64 write_i64_le i64,
		write_u64 write_u64_le u64,
	}

	/// Appends the UTF-8 encoding of `s`.
	pub fn write_utf8(&mut self, s: &str) {
		self.write_from_slice(s.as_bytes());
	}

	// -- primitive reads ----------------------------------------------------

	/// Returns the byte at `offset` without consuming it, or `None` if
	/// `offset >= self.size`.
	pub fn get(&self, offset: usize) -> Option<u8> {
		if offset >= self.size {
			return None;
		}
		let mut skip = offset;
		for seg in &self.segments {
			let len = seg.len();
			if skip < len {
				return Some(seg.data()[skip]);
			}
			skip -= len;
		}
		None
	}

	/// Consumes and returns up to `dst.len()` bytes, returning the count read.
	pub fn read_into_slice(&mut self, dst: &mut [u8]) -> usize {
		let mut off = 0;
		while off < dst.len() {
			let Some(seg) = self.segments.front_mut() else { break };
			let n = seg.pop_into_slice(&mut dst[off..]);
			if n == 0 {
				break;
			}
			off += n;
			self.size -= n;
		}
		self.tidy();
		off
	}

	/// Consumes and returns exactly `count` bytes as an owned `Vec`. Panics if
	/// fewer are buffered; callers needing fallible behavior check
	/// `self.size()` first (mirrors [`crate::stream::BufferedSource::require`]).
	pub fn read_bytes(&mut self, count: usize) -> Vec<u8> {
		assert!(count <= self.size, "not enough bytes buffered");
		let mut out = vec![0u8; count];
		let n = self.read_into_slice(&mut out);
		debug_assert_eq!(n, count);
		out
	}

	pub fn read_u8(&mut self) -> Option<u8> {
		let mut buf = [0u8; 1];
		(self.read_into_slice(&mut buf) == 1).then_some(buf[0])
	}

	pub fn read_i8(&mut self) -> Option<i8> {
		self.read_u8().map(|n| n as i8)
	}

	fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
		let mut buf = [0u8; N];
		(self.read_into_slice(&mut buf) == N).then_some(buf)
	}

	gen_int_reads! {
		read_i16 read_i16_le i16 read_u16 read_u16_le u16,
		read_i32 read_i32_le i32 read_u32 read_u32_le u32,
		read_i64 read_i64_le i64 read_u64 read_u64_le u64,
	}

	/// Consumes and discards `count` bytes.
	pub fn skip(&mut self, count: usize) {
		assert!(count <= self.size, "not enough bytes to skip");
		let mut remaining = count;
		while remaining > 0 {
			let seg = self.segments.front_mut().unwrap();
			let n = min(remaining, seg.len());
			seg.consume(n);
			self.size -= n;
			remaining -= n;
		}
		self.tidy();
	}

	/// Decodes up to `byte_count` bytes (clamped to `self.size`) as UTF-8,
	/// appending the result to `out` and consuming the bytes. The byte count
	/// must land on a UTF-8 boundary; a segment-spanning multi-byte sequence
	/// is handled by copying the tail bytes forward internally via
	/// [`simdutf8`]'s incremental-friendly error offsets.
	pub fn read_utf8(&mut self, out: &mut String, byte_count: usize) -> Result<usize, OffsetUtf8Error> {
		let byte_count = min(byte_count, self.size);
		let bytes = self.read_bytes(byte_count);
		match from_utf8(&bytes) {
			Ok(s) => {
				out.push_str(s);
				Ok(s.len())
			}
			Err(e) => Err(OffsetUtf8Error::new(e, 0)),
		}
	}

	/// The byte offset of the first occurrence of `needle` at or after
	/// `start`, searching across segment boundaries without requiring the
	/// match to lie within a single segment.
	pub fn index_of(&self, needle: &[u8], start: usize) -> Option<usize> {
		if needle.is_empty() || start + needle.len() > self.size {
			return None;
		}
		// A naive scan via `get`, which itself walks segments per call.
		// Buffers here are bounded by available memory, not expected to hold
		// gigabytes, so the O(n*m) worst case (no Boyer-Moore/KMP) is an
		// acceptable simplification over a true cross-segment search.
		'outer: for global in start..=self.size - needle.len() {
			for (j, &b) in needle.iter().enumerate() {
				if self.get(global + j) != Some(b) {
					continue 'outer;
				}
			}
			return Some(global);
		}
		None
	}
}

impl Default for Buffer {
	fn default() -> Self { Self::new() }
}

impl Debug for Buffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Buffer")
		 .field("size", &self.size)
		 .field("segments", &self.segments.len())
		 .finish()
	}
}

impl Drop for Buffer {
	fn drop(&mut self) {
		self.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_then_read_round_trips() {
		let mut buf = Buffer::new();
		buf.write_from_slice(b"hello world");
		assert_eq!(buf.size(), 11);
		let mut out = [0u8; 11];
		let n = buf.read_into_slice(&mut out);
		assert_eq!(n, 11);
		assert_eq!(&out, b"hello world");
		assert!(buf.is_empty());
	}

	#[test]
	fn whole_segment_move_preserves_segment_identity() {
		let mut a = Buffer::new();
		a.write_from_slice(&vec![9u8; SEGMENT_SIZE]);
		let id_before = a.segments.front().unwrap().id();
		let mut b = Buffer::new();
		a.move_all_to(&mut b);
		assert_eq!(a.size(), 0);
		assert_eq!(b.size(), SEGMENT_SIZE);
		assert_eq!(b.segments.front().unwrap().id(), id_before);
	}

	#[test]
	fn partial_move_shares_large_prefixes() {
		let mut a = Buffer::new();
		a.write_from_slice(&vec![1u8; 4000]);
		let mut b = Buffer::new();
		let moved = a.read_into(&mut b, 2000);
		assert_eq!(moved, 2000);
		assert_eq!(a.size(), 2000);
		assert_eq!(b.size(), 2000);
	}

	#[test]
	fn integers_round_trip_big_and_little_endian() {
		let mut buf = Buffer::new();
		buf.write_u32(0xDEADBEEF);
		buf.write_u32_le(0xDEADBEEF);
		assert_eq!(buf.read_u32(), Some(0xDEADBEEF));
		assert_eq!(buf.read_u32_le(), Some(0xDEADBEEF));
	}

	#[test]
	fn index_of_finds_needle_across_segments() {
		let mut buf = Buffer::new();
		buf.write_from_slice(&vec![b'a'; SEGMENT_SIZE - 2]);
		buf.write_from_slice(b"XYhello");
		let pos = buf.index_of(b"XYhello", 0);
		assert_eq!(pos, Some(SEGMENT_SIZE - 2));
	}

	#[test]
	fn copy_to_leaves_source_untouched() {
		let mut a = Buffer::new();
		a.write_from_slice(&vec![5u8; 4000]);
		let mut b = Buffer::new();
		a.copy_to(&mut b, 0, 4000);
		assert_eq!(a.size(), 4000);
		assert_eq!(b.size(), 4000);
	}
}
