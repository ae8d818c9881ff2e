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

//! Fixed-capacity byte blocks, the unit of storage in a [`Buffer`](crate::Buffer)
//! and the unit of transfer between buffers.

mod memory;

use std::cmp::min;
use std::sync::Arc;
use crate::{SEGMENT_SIZE, SHARE_MINIMUM};
use memory::Block;

/// A fixed-capacity (`SEGMENT_SIZE`) byte block with read (`pos`) and write
/// (`limit`) cursors.
///
/// A segment's identity (the address of its backing block) is stable across
/// moves between buffers; [`Segment::id`] exposes it for tests that need to
/// observe whether bytes were copied or a segment was moved wholesale.
pub struct Segment {
	data: Block,
	pos: usize,
	limit: usize,
	/// `true` once the backing block may be aliased by another segment. Shared
	/// segments are copy-on-write on the next write and are never recycled.
	shared: bool,
	/// `true` if this segment is allowed to grow `limit` (append more data).
	/// `false` for the prefix produced by [`Segment::split`]: its limit must
	/// stay exactly at the split point forever, since another segment may
	/// depend on that boundary.
	owner: bool,
}

impl Segment {
	/// Creates a new, empty, owned segment around a zeroed block.
	pub(crate) fn fresh() -> Self {
		Self { data: memory::fresh_block(), pos: 0, limit: 0, shared: false, owner: true }
	}

	pub(crate) fn from_block(data: Block, pos: usize, limit: usize, shared: bool, owner: bool) -> Self {
		Self { data, pos, limit, shared, owner }
	}

	/// A stable identity for the backing block, for zero-copy-transfer tests.
	pub fn id(&self) -> usize { Arc::as_ptr(&self.data) as usize }

	pub fn is_empty(&self) -> bool { self.pos == self.limit }
	pub fn is_full(&self) -> bool { self.limit == SEGMENT_SIZE }
	pub fn is_shared(&self) -> bool { self.shared }
	pub fn is_owner(&self) -> bool { self.owner }

	/// Bytes available to read.
	pub fn len(&self) -> usize { self.limit - self.pos }
	/// Bytes available to write before the block is full.
	pub fn limit_free(&self) -> usize { SEGMENT_SIZE - self.limit }

	pub fn pos(&self) -> usize { self.pos }
	pub fn limit(&self) -> usize { self.limit }

	/// Bytes an incoming [`Segment::write_to`] could still fit, counting space
	/// that an in-place [`Segment::shift`] would reclaim from an already-read
	/// prefix. Shared segments can't be shifted, so their `pos` doesn't count.
	pub fn effective_free(&self) -> usize {
		SEGMENT_SIZE - self.limit + if self.shared { 0 } else { self.pos }
	}

	/// Moves the readable bytes down to offset `0`, forking first if shared.
	/// Only ever called on a segment about to receive more data as a
	/// [`Segment::write_to`] target.
	pub fn shift(&mut self) {
		if self.pos == 0 {
			return;
		}
		let (pos, limit) = (self.pos, self.limit);
		let block = memory::make_mut(&mut self.data);
		block.copy_within(pos..limit, 0);
		self.shared = false;
		self.pos = 0;
		self.limit = limit - pos;
	}

	/// The readable slice `data[pos..limit]`.
	pub fn data(&self) -> &[u8] { &self.data[self.pos..self.limit] }

	/// A mutable view of the writable suffix `data[limit..]`, forking the block
	/// first if it's shared. Panics if this segment isn't `owner` — matching the
	/// invariant that a non-owner segment's limit is never mutated.
	pub fn writable(&mut self) -> &mut [u8] {
		assert!(self.owner, "a non-owner segment cannot be written to");
		let limit = self.limit;
		let block = memory::make_mut(&mut self.data);
		self.shared = false;
		&mut block[limit..]
	}

	/// Advances `pos` by `n` after reading `n` bytes.
	pub fn consume(&mut self, n: usize) {
		debug_assert!(self.pos + n <= self.limit);
		self.pos += n;
	}

	/// Advances `limit` by `n` after writing `n` bytes into [`Self::writable`].
	pub fn add(&mut self, n: usize) {
		assert!(self.owner, "a non-owner segment's limit cannot grow");
		debug_assert!(self.limit + n <= SEGMENT_SIZE);
		self.limit += n;
	}

	/// Pushes a slice into the writable suffix, returning the number of bytes
	/// actually written (bounded by remaining capacity).
	pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
		let n = min(self.limit_free(), bytes.len());
		if n > 0 {
			self.writable()[..n].copy_from_slice(&bytes[..n]);
			self.add(n);
		}
		n
	}

	/// Pops readable bytes into `dst`, returning the number of bytes read.
	pub fn pop_into_slice(&mut self, dst: &mut [u8]) -> usize {
		let n = min(self.len(), dst.len());
		if n > 0 {
			dst[..n].copy_from_slice(&self.data()[..n]);
			self.consume(n);
		}
		n
	}

	/// Clears the segment back to empty, forking shared memory so the old data
	/// isn't visible to a fresh owner.
	pub(crate) fn clear(&mut self) {
		self.pos = 0;
		self.limit = 0;
		self.shared = false;
		self.owner = true;
	}

	/// Returns a new segment sharing this segment's first `byte_count` readable
	/// bytes. When `byte_count >= SHARE_MINIMUM`, the returned segment aliases
	/// this one's backing block (both become `shared`); otherwise the bytes are
	/// copied into a fresh segment. `self` is advanced past the shared prefix.
	///
	/// The returned segment is never `owner`: its limit is pinned at the split
	/// point forever, since `self`'s remaining bytes start right after it in the
	/// original block and must not be overwritten.
	pub fn split(&mut self, byte_count: usize) -> Segment {
		debug_assert!(byte_count <= self.len());
		let prefix = if byte_count >= SHARE_MINIMUM {
			self.shared = true;
			Segment::from_block(self.data.clone(), self.pos, self.pos + byte_count, true, false)
		} else {
			let mut fresh = Segment::fresh();
			fresh.push_slice(&self.data()[..byte_count]);
			fresh
		};
		self.pos += byte_count;
		prefix
	}

	/// Returns a new segment sharing `len` bytes starting `rel_start` bytes
	/// into this segment's *readable* range, without consuming from `self`.
	/// Unlike [`Segment::split`], `self` keeps every byte it had; it's simply
	/// marked `shared` so a later write forks rather than corrupting the
	/// aliasing copy. Used by non-consuming reads ([`crate::Buffer::copy_to`]).
	pub fn share_range(&mut self, rel_start: usize, len: usize) -> Segment {
		debug_assert!(rel_start + len <= self.len());
		let start = self.pos + rel_start;
		if len >= SHARE_MINIMUM {
			self.shared = true;
			Segment::from_block(self.data.clone(), start, start + len, true, false)
		} else {
			let mut fresh = Segment::fresh();
			fresh.push_slice(&self.data()[rel_start..rel_start + len]);
			fresh
		}
	}

	/// Moves up to `byte_count` bytes from `self` into `target`'s writable
	/// suffix, copying, shifting `target`'s data down first if that's what it
	/// takes to make room. Returns the number of bytes moved.
	pub fn write_to(&mut self, target: &mut Segment, byte_count: usize) -> usize {
		let n = min(byte_count, min(self.len(), target.effective_free()));
		if n > 0 {
			if target.limit + n > SEGMENT_SIZE {
				target.shift();
			}
			let written = target.push_slice(&self.data()[..n]);
			debug_assert_eq!(written, n);
			self.consume(n);
		}
		n
	}

	/// If this segment's unread bytes would fit in `prev`'s free suffix
	/// (shifting `prev` if needed), copies them there and returns `true` (the
	/// caller should then recycle `self`). No-op (returns `false`) if it
	/// doesn't fit or `prev` has no owner to receive it.
	pub fn compact_into(&mut self, prev: &mut Segment) -> bool {
		if !prev.owner || self.len() > prev.effective_free() {
			return false;
		}
		self.write_to(prev, self.len());
		debug_assert!(self.is_empty());
		true
	}
}

impl Default for Segment {
	fn default() -> Self { Self::fresh() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn split_shares_large_prefixes() {
		let mut a = Segment::fresh();
		a.push_slice(&[7; 4000]);
		let prefix = a.split(2000);
		assert!(prefix.is_shared());
		assert!(a.is_shared());
		assert!(!prefix.is_owner());
		assert_eq!(prefix.len(), 2000);
		assert_eq!(a.len(), 2000);
		assert_eq!(prefix.id(), a.id());
	}

	#[test]
	fn split_copies_small_prefixes() {
		let mut a = Segment::fresh();
		a.push_slice(&[7; 100]);
		let prefix = a.split(10);
		assert!(!prefix.is_shared());
		assert_ne!(prefix.id(), a.id());
		assert_eq!(prefix.len(), 10);
	}

	#[test]
	fn write_to_shifts_when_out_of_room() {
		let mut src = Segment::fresh();
		src.push_slice(&[1; 100]);
		let mut dst = Segment::fresh();
		dst.push_slice(&[2; SEGMENT_SIZE]);
		let mut consumed = vec![0u8; SEGMENT_SIZE - 50];
		dst.pop_into_slice(&mut consumed);
		assert_eq!(dst.limit_free(), 0);
		assert_eq!(dst.effective_free(), SEGMENT_SIZE - 50);
		let moved = src.write_to(&mut dst, 100);
		assert_eq!(moved, 100);
		assert_eq!(dst.pos(), 0);
		assert_eq!(dst.len(), 150);
	}

	#[test]
	fn compact_into_merges_and_reports_fit() {
		let mut prev = Segment::fresh();
		prev.push_slice(&[1; 10]);
		let mut next = Segment::fresh();
		next.push_slice(&[2; 20]);
		assert!(next.compact_into(&mut prev));
		assert!(next.is_empty());
		assert_eq!(prev.len(), 30);
	}
}
