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

//! A process-wide, lock-free segment freelist, sharded by thread to bound
//! contention.
//!
//! Each bucket is a Treiber stack guarded by a sentinel "lock" pointer used as
//! the CAS word: a thread that observes the sentinel gives up immediately and
//! falls through to the allocator rather than spinning or blocking. A lost race
//! degrades to an extra allocation (`take`) or a dropped segment (`recycle`),
//! never to blocking another thread.

use std::cell::Cell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use once_cell::sync::Lazy;
use crate::segment::Segment;
use crate::SEGMENT_POOL_MAX_SIZE_PER_BUCKET;

/// A pooled segment plus freelist bookkeeping.
struct Node {
	seg: Segment,
	/// Cumulative byte count held by this bucket at and below this node,
	/// letting [`SegmentPool::recycle`] check the bucket's size bound in O(1)
	/// without a separate atomic counter (see spec open question on the
	/// per-bucket byte count).
	bucket_bytes: usize,
	next: *mut Node,
}

/// Sentinel used as a CAS lock word. Never dereferenced; a real `Box<Node>`
/// allocation is always aligned above 1, so this can't collide with one.
fn lock_sentinel() -> *mut Node { 1usize as *mut Node }

struct Bucket {
	head: AtomicPtr<Node>,
}

impl Bucket {
	const fn new() -> Self { Self { head: AtomicPtr::new(ptr::null_mut()) } }

	/// Claims a segment from this bucket, or `None` under contention or when
	/// empty (the caller should allocate fresh in that case).
	fn take(&self) -> Option<Segment> {
		let lock = lock_sentinel();
		let first = self.head.swap(lock, Ordering::Acquire);
		if first == lock {
			// Another thread is mid-operation; don't wait for it.
			return None;
		}
		if first.is_null() {
			self.head.store(ptr::null_mut(), Ordering::Release);
			return None;
		}
		// SAFETY: `first` was produced by a prior `Box::into_raw` in `recycle`
		// and is reachable from exactly one place (the head we just swapped
		// out), so we have exclusive ownership of it.
		let node = unsafe { Box::from_raw(first) };
		self.head.store(node.next, Ordering::Release);
		Some(node.seg)
	}

	/// Recycles `seg` into this bucket. Drops it instead of pushing when the
	/// bucket is contended, full, or loses the final CAS — recycling never
	/// retries or blocks.
	fn recycle(&self, seg: Segment) {
		let lock = lock_sentinel();
		let first = self.head.load(Ordering::Acquire);
		if first == lock {
			return;
		}
		// SAFETY: `first` is either null or a live node owned by the bucket;
		// we only read `bucket_bytes`, which is never torn by a concurrent
		// writer (the writer would have to win a CAS on `head` first).
		let first_bytes = if first.is_null() { 0 } else { unsafe { (*first).bucket_bytes } };
		if first_bytes >= SEGMENT_POOL_MAX_SIZE_PER_BUCKET {
			return;
		}
		let node = Box::into_raw(Box::new(Node {
			seg,
			bucket_bytes: first_bytes + crate::SEGMENT_SIZE,
			next: first,
		}));
		if self.head.compare_exchange(first, node, Ordering::AcqRel, Ordering::Relaxed).is_err() {
			// Lost the race. Reclaim the node we just allocated and drop its
			// segment; we do not retry.
			let node = unsafe { Box::from_raw(node) };
			drop(node);
		}
	}
}

// `Node` is only ever reached through an `AtomicPtr`, which is itself
// unconditionally `Send + Sync`; a `Segment` is `Send + Sync` (its shared
// block is an `Arc<[u8; N]>`), so sharing `Bucket`s across threads is sound.

/// The process-wide segment freelist.
pub struct SegmentPool {
	buckets: Box<[Bucket]>,
}

static POOL: Lazy<SegmentPool> = Lazy::new(SegmentPool::new);

thread_local! {
	static THREAD_SLOT: Cell<Option<usize>> = Cell::new(None);
}
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

fn thread_slot() -> usize {
	THREAD_SLOT.with(|slot| {
		if let Some(s) = slot.get() {
			return s;
		}
		let s = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
		slot.set(Some(s));
		s
	})
}

impl SegmentPool {
	fn new() -> Self {
		let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
		let count = (2 * cores).next_power_of_two().max(1);
		let buckets = (0..count).map(|_| Bucket::new()).collect();
		tracing::debug!(bucket_count = count, "segment pool initialized");
		Self { buckets }
	}

	/// The process-wide pool instance.
	pub fn shared() -> &'static SegmentPool { &POOL }

	fn bucket(&self) -> &Bucket {
		let idx = thread_slot() & (self.buckets.len() - 1);
		&self.buckets[idx]
	}

	/// Claims a segment, recycled or freshly allocated.
	pub fn take(&self) -> Segment {
		self.bucket().take().unwrap_or_else(Segment::fresh)
	}

	/// Recycles a segment, or drops it if it's shared, the bucket is
	/// contended, or the bucket is already at its size limit.
	pub fn recycle(&self, mut seg: Segment) {
		if seg.is_shared() {
			return;
		}
		seg.clear();
		self.bucket().recycle(seg);
	}
}

impl Drop for Bucket {
	fn drop(&mut self) {
		// Only runs for the process-wide `POOL` at process exit (or in tests
		// constructing a throwaway pool); drain to avoid leaking `Node`s.
		let mut cur = *self.head.get_mut();
		while !cur.is_null() && cur != lock_sentinel() {
			let node = unsafe { Box::from_raw(cur) };
			cur = node.next;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn take_recycle_roundtrip() {
		let pool = SegmentPool::new();
		let seg = pool.take();
		assert!(seg.is_empty());
		pool.recycle(seg);
		let seg2 = pool.take();
		assert!(seg2.is_empty());
	}

	#[test]
	fn shared_segments_are_never_pooled() {
		let pool = SegmentPool::new();
		let mut a = pool.take();
		a.push_slice(&[1; 2000]);
		let shared = a.split(1500);
		assert!(shared.is_shared());
		pool.recycle(shared);
		// A fresh bucket, so nothing should have been retained.
		let b = pool.take();
		assert!(b.is_empty());
	}

	#[test]
	fn bucket_byte_count_is_bounded() {
		let pool = SegmentPool::new();
		let n = SEGMENT_POOL_MAX_SIZE_PER_BUCKET / crate::SEGMENT_SIZE + 8;
		let segs: Vec<_> = (0..n).map(|_| pool.take()).collect();
		for seg in segs {
			pool.recycle(seg);
		}
		let bucket = pool.bucket();
		let head = bucket.head.load(Ordering::Acquire);
		assert!(!head.is_null());
		let bytes = unsafe { (*head).bucket_bytes };
		assert!(bytes <= SEGMENT_POOL_MAX_SIZE_PER_BUCKET);
	}
}
