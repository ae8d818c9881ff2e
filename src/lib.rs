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

//! ## How it works
//!
//! Data is written to and read from reusable bits of memory called *segments*.
//! When a segment is consumed, it's returned to a process-wide *pool*. To write
//! data, segments are claimed from this pool; when the pool is exhausted, segments
//! are allocated fresh. The pool is lock-free: claiming and recycling a segment
//! never blocks a thread, it only ever falls through to the allocator under
//! contention.
//!
//! ### Segments
//!
//! Segments are fixed-size chunks of memory arranged in a buffer's segment ring.
//! Memory within a segment can be owned or shared between segments (copy-on-write),
//! avoiding mem-copies when bytes move between buffers: a whole segment can be
//! unlinked from one buffer and relinked into another, and a prefix of a segment
//! can be shared by aliasing rather than copying.
//!
//! ### Streams
//!
//! [`Source`](stream::Source) and [`Sink`](stream::Sink) are the two stream
//! contracts; [`BufferedSource`](stream::buffered::BufferedSource) and
//! [`BufferedSink`](stream::buffered::BufferedSink) decorate a raw stream with an
//! owned [`Buffer`], exposing typed read/write primitives. [`AsyncTimeout`] and the
//! background [`watchdog`] interrupt otherwise-uninterruptible blocking I/O at a
//! deadline.

pub mod error;
pub mod segment;
pub mod pool;
pub mod buffer;
pub mod byte_str;
pub mod stream;
pub mod timeout;
pub mod watchdog;
pub mod pipe;
pub mod decorate;
pub mod pattern;

pub use buffer::{Buffer, BufferOptions};
pub use byte_str::{ByteStr, ByteString};
pub use segment::Segment;
pub use error::Error;

/// The fixed capacity of a [`Segment`], in bytes.
pub const SEGMENT_SIZE: usize = 8192;
/// The minimum byte count at which [`Segment::split`] aliases memory instead of
/// copying it.
pub const SHARE_MINIMUM: usize = 1024;
/// The maximum number of bytes a single [`pool::SegmentPool`] bucket retains.
pub const SEGMENT_POOL_MAX_SIZE_PER_BUCKET: usize = 65536;
/// The chunk size [`timeout::AsyncTimeout`]-wrapped sinks split writes into, so a
/// slow-but-progressing writer is never canceled mid-chunk.
pub const TIMEOUT_WRITE_CHUNK: usize = 65536;
/// How long the [`watchdog`] thread idles with an empty queue before exiting.
pub const WATCHDOG_IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
