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

//! The sharable, fixed-size byte block backing a [`Segment`](super::Segment).
//!
//! Memory is reference-counted copy-on-write: reading is always free, but the
//! first write after a share forks the block via [`Arc::make_mut`]. Because the
//! segment pool is process-wide, the block is an `Arc` rather than the `Rc` a
//! thread-confined pool would use.

use std::sync::Arc;
use crate::SEGMENT_SIZE;

pub(crate) type Block = Arc<[u8; SEGMENT_SIZE]>;

pub(crate) fn fresh_block() -> Block {
	Arc::new([0; SEGMENT_SIZE])
}

/// Returns a mutable view into `block`, forking it first if it's aliased.
pub(crate) fn make_mut(block: &mut Block) -> &mut [u8; SEGMENT_SIZE] {
	Arc::make_mut(block)
}
