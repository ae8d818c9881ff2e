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

//! A shared error shape used across the crate's subsystems: an `Error<Op, Kind>`
//! names *what operation* was being attempted and *what kind* of failure occurred,
//! chaining to the underlying cause via [`std::error::Error::source`].

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};

/// A subsystem-specific description of the operation that failed.
pub trait OperationKind: Copy + Debug + Display {
	/// The operation kind used when none more specific is known.
	fn unknown() -> Self;
}

/// A subsystem-specific description of why an operation failed.
pub trait ErrorKind: Copy + Debug + Display {
	/// Wraps a free-form message as an error kind.
	fn other(message: &'static str) -> Self;
}

/// A generic, chained error: `op` names what was being done, `kind` names what
/// went wrong, and `source` optionally carries the underlying cause.
pub struct Error<Op, Kind> {
	op: Op,
	kind: Kind,
	source: Option<Box<dyn StdError + Send + Sync>>,
}

impl<Op: OperationKind, Kind: ErrorKind> Error<Op, Kind> {
	pub fn new(op: Op, kind: Kind, source: Option<Box<dyn StdError + Send + Sync>>) -> Self {
		Self { op, kind, source }
	}

	/// Creates an error with an unknown operation.
	pub fn of_kind(kind: Kind) -> Self {
		Self::new(Op::unknown(), kind, None)
	}

	/// Returns the operation that was being attempted.
	pub fn operation(&self) -> Op { self.op }

	/// Returns the kind of failure.
	pub fn kind(&self) -> Kind { self.kind }

	/// Returns a copy of this error with a more specific operation recorded.
	pub fn with_operation(mut self, op: Op) -> Self {
		self.op = op;
		self
	}
}

impl<Op: OperationKind, Kind: ErrorKind> Debug for Error<Op, Kind> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Error")
		 .field("op", &self.op)
		 .field("kind", &self.kind)
		 .field("source", &self.source.as_ref().map(|_| ".."))
		 .finish()
	}
}

impl<Op: OperationKind, Kind: ErrorKind> Display for Error<Op, Kind> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.op, self.kind)
	}
}

impl<Op: OperationKind, Kind: ErrorKind> StdError for Error<Op, Kind> {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
	}
}

pub mod utf8 {
	//! The UTF-8 validation error surfaced by [`crate::byte_str`] and
	//! [`crate::buffer`] decode paths, carrying the byte offset of the failure
	//! within the logical (possibly segmented) source.

	use std::error::Error as StdError;
	use std::fmt::{self, Display, Formatter};
	use simdutf8::compat::Utf8Error;

	/// A UTF-8 error offset by how many bytes of valid data preceded it, so
	/// multi-segment decodes can report a position relative to the whole input.
	#[derive(Copy, Clone, Debug)]
	pub struct OffsetUtf8Error {
		inner: Utf8Error,
		offset: usize,
	}

	impl OffsetUtf8Error {
		pub fn new(inner: Utf8Error, offset: usize) -> Self { Self { inner, offset } }

		pub fn into_inner(self) -> Utf8Error { self.inner }

		/// The byte offset, into the whole logical input, of the last valid byte.
		pub fn valid_up_to(&self) -> usize { self.offset + self.inner.valid_up_to() }

		/// The length of the invalid sequence, if fully buffered.
		pub fn error_len(&self) -> Option<usize> { self.inner.error_len() }
	}

	impl Display for OffsetUtf8Error {
		fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
			match self.error_len() {
				Some(len) => write!(f, "invalid utf-8 sequence of {len} bytes from index {}", self.valid_up_to()),
				None => write!(f, "incomplete utf-8 byte sequence from index {}", self.valid_up_to()),
			}
		}
	}

	// thiserror's derive would conflict with our hand-written Display above, so
	// the StdError impl is written out instead of derived.
	impl StdError for OffsetUtf8Error {
		fn source(&self) -> Option<&(dyn StdError + 'static)> { Some(&self.inner) }
	}
}

pub use utf8::OffsetUtf8Error;
