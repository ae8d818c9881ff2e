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

use std::io;
use std::result;
use crate::error::{self, OffsetUtf8Error};

pub type Error = error::Error<OperationKind, ErrorKind>;
pub type Result<T = ()> = result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Default, thiserror::Error)]
pub enum OperationKind {
	#[default]
	#[error("unknown operation")]
	Unknown,
	#[error("read from buffered source")]
	BufRead,
	#[error("write to buffered sink")]
	BufWrite,
	#[error("flush sink")]
	Flush,
	#[error("close stream")]
	Close,
	#[error("{0}")]
	Other(&'static str),
}

impl error::OperationKind for OperationKind {
	fn unknown() -> Self { Self::Unknown }
}

#[derive(Copy, Clone, Debug, thiserror::Error)]
pub enum ErrorKind {
	#[error("premature end-of-stream")]
	Eos,
	#[error("I/O error")]
	Io,
	#[error("invalid UTF-8")]
	InvalidUtf8,
	#[error("stream closed")]
	Closed,
	#[error("deadline exceeded")]
	TimedOut,
	#[error("{0}")]
	Other(&'static str),
}

impl error::ErrorKind for ErrorKind {
	fn other(message: &'static str) -> Self { Self::Other(message) }
}

impl Error {
	pub fn eos(op: OperationKind) -> Self { Self::new(op, ErrorKind::Eos, None) }

	pub fn io(op: OperationKind, error: io::Error) -> Self { Self::new(op, ErrorKind::Io, Some(error.into())) }

	pub fn closed(op: OperationKind) -> Self { Self::new(op, ErrorKind::Closed, None) }

	pub fn timed_out(op: OperationKind) -> Self { Self::new(op, ErrorKind::TimedOut, None) }

	pub fn invalid_utf8(op: OperationKind, error: OffsetUtf8Error) -> Self {
		Self::new(op, ErrorKind::InvalidUtf8, Some(Box::new(error)))
	}

	/// Downcasts the chained source to an [`io::Error`], when this error wraps one.
	pub fn io_source(&self) -> Option<&io::Error> {
		std::error::Error::source(self)?.downcast_ref()
	}
}

impl From<io::Error> for Error {
	fn from(value: io::Error) -> Self {
		if value.kind() == io::ErrorKind::UnexpectedEof {
			Self::eos(OperationKind::Unknown)
		} else {
			Self::io(OperationKind::Unknown, value)
		}
	}
}
