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

//! A small pattern API used by [`crate::stream::BufferedSource::find`] and
//! [`crate::stream::BufferedSource::read_utf8_until`]: a [`Pattern`] matches
//! starting at a given offset into a [`Buffer`], returning the matched
//! length. [`Buffer::index_of`] already does the cross-segment byte scan;
//! patterns describe *what* matches at a candidate offset, not how to find
//! one.

use crate::buffer::Buffer;

/// Something that can match a run of bytes starting at a given offset into a
/// [`Buffer`].
pub trait Pattern {
	/// Returns the length of the match starting at `offset`, or `None` if
	/// there's no match there. A `Some(0)` zero-length match is valid (an
	/// always-matching pattern), but is not treated specially by callers.
	fn matches_at(&self, buffer: &Buffer, offset: usize) -> Option<usize>;
}

/// Matches one exact byte.
impl Pattern for u8 {
	fn matches_at(&self, buffer: &Buffer, offset: usize) -> Option<usize> {
		(buffer.get(offset)? == *self).then_some(1)
	}
}

/// Matches an exact byte sequence.
impl Pattern for &[u8] {
	fn matches_at(&self, buffer: &Buffer, offset: usize) -> Option<usize> {
		for (i, &b) in self.iter().enumerate() {
			if buffer.get(offset + i)? != b {
				return None;
			}
		}
		Some(self.len())
	}
}

/// Matches a line terminator: `\r\n`, `\n`, or `\r`, preferring the longer
/// `\r\n` sequence where present.
#[derive(Copy, Clone, Debug, Default)]
pub struct LineTerminator;

impl Pattern for LineTerminator {
	fn matches_at(&self, buffer: &Buffer, offset: usize) -> Option<usize> {
		match buffer.get(offset)? {
			b'\r' if buffer.get(offset + 1) == Some(b'\n') => Some(2),
			b'\r' => Some(1),
			b'\n' => Some(1),
			_ => None,
		}
	}
}

/// Matches one or more whitespace bytes (per [`u8::is_ascii_whitespace`]),
/// as greedily as possible.
#[derive(Copy, Clone, Debug, Default)]
pub struct Whitespace;

impl Pattern for Whitespace {
	fn matches_at(&self, buffer: &Buffer, offset: usize) -> Option<usize> {
		let mut len = 0;
		while buffer.get(offset + len).is_some_and(|b| b.is_ascii_whitespace()) {
			len += 1;
		}
		(len > 0).then_some(len)
	}
}

/// Scans `buffer` from `start`, returning the offset and length of the first
/// match of `pattern`.
pub fn find(buffer: &Buffer, pattern: &impl Pattern, start: usize) -> Option<(usize, usize)> {
	(start..buffer.size()).find_map(|i| pattern.matches_at(buffer, i).map(|len| (i, len)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_slice_pattern_finds_exact_match() {
		let mut buf = Buffer::new();
		buf.write_from_slice(b"the quick brown fox");
		assert_eq!(find(&buf, &b"brown".as_slice(), 0), Some((10, 5)));
	}

	#[test]
	fn line_terminator_prefers_crlf() {
		let mut buf = Buffer::new();
		buf.write_from_slice(b"a\r\nb");
		assert_eq!(find(&buf, &LineTerminator, 0), Some((1, 2)));
	}

	#[test]
	fn whitespace_matches_greedily() {
		let mut buf = Buffer::new();
		buf.write_from_slice(b"a   b");
		assert_eq!(find(&buf, &Whitespace, 0), Some((1, 3)));
	}
}
