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

use pretty_assertions::assert_eq;
use segbuf::pattern::{LineTerminator, Whitespace};
use segbuf::stream::BufferedSource;
use segbuf::Buffer;

fn buf(bytes: &[u8]) -> Buffer {
	let mut b = Buffer::new();
	b.write_from_slice(bytes);
	b
}

#[test]
fn find_locates_a_pattern_pulled_in_across_several_reads() {
	// A source that trickles in one byte at a time, so `find` must request
	// more data from it repeatedly before the terminator appears.
	struct Trickle(std::collections::VecDeque<u8>);
	impl segbuf::stream::Source for Trickle {
		fn read(&mut self, sink: &mut Buffer, _byte_count: usize) -> segbuf::stream::error::Result<usize> {
			match self.0.pop_front() {
				Some(b) => {
					sink.write_u8(b);
					Ok(1)
				}
				None => Ok(0),
			}
		}
	}

	let mut source = BufferedSource::new(Trickle(b"first line\r\nsecond".iter().copied().collect()));
	let found = source.find(LineTerminator, 0).unwrap();
	assert_eq!(found, Some((10, 2)));
}

#[test]
fn read_utf8_until_consumes_the_match_and_stops_before_the_remainder() {
	let mut source = BufferedSource::new(buf(b"alpha\nbeta"));
	let mut line = String::new();
	assert!(source.read_utf8_until(&mut line, LineTerminator).unwrap());
	assert_eq!(line, "alpha");

	let mut rest = String::new();
	assert!(!source.read_utf8_until(&mut rest, LineTerminator).unwrap());
	assert_eq!(rest, "beta");
}

#[test]
fn whitespace_pattern_skips_a_run_of_separators() {
	let mut source = BufferedSource::new(buf(b"a   b"));
	assert_eq!(source.find(Whitespace, 0).unwrap(), Some((1, 3)));
}
