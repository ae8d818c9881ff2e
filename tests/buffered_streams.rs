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
use segbuf::stream::{BufferedSink, BufferedSource};
use segbuf::Buffer;

#[test]
fn buffered_sink_emits_complete_segments_and_flush_pushes_the_rest() {
	let mut sink = BufferedSink::new(Buffer::new());
	sink.write_from_slice(&vec![1u8; segbuf::SEGMENT_SIZE + 10]).unwrap();
	sink.emit_complete_segments().unwrap();
	// One full segment has been pushed to the inner sink; the remaining 10
	// bytes are still held in the buffered sink's own buffer.
	assert_eq!(sink.buffer().size(), 10);
	sink.flush().unwrap();
	assert_eq!(sink.buffer().size(), 0);
}

#[test]
fn buffered_source_read_utf8_line_handles_a_missing_trailing_terminator() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"only one line, no newline");
	let mut source = BufferedSource::new(inner);
	let mut line = String::new();
	assert!(!source.read_utf8_line(&mut line).unwrap());
	assert_eq!(line, "only one line, no newline");
}

#[test]
fn index_of_and_select_agree_on_a_known_prefix() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"GET /path HTTP/1.1\r\n");
	let mut source = BufferedSource::new(inner);
	let idx = source.index_of(b" ", 0).unwrap();
	assert_eq!(idx, Some(3));

	let mut inner = Buffer::new();
	inner.write_from_slice(b"POST /path HTTP/1.1\r\n");
	let mut source = BufferedSource::new(inner);
	let choice = source.select(&[b"GET", b"POST", b"PUT"]).unwrap();
	assert_eq!(choice, Some(1));
}

#[test]
fn select_prefers_the_longest_matching_option() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"abc and more");
	let mut source = BufferedSource::new(inner);
	// "ab" is a prefix of the input and appears first, but "abc" also
	// matches and is longer, so it should win.
	let choice = source.select(&[b"ab", b"abc", b"abd"]).unwrap();
	assert_eq!(choice, Some(1));
	assert_eq!(source.read_bytes(9).unwrap(), b" and more");
}

#[test]
fn select_short_circuits_when_nothing_can_match() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"zzz");
	let mut source = BufferedSource::new(inner);
	assert_eq!(source.select(&[b"GET", b"POST"]).unwrap(), None);
}

#[test]
fn read_decimal_long_parses_a_negative_value_and_leaves_the_terminator() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"-42,rest");
	let mut source = BufferedSource::new(inner);
	assert_eq!(source.read_decimal_long().unwrap(), -42);
	assert_eq!(source.read_bytes(5).unwrap(), b",rest");
}

#[test]
fn read_decimal_long_fails_on_i64_overflow() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"99999999999999999999");
	let mut source = BufferedSource::new(inner);
	assert!(source.read_decimal_long().is_err());
}

#[test]
fn read_hex_unsigned_long_parses_and_fails_past_sixteen_digits() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"1A2B,rest");
	let mut source = BufferedSource::new(inner);
	assert_eq!(source.read_hex_unsigned_long().unwrap(), 0x1A2B);
	assert_eq!(source.read_bytes(5).unwrap(), b",rest");

	let mut inner = Buffer::new();
	inner.write_from_slice(b"11111111111111111");
	let mut source = BufferedSource::new(inner);
	assert!(source.read_hex_unsigned_long().is_err());
}

#[test]
fn peek_does_not_advance_the_read_position() {
	let mut inner = Buffer::new();
	inner.write_from_slice(b"peekaboo");
	let mut source = BufferedSource::new(inner);
	let mut peeked = source.peek(4).unwrap();
	assert_eq!(peeked.read_bytes(4), b"peek");
	assert_eq!(source.read_bytes(8).unwrap(), b"peekaboo");
}
