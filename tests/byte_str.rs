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
use segbuf::ByteString;

#[test]
fn base64_and_hex_agree_on_the_same_bytes() {
	let bs = ByteString::from(b"hello world".as_slice());
	assert_eq!(bs.base64(), "aGVsbG8gd29ybGQ");
	assert_eq!(bs.hex_lower(), "68656c6c6f20776f726c64");
	assert_eq!(bs.hex_upper(), "68656C6C6F20776F726C64");
}

#[test]
fn substr_is_a_view_not_a_copy_of_the_same_bytes() {
	let bs = ByteString::from(b"the quick brown fox".as_slice());
	let sub = bs.substr(4..9);
	assert_eq!(sub.as_bytes(), b"quick");
}

#[test]
fn ascii_case_conversion_round_trips() {
	let bs = ByteString::from(b"MixedCase".as_slice());
	assert_eq!(bs.to_upper_ascii().as_bytes(), b"MIXEDCASE");
	assert_eq!(bs.to_lower_ascii().as_bytes(), b"mixedcase");
}

#[cfg(feature = "sha2")]
#[test]
fn sha256_matches_a_known_vector() {
	let bs = ByteString::from(b"abc".as_slice());
	assert_eq!(
		bs.sha256().hex_lower(),
		"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
	);
}

#[test]
fn decoders_invert_their_matching_encoders() {
	let bs = ByteString::from(b"round trip through text".as_slice());
	assert_eq!(ByteString::from_base64(bs.base64()).unwrap(), bs);
	assert_eq!(ByteString::from_base64_url(bs.base64_url()).unwrap(), bs);
	assert_eq!(ByteString::from_hex(bs.hex_upper()).unwrap(), bs);
}

#[test]
fn ordering_sorts_byte_strings_lexicographically() {
	let mut values = vec![
		ByteString::from(b"banana".as_slice()),
		ByteString::from(b"apple".as_slice()),
		ByteString::from(b"ap".as_slice()),
	];
	values.sort();
	assert_eq!(values, vec![
		ByteString::from(b"ap".as_slice()),
		ByteString::from(b"apple".as_slice()),
		ByteString::from(b"banana".as_slice()),
	]);
}

#[test]
fn cloning_shares_the_backing_allocation() {
	let a = ByteString::from(b"shared".as_slice());
	let b = a.clone();
	assert_eq!(a, b);
	assert_eq!(a.as_bytes().as_ptr(), b.as_bytes().as_ptr());
}
