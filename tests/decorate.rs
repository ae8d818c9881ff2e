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
use segbuf::stream::{Sink, Source};
use segbuf::Buffer;

fn buf(bytes: &[u8]) -> Buffer {
	let mut b = Buffer::new();
	b.write_from_slice(bytes);
	b
}

#[cfg(feature = "sha2")]
#[test]
fn hash_source_and_sink_agree_on_the_same_digest() {
	use segbuf::decorate::hashing::{HashSink, HashSource};

	let mut hash_sink = HashSink::sha256(Buffer::new());
	let mut data = buf(b"golden path bytes");
	hash_sink.write_all(&mut data).unwrap();
	let via_sink = hash_sink.hash();

	let mut hash_source = HashSource::sha256(buf(b"golden path bytes"));
	let mut out = Buffer::new();
	hash_source.read_all(&mut out).unwrap();
	let via_source = hash_source.hash();

	assert_eq!(via_sink, via_source);
}

#[cfg(feature = "cipher-aes")]
#[test]
fn aes_round_trips_a_message_spanning_several_blocks() {
	use aes::Aes128;
	use cipher::KeyInit;
	use segbuf::decorate::cipher::{CipherSink, CipherSource, Decryptor, Encryptor};

	let key = [0x42u8; 16];
	let plaintext = b"a message that spans more than a single sixteen-byte AES block";

	let encryptor = Encryptor::new(Aes128::new(&key.into()));
	let mut sink = CipherSink::new(encryptor, Buffer::new());
	let mut input = buf(plaintext);
	sink.write_all(&mut input).unwrap();
	sink.close_sink().unwrap();
	let ciphertext = sink.into_inner();
	assert_ne!(ciphertext.debug_segments().len(), 0);

	let decryptor = Decryptor::new(Aes128::new(&key.into()));
	let mut source = CipherSource::new(decryptor, ciphertext);
	let mut out = Buffer::new();
	source.read_all(&mut out).unwrap();
	assert_eq!(out.read_bytes(out.size()), plaintext);
}

#[cfg(feature = "gzip")]
#[test]
fn deflate_then_gzip_both_round_trip_the_same_payload() {
	use flate2::{Compress, Compression, Decompress};
	use segbuf::decorate::deflate::gzip::{GzipSink, GzipSource};
	use segbuf::decorate::deflate::{DeflateSink, InflateSource};

	let payload = b"repeated, repeated, repeated, compressible payload text";

	let mut deflate_sink = DeflateSink::new(Compress::new(Compression::best(), false), Buffer::new());
	let mut input = buf(payload);
	deflate_sink.write_all(&mut input).unwrap();
	deflate_sink.close_sink().unwrap();
	let mut inflate_source = InflateSource::new(Decompress::new(false), deflate_sink.into_inner());
	let mut deflated_out = Buffer::new();
	inflate_source.read_all(&mut deflated_out).unwrap();
	assert_eq!(deflated_out.read_bytes(deflated_out.size()), payload);

	let mut gzip_sink = GzipSink::new(Compression::default(), Buffer::new()).unwrap();
	let mut input = buf(payload);
	gzip_sink.write_all(&mut input).unwrap();
	gzip_sink.close_sink().unwrap();
	let mut gzip_source = GzipSource::new(gzip_sink.into_inner());
	let mut gzip_out = Buffer::new();
	gzip_source.read_all(&mut gzip_out).unwrap();
	assert_eq!(gzip_out.read_bytes(gzip_out.size()), payload);
}

#[cfg(feature = "gzip")]
#[test]
fn gzip_source_rejects_a_corrupted_trailer() {
	use flate2::Compression;
	use segbuf::decorate::deflate::gzip::{GzipSink, GzipSource};

	let mut sink = GzipSink::new(Compression::default(), Buffer::new()).unwrap();
	let mut input = buf(b"validate the trailer");
	sink.write_all(&mut input).unwrap();
	sink.close_sink().unwrap();
	let mut framed = sink.into_inner();

	// Flip a bit in the trailer's CRC32 field (the last 8 bytes).
	let mut bytes = framed.read_bytes(framed.size());
	let len = bytes.len();
	bytes[len - 1] ^= 0xff;
	framed.write_from_slice(&bytes);

	let mut source = GzipSource::new(framed);
	let mut out = Buffer::new();
	assert!(source.read_all(&mut out).is_err());
}

#[test]
fn throttled_source_never_exceeds_its_configured_burst_per_read() {
	use segbuf::decorate::throttle::{Throttler, ThrottledSource};

	let throttler = Throttler::new(1_000_000, 64);
	let mut source = ThrottledSource::new(throttler, buf(&vec![3u8; 4096]));
	let mut out = Buffer::new();
	let n = source.read(&mut out, 4096).unwrap();
	assert_eq!(n, 64);
}
