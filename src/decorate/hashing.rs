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

//! [`HashSource`]/[`HashSink`] tee bytes in transit through a `digest::Digest`
//! before delegating to the wrapped stream, so a stream's hash can be taken
//! without a second pass over its data.

use digest::{Digest, FixedOutputReset};
use crate::buffer::Buffer;
use crate::stream::error::Result;
use crate::stream::{Sink, Source};
use crate::ByteString;
use crate::SEGMENT_SIZE;

/// A [`Source`] that hashes the bytes it reads from its inner source.
pub struct HashSource<H, S> {
	hasher: H,
	source: S,
}

/// A [`Sink`] that hashes the bytes written to its inner sink.
pub struct HashSink<H, S> {
	hasher: H,
	sink: S,
}

impl<H: Digest, S> HashSource<H, S> {
	pub fn new(hasher: H, source: S) -> Self { Self { hasher, source } }

	pub fn hasher(&self) -> &H { &self.hasher }

	/// A clone of the current hash, without disturbing hasher state.
	pub fn hash(&self) -> ByteString where H: Clone {
		self.hasher.clone().finalize().as_slice().into()
	}

	/// Takes the current hash and resets the hasher so the next read starts a
	/// fresh digest.
	pub fn take_hash(&mut self) -> ByteString where H: FixedOutputReset {
		self.hasher.finalize_reset().as_slice().into()
	}

	pub fn into_inner(self) -> S { self.source }
}

impl<H: Digest, S> HashSink<H, S> {
	pub fn new(hasher: H, sink: S) -> Self { Self { hasher, sink } }

	pub fn hasher(&self) -> &H { &self.hasher }

	pub fn hash(&self) -> ByteString where H: Clone {
		self.hasher.clone().finalize().as_slice().into()
	}

	pub fn take_hash(&mut self) -> ByteString where H: FixedOutputReset {
		self.hasher.finalize_reset().as_slice().into()
	}

	pub fn into_inner(self) -> S { self.sink }
}

impl<H: Digest, S: Source> Source for HashSource<H, S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut staging = Buffer::new();
		let n = self.source.read(&mut staging, byte_count)?;
		let mut chunk = [0u8; SEGMENT_SIZE];
		while !staging.is_empty() {
			let len = staging.read_into_slice(&mut chunk);
			self.hasher.update(&chunk[..len]);
			sink.write_from_slice(&chunk[..len]);
		}
		Ok(n)
	}

	fn close_source(&mut self) -> Result { self.source.close_source() }
}

impl<H: Digest, S: Sink> Sink for HashSink<H, S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let byte_count = byte_count.min(source.size());
		let mut staging = Buffer::new();
		source.copy_to(&mut staging, 0, byte_count);
		let mut chunk = [0u8; SEGMENT_SIZE];
		while !staging.is_empty() {
			let len = staging.read_into_slice(&mut chunk);
			self.hasher.update(&chunk[..len]);
		}
		self.sink.write(source, byte_count)
	}

	fn flush(&mut self) -> Result { self.sink.flush() }

	fn close_sink(&mut self) -> Result { self.sink.close_sink() }
}

macro_rules! hash_ctor {
	($feature:literal $module:ident $($name:literal $fn:ident $hasher:ident)+) => {$(
		#[cfg(feature = $feature)]
		impl<S: Source> HashSource<$module::$hasher, S> {
			#[doc = concat!("Creates a ", $name, " hash source.")]
			pub fn $fn(source: S) -> Self { Self::new($module::$hasher::default(), source) }
		}
		#[cfg(feature = $feature)]
		impl<S: Sink> HashSink<$module::$hasher, S> {
			#[doc = concat!("Creates a ", $name, " hash sink.")]
			pub fn $fn(sink: S) -> Self { Self::new($module::$hasher::default(), sink) }
		}
	)+};
}

hash_ctor! {
	"md5" md5
	"MD5" md5 Md5
}

hash_ctor! {
	"sha1" sha1
	"SHA-1" sha1 Sha1
}

hash_ctor! {
	"sha2" sha2
	"SHA-224" sha224 Sha224
	"SHA-256" sha256 Sha256
	"SHA-384" sha384 Sha384
	"SHA-512" sha512 Sha512
}

hash_ctor! {
	"sha3" sha3
	"SHA3-224" sha3_224 Sha3_224
	"SHA3-256" sha3_256 Sha3_256
	"SHA3-384" sha3_384 Sha3_384
	"SHA3-512" sha3_512 Sha3_512
}

#[cfg(test)]
mod tests {
	use super::*;
	use sha2::Sha256;

	#[test]
	fn hash_source_tees_bytes_through_to_the_sink() {
		let mut input = Buffer::new();
		input.write_from_slice(b"hello world");
		let mut hashed = HashSource::new(Sha256::default(), input);
		let mut out = Buffer::new();
		hashed.read(&mut out, usize::MAX).unwrap();
		assert_eq!(out.size(), 11);

		let mut expected = Sha256::default();
		expected.update(b"hello world");
		assert_eq!(hashed.hash(), ByteString::from(expected.finalize().as_slice()));
	}

	#[test]
	fn hash_sink_tees_bytes_before_forwarding() {
		let mut hashed = HashSink::new(Sha256::default(), Buffer::new());
		let mut src = Buffer::new();
		src.write_from_slice(b"abc");
		hashed.write_all(&mut src).unwrap();

		let mut expected = Sha256::default();
		expected.update(b"abc");
		assert_eq!(hashed.hash(), ByteString::from(expected.finalize().as_slice()));
		assert_eq!(hashed.into_inner().size(), 3);
	}
}
