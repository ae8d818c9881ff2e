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

//! An immutable, cheaply-cloned byte string: [`ByteString`] is to `[u8]` what
//! `String` is to `str`, and [`ByteStr`] is the corresponding borrowed,
//! unsized view, the way `str` relates to `String`.

use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::{Deref, RangeBounds, Bound};
use std::sync::Arc;

use base64::Engine;
use base64::prelude::{BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD};
use simdutf8::compat::from_utf8;

use crate::error::OffsetUtf8Error;

/// A borrowed view of a byte string, analogous to `str`'s relationship with
/// `String`. Always reachable through a reference (`&ByteStr`), never owned
/// directly.
#[repr(transparent)]
#[derive(Eq, PartialEq, Hash)]
pub struct ByteStr([u8]);

impl ByteStr {
	pub fn new(bytes: &[u8]) -> &ByteStr {
		// SAFETY: `ByteStr` is `#[repr(transparent)]` over `[u8]`.
		unsafe { &*(bytes as *const [u8] as *const ByteStr) }
	}

	pub fn as_bytes(&self) -> &[u8] { &self.0 }

	pub fn len(&self) -> usize { self.0.len() }

	pub fn is_empty(&self) -> bool { self.0.is_empty() }

	pub fn get(&self, index: usize) -> Option<u8> { self.0.get(index).copied() }

	pub fn starts_with(&self, prefix: &[u8]) -> bool { self.0.starts_with(prefix) }

	pub fn ends_with(&self, suffix: &[u8]) -> bool { self.0.ends_with(suffix) }

	/// The offset of the first occurrence of `needle` at or after `start`.
	pub fn index_of(&self, needle: &[u8], start: usize) -> Option<usize> {
		if needle.is_empty() || start > self.len() {
			return None;
		}
		self.0[start..].windows(needle.len()).position(|w| w == needle).map(|i| i + start)
	}

	pub fn substr(&self, range: impl RangeBounds<usize>) -> &ByteStr {
		let start = match range.start_bound() {
			Bound::Included(&n) => n,
			Bound::Excluded(&n) => n + 1,
			Bound::Unbounded => 0,
		};
		let end = match range.end_bound() {
			Bound::Included(&n) => n + 1,
			Bound::Excluded(&n) => n,
			Bound::Unbounded => self.len(),
		};
		ByteStr::new(&self.0[start..end])
	}

	/// Decodes the bytes as UTF-8, failing on the first invalid sequence.
	pub fn utf8(&self) -> Result<&str, OffsetUtf8Error> {
		from_utf8(&self.0).map_err(|e| OffsetUtf8Error::new(e, 0))
	}

	pub fn to_upper_ascii(&self) -> ByteString {
		ByteString::from(self.0.to_ascii_uppercase())
	}

	pub fn to_lower_ascii(&self) -> ByteString {
		ByteString::from(self.0.to_ascii_lowercase())
	}

	pub fn base64(&self) -> String { BASE64_STANDARD_NO_PAD.encode(&self.0) }

	pub fn base64_url(&self) -> String { BASE64_URL_SAFE_NO_PAD.encode(&self.0) }

	pub fn hex_lower(&self) -> String { base16ct::lower::encode_string(&self.0) }

	pub fn hex_upper(&self) -> String { base16ct::upper::encode_string(&self.0) }

	pub fn to_byte_string(&self) -> ByteString { ByteString::from(self.0.to_vec()) }
}

// Written out rather than derived since `ByteStr` is an unsized wrapper over
// `[u8]`, for the same lexicographic ordering `[u8]` itself already has.
impl Ord for ByteStr {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.0.cmp(&other.0) }
}

impl PartialOrd for ByteStr {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Debug for ByteStr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "b\"")?;
		for &b in &self.0 {
			for c in std::ascii::escape_default(b) {
				write!(f, "{}", c as char)?;
			}
		}
		write!(f, "\"")
	}
}

impl Deref for ByteStr {
	type Target = [u8];
	fn deref(&self) -> &[u8] { &self.0 }
}

impl PartialEq<[u8]> for ByteStr {
	fn eq(&self, other: &[u8]) -> bool { &self.0 == other }
}

/// An owned, immutable, `Arc`-backed byte string. Cloning is O(1): it shares
/// the backing allocation rather than copying it, the same trade [`Segment`]
/// makes for large shared prefixes.
#[derive(Clone, Eq)]
pub struct ByteString(Arc<[u8]>);

impl ByteString {
	pub fn empty() -> Self { Self(Arc::from([].as_slice())) }

	pub fn as_byte_str(&self) -> &ByteStr { ByteStr::new(&self.0) }

	/// Decodes base64-encoded bytes to a new byte string.
	pub fn from_base64<T: AsRef<[u8]>>(input: T) -> Result<Self, base64::DecodeError> {
		Self::from_base64_with(input, &BASE64_STANDARD_NO_PAD)
	}

	/// Decodes URL-safe base64-encoded bytes to a new byte string.
	pub fn from_base64_url<T: AsRef<[u8]>>(input: T) -> Result<Self, base64::DecodeError> {
		Self::from_base64_with(input, &BASE64_URL_SAFE_NO_PAD)
	}

	/// Decodes base64-encoded bytes to a new byte string with a custom `decoder`.
	pub fn from_base64_with<T: AsRef<[u8]>>(input: T, decoder: &impl base64::Engine) -> Result<Self, base64::DecodeError> {
		decoder.decode(input).map(Into::into)
	}

	/// Decodes hex bytes to a new byte string.
	pub fn from_hex<T: AsRef<[u8]>>(input: T) -> Result<Self, base16ct::Error> {
		base16ct::mixed::decode_vec(input).map(Into::into)
	}
}

impl Deref for ByteString {
	type Target = ByteStr;
	fn deref(&self) -> &ByteStr { self.as_byte_str() }
}

impl Debug for ByteString {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Debug::fmt(self.as_byte_str(), f) }
}

impl PartialEq for ByteString {
	fn eq(&self, other: &Self) -> bool { self.0 == other.0 }
}

impl PartialEq<ByteStr> for ByteString {
	fn eq(&self, other: &ByteStr) -> bool { &*self.0 == other.as_bytes() }
}

impl Ord for ByteString {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.as_byte_str().cmp(other.as_byte_str()) }
}

impl PartialOrd for ByteString {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Hash for ByteString {
	fn hash<H: Hasher>(&self, state: &mut H) { (*self.0).hash(state) }
}

impl From<Vec<u8>> for ByteString {
	fn from(value: Vec<u8>) -> Self { Self(Arc::from(value)) }
}

impl From<&[u8]> for ByteString {
	fn from(value: &[u8]) -> Self { Self(Arc::from(value)) }
}

impl From<String> for ByteString {
	fn from(value: String) -> Self { Self::from(value.into_bytes()) }
}

impl From<&str> for ByteString {
	fn from(value: &str) -> Self { Self::from(value.as_bytes()) }
}

impl AsRef<[u8]> for ByteString {
	fn as_ref(&self) -> &[u8] { &self.0 }
}

impl FromIterator<u8> for ByteString {
	fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
		Self::from(iter.into_iter().collect::<Vec<u8>>())
	}
}

#[cfg(feature = "hash")]
mod hashing {
	use digest::Digest;
	use super::{ByteStr, ByteString};

	impl ByteStr {
		pub fn hash(&self, mut digest: impl Digest) -> ByteString {
			digest.update(self.as_bytes());
			ByteString::from(digest.finalize().as_slice())
		}
	}

	impl ByteString {
		pub fn hash(&self, digest: impl Digest) -> ByteString {
			self.as_byte_str().hash(digest)
		}
	}

	macro_rules! hash_fn {
		($name:literal $fn:ident $module:ident $hasher:ident) => {
			#[doc = concat!("Computes a ", $name, " digest of the byte string.")]
			pub fn $fn(&self) -> ByteString {
				self.hash($module::$hasher::default())
			}
		};
	}

	macro_rules! hash {
		($feature:literal $module:ident $($name:literal $fn:ident $hasher:ident)+) => {
			#[cfg(feature = $feature)]
			impl ByteStr {
				$(hash_fn! { $name $fn $module $hasher })+
			}
			#[cfg(feature = $feature)]
			impl ByteString {
				$(
				#[doc = concat!("Computes a ", $name, " digest of the byte string.")]
				pub fn $fn(&self) -> ByteString { self.as_byte_str().$fn() }
				)+
			}
		};
	}

	hash! {
		"md5" md5
		"MD5" md5 Md5
	}

	hash! {
		"sha1" sha1
		"SHA-1" sha1 Sha1
	}

	hash! {
		"sha2" sha2
		"SHA-224" sha224 Sha224
		"SHA-256" sha256 Sha256
		"SHA-384" sha384 Sha384
		"SHA-512" sha512 Sha512
	}

	hash! {
		"sha3" sha3
		"SHA3-224" sha3_224 Sha3_224
		"SHA3-256" sha3_256 Sha3_256
		"SHA3-384" sha3_384 Sha3_384
		"SHA3-512" sha3_512 Sha3_512
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn equality_and_hashing_agree_across_views() {
		let a = ByteString::from(b"hello".as_slice());
		let b = ByteString::from(b"hello".as_slice());
		assert_eq!(a, b);
		assert_eq!(a.as_byte_str(), b.as_byte_str());
	}

	#[test]
	fn substr_and_index_of() {
		let s = ByteString::from(b"hello world".as_slice());
		assert_eq!(s.index_of(b"world", 0), Some(6));
		assert_eq!(s.substr(6..), ByteStr::new(b"world"));
	}

	#[test]
	fn case_conversion_is_ascii_only() {
		let s = ByteString::from(b"Hello".as_slice());
		assert_eq!(s.to_upper_ascii().as_bytes(), b"HELLO");
		assert_eq!(s.to_lower_ascii().as_bytes(), b"hello");
	}

	#[test]
	fn hex_and_base64_round_trip_via_crates() {
		let s = ByteString::from(b"\x00\x01\xff".as_slice());
		assert_eq!(s.hex_lower(), "0001ff");
		assert_eq!(s.hex_upper(), "0001FF");
		assert!(!s.base64().is_empty());
	}

	#[test]
	fn base64_and_hex_decode_then_encode_round_trips() {
		let s = ByteString::from(b"round trip me".as_slice());
		assert_eq!(ByteString::from_base64(s.base64()).unwrap(), s);
		assert_eq!(ByteString::from_base64_url(s.base64_url()).unwrap(), s);
		assert_eq!(ByteString::from_hex(s.hex_lower()).unwrap(), s);
	}

	#[test]
	fn ordering_is_byte_lexicographic() {
		let a = ByteString::from(b"abc".as_slice());
		let b = ByteString::from(b"abd".as_slice());
		let c = ByteString::from(b"ab".as_slice());
		assert!(a < b);
		assert!(c < a);
	}
}
