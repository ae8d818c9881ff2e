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

//! [`GzipSink`]/[`GzipSource`] wrap a raw deflate stream with the gzip
//! container: a ten-byte-minimum header (magic, compression method, flags,
//! mtime, extra flags, OS) and an eight-byte trailer (CRC32 and uncompressed
//! size, both little-endian), written/validated directly against RFC 1952's
//! byte layout. CRC32 is computed with `crc32fast`, the same crate `flate2`
//! uses internally for its own gzip support.

use crc32fast::Hasher as Crc32;
use flate2::{Compress, Compression, Decompress};
use crate::buffer::Buffer;
use crate::stream::error::{Error, ErrorKind, OperationKind, Result};
use crate::stream::{Sink, Source};
use super::{pump_deflate, Inflater};

const MAGIC: [u8; 2] = [0x1f, 0x8b];
const CM_DEFLATE: u8 = 8;
const FLG_FHCRC: u8 = 1 << 1;
const FLG_FEXTRA: u8 = 1 << 2;
const FLG_FNAME: u8 = 1 << 3;
const FLG_FCOMMENT: u8 = 1 << 4;

fn header_error(message: &'static str) -> Error {
	Error::new(OperationKind::Other("gzip header"), ErrorKind::Other(message), None)
}

/// A [`Sink`] that gzip-compresses everything written to it.
pub struct GzipSink<S> {
	deflater: Compress,
	sink: S,
	crc: Crc32,
	input_len: u32,
	closed: bool,
}

impl<S: Sink> GzipSink<S> {
	pub fn new(level: Compression, mut sink: S) -> Result<Self> {
		let header = [MAGIC[0], MAGIC[1], CM_DEFLATE, 0, 0, 0, 0, 0, 0, 0xff];
		let mut buf = Buffer::new();
		buf.write_from_slice(&header);
		sink.write_all(&mut buf)?;
		Ok(Self {
			deflater: Compress::new(level, false),
			sink,
			crc: Crc32::new(),
			input_len: 0,
			closed: false,
		})
	}

	pub fn into_inner(self) -> S { self.sink }
}

impl<S: Sink> Sink for GzipSink<S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let n = byte_count.min(source.size());
		let bytes = source.read_bytes(n);
		self.crc.update(&bytes);
		self.input_len = self.input_len.wrapping_add(bytes.len() as u32);
		pump_deflate(&mut self.deflater, &mut self.sink, &bytes, false)?;
		Ok(n)
	}

	fn flush(&mut self) -> Result {
		pump_deflate(&mut self.deflater, &mut self.sink, &[], false)?;
		self.sink.flush()
	}

	fn close_sink(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		let finish_result = pump_deflate(&mut self.deflater, &mut self.sink, &[], true);
		let trailer_result = finish_result.and_then(|()| {
			let crc = std::mem::replace(&mut self.crc, Crc32::new()).finalize();
			let mut trailer = Buffer::new();
			trailer.write_u32_le(crc);
			trailer.write_u32_le(self.input_len);
			self.sink.write_all(&mut trailer)
		});
		let close_result = self.sink.close_sink();
		trailer_result?;
		close_result
	}
}

/// A [`Source`] that gzip-decompresses everything read from it, validating
/// the header on first use and the trailer at end-of-stream.
pub struct GzipSource<S> {
	inflater: Decompress,
	source: S,
	staging: Buffer,
	crc: Crc32,
	output_len: u32,
	header_read: bool,
	trailer_checked: bool,
}

impl<S: Source> GzipSource<S> {
	pub fn new(source: S) -> Self {
		Self {
			inflater: Decompress::new(false),
			source,
			staging: Buffer::new(),
			crc: Crc32::new(),
			output_len: 0,
			header_read: false,
			trailer_checked: false,
		}
	}

	pub fn into_inner(self) -> S { self.source }

	/// Reads exactly `buf.len()` raw (pre-inflate) bytes, pulling more from
	/// the wrapped source as needed. Used for the header and trailer, which
	/// sit outside the deflate stream itself.
	fn read_exact_raw(&mut self, buf: &mut [u8]) -> Result {
		let mut off = 0;
		while off < buf.len() {
			if self.staging.is_empty() {
				let n = self.source.read(&mut self.staging, buf.len() - off)?;
				if n == 0 {
					return Err(Error::eos(OperationKind::Other("gzip header")));
				}
			}
			off += self.staging.read_into_slice(&mut buf[off..]);
		}
		Ok(())
	}

	fn skip_raw(&mut self, mut len: usize) -> Result {
		let mut scratch = [0u8; 256];
		while len > 0 {
			let take = len.min(scratch.len());
			self.read_exact_raw(&mut scratch[..take])?;
			len -= take;
		}
		Ok(())
	}

	fn skip_cstring_raw(&mut self) -> Result {
		let mut byte = [0u8; 1];
		loop {
			self.read_exact_raw(&mut byte)?;
			if byte[0] == 0 {
				return Ok(());
			}
		}
	}

	fn read_header(&mut self) -> Result {
		let mut header = [0u8; 10];
		self.read_exact_raw(&mut header)?;
		if header[0..2] != MAGIC {
			return Err(header_error("bad magic bytes"));
		}
		if header[2] != CM_DEFLATE {
			return Err(header_error("unsupported compression method"));
		}
		let flags = header[3];
		if flags & FLG_FEXTRA != 0 {
			let mut len = [0u8; 2];
			self.read_exact_raw(&mut len)?;
			self.skip_raw(u16::from_le_bytes(len) as usize)?;
		}
		if flags & FLG_FNAME != 0 {
			self.skip_cstring_raw()?;
		}
		if flags & FLG_FCOMMENT != 0 {
			self.skip_cstring_raw()?;
		}
		if flags & FLG_FHCRC != 0 {
			self.skip_raw(2)?;
		}
		self.header_read = true;
		Ok(())
	}

	fn check_trailer(&mut self) -> Result {
		let mut trailer = [0u8; 8];
		self.read_exact_raw(&mut trailer)?;
		let crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
		let isize = u32::from_le_bytes(trailer[4..8].try_into().unwrap());
		let actual_crc = std::mem::replace(&mut self.crc, Crc32::new()).finalize();
		if crc != actual_crc || isize != self.output_len {
			return Err(header_error("crc32 or length mismatch"));
		}
		self.trailer_checked = true;
		Ok(())
	}
}

impl<S: Source> Source for GzipSource<S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if !self.header_read {
			self.read_header()?;
		}
		let mut out = vec![0u8; byte_count.min(crate::SEGMENT_SIZE).max(1)];
		loop {
			if self.staging.is_empty() {
				let n = self.source.read(&mut self.staging, crate::SEGMENT_SIZE)?;
				if n == 0 && self.staging.is_empty() {
					if !self.trailer_checked {
						self.check_trailer()?;
					}
					return Ok(0);
				}
			}
			let chunk_len = self.staging.size().min(crate::SEGMENT_SIZE);
			let chunk = self.staging.read_bytes(chunk_len);
			let (consumed, produced, _end) = self.inflater.inflate(&chunk, &mut out)?;
			if consumed < chunk.len() {
				let mut combined = Buffer::new();
				combined.write_from_slice(&chunk[consumed..]);
				self.staging.move_all_to(&mut combined);
				self.staging = combined;
			}
			if produced > 0 {
				self.crc.update(&out[..produced]);
				self.output_len = self.output_len.wrapping_add(produced as u32);
				sink.write_from_slice(&out[..produced]);
				return Ok(produced);
			}
			if consumed == 0 {
				return Ok(0);
			}
		}
	}

	fn close_source(&mut self) -> Result { self.source.close_source() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gzip_round_trips_and_validates_trailer() {
		let mut sink = GzipSink::new(Compression::default(), Buffer::new()).unwrap();
		let mut data = Buffer::new();
		data.write_from_slice(b"gzip framed payload, gzip framed payload, gzip framed payload");
		sink.write_all(&mut data).unwrap();
		sink.close_sink().unwrap();
		let framed = sink.into_inner();

		let mut source = GzipSource::new(framed);
		let mut out = Buffer::new();
		source.read_all(&mut out).unwrap();
		assert_eq!(out.read_bytes(out.size()), b"gzip framed payload, gzip framed payload, gzip framed payload");
	}
}
