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

//! [`DeflateSink`]/[`InflateSource`] stage bytes through a reusable segment
//! and feed a [`Deflater`]/[`Inflater`], narrow traits implemented here over
//! `flate2::{Compress, Decompress}` in raw (headerless) mode. [`gzip`] layers
//! the gzip container format on top.

pub mod gzip;

use flate2::{Compress, Decompress, FlushCompress, FlushDecompress, Status};
use crate::buffer::Buffer;
use crate::stream::error::{Error, ErrorKind, OperationKind, Result};
use crate::stream::{Sink, Source};
use crate::SEGMENT_SIZE;

/// A compressor fed one chunk at a time: each call both consumes as much of
/// `input` as it can and produces as much of `output` as it can, returning
/// `(consumed, produced, stream_end)`.
pub trait Deflater {
	fn deflate(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<(usize, usize, bool)>;
}

/// A decompressor fed one chunk at a time, with the same `(consumed,
/// produced, stream_end)` contract as [`Deflater`].
pub trait Inflater {
	fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool)>;
}

fn protocol_error(message: &'static str) -> Error {
	Error::new(OperationKind::Other("compression"), ErrorKind::Other(message), None)
}

impl Deflater for Compress {
	fn deflate(&mut self, input: &[u8], output: &mut [u8], finish: bool) -> Result<(usize, usize, bool)> {
		let (before_in, before_out) = (self.total_in(), self.total_out());
		let flush = if finish { FlushCompress::Finish } else { FlushCompress::None };
		let status = self.compress(input, output, flush)
			.map_err(|_| protocol_error("deflate error"))?;
		let consumed = (self.total_in() - before_in) as usize;
		let produced = (self.total_out() - before_out) as usize;
		Ok((consumed, produced, status == Status::StreamEnd))
	}
}

impl Inflater for Decompress {
	fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool)> {
		let (before_in, before_out) = (self.total_in(), self.total_out());
		let status = self.decompress(input, output, FlushDecompress::None)
			.map_err(|_| protocol_error("inflate error"))?;
		let consumed = (self.total_in() - before_in) as usize;
		let produced = (self.total_out() - before_out) as usize;
		Ok((consumed, produced, status == Status::StreamEnd))
	}
}

/// A [`Sink`] that compresses every byte written through a [`Deflater`]
/// before forwarding it to the wrapped sink.
pub struct DeflateSink<D, S> {
	deflater: D,
	sink: S,
	closed: bool,
}

impl<D: Deflater, S: Sink> DeflateSink<D, S> {
	pub fn new(deflater: D, sink: S) -> Self {
		Self { deflater, sink, closed: false }
	}

	pub fn into_inner(self) -> S { self.sink }

	fn pump(&mut self, input: &[u8], finish: bool) -> Result {
		pump_deflate(&mut self.deflater, &mut self.sink, input, finish)
	}
}

/// Feeds `input` through `deflater` until it's entirely consumed, writing
/// produced bytes to `sink` as they're available. Shared by [`DeflateSink`]
/// and [`gzip::GzipSink`], which needs to drive a `Compress` directly so it
/// can write its trailer after the deflate stream ends but before the
/// wrapped sink closes.
pub(crate) fn pump_deflate(deflater: &mut impl Deflater, sink: &mut impl Sink, mut input: &[u8], finish: bool) -> Result {
	let mut out = [0u8; SEGMENT_SIZE];
	loop {
		let (consumed, produced, end) = deflater.deflate(input, &mut out, finish)?;
		if produced > 0 {
			let mut staged = Buffer::new();
			staged.write_from_slice(&out[..produced]);
			sink.write_all(&mut staged)?;
		}
		input = &input[consumed..];
		if finish {
			if end {
				return Ok(());
			}
		} else if input.is_empty() && produced == 0 {
			return Ok(());
		} else if input.is_empty() {
			continue;
		}
		if consumed == 0 && produced == 0 && !input.is_empty() {
			return Err(protocol_error("deflate made no progress"));
		}
	}
}

impl<D: Deflater, S: Sink> Sink for DeflateSink<D, S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let n = byte_count.min(source.size());
		let bytes = source.read_bytes(n);
		self.pump(&bytes, false)?;
		Ok(n)
	}

	/// Sync-flushes the deflater, emitting everything buffered so far as a
	/// complete deflate block, then flushes the wrapped sink.
	fn flush(&mut self) -> Result {
		self.pump(&[], false)?;
		self.sink.flush()
	}

	fn close_sink(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		let pump_result = self.pump(&[], true);
		let close_result = self.sink.close_sink();
		pump_result?;
		close_result
	}
}

/// A [`Source`] that decompresses bytes read from its inner source through
/// an [`Inflater`] before returning them.
pub struct InflateSource<I, S> {
	inflater: I,
	source: S,
	staging: Buffer,
}

impl<I: Inflater, S: Source> InflateSource<I, S> {
	pub fn new(inflater: I, source: S) -> Self {
		Self { inflater, source, staging: Buffer::new() }
	}

	pub fn into_inner(self) -> S { self.source }
}

impl<I: Inflater, S: Source> Source for InflateSource<I, S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		let mut produced_total = 0;
		let mut out = vec![0u8; byte_count.min(SEGMENT_SIZE).max(1)];
		loop {
			if self.staging.is_empty() {
				let n = self.source.read(&mut self.staging, SEGMENT_SIZE)?;
				if n == 0 && self.staging.is_empty() {
					return Ok(produced_total);
				}
			}
			let chunk_len = self.staging.size().min(SEGMENT_SIZE);
			let chunk = self.staging.read_bytes(chunk_len);
			let (consumed, produced, _end) = self.inflater.inflate(&chunk, &mut out)?;
			if consumed < chunk.len() {
				// Put back whatever the inflater didn't consume, ahead of
				// whatever's already staged (which arrived later).
				let mut combined = Buffer::new();
				combined.write_from_slice(&chunk[consumed..]);
				self.staging.move_all_to(&mut combined);
				self.staging = combined;
			}
			if produced > 0 {
				sink.write_from_slice(&out[..produced]);
				produced_total += produced;
				return Ok(produced_total);
			}
			if consumed == 0 {
				return Ok(produced_total);
			}
		}
	}

	fn close_source(&mut self) -> Result { self.source.close_source() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use flate2::Compression;

	#[test]
	fn deflate_then_inflate_round_trips() {
		let mut sink = DeflateSink::new(Compress::new(Compression::default(), false), Buffer::new());
		let mut data = Buffer::new();
		data.write_from_slice(b"the quick brown fox jumps over the lazy dog, repeatedly");
		sink.write_all(&mut data).unwrap();
		sink.close_sink().unwrap();
		let compressed = sink.into_inner();

		let mut source = InflateSource::new(Decompress::new(false), compressed);
		let mut out = Buffer::new();
		source.read_all(&mut out).unwrap();
		assert_eq!(out.read_bytes(out.size()), b"the quick brown fox jumps over the lazy dog, repeatedly");
	}
}
