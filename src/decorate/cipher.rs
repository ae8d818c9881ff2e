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

//! [`CipherSink`]/[`CipherSource`] feed bytes through a [`BlockCipher`] before
//! writing them downstream (or after reading them upstream). [`BlockCipher`]
//! is narrow on purpose: [`Encryptor`]/[`Decryptor`] are the only
//! implementations, adapting RustCrypto's `cipher::BlockEncryptMut`/
//! `BlockDecryptMut` with PKCS#7 padding, so a caller who wants a different
//! padding or a streaming mode can implement the trait directly instead of
//! forking this module.

use cipher::{Block, BlockDecryptMut, BlockEncryptMut, BlockSizeUser};
use crate::buffer::Buffer;
use crate::stream::error::{Error, ErrorKind, OperationKind, Result};
use crate::stream::{Sink, Source};

/// The narrow interface [`CipherSink`]/[`CipherSource`] require: feed input
/// through in block-sized pieces, and finalize (applying or stripping
/// padding) exactly once.
pub trait BlockCipher {
	/// The cipher's block size, in bytes. Input chunks must not exceed the
	/// segment size, which is always a multiple of any reasonable block size.
	fn block_size(&self) -> usize;

	/// Processes as many whole blocks of `input` as it contains, writing the
	/// result to `output` (which must be at least as long as `input`) and
	/// returning the number of bytes written.
	fn update(&mut self, input: &[u8], output: &mut [u8]) -> usize;

	/// The number of output bytes [`Self::update`] would produce for
	/// `input_len` more input bytes.
	fn get_output_size(&self, input_len: usize) -> usize {
		input_len / self.block_size() * self.block_size()
	}

	/// Processes the final, possibly-partial block, applying or stripping
	/// padding, and returns the number of bytes written to `output`.
	fn do_final(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

/// Encrypts with PKCS#7 padding: [`BlockCipher::do_final`] always emits
/// exactly one block, padding a short (possibly empty) final chunk out to the
/// block size.
pub struct Encryptor<C>(C);

impl<C: BlockEncryptMut + BlockSizeUser> Encryptor<C> {
	pub fn new(cipher: C) -> Self { Self(cipher) }
}

impl<C: BlockEncryptMut + BlockSizeUser> BlockCipher for Encryptor<C> {
	fn block_size(&self) -> usize { C::block_size() }

	fn update(&mut self, input: &[u8], output: &mut [u8]) -> usize {
		let bs = self.block_size();
		let whole = input.len() / bs * bs;
		let mut written = 0;
		for chunk in input[..whole].chunks_exact(bs) {
			let mut block = Block::<C>::default();
			block.copy_from_slice(chunk);
			self.0.encrypt_block_mut(&mut block);
			output[written..written + bs].copy_from_slice(&block);
			written += bs;
		}
		written
	}

	fn do_final(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
		let bs = self.block_size();
		debug_assert!(input.len() < bs);
		let pad = (bs - input.len()) as u8;
		let mut block = Block::<C>::default();
		block[..input.len()].copy_from_slice(input);
		for b in &mut block[input.len()..] {
			*b = pad;
		}
		self.0.encrypt_block_mut(&mut block);
		output[..bs].copy_from_slice(&block);
		Ok(bs)
	}
}

/// Decrypts and strips PKCS#7 padding. Because the padding can only be
/// identified on the last block, a [`CipherSource`] wrapping a `Decryptor`
/// must hold back one decrypted block until it knows whether more input
/// remains.
pub struct Decryptor<C>(C);

impl<C: BlockDecryptMut + BlockSizeUser> Decryptor<C> {
	pub fn new(cipher: C) -> Self { Self(cipher) }
}

impl<C: BlockDecryptMut + BlockSizeUser> BlockCipher for Decryptor<C> {
	fn block_size(&self) -> usize { C::block_size() }

	fn update(&mut self, input: &[u8], output: &mut [u8]) -> usize {
		let bs = self.block_size();
		let whole = input.len() / bs * bs;
		let mut written = 0;
		for chunk in input[..whole].chunks_exact(bs) {
			let mut block = Block::<C>::default();
			block.copy_from_slice(chunk);
			self.0.decrypt_block_mut(&mut block);
			output[written..written + bs].copy_from_slice(&block);
			written += bs;
		}
		written
	}

	fn do_final(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
		let bs = self.block_size();
		if input.len() != bs {
			return Err(Error::new(OperationKind::Other("cipher finalize"), ErrorKind::Other("truncated ciphertext"), None));
		}
		let mut block = Block::<C>::default();
		block.copy_from_slice(input);
		self.0.decrypt_block_mut(&mut block);
		let pad = *block.last().unwrap() as usize;
		if pad == 0 || pad > bs {
			return Err(Error::new(OperationKind::Other("cipher finalize"), ErrorKind::Other("invalid padding"), None));
		}
		let len = bs - pad;
		output[..len].copy_from_slice(&block[..len]);
		Ok(len)
	}
}

/// A [`Sink`] that encrypts (or decrypts) every byte written through a
/// [`BlockCipher`] before forwarding it to the wrapped sink.
pub struct CipherSink<C, S> {
	cipher: C,
	sink: S,
	/// Bytes accepted but not yet enough to fill a block; held until more
	/// arrives or `close_sink` finalizes them.
	pending: Vec<u8>,
	closed: bool,
}

impl<C: BlockCipher, S: Sink> CipherSink<C, S> {
	pub fn new(cipher: C, sink: S) -> Self {
		Self { cipher, sink, pending: Vec::new(), closed: false }
	}

	pub fn into_inner(self) -> S { self.sink }

	fn process(&mut self, bytes: &[u8]) -> Result {
		self.pending.extend_from_slice(bytes);
		let bs = self.cipher.block_size();
		let whole = self.pending.len() / bs * bs;
		if whole == 0 {
			return Ok(());
		}
		let mut out = vec![0u8; whole];
		let written = self.cipher.update(&self.pending[..whole], &mut out);
		debug_assert_eq!(written, whole);
		self.pending.drain(..whole);
		let mut buf = Buffer::new();
		buf.write_from_slice(&out);
		self.sink.write_all(&mut buf)?;
		Ok(())
	}
}

impl<C: BlockCipher, S: Sink> Sink for CipherSink<C, S> {
	fn write(&mut self, source: &mut Buffer, byte_count: usize) -> Result<usize> {
		let n = byte_count.min(source.size());
		let bytes = source.read_bytes(n);
		self.process(&bytes)?;
		Ok(n)
	}

	fn flush(&mut self) -> Result { self.sink.flush() }

	fn close_sink(&mut self) -> Result {
		if self.closed {
			return Ok(());
		}
		self.closed = true;
		let bs = self.cipher.block_size();
		let mut out = vec![0u8; bs];
		let pending = std::mem::take(&mut self.pending);
		let written = self.cipher.do_final(&pending, &mut out)?;
		let mut buf = Buffer::new();
		buf.write_from_slice(&out[..written]);
		let write_result = self.sink.write_all(&mut buf);
		let close_result = self.sink.close_sink();
		write_result?;
		close_result
	}
}

/// A [`Source`] that decrypts (or encrypts) every byte read through a
/// [`BlockCipher`] before returning it, per spec §4.6's "require input block
/// size ≤ segment size" contract on the inner stream.
pub struct CipherSource<C, S> {
	cipher: C,
	source: S,
	/// One decrypted block held back because it might be the last (and so
	/// might carry padding that has to be stripped before it's returned).
	held: Option<Vec<u8>>,
	/// A raw ciphertext block already pulled from `source`, one block ahead
	/// of `held`, so `do_final` can be applied to the true last block
	/// instead of whichever block happened to come back short.
	next_raw: Option<Vec<u8>>,
	eos: bool,
}

impl<C: BlockCipher, S: Source> CipherSource<C, S> {
	pub fn new(cipher: C, source: S) -> Self {
		Self { cipher, source, held: None, next_raw: None, eos: false }
	}

	pub fn into_inner(self) -> S { self.source }

	/// Reads up to one full block, looping on short reads: [`Source::read`]
	/// is allowed to return fewer bytes than requested without that meaning
	/// end-of-stream, so only a `0`-byte read counts as exhausted.
	fn read_raw_block(&mut self) -> Result<Vec<u8>> {
		let bs = self.cipher.block_size();
		let mut raw = Buffer::new();
		while raw.size() < bs {
			let n = self.source.read(&mut raw, bs - raw.size())?;
			if n == 0 {
				break;
			}
		}
		Ok(raw.read_bytes(raw.size()))
	}

	/// Decrypts and returns the next block, applying padding-stripping
	/// finalization only to the block that turns out to be last.
	fn pull_block(&mut self) -> Result<Option<Vec<u8>>> {
		if self.eos {
			return Ok(None);
		}
		let bs = self.cipher.block_size();
		let current = match self.next_raw.take() {
			Some(b) => b,
			None => self.read_raw_block()?,
		};
		if current.is_empty() {
			self.eos = true;
			return Ok(None);
		}
		if current.len() < bs {
			self.eos = true;
			let mut out = vec![0u8; bs];
			let len = self.cipher.do_final(&current, &mut out)?;
			out.truncate(len);
			return Ok(Some(out));
		}
		let lookahead = self.read_raw_block()?;
		if lookahead.is_empty() {
			self.eos = true;
			let mut out = vec![0u8; bs];
			let len = self.cipher.do_final(&current, &mut out)?;
			out.truncate(len);
			return Ok(Some(out));
		}
		self.next_raw = Some(lookahead);
		let mut out = vec![0u8; bs];
		self.cipher.update(&current, &mut out);
		Ok(Some(out))
	}
}

impl<C: BlockCipher, S: Source> Source for CipherSource<C, S> {
	fn read(&mut self, sink: &mut Buffer, byte_count: usize) -> Result<usize> {
		if self.held.is_none() {
			self.held = self.pull_block()?;
		}
		let Some(block) = self.held.take() else { return Ok(0) };
		let n = byte_count.min(block.len());
		sink.write_from_slice(&block[..n]);
		if n < block.len() {
			self.held = Some(block[n..].to_vec());
		}
		Ok(n)
	}

	fn close_source(&mut self) -> Result { self.source.close_source() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use aes::Aes128;
	use cipher::KeyInit;

	#[test]
	fn encrypt_then_decrypt_round_trips_unaligned_input() {
		let key = [0u8; 16].into();
		let mut enc = CipherSink::new(Encryptor::new(Aes128::new(&key)), Buffer::new());
		let mut plaintext = Buffer::new();
		plaintext.write_from_slice(b"a message longer than one block");
		enc.write_all(&mut plaintext).unwrap();
		enc.close_sink().unwrap();
		let ciphertext = enc.sink;

		let mut dec = CipherSource::new(Decryptor::new(Aes128::new(&key)), ciphertext);
		let mut out = Buffer::new();
		dec.read_all(&mut out).unwrap();
		assert_eq!(out.read_bytes(out.size()), b"a message longer than one block");
	}
}
