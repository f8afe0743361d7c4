//! Panda3D multifile (.mf/.ef) header parsing and password verification.
//!
//! A multifile is a chained directory of subfiles; at most one subfile is
//! encrypted (Panda3D signs multifiles by appending an unencrypted signature
//! subfile, which this parser must skip). This module reads just enough of
//! an archive to recover the encrypted subfile's envelope: the cipher
//! identifier, IV, iteration count, and one block of known-plaintext
//! ciphertext. It exposes [`Archive::is_password`] as the oracle the
//! memory scanner drives with candidate strings.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use thiserror::Error;

use crate::cipher;
use crate::reader::Cursor;

/// Literal header every multifile begins with.
const MAGIC_HEADER: &[u8; 6] = b"pmf\0\n\r";

/// Plaintext prefix a correctly decrypted verification block must start with.
const CRYPTY_MAGIC: &[u8; 6] = b"crypty";

/// Subfile is zlib-compressed on disk.
const SF_COMPRESSED: u16 = 0x0008;
/// Subfile payload is encrypted.
const SF_ENCRYPTED: u16 = 0x0010;
/// Subfile is Panda3D's own unencrypted signature block.
const SF_SIGNATURE: u16 = 0x0020;

/// Size, in bytes, of one subfile directory entry's fixed-length prefix
/// (`next_address` + `address` + `length` + `flags`).
const SUBFILE_ENTRY_PREFIX: usize = 4 + 4 + 4 + 2;

/// Errors encountered while loading a multifile.
#[derive(Debug, Error)]
pub enum Error {
    /// The first six bytes were not [`MAGIC_HEADER`].
    #[error("invalid multifile header")]
    InvalidHeader,

    /// The subfile chain terminated without an encrypted, non-signature subfile.
    #[error("multifile has no encrypted subfile")]
    NotEncrypted,

    /// The encrypted subfile declares a cipher identifier this crate does not implement.
    #[error("unimplemented encryption algorithm (nid {0})")]
    UnimplementedCipher(u16),

    /// The subfile chain is malformed (e.g. a `next_address` that does not advance).
    #[error("malformed subfile directory at offset {0}")]
    MalformedDirectory(usize),

    /// A field could not be read because the buffer ran out.
    #[error(transparent)]
    Truncated(#[from] crate::reader::Error),

    /// Reading the archive file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for multifile operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One entry in a multifile's subfile directory.
#[derive(Clone, Copy, Debug)]
struct Subfile {
    address: u32,
    flags: u16,
}

impl Subfile {
    fn is_encrypted(self) -> bool {
        self.flags & SF_ENCRYPTED != 0
    }

    fn is_signature(self) -> bool {
        self.flags & SF_SIGNATURE != 0
    }
}

/// A parsed multifile, holding just the fields needed to verify candidate
/// passwords against its encrypted subfile.
#[derive(Debug)]
pub struct Archive {
    /// Major version field from the multifile header.
    pub major_version: i16,
    /// Minor version field from the multifile header.
    pub minor_version: i16,
    /// Scale factor field from the multifile header.
    pub scale_factor: u32,
    /// Timestamp field from the multifile header, Unix seconds.
    pub timestamp: u32,

    nid: u16,
    key_length: usize,
    iteration_count: u32,
    iv: Vec<u8>,
    verification_block: Vec<u8>,

    /// Passwords already proven wrong for this archive, to avoid re-deriving
    /// their key. Purely a latency optimization: skipping this cache must
    /// never change the result of [`Archive::is_password`].
    failed_passwords: HashSet<Vec<u8>>,
}

impl Archive {
    /// Loads a multifile's header and the envelope of its first encrypted,
    /// non-signature subfile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`], [`Error::NotEncrypted`],
    /// [`Error::UnimplementedCipher`], [`Error::MalformedDirectory`], or an
    /// I/O error if the stream could not be read.
    pub fn load<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut header_buf = [0_u8; 18];
        reader.read_exact(&mut header_buf)?;

        let mut cursor = Cursor::new(&header_buf);
        let header = cursor.extract(6)?;
        if header != MAGIC_HEADER {
            return Err(Error::InvalidHeader);
        }

        let major_version = cursor.get_i16_le()?;
        let minor_version = cursor.get_i16_le()?;
        let scale_factor = cursor.get_u32_le()?;
        let timestamp = cursor.get_u32_le()?;

        // The first subfile directory entry begins right after the header
        // we just consumed.
        let mut next_address = cursor.position() as u32;
        let mut encrypted_subfile = None;

        while next_address != 0 {
            let (subfile, advance_to) = Self::load_subfile(&mut reader, next_address)?;

            if advance_to != 0 && advance_to < next_address.saturating_add(18) {
                return Err(Error::MalformedDirectory(next_address as usize));
            }

            if subfile.is_encrypted() && !subfile.is_signature() {
                encrypted_subfile = Some(subfile);
                break;
            }

            next_address = advance_to;
        }

        let encrypted_subfile = encrypted_subfile.ok_or(Error::NotEncrypted)?;

        reader.seek(SeekFrom::Start(u64::from(encrypted_subfile.address)))?;

        // Read the cipher-independent prefix first so we know how many more
        // bytes the IV and verification block need.
        let mut prefix = [0_u8; 6];
        reader.read_exact(&mut prefix)?;
        let mut cursor = Cursor::new(&prefix);
        let nid = cursor.get_u16_le()?;
        let key_length = cursor.get_u16_le()? as usize;
        let iteration_count_raw = cursor.get_u16_le()?;

        let iv_size = cipher::iv_size(nid).map_err(|_| Error::UnimplementedCipher(nid))?;
        let block_size = cipher::block_size(nid).map_err(|_| Error::UnimplementedCipher(nid))?;

        let mut envelope = vec![0_u8; iv_size + block_size];
        reader.read_exact(&mut envelope)?;
        let iv = envelope[..iv_size].to_vec();
        let verification_block = envelope[iv_size..].to_vec();

        Ok(Self {
            major_version,
            minor_version,
            scale_factor,
            timestamp,
            nid,
            key_length,
            iteration_count: cipher::iterations(iteration_count_raw),
            iv,
            verification_block,
            failed_passwords: HashSet::new(),
        })
    }

    /// Reads one subfile directory entry at `address`, returning the
    /// subfile and the address of the next entry (0 at the end of the chain).
    fn load_subfile<R: Read + Seek>(mut reader: R, address: u32) -> Result<(Subfile, u32)> {
        reader.seek(SeekFrom::Start(u64::from(address)))?;

        let mut prefix = [0_u8; SUBFILE_ENTRY_PREFIX];
        reader.read_exact(&mut prefix)?;
        let mut cursor = Cursor::new(&prefix);

        let next_address = cursor.get_u32_le()?;
        let subfile_address = cursor.get_u32_le()?;
        let _length = cursor.get_u32_le()?;
        let flags = cursor.get_u16_le()?;

        if flags & (SF_COMPRESSED | SF_ENCRYPTED) != 0 {
            let mut original_length = [0_u8; 4];
            reader.read_exact(&mut original_length)?;
        }

        Ok((
            Subfile {
                address: subfile_address,
                flags,
            },
            next_address,
        ))
    }

    /// Cipher identifier declared by the archive's encrypted subfile.
    #[must_use]
    pub fn nid(&self) -> u16 {
        self.nid
    }

    /// Tests whether `candidate` is this archive's decryption password.
    ///
    /// Derives a key via PBKDF2-HMAC-SHA1 (salted with the archive's IV,
    /// iterated [`Archive`]'s declared count), decrypts one CBC block of the
    /// verification ciphertext, and checks for the `crypty` magic prefix.
    pub fn is_password(&mut self, candidate: &[u8]) -> bool {
        if candidate.is_empty() {
            return false;
        }

        if self.failed_passwords.contains(candidate) {
            return false;
        }

        let key = cipher::derive_key(candidate, &self.iv, self.iteration_count, self.key_length);

        let plaintext = match cipher::decrypt_block(self.nid, &key, &self.iv, &self.verification_block)
        {
            Ok(plaintext) => plaintext,
            Err(_) => {
                self.failed_passwords.insert(candidate.to_vec());
                return false;
            }
        };

        let matches = plaintext.len() >= CRYPTY_MAGIC.len() && &plaintext[..6] == CRYPTY_MAGIC;
        if !matches {
            self.failed_passwords.insert(candidate.to_vec());
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::{BlockEncryptMut, KeyIvInit};

    /// Builds a minimal single-subfile encrypted archive in memory, whose
    /// correct password is `password`.
    fn synthetic_archive(nid: u16, password: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC_HEADER);
        buf.extend_from_slice(&1_i16.to_le_bytes()); // major_version
        buf.extend_from_slice(&1_i16.to_le_bytes()); // minor_version
        buf.extend_from_slice(&1_u32.to_le_bytes()); // scale_factor
        buf.extend_from_slice(&0_u32.to_le_bytes()); // timestamp

        // Single subfile entry terminating the chain.
        let subfile_directory_offset = buf.len() as u32;
        let iv_size = cipher::iv_size(nid).unwrap();
        let block_size = cipher::block_size(nid).unwrap();
        let envelope_len = 6 + iv_size + block_size;
        let subfile_address = subfile_directory_offset + 18;

        buf.extend_from_slice(&0_u32.to_le_bytes()); // next_address: end of chain
        buf.extend_from_slice(&subfile_address.to_le_bytes()); // address
        buf.extend_from_slice(&(envelope_len as u32).to_le_bytes()); // length
        buf.extend_from_slice(&SF_ENCRYPTED.to_le_bytes()); // flags
        buf.extend_from_slice(&(envelope_len as u32).to_le_bytes()); // original_length

        let key_length = 16_usize;
        let iv = vec![0_u8; iv_size];
        let iteration_count_raw = 1_u16;
        let iterations = cipher::iterations(iteration_count_raw);
        let key = cipher::derive_key(password, &iv, iterations, key_length);

        let mut plaintext = CRYPTY_MAGIC.to_vec();
        plaintext.resize(block_size, 0);

        let ciphertext = match nid {
            cipher::NID_BF_CBC => {
                let mut c =
                    cbc::Encryptor::<blowfish::Blowfish>::new_from_slices(&key, &iv).unwrap();
                let mut block = plaintext.clone();
                c.encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(
                    &mut block,
                    block_size,
                )
                .unwrap()
                .to_vec()
            }
            cipher::NID_AES_256_CBC => {
                let mut c = cbc::Encryptor::<aes::Aes256>::new_from_slices(&key, &iv).unwrap();
                let mut block = plaintext.clone();
                c.encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(
                    &mut block,
                    block_size,
                )
                .unwrap()
                .to_vec()
            }
            _ => unreachable!(),
        };

        buf.extend_from_slice(&nid.to_le_bytes());
        buf.extend_from_slice(&(key_length as u16).to_le_bytes());
        buf.extend_from_slice(&iteration_count_raw.to_le_bytes());
        buf.extend_from_slice(&iv);
        buf.extend_from_slice(&ciphertext);

        buf
    }

    #[test]
    fn loads_and_verifies_blowfish_archive() {
        let bytes = synthetic_archive(cipher::NID_BF_CBC, b"open sesame");
        let mut archive = Archive::load(std::io::Cursor::new(bytes.as_slice())).unwrap();
        assert!(archive.is_password(b"open sesame"));
        assert!(!archive.is_password(b"wrong"));
    }

    #[test]
    fn loads_and_verifies_aes_archive() {
        let bytes = synthetic_archive(cipher::NID_AES_256_CBC, b"correct horse battery staple");
        let mut archive = Archive::load(std::io::Cursor::new(bytes.as_slice())).unwrap();
        assert!(archive.is_password(b"correct horse battery staple"));
        assert!(!archive.is_password(b"wrong"));
    }

    #[test]
    fn rejects_bad_header() {
        let bytes = b"notamultifilexxxxxxxxxxxxxxxxxxxx".to_vec();
        let err = Archive::load(std::io::Cursor::new(bytes.as_slice())).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader));
    }

    #[test]
    fn empty_password_always_fails() {
        let bytes = synthetic_archive(cipher::NID_BF_CBC, b"open sesame");
        let mut archive = Archive::load(std::io::Cursor::new(bytes.as_slice())).unwrap();
        assert!(!archive.is_password(b""));
    }
}
