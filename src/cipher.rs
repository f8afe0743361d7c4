//! Key derivation and single-block decryption for multifile passwords.
//!
//! A candidate password is never trusted directly: it is run through
//! PBKDF2-HMAC-SHA1 to derive a key, the key decrypts one CBC block of the
//! archive's verification ciphertext, and the plaintext is checked against
//! the Panda3D magic header. This module implements the derivation and the
//! two supported ciphers; [`crate::multifile`] owns the magic-header check.

use aes::Aes256;
use blowfish::Blowfish;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use thiserror::Error;

/// OpenSSL NID for Blowfish in CBC mode.
pub const NID_BF_CBC: u16 = 91;
/// OpenSSL NID for AES-256 in CBC mode.
pub const NID_AES_256_CBC: u16 = 427;

/// Multiplier applied to an archive's raw iteration count field.
///
/// The on-disk iteration count is `(actual_iterations - 1) / ITERATION_FACTOR`;
/// see [`iterations`].
pub const ITERATION_FACTOR: u32 = 100;

/// Errors from cipher selection or single-block decryption.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The archive's cipher identifier is not one this crate implements.
    #[error("unsupported cipher identifier {0}")]
    UnsupportedCipher(u16),
}

/// Result type for cipher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Required IV length, in bytes, for the given cipher identifier.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCipher`] for unrecognized identifiers.
pub fn iv_size(nid: u16) -> Result<usize> {
    match nid {
        NID_BF_CBC => Ok(8),
        NID_AES_256_CBC => Ok(16),
        other => Err(Error::UnsupportedCipher(other)),
    }
}

/// Block size, in bytes, for the given cipher identifier.
///
/// For both supported ciphers this equals the IV size, but the two
/// quantities are kept conceptually distinct since that need not hold for
/// every CBC cipher.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCipher`] for unrecognized identifiers.
pub fn block_size(nid: u16) -> Result<usize> {
    match nid {
        NID_BF_CBC => Ok(8),
        NID_AES_256_CBC => Ok(16),
        other => Err(Error::UnsupportedCipher(other)),
    }
}

/// Converts an archive's raw on-disk iteration count to the actual PBKDF2
/// iteration count.
#[must_use]
pub fn iterations(raw: u16) -> u32 {
    u32::from(raw) * ITERATION_FACTOR + 1
}

/// Derives a key from a candidate password via PBKDF2-HMAC-SHA1.
///
/// `salt` is the archive's IV, reused as the KDF salt per the on-disk
/// format. `key_length` is the archive's declared key length in bytes.
#[must_use]
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32, key_length: usize) -> Vec<u8> {
    let mut key = vec![0_u8; key_length];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, &mut key);
    key
}

/// Decrypts one CBC block with the cipher selected by `nid`.
///
/// `block` must be exactly [`block_size`] bytes and `iv` exactly
/// [`iv_size`] bytes for the given `nid`; both are guaranteed by the
/// multifile parser, which reads them at those declared sizes.
///
/// # Errors
///
/// Returns [`Error::UnsupportedCipher`] for unrecognized identifiers.
pub fn decrypt_block(nid: u16, key: &[u8], iv: &[u8], block: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = block.to_vec();
    match nid {
        NID_BF_CBC => {
            let mut cipher = cbc::Decryptor::<Blowfish>::new_from_slices(key, iv)
                .expect("key/iv sizes validated by caller");
            let len = cipher
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .expect("block is exactly one cipher block")
                .len();
            buffer.truncate(len);
            Ok(buffer)
        }
        NID_AES_256_CBC => {
            let mut cipher = cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .expect("key/iv sizes validated by caller");
            let len = cipher
                .decrypt_padded_mut::<NoPadding>(&mut buffer)
                .expect("block is exactly one cipher block")
                .len();
            buffer.truncate(len);
            Ok(buffer)
        }
        other => Err(Error::UnsupportedCipher(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    #[test]
    fn iteration_formula_matches_on_disk_contract() {
        assert_eq!(iterations(0), 1);
        assert_eq!(iterations(1), 101);
        assert_eq!(iterations(9), 901);
    }

    #[test]
    fn pbkdf2_matches_reference_vector() {
        // RFC 6070 test vector 1, truncated to SHA-1: P="password", S="salt", c=1, dkLen=20
        let key = derive_key(b"password", b"salt", 1, 20);
        assert_eq!(
            key,
            [
                0x0c, 0x60, 0xc8, 0x0f, 0x96, 0x1f, 0x0e, 0x71, 0xf3, 0xa9, 0xb5, 0x24, 0xaf,
                0x60, 0x12, 0x06, 0x2f, 0xe0, 0x37, 0xa6,
            ]
        );
    }

    #[test]
    fn unsupported_cipher_is_rejected() {
        assert_eq!(iv_size(1), Err(Error::UnsupportedCipher(1)));
        assert_eq!(block_size(1), Err(Error::UnsupportedCipher(1)));
    }

    #[test]
    fn round_trips_blowfish_cbc_block() {
        let key = b"0123456789abcdef";
        let iv = [0_u8; 8];
        let plaintext = b"crypty\x00\x00";

        let mut cipher =
            cbc::Encryptor::<Blowfish>::new_from_slices(key, &iv).expect("valid key/iv");
        let mut buf = *plaintext;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
            .expect("exact block size");

        let decrypted = decrypt_block(NID_BF_CBC, key, &iv, ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn round_trips_aes_256_cbc_block() {
        let key = [0x42_u8; 32];
        let iv = [0_u8; 16];
        let plaintext = b"crypty\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";

        let mut cipher =
            cbc::Encryptor::<Aes256>::new_from_slices(&key, &iv).expect("valid key/iv");
        let mut buf = *plaintext;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
            .expect("exact block size");

        let decrypted = decrypt_block(NID_AES_256_CBC, &key, &iv, ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }
}
