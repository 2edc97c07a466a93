//! AES-256-GCM key unwrap and content decryption for snapshot files.
//!
//! Two envelopes, two nonce policies:
//!
//! | Envelope | Key        | Nonce                     | Layout                                   |
//! |----------|------------|---------------------------|------------------------------------------|
//! | key blob | MasterKey  | first 12 B of the blob    | `nonce (12 B) | ciphertext (32 B) | tag (16 B)` |
//! | content  | ContentKey | 12 zero bytes, implicit   | `ciphertext | tag (16 B)`               |
//!
//! A content key encrypts exactly one payload.  The master key is shared
//! across files, so each key blob carries its own nonce.  Neither envelope
//! uses associated data.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ExportError;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;
/// AES-GCM tag length.
pub const TAG_LEN: usize = 16;
/// Exact size of a wrapped content key: nonce + encrypted key + tag.
pub const KEY_BLOB_LEN: usize = NONCE_LEN + KEY_LEN + TAG_LEN;

/// Nonce used for every content payload.
const CONTENT_NONCE: [u8; NONCE_LEN] = [0u8; NONCE_LEN];

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            bytes: [u8; KEY_LEN],
        }

        impl $name {
            pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self { bytes }
            }

            pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
                &self.bytes
            }

            fn cipher(&self) -> Aes256Gcm {
                Aes256Gcm::new(self.bytes.as_slice().into())
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                self.bytes.zeroize();
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Key derived from the export code.  Shared by every file in a run.
    /// Zeroized on drop.
    MasterKey
);

secret_key!(
    /// Per-file key recovered from the key blob.  Zeroized on drop.
    ContentKey
);

/// Unwrap the per-file content key from a 60-byte key blob.
pub fn unwrap_content_key(master: &MasterKey, key_blob: &[u8]) -> Result<ContentKey, ExportError> {
    if key_blob.len() != KEY_BLOB_LEN {
        return Err(ExportError::format(format!(
            "key blob is {} bytes (expected {KEY_BLOB_LEN})",
            key_blob.len()
        )));
    }

    let (nonce, rest) = key_blob.split_at(NONCE_LEN);
    let (ciphertext, tag) = rest.split_at(KEY_LEN);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(ciphertext);
    master
        .cipher()
        .decrypt_in_place_detached(Nonce::from_slice(nonce), b"", key.as_mut_slice(), Tag::from_slice(tag))
        .map_err(|_| ExportError::Authentication)?;

    debug!("content key unwrapped");
    Ok(ContentKey::from_bytes(*key))
}

/// Decrypt a content blob (`ciphertext || tag`) under the all-zero nonce.
///
/// The returned buffer is exactly `blob.len() - TAG_LEN` bytes and is
/// zeroized when dropped.
pub fn decrypt_content(key: &ContentKey, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, ExportError> {
    if blob.len() < TAG_LEN {
        return Err(ExportError::format(format!(
            "content blob is {} bytes (minimum {TAG_LEN})",
            blob.len()
        )));
    }

    let (ciphertext, tag) = blob.split_at(blob.len() - TAG_LEN);
    let mut plaintext = Zeroizing::new(ciphertext.to_vec());
    key.cipher()
        .decrypt_in_place_detached(
            Nonce::from_slice(&CONTENT_NONCE),
            b"",
            plaintext.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| ExportError::Authentication)?;

    debug!(len = plaintext.len(), "content decrypted");
    Ok(plaintext)
}
