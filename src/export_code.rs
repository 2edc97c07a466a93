//! Export-code handling: canonicalization and master-key derivation.
//!
//! The export code is shown to the user as hex, usually grouped with spaces
//! or hyphens.  Canonical form is the bare 32-character hex string; the
//! master key is `SHA-256(hex_decode(code))`.

use sha2::{Digest, Sha256};
use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::{MasterKey, KEY_LEN};
use crate::error::ExportError;

/// Number of hex characters in a canonical export code.
pub const CANONICAL_CODE_LEN: usize = 32;

/// Strip grouping separators from a user-supplied export code.
///
/// Separators are only removed when the input is longer than
/// [`CANONICAL_CODE_LEN`].  A result of any other length is reported with a
/// warning but still returned: a bad code surfaces later as an
/// authentication failure.  Case and non-hex characters are left alone.
pub fn canonicalize(code: &str) -> String {
    let canonical: String = if code.len() > CANONICAL_CODE_LEN {
        code.chars().filter(|c| *c != ' ' && *c != '-').collect()
    } else {
        code.to_owned()
    };

    if canonical.len() != CANONICAL_CODE_LEN {
        warn!(
            len = canonical.len(),
            "The export code has incorrect number of characters"
        );
    }
    canonical
}

/// Hex-decode a canonical export code and hash it into the master key.
pub fn derive_master_key(canonical: &str) -> Result<MasterKey, ExportError> {
    let code_bytes = Zeroizing::new(hex::decode(canonical)?);
    let digest = Sha256::digest(code_bytes.as_slice());

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&digest);
    Ok(MasterKey::from_bytes(key))
}
