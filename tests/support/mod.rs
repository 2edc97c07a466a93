//! Fixture builders: encrypted snapshot files and JPEG images carrying an
//! Exif metadata blob, assembled the way the capture side writes them.

#![allow(dead_code)]

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};

use snapshot_export::container::SnapshotHeader;
use snapshot_export::exif::METADATA_TAG;

pub const EXPORT_CODE: &str = "A1B2-C3D4-E5F6-0718-293A-4B5C-6D7E-8F90";
pub const CANONICAL_CODE: &str = "A1B2C3D4E5F60718293A4B5C6D7E8F90";

/// Content type the capture side writes for JPEG payloads.
pub const CONTENT_TYPE_JPEG: u32 = 1;

pub fn master_key(canonical_code: &str) -> [u8; 32] {
    let digest = Sha256::digest(hex::decode(canonical_code).unwrap());
    digest.into()
}

/// Wrap `content_key` under `master` with a random nonce: `nonce || ct || tag`.
pub fn wrap_key(master: &[u8; 32], content_key: &[u8; 32]) -> Vec<u8> {
    let cipher = Aes256Gcm::new_from_slice(master).unwrap();
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut blob = nonce.to_vec();
    blob.extend(cipher.encrypt(&nonce, content_key.as_slice()).unwrap());
    blob
}

/// Encrypt `plaintext` under `content_key` with the all-zero nonce: `ct || tag`.
pub fn seal_content(content_key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new_from_slice(content_key).unwrap();
    cipher.encrypt(Nonce::from_slice(&[0u8; 12]), plaintext).unwrap()
}

/// A complete snapshot file for `image`, using a fresh random content key.
pub fn snapshot_file(canonical_code: &str, image: &[u8]) -> Vec<u8> {
    let mut content_key = [0u8; 32];
    content_key.copy_from_slice(&Aes256Gcm::generate_key(&mut OsRng));
    assemble(
        &wrap_key(&master_key(canonical_code), &content_key),
        &seal_content(&content_key, image),
    )
}

pub fn assemble(key_blob: &[u8], content_blob: &[u8]) -> Vec<u8> {
    let mut file = Vec::new();
    SnapshotHeader::new(key_blob.len() as u32, content_blob.len() as u32, CONTENT_TYPE_JPEG)
        .write(&mut file)
        .unwrap();
    file.extend_from_slice(key_blob);
    file.extend_from_slice(content_blob);
    file
}

/// A minimal JPEG stream.  With `metadata`, an Exif APP1 segment stores it
/// under the metadata tag as an UNDEFINED byte array (little-endian TIFF).
pub fn jpeg(metadata: Option<&[u8]>) -> Vec<u8> {
    let mut j = vec![0xFF, 0xD8];
    j.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    j.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");

    if let Some(blob) = metadata {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        // IFD0: Exif pointer -> 26
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x8769u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        // Exif IFD: metadata tag, data at 44
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&METADATA_TAG.to_le_bytes());
        tiff.extend_from_slice(&7u16.to_le_bytes());
        tiff.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&44u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        assert!(blob.len() > 4, "fixture only supports out-of-line blobs");
        tiff.extend_from_slice(blob);

        let mut body = b"Exif\0\0".to_vec();
        body.extend(tiff);
        j.extend_from_slice(&[0xFF, 0xE1]);
        j.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        j.extend(body);
    }

    // Scan data is opaque to the exporter.
    j.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x12, 0x34, 0x56, 0xFF, 0xD9]);
    j
}
