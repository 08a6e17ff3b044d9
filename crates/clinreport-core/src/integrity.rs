// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints of attachment originals and of the merged PDF.
//
// Originals are fingerprinted when they are merged and checked again when
// they are copied into the export archive, so the archive always holds the
// bytes that were actually merged.

use sha2::{Digest, Sha256};

use crate::error::{ReportError, Result};

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a digest recorded earlier. Hex case is ignored.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    if !actual.eq_ignore_ascii_case(expected_hex) {
        return Err(ReportError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let digest = hash_bytes(b"%PDF-1.4 calibration certificate");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn single_byte_change_is_detected() {
        let original = b"%PDF-1.7 original".to_vec();
        let recorded = hash_bytes(&original);
        let mut edited = original.clone();
        edited[9] ^= 0x01;

        assert!(verify_hash(&original, &recorded).is_ok());
        match verify_hash(&edited, &recorded) {
            Err(ReportError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, recorded);
                assert_eq!(actual, hash_bytes(&edited));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn recorded_digest_case_does_not_matter() {
        let upper = hash_bytes(b"raw data").to_uppercase();
        assert!(verify_hash(b"raw data", &upper).is_ok());
    }
}
