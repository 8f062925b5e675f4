//! Property-based tests for selfupdate.
//!
//! These tests use proptest to verify correctness properties across
//! randomly generated inputs.
//!
//! # Properties Tested
//!
//! - Version gating: `is_newer_than` is a strict greater-than
//! - Manifest parsing: file count and order are preserved
//! - Manifest parsing: a missing application is never an error
//! - Manifest parsing: any missing file field fails the whole manifest
//! - Digest comparison ignores hex case

#![cfg(test)]

use proptest::prelude::*;
use crate::version::Version;

use crate::error::UpdateError;
use crate::manifest::{parse_document, UpdateManifest};
use crate::verify::DigestVerifier;

// =============================================================================
// Generators
// =============================================================================

/// Generate a random version, three- or four-part.
fn arb_version() -> impl Strategy<Value = Version> {
    (0u64..100, 0u64..100, 0u64..100, 0u64..4).prop_map(|(major, minor, patch, revision)| {
        Version::with_revision(major, minor, patch, revision)
    })
}

/// Generate a hex digest of random length and case.
fn arb_digest() -> impl Strategy<Value = String> {
    "([0-9a-fA-F]{2}){1,32}"
}

/// Generate a simple file name.
fn arb_file_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.(exe|dll|bin)"
}

/// Generate a list of (file name, digest) pairs.
fn arb_files() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((arb_file_name(), arb_digest()), 0..8)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn manifest_at(version: Version) -> UpdateManifest {
    UpdateManifest::new(version, vec![], String::new(), String::new(), String::new())
}

fn file_json(index: usize, name: &str, digest: &str) -> serde_json::Value {
    serde_json::json!({
        "url": format!("https://example.com/{}/{}", index, name),
        "fileName": name,
        "digest": digest,
    })
}

fn document(app_id: &str, version: &Version, files: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::json!({
        "updates": [{
            "appId": app_id,
            "version": version.to_string(),
            "description": "generated",
            "launchFile": "app.exe",
            "launchArgs": "",
            "files": files,
        }]
    })
    .to_string()
    .into_bytes()
}

// =============================================================================
// Version gating
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For versions v1 < v2, a v2 manifest is newer than v1 and not vice versa.
    #[test]
    fn prop_is_newer_than_is_strict(a in arb_version(), b in arb_version()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };

        prop_assert!(!manifest_at(low.clone()).is_newer_than(&low));
        prop_assert!(!manifest_at(low.clone()).is_newer_than(&high));
        prop_assert_eq!(manifest_at(high.clone()).is_newer_than(&low), high > low);
    }
}

// =============================================================================
// Manifest parsing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Parsed file list has the same length and order as the document.
    #[test]
    fn prop_parse_preserves_file_order(version in arb_version(), files in arb_files()) {
        let json = files
            .iter()
            .enumerate()
            .map(|(i, (name, digest))| file_json(i, name, digest))
            .collect();
        let data = document("com.example.app", &version, json);

        let manifest = parse_document(&data, "com.example.app").unwrap().unwrap();

        prop_assert_eq!(manifest.version(), &version);
        prop_assert_eq!(manifest.files().len(), files.len());
        for (entry, (name, digest)) in manifest.files().iter().zip(&files) {
            prop_assert_eq!(entry.file_name(), name.as_str());
            prop_assert_eq!(entry.digest(), digest.as_str());
        }
    }

    /// A document without the requested application yields None, never an error.
    #[test]
    fn prop_missing_app_is_not_found(
        version in arb_version(),
        files in arb_files(),
        suffix in "[a-z]{1,6}",
    ) {
        let json = files
            .iter()
            .enumerate()
            .map(|(i, (name, digest))| file_json(i, name, digest))
            .collect();
        let data = document("com.example.app", &version, json);

        let result = parse_document(&data, &format!("com.example.app.{}", suffix));

        prop_assert!(matches!(result, Ok(None)));
    }

    /// Removing any required field from any file fails the whole manifest.
    #[test]
    fn prop_missing_file_field_fails(
        version in arb_version(),
        files in prop::collection::vec((arb_file_name(), arb_digest()), 1..6),
        victim in any::<prop::sample::Index>(),
        field in prop_oneof![Just("url"), Just("fileName"), Just("digest")],
    ) {
        let victim = victim.index(files.len());
        let json = files
            .iter()
            .enumerate()
            .map(|(i, (name, digest))| {
                let mut value = file_json(i, name, digest);
                if i == victim {
                    value.as_object_mut().unwrap().remove(field);
                }
                value
            })
            .collect();
        let data = document("com.example.app", &version, json);

        let result = parse_document(&data, "com.example.app");

        let is_missing_field = matches!(
            result,
            Err(UpdateError::MissingField { field: f, .. }) if f == field
        );
        prop_assert!(is_missing_field);
    }
}

// =============================================================================
// Digest comparison
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Changing the case of a digest never changes whether it matches.
    #[test]
    fn prop_digest_match_ignores_case(digest in arb_digest()) {
        let verifier = DigestVerifier::new();

        prop_assert!(verifier.digests_match(&digest.to_uppercase(), &digest.to_lowercase()));
        prop_assert!(verifier.digests_match(&digest, &digest.to_ascii_lowercase()));
    }

    /// Digests that differ after normalization never match.
    #[test]
    fn prop_distinct_digests_do_not_match(a in arb_digest(), b in arb_digest()) {
        prop_assume!(a.to_lowercase() != b.to_lowercase());

        prop_assert!(!DigestVerifier::new().digests_match(&a, &b));
    }
}
