mod common;

use std::fs;

use common::fixture;
use launcher_updater::bundle::{SystemBundleStore, BUNDLE_PASSWORD};
use launcher_updater::error::ExtractError;

fn store() -> (tempfile::TempDir, SystemBundleStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SystemBundleStore::new(dir.path().join("system"));
    (dir, store)
}

#[test]
fn encrypted_bundle_extracts_with_the_shared_password() {
    let (_dir, store) = store();
    store
        .extract(&fixture("bundle_encrypted.zip"), Some(BUNDLE_PASSWORD))
        .unwrap();

    let root = store.system_folder();
    assert_eq!(
        fs::read_to_string(root.join("game.exe")).unwrap(),
        "client build 3\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("data/maps/map01.dat")).unwrap(),
        "map01 tiles\n"
    );
}

#[test]
fn wrong_password_is_reported_and_leaves_version_alone() {
    let (_dir, store) = store();
    store.set_version("2").unwrap();

    let err = store
        .extract(&fixture("bundle_encrypted.zip"), Some(b"54321"))
        .unwrap_err();

    assert!(matches!(err, ExtractError::BadPassword));
    assert!(err.is_bad_password());
    assert_eq!(store.local_version().as_deref(), Some("2"));
}

#[test]
fn encrypted_bundle_without_password_is_rejected() {
    let (_dir, store) = store();
    let err = store
        .extract(&fixture("bundle_encrypted.zip"), None)
        .unwrap_err();
    assert!(matches!(err, ExtractError::BadPassword));
}

#[test]
fn bundle_sealed_with_another_password_is_rejected() {
    let (_dir, store) = store();
    let err = store
        .extract(&fixture("bundle_other_password.zip"), Some(BUNDLE_PASSWORD))
        .unwrap_err();
    assert!(matches!(err, ExtractError::BadPassword));
}

#[test]
fn plain_bundle_ignores_the_password() {
    let (_dir, store) = store();
    store
        .extract(&fixture("bundle_plain.zip"), Some(BUNDLE_PASSWORD))
        .unwrap();
    assert!(store.system_folder().join("data/maps/map01.dat").is_file());
}

#[test]
fn non_zip_file_is_an_invalid_archive() {
    let (_dir, store) = store();
    let err = store
        .extract(&fixture("not_a_zip.zip"), Some(BUNDLE_PASSWORD))
        .unwrap_err();
    assert!(matches!(err, ExtractError::InvalidArchive { .. }));
    assert!(!err.is_bad_password());
}

#[test]
fn missing_file_is_reported() {
    let (dir, store) = store();
    let err = store
        .extract(&dir.path().join("system_update.zip"), Some(BUNDLE_PASSWORD))
        .unwrap_err();
    assert!(matches!(err, ExtractError::Missing(_)));
}
