//! Integration tests for format sniffing on real files.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use unpacker::{sniff, FormatClass, UnpackError};

/// Helper function to write a file with the given leading bytes
fn create_test_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

#[test]
fn test_zip_magic_wins_for_zip_names() {
    let dir = TempDir::new().unwrap();
    for name in ["VSCodium-darwin-arm64.zip", "UPPER.ZIP", "a.b.c.zip"] {
        let path = create_test_file(&dir, name, b"PK\x03\x04rest of archive");
        assert_eq!(sniff(&path).unwrap(), FormatClass::Zip, "{name}");
    }
}

#[test]
fn test_pe_magic_overrides_zip_extension() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "VSCode-win.zip", b"MZ\x90\x00\x03\x00\x00\x00");
    assert_eq!(sniff(&path).unwrap(), FormatClass::PeExecutable);
}

#[test]
fn test_extension_rules_for_other_formats() {
    let dir = TempDir::new().unwrap();
    let cases: [(&str, &[u8], FormatClass); 5] = [
        ("code-stable-x64.tar.gz", b"\x1f\x8b\x08\x00", FormatClass::GzipTar),
        ("Cursor-darwin-arm64.dmg", b"\x78\x01\x73\x0d", FormatClass::DiskImage),
        ("VSCodeSetup-arm64.exe", b"MZ\x90\x00", FormatClass::PeExecutable),
        ("Cursor-1.2.3-x86_64.AppImage", b"\x7fELF", FormatClass::AppImageCandidate),
        ("foo.xyz", b"PK\x03\x04", FormatClass::Unknown),
    ];

    for (name, magic, expected) in cases {
        let path = create_test_file(&dir, name, magic);
        assert_eq!(sniff(&path).unwrap(), expected, "{name}");
    }
}

#[test]
fn test_short_and_empty_files() {
    let dir = TempDir::new().unwrap();

    let one_byte = create_test_file(&dir, "tiny.zip", b"P");
    assert_eq!(sniff(&one_byte).unwrap(), FormatClass::Unknown);

    let empty = create_test_file(&dir, "empty.exe", b"");
    assert_eq!(sniff(&empty).unwrap(), FormatClass::PeExecutable);
}

#[test]
fn test_sniff_does_not_modify_file() {
    let dir = TempDir::new().unwrap();
    let content = b"MZ\x90\x00 installer payload".to_vec();
    let path = create_test_file(&dir, "VSCode-win.zip", &content);

    sniff(&path).unwrap();
    assert_eq!(fs::read(&path).unwrap(), content);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = sniff(&dir.path().join("gone.zip"));
    assert!(matches!(result, Err(UnpackError::NotFound(_))));
}
