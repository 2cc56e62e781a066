use std::{
    fs,
    io::Write,
    process::{Command, Output, Stdio},
};

use similar_asserts::assert_eq;
use tempfile::tempdir;

fn transplant(args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_transplant"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // the child may exit without reading its input
    let _ = child.stdin.take().unwrap().write_all(input);
    child.wait_with_output().unwrap()
}

#[test]
fn test_serialize_then_deserialize() {
    let td = tempdir().unwrap();
    let src = td.path().join("src");
    let dst = td.path().join("dst");
    fs::create_dir_all(src.join("sub")).unwrap();
    fs::write(src.join("sub/file"), b"contents").unwrap();

    let serialized = transplant(&["-s", "-p", src.to_str().unwrap()], b"");
    assert!(serialized.status.success());
    assert_eq!(&serialized.stdout[..3], &[0x0c, 0x0d, 0xed][..]);

    let deserialized = transplant(&["-d", "-p", dst.to_str().unwrap()], &serialized.stdout);
    assert!(deserialized.status.success());
    assert_eq!(fs::read(dst.join("sub/file")).unwrap(), b"contents".to_vec());

    // a second run conflicts unless clobbering
    let again = transplant(&["-d", "-p", dst.to_str().unwrap()], &serialized.stdout);
    assert!(!again.status.success());
    let clobbered = transplant(
        &["-d", "-c", "-p", dst.to_str().unwrap()],
        &serialized.stdout,
    );
    assert!(clobbered.status.success());

    let listing = transplant(&["-l"], &serialized.stdout);
    assert!(listing.status.success());
    let listing = String::from_utf8(listing.stdout).unwrap();
    assert_eq!(listing.lines().count(), 9);
    assert!(listing.contains("name=\"file\""));
}

#[test]
fn test_usage_errors() {
    assert!(transplant(&["-h"], b"").status.success());
    assert!(!transplant(&[], b"").status.success());
    assert!(!transplant(&["-s", "-d"], b"").status.success());
    assert!(!transplant(&["-s", "-c"], b"").status.success());
    assert!(!transplant(&["-s", "-p", "-d"], b"").status.success());
}

#[test]
fn test_bad_stream() {
    let td = tempdir().unwrap();
    let output = transplant(&["-d", "-p", td.path().to_str().unwrap()], b"garbage");
    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}
