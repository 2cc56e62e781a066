use std::{ffi::OsString, fs::create_dir_all, sync::LazyLock};

use tempfile::TempDir;

static TMPDIR: LazyLock<OsString> = LazyLock::new(|| {
    if let Some(path) = std::env::var_os("TRANSPLANT_TEST_TMPDIR") {
        eprintln!("temporary directory from $TRANSPLANT_TEST_TMPDIR: {path:?}");
        create_dir_all(&path).expect("can't create $TRANSPLANT_TEST_TMPDIR");
        path
    } else {
        std::env::temp_dir().into()
    }
});

pub fn tempdir() -> TempDir {
    TempDir::with_prefix_in("transplant-test-", TMPDIR.as_os_str()).unwrap()
}

