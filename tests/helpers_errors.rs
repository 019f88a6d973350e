use std::io;
use std::path::Path;

use relocator::gateway::{io_error_with_help, io_error_with_help_io};

#[test]
fn message_names_operation_and_path() {
    let p = Path::new("/nonexistent/path/for/test");
    let err = io_error_with_help("open", p)(io::Error::from(io::ErrorKind::NotFound));
    let msg = err.to_string();
    assert!(msg.contains("open"));
    assert!(msg.contains("/nonexistent/path/for/test"));
    assert!(msg.contains("path not found"));
}

#[test]
fn io_variant_preserves_kind() {
    let p = Path::new("/some/dir");
    let err = io_error_with_help_io("create directory", p)(io::Error::from(
        io::ErrorKind::PermissionDenied,
    ));
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    assert!(err.to_string().contains("create directory"));
    assert!(err.to_string().contains("permission denied"));
}

#[cfg(unix)]
#[test]
fn os_errors_carry_code_and_hint() {
    let p = Path::new("/mnt/a");
    let err = io_error_with_help_io("move", p)(io::Error::from_raw_os_error(libc::EXDEV));
    let msg = err.to_string();
    assert!(msg.contains("cross-device"), "{msg}");
    assert!(msg.contains(&format!("[os code: {}]", libc::EXDEV)), "{msg}");
}

#[test]
fn unknown_errors_have_no_hint() {
    let p = Path::new("/x");
    let err = io_error_with_help_io("read", p)(io::Error::other("boom"));
    assert_eq!(err.to_string(), "read '/x': boom");
}
