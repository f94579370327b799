use super::*;

#[test]
fn safe_filename_replaces_dangerous_chars() {
    assert_eq!(safe_filename("a/b\\c:d*e"), "a_b_c_d_e");
    assert_eq!(safe_filename("file<>|name"), "file___name");
}

#[test]
fn ensure_dir_creates_and_returns() {
    let tmp = tempfile::tempdir().unwrap();
    let new_dir = tmp.path().join("subdir");
    let result = ensure_dir(&new_dir).unwrap();
    assert_eq!(result, new_dir);
    assert!(new_dir.exists());
}

#[test]
fn atomic_write_creates_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("test.txt");
    atomic_write(&path, "hello").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
}

#[test]
fn atomic_write_overwrites() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("test.txt");
    atomic_write(&path, "first").unwrap();
    atomic_write(&path, "second").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
}

#[test]
fn truncate_chars_short_string_passthrough() {
    assert_eq!(truncate_chars("hello", 10, "..."), "hello");
}

#[test]
fn truncate_chars_truncates_multibyte_safely() {
    let s = "hello wörld";
    let truncated = truncate_chars(s, 5, "...");
    assert_eq!(truncated, "hello...");
}

#[test]
fn bridge_home_defaults_without_env() {
    unsafe { std::env::remove_var("BRIDGE_HOME") };
    let home = get_bridge_home().unwrap();
    assert!(home.ends_with(".signal-choom-bridge"));
}
