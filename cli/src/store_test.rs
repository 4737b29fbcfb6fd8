use termipics::SessionStore;
use termipics::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

use super::*;

fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("nested").join("session.json")
}

#[test]
fn missing_file_opens_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileTokenStore::open(temp_path(&dir)).expect("open");
    assert_eq!(store.get(ACCESS_TOKEN_COOKIE), None);
    assert!(!store.path().exists());
}

#[test]
fn writes_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir);
    let options = CookieOptions::default();

    let mut store = FileTokenStore::open(&path).expect("open");
    store.set(ACCESS_TOKEN_COOKIE, "a-1", &options);
    store.set(REFRESH_TOKEN_COOKIE, "r-1", &options);

    let reopened = FileTokenStore::open(&path).expect("reopen");
    assert_eq!(reopened.get(ACCESS_TOKEN_COOKIE).as_deref(), Some("a-1"));
    assert_eq!(reopened.get(REFRESH_TOKEN_COOKIE).as_deref(), Some("r-1"));
}

#[test]
fn remove_is_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir);
    let options = CookieOptions::default();

    let mut store = FileTokenStore::open(&path).expect("open");
    store.set(ACCESS_TOKEN_COOKIE, "a-1", &options);
    store.remove(ACCESS_TOKEN_COOKIE, &options);
    store.remove(ACCESS_TOKEN_COOKIE, &options);

    assert_eq!(FileTokenStore::open(&path).expect("reopen").get(ACCESS_TOKEN_COOKIE), None);
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json").expect("write");
    assert!(matches!(FileTokenStore::open(&path), Err(CliError::Json(_))));
}

#[test]
fn session_login_and_logout_round_trip_through_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir);

    let mut session = SessionStore::new(FileTokenStore::open(&path).expect("open"), CookieOptions::default());
    session.login("a-2", "r-2", "user-9");
    let persisted = FileTokenStore::open(&path).expect("reopen");
    assert_eq!(persisted.get(ACCESS_TOKEN_COOKIE).as_deref(), Some("a-2"));

    session.logout();
    let cleared = FileTokenStore::open(&path).expect("reopen");
    assert_eq!(cleared.get(ACCESS_TOKEN_COOKIE), None);
    assert_eq!(cleared.get(REFRESH_TOKEN_COOKIE), None);
}

#[cfg(unix)]
#[test]
fn session_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir);
    let mut store = FileTokenStore::open(&path).expect("open");
    store.set(ACCESS_TOKEN_COOKIE, "a-1", &CookieOptions::default());

    let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
