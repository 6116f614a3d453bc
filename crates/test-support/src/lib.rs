use std::{
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

use tempfile::TempDir;

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Sets (or clears, for `None`) environment variables for the lifetime of the
/// guard and restores the previous values on drop.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(String, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new(vars: &[(&str, Option<&str>)]) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let mut previous = Vec::with_capacity(vars.len());

        for (key, value) in vars {
            previous.push((key.to_string(), std::env::var(key).ok()));
            // SAFETY: tests using TestEnvGuard are serialized by test_lock.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }

        Self {
            _lock: lock,
            previous,
        }
    }

    /// Points the asset directory and database at `temp_root`.
    pub fn with_asset_dir(temp_root: &Path) -> Self {
        let root = temp_root.to_string_lossy().into_owned();
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            temp_root.join("db.sqlite").to_string_lossy()
        );
        Self::new(&[
            ("TASKBOARD_ASSET_DIR", Some(root.as_str())),
            ("DATABASE_URL", Some(db_url.as_str())),
        ])
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.iter().rev() {
            // SAFETY: tests using TestEnvGuard are serialized by test_lock.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}

pub fn temp_root() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("taskboard-test-").tempdir()
}
