use std::{io, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
pub const ASSET_DIR_ENV: &str = "TASKBOARD_ASSET_DIR";

/// Directory holding the database file and `config.json`.
///
/// `TASKBOARD_ASSET_DIR` wins when set; debug builds use `dev_assets/` at the
/// workspace root, release builds the platform data directory.
pub fn asset_dir() -> io::Result<PathBuf> {
    let path = match std::env::var(ASSET_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ if cfg!(debug_assertions) => PathBuf::from(PROJECT_ROOT).join("../../dev_assets"),
        _ => ProjectDirs::from("dev", "taskboard", "taskboard")
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))?
            .data_dir()
            .to_path_buf(),
    };

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "created asset directory");
    }

    Ok(path)
}

pub fn config_path() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join("config.json"))
}

pub fn database_path() -> io::Result<PathBuf> {
    Ok(asset_dir()?.join("db.sqlite"))
}
