use crate::Result;
use directories::ProjectDirs;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

const FILE_NAME: &str = "credential";

/// Persists the bearer credential between runs.
///
/// Holds a single token: written on login or registration, removed on
/// logout.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory, if one can be determined.
    pub fn default_location() -> Option<Self> {
        ProjectDirs::from("dev", "livedrop", "viewer").map(|dirs| Self::new(dirs.data_dir().join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, token)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join(FILE_NAME));

        assert_eq!(store.load().unwrap(), None);
        store.save("jwt-token").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-token"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_blank_file_is_no_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(FILE_NAME));
        store.save("  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
