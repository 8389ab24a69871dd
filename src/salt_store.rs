//! Per-user salts kept in an append-only text file of `username:salt` lines.
//!
//! Lookup is first match wins. A salt is generated and written at most once
//! per username, before any signature is derived from it, so registration
//! and every later retrieval use the same signature.

use log::{debug, info};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::cryptography::{generate_salt, Salt};
use crate::error::SaltStoreError;

#[derive(Debug, Clone)]
pub struct SaltStore {
    path: PathBuf,
}

impl SaltStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finds the salt recorded for `username`. A missing store file means no
    /// user has a salt yet. Lines without a `:` or with an unusable salt are
    /// skipped, so a corrupt record never shadows a later valid one.
    pub fn lookup(&self, username: &str) -> Result<Option<Salt>, SaltStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        let salt = contents
            .lines()
            .filter_map(|line| line.split_once(':'))
            .filter(|(name, _)| *name == username)
            .find_map(|(_, salt)| Salt::new(salt.trim_end()));
        Ok(salt)
    }

    /// Appends a record, creating the store if needed.
    pub fn store(&self, username: &str, salt: &Salt) -> Result<(), SaltStoreError> {
        if username.is_empty() || username.contains(&[':', '\n', '\r'][..]) {
            return Err(SaltStoreError::InvalidUsername(username.to_string()));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        // One write per record so the line lands whole.
        let record = format!("{}:{}\n", username, salt.as_str());
        file.write_all(record.as_bytes()).map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))?;

        debug!("Stored salt for {} in {:?}", username, self.path);
        Ok(())
    }

    /// Returns the existing salt for `username`, or generates, persists and
    /// returns a new one. An existing salt is never replaced.
    pub fn get_or_create(&self, username: &str) -> Result<Salt, SaltStoreError> {
        if let Some(salt) = self.lookup(username)? {
            return Ok(salt);
        }

        info!("No salt recorded for {}, generating one", username);
        let salt = generate_salt();
        self.store(username, &salt)?;
        Ok(salt)
    }

    fn io_error(&self, source: io::Error) -> SaltStoreError {
        SaltStoreError::Io { path: self.path.clone(), source }
    }
}
