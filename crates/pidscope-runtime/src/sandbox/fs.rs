use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{Error, Result};

/// In-memory, path-addressed file store shared with sandboxed scripts.
///
/// Paths are absolute (`/results/headdict.json`); directories are implicit
/// and exist as long as a file lives beneath them.
#[derive(Debug, Default)]
pub struct VirtualFs {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) -> Result<()> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(Error::InvalidPath(path));
        }
        self.files_mut().insert(path, content.as_ref().to_vec());
        Ok(())
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        self.files()
            .get(&path)
            .cloned()
            .ok_or(Error::FileNotFound(path))
    }

    pub fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Protocol(format!("{} is not valid UTF-8 text", path)))
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize(path)
            .map(|path| self.files().contains_key(&path))
            .unwrap_or(false)
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path)?;
        match self.files_mut().remove(&path) {
            Some(_) => Ok(()),
            None => Err(Error::FileNotFound(path)),
        }
    }

    /// Remove a file if present; returns whether anything was removed.
    pub fn remove_if_exists(&self, path: &str) -> bool {
        match normalize(path) {
            Ok(path) => self.files_mut().remove(&path).is_some(),
            Err(_) => false,
        }
    }

    /// Names of the files directly inside `dir`, in name order.
    pub fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = dir_prefix(dir)?;
        Ok(self
            .files()
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|name| !name.contains('/'))
            .map(str::to_string)
            .collect())
    }

    /// Remove the files directly inside `dir`; returns how many were removed.
    pub fn clear_dir(&self, dir: &str) -> Result<usize> {
        let prefix = dir_prefix(dir)?;
        let mut files = self.files_mut();
        let before = files.len();
        files.retain(|path, _| match path.strip_prefix(&prefix) {
            Some(name) => name.contains('/'),
            None => true,
        });
        Ok(before - files.len())
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    fn files(&self) -> RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn files_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::InvalidPath(path.to_string()));
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::InvalidPath(path.to_string()));
    }

    Ok(format!("/{}", segments.join("/")))
}

fn dir_prefix(dir: &str) -> Result<String> {
    let dir = normalize(dir)?;
    Ok(if dir == "/" { dir } else { format!("{}/", dir) })
}
