use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to load '{path}': {source}")]
    Load {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("failed to close '{path}': {source}")]
    Unload {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("symbol '{0}' not found")]
    MissingSymbol(String),
}

/// A single-owner handle to a loaded shared object.
///
/// Mirrors the teacher's thin `libloading::Library` wrapper: load by path, test for a
/// symbol, fetch a symbol by name, unload, report the last error string. Not `Clone` —
/// exactly one owner may hold the handle at a time, matching spec.md §4.1.
#[derive(Debug)]
pub struct DynamicLibrary {
    path: PathBuf,
    library: Option<Library>,
    last_error: Option<String>,
}

impl DynamicLibrary {
    pub fn new() -> Self {
        Self {
            path: PathBuf::new(),
            library: None,
            last_error: None,
        }
    }

    /// Loads the shared object at `path`. If a handle is already held it is released
    /// first, per spec.md §4.1.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), LibraryError> {
        if self.library.is_some() {
            let _ = self.unload();
        }
        let path = path.as_ref().to_path_buf();
        match unsafe { Library::new(&path) } {
            Ok(lib) => {
                self.library = Some(lib);
                self.path = path;
                self.last_error = None;
                Ok(())
            }
            Err(source) => {
                self.last_error = Some(source.to_string());
                Err(LibraryError::Load { path, source })
            }
        }
    }

    pub fn loaded(&self) -> bool {
        self.library.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff `name` resolves. Never mutates `last_error` — a failed symbol probe is
    /// not itself a library-level failure (spec.md §4.1).
    pub fn has_symbol(&self, name: &str) -> bool {
        let Some(library) = &self.library else {
            return false;
        };
        unsafe { library.get::<*const ()>(name.as_bytes()).is_ok() }
    }

    /// Fetches a symbol and reinterprets it as `T`. The caller is responsible for type
    /// correctness: the contract is by-name and agreed layout, not statically checked.
    ///
    /// # Safety
    /// `T` must match the actual layout of the symbol exported under `name`.
    pub unsafe fn get<T>(&self, name: &str) -> Result<Symbol<'_, T>, LibraryError> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| LibraryError::MissingSymbol(name.to_string()))?;
        library
            .get(name.as_bytes())
            .map_err(|_| LibraryError::MissingSymbol(name.to_string()))
    }

    /// Releases the handle. Returns whether a handle was actually held and freed.
    pub fn unload(&mut self) -> Result<bool, LibraryError> {
        let Some(library) = self.library.take() else {
            return Ok(false);
        };
        match library.close() {
            Ok(()) => Ok(true),
            Err(source) => {
                let path = self.path.clone();
                self.last_error = Some(source.to_string());
                Err(LibraryError::Unload { path, source })
            }
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Default for DynamicLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unloaded_handle_has_no_symbols() {
        let lib = DynamicLibrary::new();
        assert!(!lib.loaded());
        assert!(!lib.has_symbol("anything"));
    }

    #[test]
    fn load_nonexistent_path_fails() {
        let mut lib = DynamicLibrary::new();
        let err = lib.load("/nonexistent/path/does-not-exist.so");
        assert!(err.is_err());
        assert!(!lib.loaded());
    }
}
