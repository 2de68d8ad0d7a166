//! The source-reader contract
//!
//! `include`/`incbin` resolution needs a directory-scoped file opener that
//! can be asked to `changeDir` and restore the previous directory on
//! return, so nested includes compose without leaking state (spec.md §5,
//! §6). This is the one "external collaborator" contract spec.md treats as
//! out of scope for the engine itself, but a runnable crate still needs a
//! concrete implementation behind it.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, LasmError};
use crate::token::Token;

pub trait SourceReader {
    fn read_to_string(&self, path: &str, at: &Token) -> Result<String, LasmError>;
    fn read_bytes(&self, path: &str, at: &Token) -> Result<Vec<u8>, LasmError>;

    /// Change to the directory containing `path` (or `path` itself if
    /// `is_file` is false), returning a guard that restores the previous
    /// directory on drop.
    fn change_dir(&self, path: &str, is_file: bool) -> Box<dyn DirGuard + '_>;

    fn current_dir(&self) -> String;
}

/// RAII guard restoring the reader's working directory once a scoped
/// `include`/`incbin` resolution completes (spec.md §5: "scoped
/// acquire/release; nested includes thus compose").
pub trait DirGuard {}

/// Default filesystem-backed reader.
pub struct FsSourceReader {
    cwd: RefCell<PathBuf>,
}

impl FsSourceReader {
    pub fn new() -> FsSourceReader {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        FsSourceReader { cwd: RefCell::new(cwd) }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.cwd.borrow().join(path)
    }
}

impl Default for FsSourceReader {
    fn default() -> FsSourceReader {
        FsSourceReader::new()
    }
}

/// Restores `cwd` to whatever it was before the `change_dir` call that
/// produced this guard, on drop — the scoped acquire/release spec.md §5
/// requires so nested `include`s compose instead of leaking a directory
/// change into their caller's remaining statements.
struct FsDirGuard<'a> {
    cwd: &'a RefCell<PathBuf>,
    previous: PathBuf,
}
impl<'a> DirGuard for FsDirGuard<'a> {}
impl<'a> Drop for FsDirGuard<'a> {
    fn drop(&mut self) {
        *self.cwd.borrow_mut() = std::mem::take(&mut self.previous);
    }
}

impl SourceReader for FsSourceReader {
    fn read_to_string(&self, path: &str, at: &Token) -> Result<String, LasmError> {
        fs::read_to_string(self.resolve(path)).map_err(|_| LasmError::with_detail(ErrorKind::FileNotFound, at.clone(), path.to_string()))
    }

    fn read_bytes(&self, path: &str, at: &Token) -> Result<Vec<u8>, LasmError> {
        fs::read(self.resolve(path)).map_err(|_| LasmError::with_detail(ErrorKind::FileNotFound, at.clone(), path.to_string()))
    }

    fn change_dir(&self, path: &str, is_file: bool) -> Box<dyn DirGuard + '_> {
        let previous = self.cwd.borrow().clone();
        let mut target = self.resolve(path);
        if is_file {
            target.pop();
        }
        if !target.as_os_str().is_empty() {
            *self.cwd.borrow_mut() = target;
        }
        Box::new(FsDirGuard { cwd: &self.cwd, previous })
    }

    fn current_dir(&self) -> String {
        self.cwd.borrow().to_string_lossy().into_owned()
    }
}

/// An in-memory reader for tests, mirroring `DummyReader` in
/// `original_source/tests/test_frontend.cc`.
pub struct MemorySourceReader {
    pub files: std::collections::HashMap<String, Vec<u8>>,
}

impl MemorySourceReader {
    pub fn new() -> MemorySourceReader {
        MemorySourceReader { files: std::collections::HashMap::new() }
    }

    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> MemorySourceReader {
        self.files.insert(path.to_string(), content.into());
        self
    }
}

impl Default for MemorySourceReader {
    fn default() -> MemorySourceReader {
        MemorySourceReader::new()
    }
}

impl SourceReader for MemorySourceReader {
    fn read_to_string(&self, path: &str, at: &Token) -> Result<String, LasmError> {
        self.files
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| LasmError::with_detail(ErrorKind::FileNotFound, at.clone(), path.to_string()))
    }

    fn read_bytes(&self, path: &str, at: &Token) -> Result<Vec<u8>, LasmError> {
        self.files.get(path).cloned().ok_or_else(|| LasmError::with_detail(ErrorKind::FileNotFound, at.clone(), path.to_string()))
    }

    fn change_dir(&self, _path: &str, _is_file: bool) -> Box<dyn DirGuard + '_> {
        struct NoopGuard;
        impl DirGuard for NoopGuard {}
        Box::new(NoopGuard)
    }

    fn current_dir(&self) -> String {
        String::new()
    }
}

pub fn canonical_key(current_dir: &str, path: &str) -> String {
    Path::new(current_dir).join(path).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_dir_guard_restores_previous_directory_on_drop() {
        let reader = FsSourceReader::new();
        let original = reader.current_dir();
        {
            let _guard = reader.change_dir("sub/inner.asm", true);
            assert_ne!(reader.current_dir(), original);
        }
        assert_eq!(reader.current_dir(), original);
    }

    #[test]
    fn nested_change_dir_composes() {
        let reader = FsSourceReader::new();
        let original = reader.current_dir();
        {
            let _outer = reader.change_dir("a/b.asm", true);
            let after_outer = reader.current_dir();
            {
                let _inner = reader.change_dir("c/d.asm", true);
                assert_ne!(reader.current_dir(), after_outer);
            }
            assert_eq!(reader.current_dir(), after_outer);
        }
        assert_eq!(reader.current_dir(), original);
    }
}
