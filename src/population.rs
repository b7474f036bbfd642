//! Candidate identifiers and population discovery.
//!
//! A population is a root directory plus the identifiers found under it.
//! Identifiers are paths relative to the root: plain files at the top level
//! map to their file name and files inside an immediate subdirectory map to
//! `subdir/file`. Deeper nesting is ignored.

use std::borrow::Borrow;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::util::{IdentifyError, IdentifyResult};

/// Opaque candidate key, unique within one population.
///
/// Cloning is cheap; the string is shared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(Arc<str>);

impl CandidateId {
    /// Creates an identifier from any string-like value.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CandidateId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for CandidateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CandidateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A candidate population rooted at a directory.
#[derive(Clone, Debug)]
pub struct Population {
    root: PathBuf,
    ids: Vec<CandidateId>,
}

impl Population {
    /// Creates a population from an explicit identifier list.
    ///
    /// Duplicates are rejected; the store relies on keys being unique.
    pub fn new(root: impl Into<PathBuf>, ids: Vec<CandidateId>) -> IdentifyResult<Self> {
        let mut sorted: Vec<&CandidateId> = ids.iter().collect();
        sorted.sort();
        if sorted.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(IdentifyError::InvalidInput(
                "population contains duplicate candidate identifiers",
            ));
        }
        Ok(Self {
            root: root.into(),
            ids,
        })
    }

    /// Lists `root` with [`enumerate_candidates`].
    pub fn discover(root: impl Into<PathBuf>) -> IdentifyResult<Self> {
        let root = root.into();
        let ids = enumerate_candidates(&root)?;
        Ok(Self { root, ids })
    }

    /// Returns the population root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the candidate identifiers in enumeration order.
    pub fn ids(&self) -> &[CandidateId] {
        &self.ids
    }

    /// Returns the number of candidates.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` when the population has no candidates.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolves the sample path for a candidate.
    pub fn sample_path(&self, id: &CandidateId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Maps a sample path back to its candidate identifier.
    ///
    /// Both `path` and the root are normalized first, so `./root/a.png`,
    /// `root/a.png` and the absolute spelling resolve to the same candidate.
    /// Existing files are compared by their canonical paths; otherwise `.`
    /// and `..` are resolved lexically against the working directory.
    ///
    /// Returns `None` when `path` is outside the root or is not one of the
    /// population's candidates.
    pub fn id_for_path(&self, path: &Path) -> Option<CandidateId> {
        let canonical = fs::canonicalize(&self.root)
            .ok()
            .zip(fs::canonicalize(path).ok());
        if let Some((root, path)) = canonical {
            if let Some(id) = self.lookup(&root, &path) {
                return Some(id);
            }
        }
        self.lookup(&lexical_absolute(&self.root), &lexical_absolute(path))
    }

    fn lookup(&self, root: &Path, path: &Path) -> Option<CandidateId> {
        let relative = path.strip_prefix(root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect();
        let key = parts.join("/");
        self.ids.iter().find(|id| id.as_str() == key).cloned()
    }
}

/// Absolute form of `path` with `.` dropped and `..` applied, without
/// touching the filesystem.
fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let mut out = PathBuf::new();
    for part in absolute.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Lists candidate identifiers under `root`, flattening one level of nesting.
///
/// Entries are visited in file-name order so the result is deterministic.
pub fn enumerate_candidates(root: &Path) -> IdentifyResult<Vec<CandidateId>> {
    let mut ids = Vec::new();
    for entry in sorted_entries(root)? {
        if entry.is_dir {
            for nested in sorted_entries(&root.join(&entry.name))? {
                if !nested.is_dir {
                    ids.push(CandidateId::from(format!("{}/{}", entry.name, nested.name)));
                }
            }
        } else {
            ids.push(CandidateId::from(entry.name));
        }
    }
    Ok(ids)
}

struct DirEntry {
    name: String,
    is_dir: bool,
}

fn sorted_entries(dir: &Path) -> IdentifyResult<Vec<DirEntry>> {
    let enumerate_err = |err: std::io::Error| IdentifyError::Enumerate {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(enumerate_err)? {
        let entry = entry.map_err(enumerate_err)?;
        let is_dir = entry.file_type().map_err(enumerate_err)?.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(DirEntry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
