//! Answering "which streams does this file have?" for single files and whole trees.

use std::{
    collections::{hash_map, HashMap},
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    dump::{parse_dump, ParsedDump},
    error::Result,
    getfattr::AttributeDump,
};

/// The names of the alternate data streams of one file, in the order getfattr reported them.
pub type StreamList = Vec<OsString>;

/// A mapping from absolute path to the streams of that file.
///
/// Only files that actually have streams are stored: looking up any other path gives an empty
/// list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathStreamMap {
    entries: HashMap<PathBuf, StreamList>,
}

impl PathStreamMap {
    /// Records the streams of a file.  Empty lists aren't stored.
    pub(crate) fn insert(&mut self, path: PathBuf, streams: StreamList) {
        if !streams.is_empty() {
            self.entries.insert(path, streams);
        }
    }

    /// Gets the streams of a file, which is empty for any file we know nothing about.
    pub fn get(&self, path: impl AsRef<Path>) -> &[OsString] {
        self.entries
            .get(path.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The number of files that have at least one stream.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, PathBuf, StreamList> {
        self.entries.iter()
    }
}

impl FromIterator<(PathBuf, StreamList)> for PathStreamMap {
    fn from_iter<I: IntoIterator<Item = (PathBuf, StreamList)>>(iter: I) -> Self {
        let mut map = PathStreamMap::default();
        for (path, streams) in iter {
            map.insert(path, streams);
        }
        map
    }
}

/// Looks up streams by running getfattr and parsing what it prints.
#[derive(Debug, Default, Clone)]
pub struct StreamCatalog {
    dump: AttributeDump,
}

impl StreamCatalog {
    pub fn new(dump: AttributeDump) -> Self {
        Self { dump }
    }

    /// Returns the streams of a single file.
    ///
    /// `path` must be absolute: it's used as-is to find the record in the dump.  A file that
    /// getfattr printed nothing usable for has no streams.
    pub fn streams_of_file(&self, path: impl AsRef<Path>) -> Result<StreamList> {
        let path = path.as_ref();
        let output = self.dump.run_on_file(path)?;
        let parsed = parse_dump(&output, "/");
        log_violations(&parsed);
        Ok(parsed.streams.get(path).to_vec())
    }

    /// Runs one recursive getfattr call on `root` and returns the parsed dump, malformed records
    /// included.
    pub fn query_tree(&self, root: impl AsRef<Path>) -> Result<ParsedDump> {
        let root = root.as_ref();
        let output = self.dump.run_on_directory_recursively(root)?;
        let parsed = parse_dump(&output, "/");
        debug!(
            "{} files with streams below {root:?} ({} malformed records)",
            parsed.streams.len(),
            parsed.violations.len()
        );
        Ok(parsed)
    }

    /// Returns the streams of every file below `root` (inclusive) with a single getfattr call.
    pub fn streams_of_tree(&self, root: impl AsRef<Path>) -> Result<PathStreamMap> {
        let parsed = self.query_tree(root)?;
        log_violations(&parsed);
        Ok(parsed.streams)
    }
}

fn log_violations(parsed: &ParsedDump) {
    for violation in &parsed.violations {
        warn!("Skipping getfattr record: {violation}");
    }
}
