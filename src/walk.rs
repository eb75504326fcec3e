//! Walking a directory and annotating every entry with its streams.

use std::{
    ffi::{OsStr, OsString},
    io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use rustix::fs::{lstat, open, Dir, FileType, Mode, OFlags};

use crate::{
    catalog::{PathStreamMap, StreamCatalog, StreamList},
    error::StreamError,
};

/// The metadata of a file that ends up in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime_sec: i64,
    pub mtime_nsec: u32,
}

impl FileStat {
    /// Stats `path`, following symlinks.
    #[allow(clippy::unnecessary_cast)]
    pub fn of(path: impl AsRef<Path>) -> io::Result<Self> {
        let st = rustix::fs::stat(path.as_ref())?;
        Ok(Self {
            mode: st.st_mode as u32,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            size: st.st_size as u64,
            mtime_sec: st.st_mtime as i64,
            mtime_nsec: st.st_mtime_nsec as u32,
        })
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_raw_mode(self.mode)
    }
}

/// One alternate data stream of a listed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub name: OsString,
    /// None if the stream couldn't be stat'ed.
    pub size: Option<u64>,
}

/// One row of the listing, plus one row per stream.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The absolute path.
    pub path: PathBuf,
    /// The path as it should be displayed.
    pub name: PathBuf,
    pub stat: FileStat,
    pub streams: Vec<StreamEntry>,
}

/// Everything that was listed, and everything that went wrong along the way.
#[derive(Debug, Default)]
pub struct Listing {
    pub entries: Vec<Entry>,
    pub problems: Vec<StreamError>,
}

/// Where the stream names of the listed files come from.
#[derive(Debug)]
pub enum StreamSource<'a> {
    /// Don't look for streams at all.
    Disabled,
    /// Ask getfattr about every regular file individually.
    PerFile(&'a StreamCatalog),
    /// Look files up in the result of one recursive getfattr call.
    Tree(PathStreamMap),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ListOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Only keep entries that have at least one stream.
    pub only_with_streams: bool,
}

/// The path of a stream as exposed by ntfs-3g's `streams_interface=windows`: `file:stream`.
pub fn stream_path(path: &Path, stream: &OsString) -> PathBuf {
    let mut result = path.as_os_str().to_owned();
    result.push(":");
    result.push(stream);
    result.into()
}

struct Walker<'a> {
    base: &'a Path,
    options: ListOptions,
    source: StreamSource<'a>,
    listing: Listing,
}

impl Walker<'_> {
    fn streams_of(&mut self, path: &Path, stat: &FileStat) -> StreamList {
        let catalog = match &self.source {
            StreamSource::Disabled => return vec![],
            StreamSource::Tree(map) => return map.get(path).to_vec(),
            StreamSource::PerFile(catalog) => *catalog,
        };

        if stat.file_type() != FileType::RegularFile {
            return vec![];
        }

        catalog.streams_of_file(path).unwrap_or_else(|err| {
            // If getfattr can't be run for one file it can't be run for any of them.
            if matches!(err, StreamError::ExecutionFailure { .. }) {
                self.source = StreamSource::Disabled;
            }
            self.listing.problems.push(err);
            vec![]
        })
    }

    fn add(&mut self, path: PathBuf, name: PathBuf) -> Option<FileStat> {
        let stat = match FileStat::of(&path) {
            Ok(stat) => stat,
            Err(source) => {
                self.problem(path, source);
                return None;
            }
        };

        let streams = self
            .streams_of(&path, &stat)
            .into_iter()
            .map(|name| {
                let size = match FileStat::of(stream_path(&path, &name)) {
                    Ok(st) => Some(st.size),
                    Err(source) => {
                        self.problem(stream_path(&path, &name), source);
                        None
                    }
                };
                StreamEntry { name, size }
            })
            .collect::<Vec<_>>();

        trace!("{path:?}: {} streams", streams.len());

        if !self.options.only_with_streams || !streams.is_empty() {
            self.listing.entries.push(Entry {
                path,
                name,
                stat,
                streams,
            });
        }

        Some(stat)
    }

    fn problem(&mut self, path: PathBuf, source: impl Into<io::Error>) {
        self.listing.problems.push(StreamError::FilesystemAccess {
            path,
            source: source.into(),
        });
    }

    /// The names and types of the entries of `dir`, sorted by name.
    fn read_children(&mut self, dir: &Path) -> Vec<(OsString, FileType)> {
        let entries = open(
            dir,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .and_then(Dir::read_from);
        let entries = match entries {
            Ok(entries) => entries,
            Err(errno) => {
                self.problem(dir.to_path_buf(), errno);
                return vec![];
            }
        };

        let mut children = vec![];
        for item in entries {
            let entry = match item {
                Ok(entry) => entry,
                Err(errno) => {
                    self.problem(dir.to_path_buf(), errno);
                    break;
                }
            };
            let name = OsStr::from_bytes(entry.file_name().to_bytes());

            if name == "." || name == ".." {
                continue;
            }

            children.push((name.to_os_string(), entry.file_type()));
        }

        children.sort_by(|(a, _), (b, _)| a.cmp(b));
        children
    }

    fn walk(&mut self, dir: &Path) {
        for (name, ifmt) in self.read_children(dir) {
            let path = dir.join(&name);
            let display = path
                .strip_prefix(self.base)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());

            if self.add(path.clone(), display).is_none() {
                continue;
            }

            // Some filesystems don't fill in the type in readdir().
            let ifmt = match ifmt {
                FileType::Unknown => lstat(&path)
                    .map(|st| FileType::from_raw_mode(st.st_mode))
                    .unwrap_or(FileType::Unknown),
                ifmt => ifmt,
            };

            // Only real directories: a symlink to a directory is listed but not entered.
            if self.options.recursive && ifmt == FileType::Directory {
                self.walk(&path);
            }
        }
    }
}

/// Lists a single file.  `name` is how it should be displayed.
pub fn list_file(
    path: impl AsRef<Path>,
    name: impl Into<PathBuf>,
    options: ListOptions,
    source: StreamSource<'_>,
) -> Listing {
    let path = path.as_ref();
    let mut walker = Walker {
        base: path,
        options,
        source,
        listing: Listing::default(),
    };
    walker.add(path.to_path_buf(), name.into());
    walker.listing
}

/// Lists the contents of the directory `base`, which should be absolute, in name order.
///
/// Entries that can't be inspected are reported in [`Listing::problems`] and skipped; the rest of
/// the directory is still listed.
pub fn list_directory(
    base: impl AsRef<Path>,
    options: ListOptions,
    source: StreamSource<'_>,
) -> Listing {
    let base = base.as_ref();
    debug!("Listing {base:?} ({options:?})");

    let mut walker = Walker {
        base,
        options,
        source,
        listing: Listing::default(),
    };
    walker.walk(base);
    walker.listing
}
