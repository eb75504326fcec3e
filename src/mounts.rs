//! Figuring out which filesystem a path lives on.
//!
//! Alternate data streams are only visible through ntfs-3g, so before asking getfattr about
//! them it's worth checking whether that could possibly work.  We look at the mount table and
//! pick the mount whose mountpoint is the longest prefix of the path.

use std::path::{Path, PathBuf};

use anyhow::Result;
use fn_error_context::context;

use crate::util::unescape_path;

/// Where the kernel lists the mounts visible to this process.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Filesystem types that can carry alternate data streams.  ntfs-3g mounts show up as `fuseblk`.
pub const STREAM_FILESYSTEMS: &[&str] = &["ntfs", "fuseblk"];

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub mountpoint: PathBuf,
    pub fstype: String,
}

/// A snapshot of the mount table.
#[derive(Debug, Default, Clone)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    /// Parses text in the `/proc/mounts` format.
    ///
    /// Lines with fewer than three fields are ignored.  Mountpoints have their octal escapes
    /// (`\040` for a space, and so on) decoded.
    pub fn parse(text: &str) -> Self {
        let mounts = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_ascii_whitespace();
                let source = fields.next()?;
                let mountpoint = fields.next()?;
                let fstype = fields.next()?;
                Some(Mount {
                    source: source.to_string(),
                    mountpoint: unescape_path(mountpoint),
                    fstype: fstype.to_string(),
                })
            })
            .collect();

        Self { mounts }
    }

    /// Reads the mount table of the current process.
    #[context("Reading mount table from /proc/self/mounts")]
    pub fn read() -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(PROC_MOUNTS)?))
    }

    /// Finds the mount that `path` lives on: the one with the longest mountpoint that is a
    /// prefix of `path`, compared component by component.
    ///
    /// If the same mountpoint appears more than once, the last one wins, just as the most
    /// recent mount shadows the earlier ones.
    pub fn mount_of(&self, path: impl AsRef<Path>) -> Option<&Mount> {
        let path = path.as_ref();
        self.mounts
            .iter()
            .filter(|mount| path.starts_with(&mount.mountpoint))
            .max_by_key(|mount| mount.mountpoint.components().count())
    }

    /// The filesystem type of the mount that `path` lives on.
    pub fn fstype_of(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.mount_of(path).map(|mount| mount.fstype.as_str())
    }

    /// Whether `path` is on a filesystem that can carry alternate data streams.
    pub fn supports_streams(&self, path: impl AsRef<Path>) -> bool {
        self.fstype_of(path)
            .is_some_and(|fstype| STREAM_FILESYSTEMS.contains(&fstype))
    }
}
