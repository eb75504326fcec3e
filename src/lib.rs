//! List files together with the alternate data streams attached to them.
//!
//! NTFS volumes mounted through ntfs-3g with `streams_interface=windows` expose the names of a
//! file's alternate data streams through the virtual `ntfs.streams.list` extended attribute.  This
//! crate queries that attribute with `getfattr`, parses the dump into a [`catalog::PathStreamMap`]
//! and annotates a directory listing with it.

pub mod catalog;
pub mod dump;
pub mod error;
pub mod format;
pub mod getfattr;
pub mod mounts;
pub mod walk;

mod util;


/// The virtual extended attribute that ntfs-3g uses to list the streams of a file.
pub const STREAMS_XATTR: &str = "ntfs.streams.list";
