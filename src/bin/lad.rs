//! Lists information about files, including their NTFS alternate data streams.

use std::{
    io::{stdout, ErrorKind, IsTerminal, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, warn};

use lad::{
    catalog::StreamCatalog,
    error::StreamError,
    format::{render, rows, FormatOptions},
    getfattr::{AttributeDump, DEFAULT_PROGRAM},
    mounts::MountTable,
    walk::{list_directory, list_file, ListOptions, StreamSource},
};

const WRONG_FILESYSTEM: &str = "Path is not under a NTFS filesystem partition - Alternate Data \
    Streams can not be detected. Ensure that the partition is mounted with ntfs-3g using the \
    -o streams_interface=windows option.";

const WRONG_FILESYSTEM_BASE: &str = "The provided path is not under a NTFS filesystem partition - \
    Alternate Data Streams can only be detected below a mounted NTFS partition. Use the \
    -o streams_interface=windows option when mounting. If an NTFS filesystem is mounted in a \
    subdirectory, its Alternate Data Streams will still be listed.";

/// Lists information about the FILE (the current directory by default) including Alternate Data
/// Streams.
#[derive(Debug, Parser)]
#[clap(name = "lad", version, disable_help_flag = true)]
pub struct App {
    /// print sizes like 1K 234M 2G etc.
    #[clap(short = 'h', long)]
    human_readable: bool,
    /// prints the help text
    #[clap(long, action = ArgAction::Help)]
    help: Option<bool>,
    /// list subdirectories recursively
    #[clap(short = 'R', long)]
    recursive: bool,
    /// shows the complete timestamp
    #[clap(long)]
    full_time: bool,
    /// list numeric user and group IDs
    #[clap(short = 'n', long)]
    numeric_uid_gid: bool,
    /// show only files which include Alternate Data Streams
    #[clap(short = 'F')]
    filter_files_with_ads: bool,
    /// suppress warnings (e.g. if the filesystem is not NTFS)
    #[clap(long)]
    no_warning: bool,
    /// the getfattr program to run
    #[clap(long, env = "LAD_GETFATTR", default_value = DEFAULT_PROGRAM)]
    getfattr: PathBuf,

    /// the file or directory to list
    #[clap(default_value = ".")]
    path: PathBuf,
}

impl App {
    fn filesystem_warning(&self, message: &str) {
        if !self.no_warning {
            eprintln!("warning: {message}");
        }
    }
}

fn supports_streams(mounts: Option<&MountTable>, path: &Path) -> bool {
    mounts.is_some_and(|mounts| mounts.supports_streams(path))
}

/// Makes `path` absolute without resolving symlinks, and drops `.` components and trailing
/// slashes so that it matches the paths getfattr prints.
fn absolute(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path).with_context(|| format!("Making {path:?} absolute"))?;
    Ok(path.components().collect())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = App::parse();
    debug!("{args:?}");

    let base = absolute(&args.path)?;
    let metadata = match std::fs::metadata(&base) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(StreamError::PathNotFound(args.path.clone()).into());
        }
        Err(err) => return Err(err).with_context(|| format!("Inspecting {:?}", args.path)),
    };

    let mounts = MountTable::read().inspect_err(|err| warn!("{err:#}")).ok();
    let catalog = StreamCatalog::new(AttributeDump::with_program(&args.getfattr));
    let options = ListOptions {
        recursive: false,
        only_with_streams: args.filter_files_with_ads,
    };

    let mut problems = vec![];
    let listing = if metadata.is_dir() && args.recursive {
        if !supports_streams(mounts.as_ref(), &base) {
            args.filesystem_warning(WRONG_FILESYSTEM_BASE);
        }

        // One getfattr call for the whole tree, whatever the filesystem: an NTFS volume might be
        // mounted somewhere below `base`.
        let source = match catalog.query_tree(&base) {
            Ok(parsed) => {
                problems.extend(parsed.violations.into_iter().map(StreamError::from));
                StreamSource::Tree(parsed.streams)
            }
            Err(err) => {
                problems.push(err);
                StreamSource::Disabled
            }
        };

        let options = ListOptions {
            recursive: true,
            ..options
        };
        list_directory(&base, options, source)
    } else {
        let source = if supports_streams(mounts.as_ref(), &base) {
            StreamSource::PerFile(&catalog)
        } else {
            args.filesystem_warning(WRONG_FILESYSTEM);
            StreamSource::Disabled
        };

        if metadata.is_dir() {
            list_directory(&base, options, source)
        } else {
            // shown the way it was given on the command line
            list_file(&base, &args.path, options, source)
        }
    };

    problems.extend(listing.problems);
    for problem in &problems {
        eprintln!("warning: {problem}");
    }

    let options = FormatOptions {
        human_readable: args.human_readable,
        full_time: args.full_time,
        numeric_ids: args.numeric_uid_gid,
        color: stdout().is_terminal(),
    };
    let table = render(&rows(&listing.entries, &options), &options);
    stdout()
        .lock()
        .write_all(table.as_bytes())
        .context("Writing listing")?;

    Ok(())
}
