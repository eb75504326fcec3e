//! Parsing of `getfattr -e text -n ntfs.streams.list` dumps.
//!
//! getfattr prints one block per file:
//!
//! ```text
//! # file: data/report.docx
//! ntfs.streams.list="Zone.Identifier\000summary"
//!
//! ```
//!
//! The path on the marker line is relative to the root of the query (getfattr strips the leading
//! `/` from absolute paths), and the stream names in the quoted value are separated by the escaped
//! NUL byte `\000`.  Files without streams get an empty value.

use std::{
    ffi::OsString,
    os::unix::ffi::OsStringExt,
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    catalog::{PathStreamMap, StreamList},
    error::{ProtocolViolation, ViolationKind},
    util::{unescape_octal, unescape_path},
    STREAMS_XATTR,
};

/// The prefix of the line that starts a new block.
pub const FILE_MARKER: &str = "# file: ";

/// The separator between stream names inside the quoted attribute value.
const STREAM_SEPARATOR: &str = r"\000";

/// The result of parsing one dump.
#[derive(Debug, Default)]
pub struct ParsedDump {
    /// Every file that has at least one stream.
    pub streams: PathStreamMap,
    /// Records that had to be skipped.
    pub violations: Vec<ProtocolViolation>,
}

#[derive(Debug)]
enum State {
    ExpectMarker,
    ExpectAttribute(PathBuf),
    ExpectSeparator(PathBuf),
    Invalid(PathBuf),
}

/// Builds the absolute key for a path printed by getfattr.
///
/// This is a plain concatenation: a path that getfattr printed with a leading `/` ends up with a
/// doubled separator rather than being joined onto the root.
fn reconstruct_path(base: &Path, relative: &str) -> PathBuf {
    let mut bytes = base.as_os_str().as_encoded_bytes().to_vec();
    if bytes.last() == Some(&b'/') {
        bytes.pop();
    }
    bytes.push(b'/');
    bytes.extend_from_slice(unescape_path(relative).as_os_str().as_encoded_bytes());
    PathBuf::from(OsString::from_vec(bytes))
}

/// Parses an attribute line, returning the list of streams, or None if the line is malformed.
fn parse_attribute(line: &str) -> Option<StreamList> {
    let value = line
        .strip_prefix(STREAMS_XATTR)?
        .strip_prefix("=\"")?
        .strip_suffix('"')?;

    Some(
        value
            .split(STREAM_SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(|name| OsString::from_vec(unescape_octal(name).into_owned()))
            .collect(),
    )
}

fn start_record(base: &Path, line: &str) -> Option<State> {
    let relative = line.strip_prefix(FILE_MARKER)?;
    Some(State::ExpectAttribute(reconstruct_path(base, relative)))
}

/// Parses the output of getfattr into a map from absolute path to stream names.
///
/// `base` is the directory the printed paths are relative to.  For queries on absolute paths
/// that's `/`.
///
/// Malformed records are skipped and reported in [`ParsedDump::violations`]; they never prevent
/// the rest of the dump from being parsed.
pub fn parse_dump(dump: &str, base: impl AsRef<Path>) -> ParsedDump {
    let base = base.as_ref();
    let mut streams = PathStreamMap::default();
    let mut violations = vec![];
    let mut state = State::ExpectMarker;
    let mut line_nr = 0;

    let mut violation = |line: usize, path: PathBuf, kind| {
        debug!("Malformed getfattr record for {path:?} at line {line}: {kind:?}");
        violations.push(ProtocolViolation { line, path, kind });
    };

    for line in dump.lines() {
        line_nr += 1;

        state = match state {
            State::ExpectMarker => start_record(base, line).unwrap_or(State::ExpectMarker),
            State::ExpectAttribute(path) => {
                if let Some(next) = start_record(base, line) {
                    violation(line_nr, path, ViolationKind::MissingAttribute);
                    next
                } else if let Some(list) = parse_attribute(line) {
                    trace!("{path:?}: {list:?}");
                    streams.insert(path.clone(), list);
                    State::ExpectSeparator(path)
                } else {
                    violation(line_nr, path.clone(), ViolationKind::MalformedAttribute);
                    State::Invalid(path)
                }
            }
            State::ExpectSeparator(path) => {
                if line.is_empty() {
                    State::ExpectMarker
                } else if let Some(next) = start_record(base, line) {
                    next
                } else {
                    violation(line_nr, path.clone(), ViolationKind::UnexpectedLine);
                    State::Invalid(path)
                }
            }
            State::Invalid(path) => {
                if line.is_empty() {
                    State::ExpectMarker
                } else {
                    start_record(base, line).unwrap_or(State::Invalid(path))
                }
            }
        };
    }

    if let State::ExpectAttribute(path) = state {
        violation(line_nr + 1, path, ViolationKind::MissingAttribute);
    }

    ParsedDump {
        streams,
        violations,
    }
}
