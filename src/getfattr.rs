//! Running `getfattr` to dump the `ntfs.streams.list` attribute.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::debug;

use crate::{
    error::{Result, StreamError},
    STREAMS_XATTR,
};

/// The default program, looked up in `$PATH`.
pub const DEFAULT_PROGRAM: &str = "getfattr";

/// Invokes the attribute dump tool.
///
/// The tool exits with a failure status for all kinds of ordinary reasons (a file on a filesystem
/// without the attribute, an unreadable directory somewhere in a recursive listing) while still
/// printing everything it could find, so the exit status is ignored and whatever was written to
/// stdout is returned.  Only failing to start the program at all is an error.
#[derive(Debug, Clone)]
pub struct AttributeDump {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Default for AttributeDump {
    fn default() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }
}

impl AttributeDump {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self::with_command(program, None::<OsString>)
    }

    /// Runs `program` with `leading_args` in front of the getfattr arguments, for wrappers like
    /// `sudo getfattr` or `sh script`.
    pub fn with_command(
        program: impl Into<PathBuf>,
        leading_args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Dumps the attribute of a single file.
    pub fn run_on_file(&self, path: impl AsRef<Path>) -> Result<String> {
        self.run(&[], path.as_ref())
    }

    /// Dumps the attribute of every file below `path` with a single invocation.
    pub fn run_on_directory_recursively(&self, path: impl AsRef<Path>) -> Result<String> {
        self.run(&["-R"], path.as_ref())
    }

    fn run(&self, flags: &[&str], path: &Path) -> Result<String> {
        // The path goes in as its own argument after "--": no shell, no quoting.  Without
        // `-e text` getfattr picks base64 for values with many NULs, like short stream names.
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(flags)
            .args(["-e", "text", "-n", STREAMS_XATTR, "--"])
            .arg(path)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| StreamError::ExecutionFailure {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            debug!(
                "{:?} {} {path:?} exited with {}; using {} bytes of output",
                self.program,
                flags.join(" "),
                output.status,
                output.stdout.len()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
