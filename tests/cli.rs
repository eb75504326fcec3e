//! Runs the `lad` binary against temporary directories, with a fake getfattr that prints a dump
//! prepared by each test.

use std::{
    fs::{create_dir, write},
    os::unix::fs::{MetadataExt, PermissionsExt},
    path::{Path, PathBuf},
    process::{Command, Output},
};

use once_cell::sync::Lazy;
use similar_asserts::assert_eq;
use tempfile::TempDir;

/// A getfattr replacement that prints the file named by `$LAD_FAKE_DUMP`.
///
/// It's written once, before any test spawns it, so that no other thread can fork while the
/// file is still open for writing.
static FAKE_GETFATTR: Lazy<(TempDir, PathBuf)> = Lazy::new(|| {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("getfattr");
    write(&script, "#!/bin/sh\ncat \"$LAD_FAKE_DUMP\"\n").unwrap();
    std::fs::set_permissions(&script, PermissionsExt::from_mode(0o755)).unwrap();
    (dir, script)
});

fn lad(dump: &str, args: &[&str], path: &Path) -> Output {
    let dumpdir = tempfile::tempdir().unwrap();
    let dumpfile = dumpdir.path().join("dump.txt");
    write(&dumpfile, dump).unwrap();

    Command::new(env!("CARGO_BIN_EXE_lad"))
        .args(args)
        .arg(path)
        .env("LAD_GETFATTR", &FAKE_GETFATTR.1)
        .env("LAD_FAKE_DUMP", &dumpfile)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

/// The name column of each line.
fn names(output: &Output) -> Vec<String> {
    stdout(output)
        .lines()
        .map(|line| line.rsplit(' ').next().unwrap().to_string())
        .collect()
}

/// The dump getfattr would print for `-R` on `base`: paths relative to `/`.
fn tree_dump(base: &Path) -> String {
    let base = base.strip_prefix("/").unwrap().display();
    format!(
        "\
# file: {base}/a.txt
ntfs.streams.list=\"secret\\000backup\"

# file: {base}/sub
ntfs.streams.list=\"\"

# file: {base}/sub/b.txt
ntfs.streams.list=\"notes\"

"
    )
}

/// `a.txt` with a stream `secret` whose content is reachable as `a.txt:secret`, and `sub/b.txt`
/// with a stream `notes` that can't be stat'ed.
fn populate() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path().join("a.txt"), "hello").unwrap();
    write(dir.path().join("a.txt:secret"), "0123456789").unwrap();
    create_dir(dir.path().join("sub")).unwrap();
    write(dir.path().join("sub/b.txt"), "").unwrap();
    write(dir.path().join("z.txt"), "").unwrap();
    dir
}

#[test]
fn test_recursive() {
    let dir = populate();
    let output = lad(&tree_dump(dir.path()), &["-R", "-n", "--no-warning"], dir.path());

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        names(&output),
        [
            "a.txt",
            "a.txt:secret",
            "a.txt:backup",
            "a.txt:secret",
            "sub",
            "sub/b.txt",
            "sub/b.txt:notes",
            "z.txt",
        ]
    );

    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    // stream rows carry the size of the stream, or `?`
    assert!(lines[1].contains(" 10 "), "{}", lines[1]);
    assert!(lines[2].contains(" ? "), "{}", lines[2]);
    assert!(lines[6].contains(" ? "), "{}", lines[6]);

    // the two streams that couldn't be stat'ed
    let err = stderr(&output);
    assert_eq!(err.matches("could not be analyzed").count(), 2, "{err}");
}

#[test]
fn test_only_with_streams() {
    let dir = populate();
    let output = lad(
        &tree_dump(dir.path()),
        &["-R", "-F", "--no-warning"],
        dir.path(),
    );

    assert!(output.status.success());
    assert_eq!(
        names(&output),
        [
            "a.txt",
            "a.txt:secret",
            "a.txt:backup",
            "sub/b.txt",
            "sub/b.txt:notes",
        ]
    );
}

#[test]
fn test_numeric_ids() {
    let dir = populate();
    let output = lad("", &["-n", "--no-warning"], &dir.path().join("a.txt"));

    assert!(output.status.success());
    let metadata = std::fs::metadata(dir.path().join("a.txt")).unwrap();
    let out = stdout(&output);
    let fields: Vec<&str> = out.split_whitespace().collect();
    assert!(fields[0].starts_with('-'));
    assert_eq!(fields[1], metadata.uid().to_string());
    assert_eq!(fields[2], metadata.gid().to_string());
    assert_eq!(fields[3], "5");
}

#[test]
fn test_single_file_name() {
    let dir = populate();
    let path = dir.path().join("sub/b.txt");
    let output = lad("", &["--no-warning"], &path);

    assert!(output.status.success());
    assert_eq!(names(&output), [path.display().to_string()]);
}

#[test]
fn test_human_readable() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path().join("big"), vec![0u8; 3 * 1024]).unwrap();
    let output = lad("", &["-h", "-n", "--no-warning"], dir.path());

    assert!(output.status.success());
    let out = stdout(&output);
    assert_eq!(out.split_whitespace().nth(3), Some("3K"), "{out}");
}

#[test]
fn test_full_time() {
    let dir = populate();
    let output = lad("", &["--full-time", "--no-warning"], &dir.path().join("a.txt"));

    assert!(output.status.success());
    let out = stdout(&output);
    // mode, owner, group, size, date, time, zone, name
    let fields: Vec<&str> = out.split_whitespace().collect();
    assert_eq!(fields.len(), 8, "{out}");
    assert_eq!(fields[5].len(), "00:00:00.000000000".len(), "{out}");
}

#[test]
fn test_filesystem_warning() {
    // temporary directories are never on ntfs-3g
    let dir = populate();

    let output = lad("", &[], dir.path());
    assert!(output.status.success());
    assert!(stderr(&output).contains("not under a NTFS filesystem"));
    assert_eq!(names(&output), ["a.txt", "a.txt:secret", "sub", "z.txt"]);

    let output = lad("", &["--no-warning"], dir.path());
    assert!(output.status.success());
    assert_eq!(stderr(&output), "");
}

#[test]
fn test_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let output = lad("", &[], &dir.path().join("nope"));

    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("does not exist"), "{}", stderr(&output));
}

#[test]
fn test_inaccessible_path() {
    // a path that exists but can't be stat'ed
    let dir = tempfile::tempdir().unwrap();
    let looped = dir.path().join("loop");
    std::os::unix::fs::symlink(&looped, &looped).unwrap();
    let output = lad("", &[], &looped);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(!err.contains("does not exist"), "{err}");
    assert!(err.contains("Inspecting"), "{err}");
    assert!(err.contains("os error 40"), "{err}");
}

#[test]
fn test_missing_getfattr() {
    let dir = populate();
    let output = Command::new(env!("CARGO_BIN_EXE_lad"))
        .args(["-R", "--no-warning", "--getfattr", "/nonexistent/getfattr"])
        .arg(dir.path())
        .output()
        .unwrap();

    // the listing is still printed, without streams
    assert!(output.status.success());
    assert_eq!(names(&output), ["a.txt", "a.txt:secret", "sub", "sub/b.txt", "z.txt"]);
    assert!(stderr(&output).contains("/nonexistent/getfattr"));
}

#[test]
fn test_protocol_violation_is_not_fatal() {
    let dir = populate();
    let base = dir.path().strip_prefix("/").unwrap().display().to_string();
    let dump = format!(
        "# file: {base}/a.txt\n# file: {base}/z.txt\nntfs.streams.list=\"x\"\n\n"
    );
    let output = lad(&dump, &["-R", "-F", "--no-warning"], dir.path());

    assert!(output.status.success());
    assert_eq!(names(&output), ["z.txt", "z.txt:x"]);

    let err = stderr(&output);
    let needle = format!(
        "warning: attribute dump line 2: MissingAttribute (record for /{base}/a.txt)"
    );
    assert_eq!(err.matches(&needle).count(), 1, "{err}");
}
