//! Turning a [`Listing`](crate::walk::Listing) into an `ls -l` style table.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use nix::unistd::{Gid, Group, Uid, User};
use owo_colors::OwoColorize;
use rustix::fs::{FileType, Mode};

use crate::walk::{Entry, FileStat};

/// The column holding the size, which is right-aligned.
const SIZE_COLUMN: usize = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct FormatOptions {
    /// Print sizes like `1K 234M 2G`.
    pub human_readable: bool,
    /// Print the complete modification time in a single column.
    pub full_time: bool,
    /// Print uid and gid instead of user and group names.
    pub numeric_ids: bool,
    /// Highlight stream names.
    pub color: bool,
}

/// Formats a mode the way `ls -l` does, e.g. `-rw-r--r--` or `drwxrwxrwt`.
pub fn filemode(mode: u32) -> String {
    let kind = match FileType::from_raw_mode(mode) {
        FileType::Socket => 's',
        FileType::Symlink => 'l',
        FileType::RegularFile => '-',
        FileType::BlockDevice => 'b',
        FileType::Directory => 'd',
        FileType::CharacterDevice => 'c',
        FileType::Fifo => 'p',
        FileType::Unknown => '?',
    };
    let mode = Mode::from_raw_mode(mode);

    // (read, write, execute, special bit, special char when executable, when not)
    let triples = [
        (Mode::RUSR, Mode::WUSR, Mode::XUSR, Mode::SUID, 's', 'S'),
        (Mode::RGRP, Mode::WGRP, Mode::XGRP, Mode::SGID, 's', 'S'),
        (Mode::ROTH, Mode::WOTH, Mode::XOTH, Mode::SVTX, 't', 'T'),
    ];

    let mut result = String::with_capacity(10);
    result.push(kind);
    for (r, w, x, special, set_exec, set_noexec) in triples {
        result.push(if mode.contains(r) { 'r' } else { '-' });
        result.push(if mode.contains(w) { 'w' } else { '-' });
        result.push(match (mode.contains(x), mode.contains(special)) {
            (true, true) => set_exec,
            (false, true) => set_noexec,
            (true, false) => 'x',
            (false, false) => '-',
        });
    }
    result
}

/// Formats a size with binary units and at most one decimal: `0`, `1023`, `1K`, `1.5K`, `117.7M`.
pub fn human_readable(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["", "K", "M", "G", "T", "P", "E", "Z"] {
        if value < 1024.0 {
            let formatted = format!("{value:.1}");
            let formatted = formatted.strip_suffix(".0").unwrap_or(&formatted);
            return format!("{formatted}{unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1}Y")
}

fn size_column(size: Option<u64>, options: &FormatOptions) -> String {
    match size {
        None => "?".to_string(),
        Some(size) if options.human_readable => human_readable(size),
        Some(size) => size.to_string(),
    }
}

/// The time columns for a modification time, in the given timezone.
pub fn time_columns<Tz: TimeZone>(tz: &Tz, sec: i64, nsec: u32, full_time: bool) -> Vec<String>
where
    Tz::Offset: Display,
{
    let Some(time) = DateTime::from_timestamp(sec, nsec) else {
        return vec!["?".to_string()];
    };
    let time = time.with_timezone(tz);

    if full_time {
        vec![format!(
            "{}.{nsec:09} {}",
            time.format("%Y-%m-%d %H:%M:%S"),
            time.format("%z")
        )]
    } else {
        vec![
            time.format("%e.").to_string(),
            time.format("%B").to_string(),
            time.format("%Y").to_string(),
            time.format("%H:%M").to_string(),
        ]
    }
}

fn owner(uid: u32, numeric: bool) -> String {
    if !numeric {
        if let Ok(Some(user)) = User::from_uid(Uid::from_raw(uid)) {
            return user.name;
        }
    }
    uid.to_string()
}

fn group(gid: u32, numeric: bool) -> String {
    if !numeric {
        if let Ok(Some(group)) = Group::from_gid(Gid::from_raw(gid)) {
            return group.name;
        }
    }
    gid.to_string()
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Every column except the name.
    pub cells: Vec<String>,
    pub name: String,
    /// Set for the lines that show a stream of the file named by `name`.
    pub stream: Option<String>,
}

fn stat_cells(stat: &FileStat, size: Option<u64>, options: &FormatOptions) -> Vec<String> {
    let mut cells = vec![
        filemode(stat.mode),
        owner(stat.uid, options.numeric_ids),
        group(stat.gid, options.numeric_ids),
        size_column(size, options),
    ];
    cells.extend(time_columns(
        &Local,
        stat.mtime_sec,
        stat.mtime_nsec,
        options.full_time,
    ));
    cells
}

/// Builds the rows for a list of entries: one for each entry, followed by one for each of its
/// streams.  Stream rows repeat the metadata of their file, except for the size.
pub fn rows(entries: &[Entry], options: &FormatOptions) -> Vec<Row> {
    let mut rows = vec![];

    for entry in entries {
        let name = entry.name.to_string_lossy().into_owned();

        rows.push(Row {
            cells: stat_cells(&entry.stat, Some(entry.stat.size), options),
            name: name.clone(),
            stream: None,
        });

        for stream in &entry.streams {
            rows.push(Row {
                cells: stat_cells(&entry.stat, stream.size, options),
                name: name.clone(),
                stream: Some(stream.name.to_string_lossy().into_owned()),
            });
        }
    }

    rows
}

/// Lays the rows out as a table: each column padded to its widest cell, the size column
/// right-aligned and the name column last.
pub fn render(rows: &[Row], options: &FormatOptions) -> String {
    let mut widths: Vec<usize> = vec![];
    for row in rows {
        if widths.len() < row.cells.len() {
            widths.resize(row.cells.len(), 0);
        }
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    for row in rows {
        for (column, (cell, width)) in row.cells.iter().zip(&widths).enumerate() {
            if column == SIZE_COLUMN {
                output.push_str(&format!("{cell:>width$} "));
            } else {
                output.push_str(&format!("{cell:<width$} "));
            }
        }

        output.push_str(&row.name);
        if let Some(stream) = &row.stream {
            output.push(':');
            if options.color {
                output.push_str(&stream.blue().to_string());
            } else {
                output.push_str(stream);
            }
        }
        output.push('\n');
    }
    output
}
