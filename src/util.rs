use std::{
    borrow::Cow,
    ffi::OsStr,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

/// Decodes the `\ooo` octal escapes used by getfattr and by `/proc/self/mounts`.
///
/// Both tools escape a byte as a backslash followed by exactly three octal digits.  Anything
/// that doesn't look like such an escape (a lone backslash, too few digits, a value above 0o377)
/// is passed through verbatim.
///
/// This call never fails.
pub(crate) fn unescape_octal(input: &str) -> Cow<'_, [u8]> {
    let bytes = input.as_bytes();
    if !bytes.contains(&b'\\') {
        return Cow::Borrowed(bytes);
    }

    let mut result = Vec::with_capacity(bytes.len());
    let mut rest = bytes;

    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'\\' {
            if let [hi @ b'0'..=b'3', mid @ b'0'..=b'7', lo @ b'0'..=b'7', ..] = tail {
                result.push(((hi - b'0') << 6) | ((mid - b'0') << 3) | (lo - b'0'));
                rest = &tail[3..];
                continue;
            }
        }
        result.push(byte);
        rest = tail;
    }

    Cow::Owned(result)
}

/// Like [`unescape_octal`], but produces a path.
pub(crate) fn unescape_path(input: &str) -> PathBuf {
    Path::new(OsStr::from_bytes(&unescape_octal(input))).to_path_buf()
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_unescape_octal() {
        // nothing to do: borrowed
        assert!(matches!(unescape_octal("plain"), Cow::Borrowed(_)));
        assert_eq!(&*unescape_octal("plain"), b"plain");

        assert_eq!(&*unescape_octal(r"a\040b"), b"a b");
        assert_eq!(&*unescape_octal(r"tab\011"), b"tab\t");
        assert_eq!(&*unescape_octal(r"\134"), b"\\");
        assert_eq!(&*unescape_octal(r"\303\251t\303\251"), "été".as_bytes());

        // not escapes
        assert_eq!(&*unescape_octal(r"\"), b"\\");
        assert_eq!(&*unescape_octal(r"\04"), b"\\04");
        assert_eq!(&*unescape_octal(r"\400"), b"\\400");
        assert_eq!(&*unescape_octal(r"\x41"), b"\\x41");
    }

    #[test]
    fn test_unescape_path() {
        assert_eq!(
            unescape_path(r"mnt/My\040Drive"),
            PathBuf::from("mnt/My Drive")
        );
    }
}
