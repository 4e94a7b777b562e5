//! Quoting helpers for the different layers a command string passes through
//! before it reaches a shell.

use std::borrow::Cow;

/// Quote `s` as a single POSIX shell word.
///
/// Falls back to manual single-quoting when shlex refuses the input (it
/// rejects interior NUL bytes).
pub fn quote_posix(s: &str) -> Cow<'_, str> {
    match shlex::try_quote(s) {
        Ok(quoted) => quoted,
        Err(_) => Cow::Owned(format!("'{}'", s.replace('\0', "").replace('\'', "'\\''"))),
    }
}

/// Escape a string for embedding inside an AppleScript string literal.
///
/// Order matters: backslashes first so the escapes added for quotes are not
/// doubled again.
pub fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\'")
}

/// Escape a string for the argument list of `Start-Process`.
///
/// The value ends up inside a single-quoted PowerShell literal (single quotes
/// doubled) and is re-parsed by the elevated process, which needs embedded
/// double quotes backtick-escaped.
pub fn escape_elevation(s: &str) -> String {
    s.replace('\'', "''").replace('"', "`\"")
}

/// Wrap a path in double quotes when it contains whitespace.
pub fn quote_if_whitespace(path: &str) -> Cow<'_, str> {
    if path.chars().any(char::is_whitespace) && !(path.starts_with('"') && path.ends_with('"')) {
        Cow::Owned(format!("\"{}\"", path))
    } else {
        Cow::Borrowed(path)
    }
}
