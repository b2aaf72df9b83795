//! Virtual-path normalization.
//!
//! This is one of the most important pieces of code in the engine from a
//! security perspective: every vpath a client sends passes through
//! [`normalize`] before it touches the permission or file layers. Read it
//! carefully.

use crate::error::EngineError;

/// Splits a vpath into its non-empty, slash-delimited segments.
///
/// `"/a/b/"` and `"a//b"` both yield `["a", "b"]`; a leading/trailing slash
/// run is never itself a segment.
pub fn split(vpath: &str) -> Vec<&str> {
    vpath.split('/').filter(|s| !s.is_empty()).collect()
}

/// Re-joins segments into a canonical, root-anchored vpath.
///
/// An empty segment list renders as `"/"`.
pub fn to_vpath(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Normalizes `vpath` relative to `current_dir`, rejecting traversal attacks.
///
/// - An empty `vpath` resolves to `current_dir` itself.
/// - A `vpath` starting with `/` is resolved from the root; otherwise it is
///   resolved relative to `current_dir`.
/// - `.` segments are dropped; `..` segments pop one resolved segment (an
///   error if there is nothing to pop); a segment containing a backslash,
///   three or more consecutive dots, or `..` followed by any character other
///   than `/` is rejected.
///
/// The result never contains `.`, `..`, `//`, `\`, or a trailing `/` (unless
/// it is exactly `"/"`).
pub fn normalize(vpath: &str, current_dir: &str) -> Result<String, EngineError> {
    Ok(to_vpath(&normalize_and_split(vpath, current_dir)?))
}

/// Like [`normalize`] but returns the resolved segments instead of a joined
/// string, for callers that want to inspect or further transform them (e.g.
/// `CreateSubpath`).
pub fn normalize_and_split<'a>(vpath: &'a str, current_dir: &'a str) -> Result<Vec<&'a str>, EngineError> {
    if vpath.is_empty() {
        return Ok(split(current_dir));
    }

    let mut parts: Vec<&str> = if vpath.starts_with('/') { Vec::new() } else { split(current_dir) };

    let bytes = vpath.as_bytes();
    let len = bytes.len();
    let mut cur = 0;
    while cur < len {
        if bytes[cur] == b'/' {
            cur += 1;
            continue;
        }

        if bytes[cur] == b'.' {
            let p = cur + 1;
            if p == len {
                // Path ends with a single "." - strip it off.
                cur = p;
                continue;
            }
            if bytes[p] == b'/' {
                // "./" - just strip it off.
                cur = p + 1;
                continue;
            }
            if bytes[p] == b'.' {
                // ".." - investigate further.
                let pp = p + 1;
                if pp == len || bytes[pp] == b'/' {
                    // "..[/]" - wind up one part.
                    if parts.is_empty() {
                        return Err(EngineError::AccessDenied(format!("path escapes root: {vpath}")));
                    }
                    parts.pop();
                    cur = if pp == len { pp } else { pp + 1 };
                    continue;
                }
                // We don't allow dot-dot-anything but "../".
                return Err(EngineError::AccessDenied(format!("invalid path segment in: {vpath}")));
            }
            // A lone leading '.' followed by neither '/' nor '.' (e.g.
            // ".git") is an ordinary, legal segment - fall through to the
            // generic scan below, starting at `cur`.
        }

        let start = cur;
        let mut p = cur;
        while p < len && bytes[p] != b'/' {
            if bytes[p] == b'\\' {
                return Err(EngineError::AccessDenied(format!("backslash not allowed in: {vpath}")));
            }
            if bytes[p] == b'.' && p != start && (p + 1 == len || bytes[p + 1] == b'.' || bytes[p + 1] == b'/') {
                break;
            }
            p += 1;
        }

        if p != start {
            parts.push(std::str::from_utf8(&bytes[start..p]).expect("vpath is valid utf8 by construction"));
            cur = p;
            continue;
        }

        debug_assert_eq!(cur, len);
    }

    Ok(parts)
}
