//! JSON pointers (RFC 6901).
//!
//! A pointer is either empty (the whole document) or a sequence of
//! `/`-prefixed segments. Inside a segment `~` is written `~0` and `/` is
//! written `~1`.

use crate::error::{PatchError, Result};

/// Escape one path segment.
pub fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse [`escape`], rejecting dangling or unknown escapes.
pub fn unescape(segment: &str, pointer: &str) -> Result<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(PatchError::InvalidEscape {
                    pointer: pointer.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Append `segment` to `base`.
pub fn join(base: &str, segment: &str) -> String {
    format!("{base}/{}", escape(segment))
}

/// Split a pointer into unescaped segments. The root pointer yields none.
pub fn parse(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchError::MalformedPointer {
            pointer: pointer.to_string(),
        });
    };
    rest.split('/')
        .map(|segment| unescape(segment, pointer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_order() {
        // `~` first, otherwise "~1" from a slash would be re-escaped
        assert_eq!(escape("a/b"), "a~1b");
        assert_eq!(escape("m~n"), "m~0n");
        assert_eq!(escape("~/"), "~0~1");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "settings"), "/settings");
        assert_eq!(join("/settings", "index/refresh"), "/settings/index~1refresh");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse("").unwrap(), Vec::<String>::new());
        assert_eq!(parse("/a/b").unwrap(), vec!["a", "b"]);
        assert_eq!(parse("/a~1b/~0c").unwrap(), vec!["a/b", "~c"]);
        // Empty segments are legal keys
        assert_eq!(parse("/").unwrap(), vec![""]);
        assert_eq!(parse("/a//b").unwrap(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("settings/replicas"),
            Err(PatchError::MalformedPointer { .. })
        ));
        assert!(matches!(parse("/a~2"), Err(PatchError::InvalidEscape { .. })));
        assert!(matches!(parse("/a~"), Err(PatchError::InvalidEscape { .. })));
    }
}
