//! Dotted/bracket path resolution over JSON value trees.
//!
//! `user.tags[0]`, `steps['fetch-data'].body` and `items.2` are all valid
//! paths. Missing segments resolve to `None`; nothing here returns an error.

use serde_json::Value;

/// Split a path into its segments.
///
/// Bracket segments may be quoted (`['a.b']`, `["a.b"]`) or bare (`[0]`).
/// Returns `None` for malformed input such as an unclosed bracket.
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let key = match chars.peek() {
                    Some(&quote @ ('\'' | '"')) => {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some(ch) if ch == quote => break,
                                Some(ch) => key.push(ch),
                                None => return None,
                            }
                        }
                        if chars.next() != Some(']') {
                            return None;
                        }
                        key
                    }
                    _ => {
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(ch) => key.push(ch),
                                None => return None,
                            }
                        }
                        key.trim().to_string()
                    }
                };
                segments.push(key);
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    Some(segments)
}

/// Walk `segments` from `root`. Arrays are indexed by numeric segments.
pub fn resolve_segments<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| {
        let segment = segment.as_ref();
        match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Resolve `path` against `root`.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    resolve_segments(root, &segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_dots_and_brackets() {
        assert_eq!(
            parse_path("steps['fetch-data'].body[0].name").unwrap(),
            vec!["steps", "fetch-data", "body", "0", "name"]
        );
        assert_eq!(parse_path(r#"a["x.y"]"#).unwrap(), vec!["a", "x.y"]);
        assert_eq!(parse_path("  input.count ").unwrap(), vec!["input", "count"]);
    }

    #[test]
    fn malformed_brackets_are_rejected() {
        assert!(parse_path("a['b").is_none());
        assert!(parse_path("a[0").is_none());
        assert!(parse_path("a['b'x]").is_none());
    }

    #[test]
    fn resolves_nested_values() {
        let root = json!({ "user": { "tags": ["a", "b"], "name": "ada" } });
        assert_eq!(resolve_path(&root, "user.name"), Some(&json!("ada")));
        assert_eq!(resolve_path(&root, "user.tags[1]"), Some(&json!("b")));
        assert_eq!(resolve_path(&root, "user.tags.0"), Some(&json!("a")));
        assert_eq!(resolve_path(&root, "user['name']"), Some(&json!("ada")));
    }

    #[test]
    fn missing_or_untraversable_is_none() {
        let root = json!({ "a": { "b": 1 }, "s": "text", "n": null });
        assert_eq!(resolve_path(&root, "a.c"), None);
        assert_eq!(resolve_path(&root, "a.b.c"), None);
        assert_eq!(resolve_path(&root, "s.length"), None);
        assert_eq!(resolve_path(&root, "n.x"), None);
        assert_eq!(resolve_path(&root, "a['b"), None);
    }

    #[test]
    fn null_is_present_not_missing() {
        let root = json!({ "n": null });
        assert_eq!(resolve_path(&root, "n"), Some(&Value::Null));
    }

    #[test]
    fn empty_path_is_root() {
        let root = json!({ "a": 1 });
        assert_eq!(resolve_path(&root, ""), Some(&root));
    }
}
