//! Normalized, relative, forward-slash paths.
//!
//! Every path that crosses a bucket or module boundary is normalized: it is
//! relative, uses `/` separators, contains no `.` or `..` components, and is
//! never empty. The root itself is spelled `"."`; object paths are never
//! `"."`.

use std::collections::BTreeSet;

/// Errors produced while normalizing or relating paths.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path was empty.
    #[error("path is empty")]
    Empty,
    /// The path was absolute.
    #[error("path {path:?} is absolute, expected a relative path")]
    Absolute {
        /// The offending path.
        path: String,
    },
    /// The path used `..` to leave its root.
    #[error("path {path:?} escapes its root")]
    EscapesRoot {
        /// The offending path.
        path: String,
    },
    /// The path was not already in normalized form.
    #[error("path {path:?} is not normalized, expected {normalized:?}")]
    NotNormalized {
        /// The offending path.
        path: String,
        /// What the path normalizes to.
        normalized: String,
    },
    /// The path names the root where an object path was required.
    #[error("path \".\" does not name an object")]
    Root,
    /// `target` is not contained in `base`.
    #[error("path {target:?} is not contained in {base:?}")]
    NotContained {
        /// The base path.
        base: String,
        /// The target path.
        target: String,
    },
}

/// Normalizes `path` into relative forward-slash form.
///
/// Backslashes are treated as separators. An input that reduces to nothing,
/// such as `"a/.."`, normalizes to `"."`.
pub fn normalize(path: &str) -> Result<String, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(PathError::Absolute {
            path: path.to_string(),
        });
    }
    let mut parts: Vec<&str> = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot {
                        path: path.to_string(),
                    });
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(parts.join("/"))
    }
}

/// Validates that `path` is an already-normalized object path.
pub fn validate_object_path(path: &str) -> Result<(), PathError> {
    let normalized = normalize(path)?;
    if normalized == "." {
        return Err(PathError::Root);
    }
    if normalized != path {
        return Err(PathError::NotNormalized {
            path: path.to_string(),
            normalized,
        });
    }
    Ok(())
}

/// Joins two normalized paths, treating `"."` as the identity.
pub fn join(base: &str, rest: &str) -> String {
    match (base, rest) {
        (".", r) | ("", r) => r.to_string(),
        (b, ".") | (b, "") => b.to_string(),
        (b, r) => format!("{b}/{r}"),
    }
}

/// Returns the parent directory of `path`, or `"."` at the top level.
pub fn dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => ".",
    }
}

/// Returns the final component of `path`.
pub fn base(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Returns the extension of the final component, including the dot.
pub fn ext(path: &str) -> &str {
    let name = base(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(index) => &name[index..],
    }
}

/// Returns `true` if `child` is strictly inside `parent`.
pub fn contains(parent: &str, child: &str) -> bool {
    if parent == "." {
        return child != ".";
    }
    child.len() > parent.len()
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

/// Returns `true` if `child` equals `parent` or is inside it.
pub fn equals_or_contains(parent: &str, child: &str) -> bool {
    parent == child || contains(parent, child)
}

/// Returns `target` relative to `base`. `target` must equal or be inside
/// `base`.
pub fn rel(base: &str, target: &str) -> Result<String, PathError> {
    if base == target {
        return Ok(".".to_string());
    }
    if base == "." {
        return Ok(target.to_string());
    }
    if contains(base, target) {
        return Ok(target[base.len() + 1..].to_string());
    }
    Err(PathError::NotContained {
        base: base.to_string(),
        target: target.to_string(),
    })
}

/// Iterates over `path` and each of its ancestors, ending with `"."`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(path);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current == "." {
            None
        } else {
            Some(dir(current))
        };
        Some(current)
    })
}

/// Returns `true` if `set` contains `path` or any ancestor directory of it.
pub fn set_has_equal_or_containing_path(set: &BTreeSet<String>, path: &str) -> bool {
    ancestors(path).any(|candidate| set.contains(candidate))
}

/// Returns `true` if `set` contains a path strictly inside `path`.
pub fn set_has_contained_path(set: &BTreeSet<String>, path: &str) -> bool {
    set.iter().any(|candidate| contains(path, candidate))
}
