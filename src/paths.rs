//! Path helpers shared by the tilemap and tileset loaders.
//!
//! Every asset file refers to its dependencies relative to its own folder.

use std::path::{Component, Path, PathBuf};

/// Returns the folder containing `path`, or `.` if it has none.
pub fn directory_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Returns the extension of `path` as UTF-8, if any.
pub fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Joins `relative` onto `base` and lexically folds `.` and `..` components.
///
/// An absolute `relative` replaces `base` entirely.
pub fn combine(base: &Path, relative: &Path) -> PathBuf {
    let joined = base.join(relative);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Strips from `to` the leading components it shares with the folder of `from`.
///
/// This is a plain suffix, not a re-encoded relative path: no `..` is ever
/// emitted, so `to` is expected to live beside or below `from`.
pub fn relative_suffix(from: &Path, to: &Path) -> PathBuf {
    let base = directory_of(from);
    let base: Vec<_> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let target: Vec<_> = to
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let shared = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    target[shared..].iter().map(|c| c.as_os_str()).collect()
}
