//! Site Assembler: writes the finished site in one step.
//!
//! Everything is written to a staging directory next to the output directory
//! first. Only when every page and static file is in place is the previous
//! output swapped out, so a failed run leaves the old site untouched.

use crate::error::WriteError;
use crate::log;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Write `pages` (site-relative path → HTML) and the contents of every
/// directory in `static_dirs` to `output_dir`, replacing whatever was there.
pub fn assemble(
    output_dir: &Path,
    pages: &BTreeMap<String, String>,
    static_dirs: &[PathBuf],
) -> Result<(), WriteError> {
    for path in pages.keys() {
        check_page_path(path)?;
    }

    let (parent, name) = split_output(output_dir)?;
    fs::create_dir_all(&parent).map_err(|err| WriteError::io(&parent, err))?;

    let pid = std::process::id();
    let staging = parent.join(format!(".{name}.staging-{pid}"));
    let backup = parent.join(format!(".{name}.previous-{pid}"));

    remove_if_exists(&staging)?;
    if let Err(err) = stage(&staging, pages, static_dirs) {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    swap(output_dir, &staging, &backup)
}

/// Page paths are relative, non-empty and never leave the output directory.
fn check_page_path(path: &str) -> Result<(), WriteError> {
    let candidate = Path::new(path);
    let valid = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(WriteError::InvalidPath(candidate.to_path_buf()))
    }
}

fn split_output(output_dir: &Path) -> Result<(PathBuf, String), WriteError> {
    let name = output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| WriteError::NoParent(output_dir.to_path_buf()))?;
    let parent = match output_dir.parent() {
        Some(p) if p.as_os_str().is_empty() => PathBuf::from("."),
        Some(p) => p.to_path_buf(),
        None => return Err(WriteError::NoParent(output_dir.to_path_buf())),
    };
    Ok((parent, name))
}

fn stage(staging: &Path, pages: &BTreeMap<String, String>, static_dirs: &[PathBuf]) -> Result<(), WriteError> {
    fs::create_dir_all(staging).map_err(|err| WriteError::io(staging, err))?;

    for dir in static_dirs {
        copy_static(dir, staging)?;
    }

    for (path, html) in pages {
        let dest = staging.join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| WriteError::io(parent, err))?;
        }
        fs::write(&dest, html).map_err(|err| WriteError::io(&dest, err))?;
    }

    Ok(())
}

/// Copy the contents of `src` into `dst`, keeping relative paths.
fn copy_static(src: &Path, dst: &Path) -> Result<(), WriteError> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(src).to_path_buf();
            WriteError::io(path, err.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let dest = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|err| WriteError::io(&dest, err))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|err| WriteError::io(entry.path(), err))?;
            log!("static"; "{}", relative.display());
        }
    }
    Ok(())
}

/// Move `staging` into place, keeping the old output until that succeeded.
fn swap(output_dir: &Path, staging: &Path, backup: &Path) -> Result<(), WriteError> {
    let had_previous = output_dir.exists();
    if had_previous {
        remove_if_exists(backup)?;
        fs::rename(output_dir, backup).map_err(|err| WriteError::io(output_dir, err))?;
    }

    if let Err(err) = fs::rename(staging, output_dir) {
        if had_previous {
            let _ = fs::rename(backup, output_dir);
        }
        let _ = fs::remove_dir_all(staging);
        return Err(WriteError::io(output_dir, err));
    }

    if had_previous {
        remove_if_exists(backup)?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), WriteError> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(());
    };
    result.map_err(|err| WriteError::io(path, err))
}
