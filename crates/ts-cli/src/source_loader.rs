use std::fs;
use std::path::{Path, PathBuf};

use ts_core::ThreadScriptError;
use walkdir::WalkDir;

use crate::{file_error, FileOp, LoadedScript};

const SCRIPT_EXTENSION: &str = ".twee";

pub(crate) fn load_script_source(script: &str) -> Result<LoadedScript, ThreadScriptError> {
    let path = resolve_script_path(script)?;
    let source = if path.is_dir() {
        read_twee_files_from_dir(&path)?
            .into_iter()
            .map(|(_, content)| content)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        fs::read_to_string(&path).map_err(|error| file_error(FileOp::ReadScript, &path, error))?
    };

    Ok(LoadedScript {
        id: path.to_string_lossy().to_string(),
        source,
    })
}

pub(crate) fn resolve_script_path(script: &str) -> Result<PathBuf, ThreadScriptError> {
    let path = PathBuf::from(script);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|error| file_error(FileOp::ResolveScript, &path, error))?
            .join(path)
    };

    if !absolute.exists() {
        return Err(ThreadScriptError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("script does not exist: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// `.twee` files under `dir`, sorted by relative path.
pub(crate) fn read_twee_files_from_dir(
    dir: &Path,
) -> Result<Vec<(String, String)>, ThreadScriptError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path.to_string_lossy().ends_with(SCRIPT_EXTENSION) {
            continue;
        }

        let relative = path
            .strip_prefix(dir)
            .map_err(|error| file_error(FileOp::ScanScripts, path, error))?
            .to_string_lossy()
            .replace('\\', "/");
        let content =
            fs::read_to_string(path).map_err(|error| file_error(FileOp::ReadScript, path, error))?;
        files.push((relative, content));
    }

    if files.is_empty() {
        return Err(ThreadScriptError::new(
            "CLI_SOURCE_EMPTY",
            format!("No .twee files under {}", dir.display()),
        ));
    }

    files.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(files)
}
