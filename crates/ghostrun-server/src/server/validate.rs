//! Request field validation.

use std::path::{Component, Path, PathBuf};

use ghostrun_core::CommandWhitelist;

use super::ApiError;

/// The project directory: required, absolute and an existing directory.
pub fn project_dir(project: &str) -> Result<PathBuf, ApiError> {
    if project.is_empty() {
        return Err(ApiError::BadRequest("project is required".into()));
    }
    let path = clean(Path::new(project));
    if !path.is_absolute() {
        return Err(ApiError::BadRequest(
            "project must be an absolute path".into(),
        ));
    }
    match std::fs::metadata(&path) {
        Ok(meta) if meta.is_dir() => Ok(path),
        Ok(_) => Err(ApiError::BadRequest("project must be a directory".into())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::BadRequest(
            "project path does not exist".into(),
        )),
        Err(_) => Err(ApiError::BadRequest(
            "failed to check project path".into(),
        )),
    }
}

/// Lexically normalize `path`: drop `.` and resolve `..` against the
/// preceding component.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Reject an empty `value` for the field `name`.
pub fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.is_empty() {
        Err(ApiError::BadRequest(format!("{name} is required")))
    } else {
        Ok(value)
    }
}

/// The command name: required and whitelisted.
pub fn command<'a>(whitelist: &CommandWhitelist, command: &'a str) -> Result<&'a str, ApiError> {
    required("command", command)?;
    if whitelist.contains(command) {
        Ok(command)
    } else {
        Err(ApiError::BadRequest(format!(
            "Command not allowed: {command}"
        )))
    }
}
