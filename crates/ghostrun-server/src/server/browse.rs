//! Read-only directory listings for picking a project and its plan documents.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use ghostrun_core::config::DocsConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ApiError;

/// One candidate project directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: PathBuf,
}

/// `GET /api/projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub success: bool,
    pub projects: Vec<ProjectInfo>,
}

/// One document, with its path relative to the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
}

/// `GET /api/files?project=`: documents grouped by folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub success: bool,
    pub files: BTreeMap<String, Vec<FileInfo>>,
}

/// Query string of `GET /api/files`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub project: String,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Non-hidden directories directly under `base`, sorted by name.
///
/// Files and symlinks are skipped.
pub async fn list_projects(base: &Path) -> io::Result<Vec<ProjectInfo>> {
    let mut entries = tokio::fs::read_dir(base).await?;
    let mut projects = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        // file_type() does not follow symlinks
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        projects.push(ProjectInfo {
            path: base.join(&name),
            name,
        });
    }
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

/// Documents in each configured folder of the project's docs directory.
///
/// A missing folder lists as empty. A missing docs directory is a 404.
pub async fn list_docs(
    project: &Path,
    docs: &DocsConfig,
) -> Result<BTreeMap<String, Vec<FileInfo>>, ApiError> {
    let docs_dir = project.join(&docs.dir);
    match tokio::fs::metadata(&docs_dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ApiError::BadRequest(
                "docs path is not a directory".into(),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("docs directory does not exist".into()));
        }
        Err(e) => {
            return Err(ApiError::Internal(format!(
                "failed to check docs directory: {e}"
            )));
        }
    }

    let suffix = format!(".{}", docs.extension);
    let mut files = BTreeMap::new();
    for folder in &docs.folders {
        let listed = match list_folder(&docs_dir.join(folder)).await {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ApiError::Internal(format!(
                    "failed to read folder {folder}: {e}"
                )));
            }
        };
        let entries: Vec<FileInfo> = listed
            .into_iter()
            .filter(|name| !is_hidden(name) && name.ends_with(&suffix))
            .map(|name| FileInfo {
                path: Path::new(&docs.dir)
                    .join(folder)
                    .join(&name)
                    .to_string_lossy()
                    .into_owned(),
                name,
            })
            .collect();
        debug!(folder = %folder, count = entries.len(), "Listed docs folder");
        files.insert(folder.clone(), entries);
    }
    Ok(files)
}

/// Names of the non-directory entries in `dir`, sorted.
async fn list_folder(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
