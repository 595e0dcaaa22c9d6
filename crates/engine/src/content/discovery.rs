use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentLoadRequest, DiscoveryError};

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub source_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SourceFormat {
    Json,
    Xml,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|ext| ext.to_str())?;
        if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ext.eq_ignore_ascii_case("xml") {
            Some(Self::Xml)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    pub format: SourceFormat,
}

pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentLoadRequest,
) -> Result<Vec<ModSource>, DiscoveryError> {
    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        mod_load_index: 0,
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in request.enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(DiscoveryError::EmptyEnabledMod);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(DiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        if !mod_dir.is_dir() {
            return Err(DiscoveryError::EnabledModMissing {
                mod_id: trimmed.to_string(),
                expected_dir: mod_dir,
            });
        }
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            mod_load_index: u32::try_from(idx + 1).unwrap_or(u32::MAX),
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

/// Prototype files under `root`, ordered by `/`-joined relative path.
/// A missing base directory yields no files.
pub(crate) fn collect_source_files_sorted(root: &Path) -> Result<Vec<SourceFile>, DiscoveryError> {
    let mut files = Vec::<(String, SourceFile)>::new();
    if root.is_dir() {
        collect_recursive(root, root, &mut files)?;
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files.into_iter().map(|(_, file)| file).collect())
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, SourceFile)>,
) -> Result<(), DiscoveryError> {
    let entries = fs::read_dir(current).map_err(|source| DiscoveryError::ReadDir {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::ReadDir {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
        } else if let Some(format) = SourceFormat::from_path(&path) {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            files.push((normalize_rel_path(relative), SourceFile { path, format }));
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
