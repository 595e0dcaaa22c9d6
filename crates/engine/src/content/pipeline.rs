use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::sim::FurniturePrototype;
use crate::AppPaths;

use super::compiler::parse_furniture_defs_xml;
use super::discovery::{collect_source_files_sorted, discover_mod_sources, SourceFormat};
use super::json::parse_furniture_json;
use super::registry::{FurniturePrototypeRegistry, RegistryError};
use super::types::{ContentErrorCode, ContentLoadError, ContentLoadRequest, DiscoveryError};

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Load(#[from] ContentLoadError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Loads base content and every enabled mod into a fresh registry.
/// Later mods override earlier ones by object type.
pub fn load_furniture_prototypes(
    app_paths: &AppPaths,
    request: &ContentLoadRequest,
) -> Result<FurniturePrototypeRegistry, ContentPipelineError> {
    let sources = discover_mod_sources(app_paths, request)?;
    let mut merged = BTreeMap::<String, FurniturePrototype>::new();

    for source in &sources {
        let files = collect_source_files_sorted(&source.source_dir)?;
        let mut seen_in_mod = HashSet::<String>::new();
        let mut overrides = 0_usize;

        for file in &files {
            let raw = fs::read_to_string(&file.path).map_err(|error| ContentLoadError {
                code: ContentErrorCode::ReadFile,
                message: format!("failed to read prototype file: {error}"),
                mod_id: source.mod_id.clone(),
                file_path: file.path.clone(),
                location: None,
            })?;
            let prototypes = parse_source(&source.mod_id, &file.path, file.format, &raw)?;
            for prototype in prototypes {
                if !seen_in_mod.insert(prototype.object_type.clone()) {
                    return Err(ContentLoadError {
                        code: ContentErrorCode::DuplicateDefInMod,
                        message: format!(
                            "duplicate furniture '{}' in mod '{}'; each mod may define an objectType only once",
                            prototype.object_type, source.mod_id
                        ),
                        mod_id: source.mod_id.clone(),
                        file_path: file.path.clone(),
                        location: None,
                    }
                    .into());
                }
                if merged
                    .insert(prototype.object_type.clone(), prototype)
                    .is_some()
                {
                    overrides += 1;
                }
            }
        }

        info!(
            mod_id = %source.mod_id,
            mod_load_index = source.mod_load_index,
            source_dir = %source.source_dir.display(),
            file_count = files.len(),
            prototype_count = seen_in_mod.len(),
            override_count = overrides,
            "content_mod_loaded"
        );
    }

    let registry = FurniturePrototypeRegistry::from_prototypes(merged.into_values())?;
    info!(
        total_mods = sources.len(),
        prototype_count = registry.len(),
        "content_pipeline_summary"
    );
    Ok(registry)
}

fn parse_source(
    mod_id: &str,
    path: &Path,
    format: SourceFormat,
    raw: &str,
) -> Result<Vec<FurniturePrototype>, ContentLoadError> {
    match format {
        SourceFormat::Json => parse_furniture_json(mod_id, path, raw),
        SourceFormat::Xml => parse_furniture_defs_xml(mod_id, path, raw),
    }
}
