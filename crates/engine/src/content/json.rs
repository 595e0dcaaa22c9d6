use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::sim::{FurniturePrototype, ParamValue, TileOffset};

use super::registry::check_prototype;
use super::types::{ContentErrorCode, ContentLoadError, SourceLocation};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FurnitureFile {
    furnitures: Vec<FurnitureRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FurnitureRecord {
    object_type: String,
    #[serde(default)]
    name: String,
    #[serde(default = "default_movement_cost")]
    movement_cost: f32,
    #[serde(default = "default_dimension")]
    width: u32,
    #[serde(default = "default_dimension")]
    height: u32,
    #[serde(default)]
    can_link_to_neighbour: bool,
    #[serde(default)]
    can_enclose_rooms: bool,
    #[serde(default)]
    update_hooks: Vec<String>,
    #[serde(default)]
    is_enterable_hook: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, ParamValue>,
    #[serde(default)]
    work_spot_offset_x: i32,
    #[serde(default)]
    work_spot_offset_y: i32,
    #[serde(default)]
    spawn_spot_offset_x: i32,
    #[serde(default)]
    spawn_spot_offset_y: i32,
}

fn default_movement_cost() -> f32 {
    1.0
}

fn default_dimension() -> u32 {
    1
}

impl From<FurnitureRecord> for FurniturePrototype {
    fn from(record: FurnitureRecord) -> Self {
        Self {
            object_type: record.object_type.trim().to_string(),
            name: record.name,
            movement_cost: record.movement_cost,
            width: record.width,
            height: record.height,
            can_link_to_neighbour: record.can_link_to_neighbour,
            can_enclose_rooms: record.can_enclose_rooms,
            update_hooks: record.update_hooks,
            enterability_hook: record
                .is_enterable_hook
                .map(|hook| hook.trim().to_string())
                .filter(|hook| !hook.is_empty()),
            work_spot_offset: TileOffset::new(record.work_spot_offset_x, record.work_spot_offset_y),
            spawn_spot_offset: TileOffset::new(
                record.spawn_spot_offset_x,
                record.spawn_spot_offset_y,
            ),
            parameters: record.parameters,
        }
    }
}

/// Parses a `{"furnitures": [...]}` prototype file.
pub(crate) fn parse_furniture_json(
    mod_id: &str,
    file_path: &Path,
    raw: &str,
) -> Result<Vec<FurniturePrototype>, ContentLoadError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let file = serde_path_to_error::deserialize::<_, FurnitureFile>(&mut deserializer).map_err(
        |error| {
            let path = error.path().to_string();
            let source = error.into_inner();
            let message = if path.is_empty() || path == "." {
                format!("invalid furniture json: {source}")
            } else {
                format!("invalid furniture json at {path}: {source}")
            };
            ContentLoadError {
                code: ContentErrorCode::JsonMalformed,
                message,
                mod_id: mod_id.to_string(),
                file_path: file_path.to_path_buf(),
                location: Some(SourceLocation {
                    line: source.line(),
                    column: source.column(),
                }),
            }
        },
    )?;

    let mut prototypes = Vec::with_capacity(file.furnitures.len());
    for (index, record) in file.furnitures.into_iter().enumerate() {
        let prototype = FurniturePrototype::from(record);
        check_prototype(&prototype).map_err(|reason| ContentLoadError {
            code: ContentErrorCode::InvalidValue,
            message: format!("furnitures[{index}]: {reason}"),
            mod_id: mod_id.to_string(),
            file_path: file_path.to_path_buf(),
            location: None,
        })?;
        prototypes.push(prototype);
    }
    Ok(prototypes)
}
