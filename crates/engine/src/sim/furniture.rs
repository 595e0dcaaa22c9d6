use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::hooks::{HookContext, HookError, ScriptHookRunner, WorldView};
use super::placement::Footprint;
use super::tile::{Enterability, Tile, TileCoord, TileGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FurnitureId(pub u64);

impl fmt::Display for FurnitureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Live instances keyed by id; iteration order is id order.
pub type FurnitureStore = BTreeMap<FurnitureId, Furniture>;

#[derive(Debug, Default)]
pub(crate) struct FurnitureIdAllocator {
    next: u64,
}

impl FurnitureIdAllocator {
    pub(crate) fn allocate(&mut self) -> FurnitureId {
        let id = FurnitureId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Scalar stored in a furniture parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Booleans as-is, numbers are truthy when non-zero, text when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::Text(value) => !value.is_empty(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileOffset {
    pub x: i32,
    pub y: i32,
}

impl TileOffset {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Immutable furniture template. Instances share it and copy only the
/// parameter bag and the update-hook list.
#[derive(Debug, Clone, PartialEq)]
pub struct FurniturePrototype {
    pub object_type: String,
    pub name: String,
    /// Multiplier applied to the movement cost of every footprint tile.
    pub movement_cost: f32,
    pub width: u32,
    pub height: u32,
    pub can_link_to_neighbour: bool,
    pub can_enclose_rooms: bool,
    pub update_hooks: Vec<String>,
    pub enterability_hook: Option<String>,
    pub work_spot_offset: TileOffset,
    pub spawn_spot_offset: TileOffset,
    pub parameters: BTreeMap<String, ParamValue>,
}

impl FurniturePrototype {
    pub fn new(object_type: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            name: String::new(),
            movement_cost: 1.0,
            width: 1,
            height: 1,
            can_link_to_neighbour: false,
            can_enclose_rooms: false,
            update_hooks: Vec::new(),
            enterability_hook: None,
            work_spot_offset: TileOffset::default(),
            spawn_spot_offset: TileOffset::default(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.object_type
        } else {
            &self.name
        }
    }

    pub(crate) fn instantiate(self: &Arc<Self>, id: FurnitureId) -> Furniture {
        Furniture {
            id,
            prototype: Arc::clone(self),
            tile: None,
            parameters: self.parameters.clone(),
            update_hooks: self.update_hooks.clone(),
            changed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookRunReport {
    pub invoked: u32,
    pub faults: Vec<HookError>,
}

#[derive(Debug, Clone)]
pub struct Furniture {
    id: FurnitureId,
    prototype: Arc<FurniturePrototype>,
    tile: Option<TileCoord>,
    parameters: BTreeMap<String, ParamValue>,
    update_hooks: Vec<String>,
    changed: bool,
}

impl Furniture {
    pub fn id(&self) -> FurnitureId {
        self.id
    }

    pub fn prototype(&self) -> &FurniturePrototype {
        &self.prototype
    }

    pub fn object_type(&self) -> &str {
        &self.prototype.object_type
    }

    pub fn name(&self) -> &str {
        self.prototype.display_name()
    }

    pub fn movement_cost(&self) -> f32 {
        self.prototype.movement_cost
    }

    pub fn width(&self) -> u32 {
        self.prototype.width
    }

    pub fn height(&self) -> u32 {
        self.prototype.height
    }

    pub fn can_link_to_neighbour(&self) -> bool {
        self.prototype.can_link_to_neighbour
    }

    pub fn can_enclose_rooms(&self) -> bool {
        self.prototype.can_enclose_rooms
    }

    /// Base (lower-left) tile; `None` until placed.
    pub fn tile(&self) -> Option<TileCoord> {
        self.tile
    }

    pub fn footprint(&self) -> Option<Footprint> {
        self.tile
            .map(|origin| Footprint::new(origin, self.width(), self.height()))
    }

    pub(crate) fn place_at(&mut self, origin: TileCoord) {
        debug_assert!(self.tile.is_none(), "furniture base tile is set once");
        self.tile = Some(origin);
    }

    pub fn work_spot_tile<'g>(&self, grid: &'g TileGrid) -> Option<&'g Tile> {
        let offset = self.prototype.work_spot_offset;
        self.tile
            .and_then(|origin| grid.tile(origin.offset(offset.x, offset.y)))
    }

    pub fn spawn_spot_tile<'g>(&self, grid: &'g TileGrid) -> Option<&'g Tile> {
        let offset = self.prototype.spawn_spot_offset;
        self.tile
            .and_then(|origin| grid.tile(origin.offset(offset.x, offset.y)))
    }

    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    pub fn get_parameter(&self, key: &str, default: impl Into<ParamValue>) -> ParamValue {
        self.parameters
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    pub fn number_parameter(&self, key: &str, default: f64) -> f64 {
        self.parameters
            .get(key)
            .and_then(ParamValue::as_number)
            .unwrap_or(default)
    }

    /// Returns whether the stored value changed.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> bool {
        let key = key.into();
        let value = value.into();
        if self.parameters.get(&key) == Some(&value) {
            return false;
        }
        self.parameters.insert(key, value);
        self.changed = true;
        true
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn update_hooks(&self) -> &[String] {
        &self.update_hooks
    }

    pub fn subscribe_update_hook(&mut self, name: impl Into<String>) {
        self.update_hooks.push(name.into());
    }

    pub fn unsubscribe_update_hook(&mut self, name: &str) -> bool {
        match self.update_hooks.iter().position(|hook| hook == name) {
            Some(index) => {
                self.update_hooks.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn enterability_hook(&self) -> Option<&str> {
        self.prototype.enterability_hook.as_deref()
    }

    pub(crate) fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Runs every update hook in registration order. Hooks added or removed
    /// while running take effect on the next call.
    pub fn update(
        &mut self,
        delta_seconds: f32,
        runner: &dyn ScriptHookRunner,
        context: &mut HookContext<'_>,
    ) -> HookRunReport {
        let mut report = HookRunReport::default();
        if self.update_hooks.is_empty() {
            return report;
        }

        let hooks = self.update_hooks.clone();
        for name in &hooks {
            report.invoked = report.invoked.saturating_add(1);
            match runner.call_update(name, self, delta_seconds, context) {
                Ok(Some(diagnostic)) => {
                    info!(
                        hook = %name,
                        furniture = %self.id,
                        object_type = %self.object_type(),
                        diagnostic = %diagnostic,
                        "hook_diagnostic"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        hook = %name,
                        furniture = %self.id,
                        object_type = %self.object_type(),
                        error = %error,
                        "update_hook_skipped"
                    );
                    report.faults.push(error);
                }
            }
        }
        report
    }

    /// Re-evaluated on every call; predicate results are never cached.
    pub fn enterability(
        &self,
        runner: &dyn ScriptHookRunner,
        view: &WorldView<'_>,
    ) -> Enterability {
        let Some(name) = self.enterability_hook() else {
            return Enterability::Enterable;
        };

        match runner.call_enterability(name, self, view) {
            Ok(code) => Enterability::from_code(code).unwrap_or_else(|| {
                warn!(
                    hook = %name,
                    furniture = %self.id,
                    code,
                    "enterability_code_unmapped"
                );
                Enterability::NotEnterable
            }),
            Err(error) => {
                warn!(
                    hook = %name,
                    furniture = %self.id,
                    error = %error,
                    "enterability_hook_failed"
                );
                Enterability::Enterable
            }
        }
    }
}
