use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::sim::FurniturePrototype;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("furniture prototype registry is already loaded")]
    DuplicateInitialization,
    #[error("duplicate furniture prototype '{object_type}'")]
    DuplicatePrototype { object_type: String },
    #[error("invalid furniture prototype '{object_type}': {reason}")]
    InvalidPrototype { object_type: String, reason: String },
}

/// Immutable prototype table keyed by object type, populated once.
#[derive(Debug, Default, Clone)]
pub struct FurniturePrototypeRegistry {
    prototypes: Vec<Arc<FurniturePrototype>>,
    ids_by_type: HashMap<String, usize>,
    loaded: bool,
}

impl FurniturePrototypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prototypes(
        prototypes: impl IntoIterator<Item = FurniturePrototype>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.load(prototypes)?;
        Ok(registry)
    }

    /// Fails without modifying the registry if it was loaded before or any
    /// prototype is rejected.
    pub fn load(
        &mut self,
        prototypes: impl IntoIterator<Item = FurniturePrototype>,
    ) -> Result<(), RegistryError> {
        if self.loaded {
            return Err(RegistryError::DuplicateInitialization);
        }

        let mut staged = Vec::<Arc<FurniturePrototype>>::new();
        let mut ids_by_type = HashMap::<String, usize>::new();
        for prototype in prototypes {
            check_prototype(&prototype).map_err(|reason| RegistryError::InvalidPrototype {
                object_type: prototype.object_type.clone(),
                reason,
            })?;
            if ids_by_type
                .insert(prototype.object_type.clone(), staged.len())
                .is_some()
            {
                return Err(RegistryError::DuplicatePrototype {
                    object_type: prototype.object_type,
                });
            }
            staged.push(Arc::new(prototype));
        }

        info!(prototype_count = staged.len(), "furniture_prototypes_loaded");
        self.prototypes = staged;
        self.ids_by_type = ids_by_type;
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get_prototype(&self, object_type: &str) -> Option<&Arc<FurniturePrototype>> {
        self.ids_by_type
            .get(object_type)
            .and_then(|index| self.prototypes.get(*index))
    }

    pub fn contains(&self, object_type: &str) -> bool {
        self.ids_by_type.contains_key(object_type)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FurniturePrototype> {
        self.prototypes.iter().map(|prototype| &**prototype)
    }
}

pub(crate) fn check_prototype(prototype: &FurniturePrototype) -> Result<(), String> {
    if prototype.object_type.trim().is_empty() {
        return Err("objectType must not be empty".to_string());
    }
    if prototype.width == 0 || prototype.height == 0 {
        return Err(format!(
            "width and height must be >= 1, got {}x{}",
            prototype.width, prototype.height
        ));
    }
    if !prototype.movement_cost.is_finite() || prototype.movement_cost < 0.0 {
        return Err("movementCost must be finite and >= 0".to_string());
    }
    Ok(())
}
