mod compiler;
mod discovery;
mod json;
mod pipeline;
mod registry;
mod types;

pub use pipeline::{load_furniture_prototypes, ContentPipelineError};
pub use registry::{FurniturePrototypeRegistry, RegistryError};
pub use types::{
    ContentErrorCode, ContentLoadError, ContentLoadRequest, DiscoveryError, SourceLocation,
};
