//! DCT action catalog: tool definitions, parameter validation and persona
//! toolsets.

pub mod action;
pub mod error;
pub mod filter;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod toolset;

pub use action::{placeholders, ActionSpec, ToolDefinition, RESERVED_PARAMS};
pub use error::{ActionError, CatalogError, FieldError};
pub use loader::{LoadedToolset, ToolsetLoader, AUTO_TOOLSET};
pub use registry::ActionRegistry;
pub use schema::{ParamLocation, ParamSpec, ParamType, ParamValue};
pub use toolset::{PersonaToolset, ResolvedToolset};
