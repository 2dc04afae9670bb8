pub mod default_config;
pub mod provider;
pub mod types;

pub use default_config::{default_schema, CAMERA_BLOCK_ID, DEFAULT_STYLE, STYLE_FIELD_ID};
pub use provider::{initial_form_state, load_schema};
pub use types::{Block, Field, FieldKind, Schema, SchemaFile};
