use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::CONFIG;
use crate::form::{FieldValue, FormState};
use crate::schema::default_config::{default_schema, DEFAULT_STYLE, STYLE_FIELD_ID};
use crate::schema::types::{Schema, SchemaFile};
use crate::utils::http::get_http_client;

pub async fn load_schema() -> Schema {
    let url = CONFIG.ui_config_url.trim();
    if url.is_empty() {
        debug!("UI_CONFIG_URL not set; using built-in UI schema");
        return default_schema();
    }

    match fetch_schema(url).await {
        Ok(schema) => {
            info!("Loaded UI schema from {} ({} block(s))", url, schema.blocks.len());
            schema
        }
        Err(err) => {
            warn!("Failed to load UI schema from {}: {}; using built-in schema", url, err);
            default_schema()
        }
    }
}

async fn fetch_schema(url: &str) -> Result<Schema> {
    let response = get_http_client().get(url).send().await?.error_for_status()?;
    let file: SchemaFile = response.json().await?;
    Schema::from_config(file)
}

pub fn initial_form_state(schema: &Schema) -> FormState {
    let mut state = FormState::default();
    for field in schema.fields() {
        let value = if field.id == STYLE_FIELD_ID {
            FieldValue::scalar(DEFAULT_STYLE)
        } else {
            FieldValue::empty_for(field.kind)
        };
        state.set(field.id.clone(), value);
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_defaults_every_field() {
        let schema = default_schema();
        let state = initial_form_state(&schema);

        for field in schema.fields() {
            let value = state.get(&field.id).expect("every field is seeded");
            if field.id == STYLE_FIELD_ID {
                assert_eq!(value, &FieldValue::scalar(DEFAULT_STYLE));
            } else {
                assert!(value.is_empty(), "field {} should start empty", field.id);
            }
        }
    }

    #[test]
    fn multi_select_fields_start_as_empty_lists() {
        let schema = default_schema();
        let state = initial_form_state(&schema);
        assert_eq!(
            state.get("negative_prompt"),
            Some(&FieldValue::List(Vec::new()))
        );
    }
}
