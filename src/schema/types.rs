use std::collections::HashSet;

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Select,
    TextWithSuggestions,
    MultiSelect,
}

impl FieldKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "text" => Ok(FieldKind::Text),
            "select" => Ok(FieldKind::Select),
            "select-or-type" => Ok(FieldKind::TextWithSuggestions),
            "multi-select" => Ok(FieldKind::MultiSelect),
            other => Err(anyhow!("Unknown field type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaFile {
    pub blocks: Vec<BlockEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockEntry {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    pub placeholder: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: String,
    pub title: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub blocks: Vec<Block>,
}

impl Schema {
    pub fn from_config(file: SchemaFile) -> Result<Self> {
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut blocks = Vec::with_capacity(file.blocks.len());

        for block_entry in file.blocks {
            let block_id = block_entry.id.trim().to_string();
            if block_id.is_empty() {
                return Err(anyhow!("Schema block is missing an id"));
            }

            let mut fields = Vec::with_capacity(block_entry.fields.len());
            for field_entry in block_entry.fields {
                let field_id = field_entry.id.trim().to_string();
                if field_id.is_empty() {
                    return Err(anyhow!("Field in block '{}' is missing an id", block_id));
                }
                if !seen_ids.insert(field_id.clone()) {
                    return Err(anyhow!("Duplicate field id '{}' in schema", field_id));
                }

                fields.push(Field {
                    id: field_id,
                    label: field_entry.label.trim().to_string(),
                    kind: FieldKind::parse(&field_entry.kind)?,
                    placeholder: field_entry.placeholder,
                    options: field_entry.options,
                });
            }

            blocks.push(Block {
                id: block_id,
                title: block_entry.title,
                fields,
            });
        }

        Ok(Schema { blocks })
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.blocks
            .iter()
            .flat_map(|block| block.fields.iter())
            .find(|field| field.id == field_id)
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == block_id)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.blocks.iter().flat_map(|block| block.fields.iter())
    }

    pub fn field_label(&self, field_id: &str) -> Option<&str> {
        self.field(field_id).map(|field| field.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_json(blocks: &str) -> SchemaFile {
        serde_json::from_str(&format!(r#"{{"blocks": {blocks}}}"#))
            .expect("valid schema config JSON")
    }

    #[test]
    fn parses_remote_config_shape() {
        let file = config_json(
            r#"[{
                "id": "subject_block",
                "title": "1. Сюжет",
                "fields": [
                    {"id": "subject", "label": "Субъект", "type": "select-or-type",
                     "placeholder": "Кто в кадре?", "options": ["Кот"]},
                    {"id": "negative_prompt", "label": "Фильтры", "type": "multi-select",
                     "options": ["Без текста"]}
                ]
            }]"#,
        );

        let schema = Schema::from_config(file).expect("schema parses");
        assert_eq!(schema.blocks.len(), 1);
        let subject = schema.field("subject").expect("subject present");
        assert_eq!(subject.kind, FieldKind::TextWithSuggestions);
        assert_eq!(subject.placeholder.as_deref(), Some("Кто в кадре?"));
        let negative = schema.field("negative_prompt").expect("filters present");
        assert_eq!(negative.kind, FieldKind::MultiSelect);
    }

    #[test]
    fn rejects_duplicate_field_ids_across_blocks() {
        let file = config_json(
            r#"[
                {"id": "a", "title": "A", "fields": [
                    {"id": "style", "label": "Стиль", "type": "select", "options": []}]},
                {"id": "b", "title": "B", "fields": [
                    {"id": "style", "label": "Стиль 2", "type": "select", "options": []}]}
            ]"#,
        );

        let err = Schema::from_config(file).expect_err("duplicate ids must be rejected");
        assert!(err.to_string().contains("Duplicate field id"));
    }

    #[test]
    fn rejects_unknown_field_type() {
        let file = config_json(
            r#"[{"id": "a", "title": "A", "fields": [
                {"id": "x", "label": "X", "type": "checkbox", "options": []}]}]"#,
        );

        assert!(Schema::from_config(file).is_err());
    }
}
