use thiserror::Error;

use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("required field '{0}' is empty")]
    MissingRequired(String),
    #[error("reference submission has neither images nor a main prompt")]
    MissingReference,
}

impl ValidationError {
    pub fn user_message(&self, schema: &Schema) -> String {
        match self {
            ValidationError::MissingRequired(field_id) => {
                let label = schema.field_label(field_id).unwrap_or(field_id);
                format!("Заполните обязательное поле «{label}».")
            }
            ValidationError::MissingReference => {
                "Добавьте хотя бы одно референс-изображение или опишите задачу в основном поле."
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::default_schema;

    #[test]
    fn missing_required_uses_the_schema_label() {
        let schema = default_schema();
        let message = ValidationError::MissingRequired("subject".to_string()).user_message(&schema);
        assert_eq!(message, "Заполните обязательное поле «Субъект».");
    }

    #[test]
    fn unknown_field_falls_back_to_the_id() {
        let schema = default_schema();
        let message = ValidationError::MissingRequired("mystery".to_string()).user_message(&schema);
        assert!(message.contains("mystery"));
    }
}
