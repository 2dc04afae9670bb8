use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::FieldKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        FieldValue::Scalar(value.into())
    }

    pub fn empty_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::MultiSelect => FieldValue::List(Vec::new()),
            _ => FieldValue::Scalar(String::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Scalar(value) => value.trim().is_empty(),
            FieldValue::List(values) => values.is_empty(),
        }
    }

    pub fn joined(&self) -> String {
        match self {
            FieldValue::Scalar(value) => value.trim().to_string(),
            FieldValue::List(values) => values.join(", "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Set { field: String, value: FieldValue },
    Toggle { field: String, option: String },
}

#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: HashMap<String, FieldValue>,
    version: u64,
}

impl FormState {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.values.insert(field.into(), value);
        self.version += 1;
    }

    pub fn apply(&mut self, change: FieldChange) {
        match change {
            FieldChange::Set { field, value } => self.set(field, value),
            FieldChange::Toggle { field, option } => self.toggle(field, option),
        }
    }

    fn toggle(&mut self, field: String, option: String) {
        let entry = self
            .values
            .entry(field)
            .or_insert_with(|| FieldValue::List(Vec::new()));
        match entry {
            FieldValue::List(values) => {
                if let Some(index) = values.iter().position(|value| value == &option) {
                    values.remove(index);
                } else {
                    values.push(option);
                }
            }
            FieldValue::Scalar(_) => {
                *entry = FieldValue::List(vec![option]);
            }
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut state = FormState::default();
        state.set("negative_prompt", FieldValue::List(Vec::new()));

        state.apply(FieldChange::Toggle {
            field: "negative_prompt".to_string(),
            option: "Без текста".to_string(),
        });
        assert_eq!(
            state.get("negative_prompt"),
            Some(&FieldValue::List(vec!["Без текста".to_string()]))
        );

        state.apply(FieldChange::Toggle {
            field: "negative_prompt".to_string(),
            option: "Без текста".to_string(),
        });
        assert_eq!(state.get("negative_prompt"), Some(&FieldValue::List(Vec::new())));
    }

    #[test]
    fn toggle_keeps_selection_order() {
        let mut state = FormState::default();
        for option in ["a", "b", "c"] {
            state.apply(FieldChange::Toggle {
                field: "negative_prompt".to_string(),
                option: option.to_string(),
            });
        }
        state.apply(FieldChange::Toggle {
            field: "negative_prompt".to_string(),
            option: "b".to_string(),
        });

        assert_eq!(
            state.get("negative_prompt"),
            Some(&FieldValue::List(vec!["a".to_string(), "c".to_string()]))
        );
    }

    #[test]
    fn whitespace_scalar_counts_as_empty() {
        assert!(FieldValue::scalar("   \t").is_empty());
        assert!(!FieldValue::scalar(" кот ").is_empty());
        assert!(FieldValue::List(Vec::new()).is_empty());
        assert!(!FieldValue::List(vec![" ".to_string()]).is_empty());
    }

    #[test]
    fn every_applied_change_bumps_the_version() {
        let mut state = FormState::default();
        assert_eq!(state.version(), 0);

        state.apply(FieldChange::Set {
            field: "subject".to_string(),
            value: FieldValue::scalar("кот"),
        });
        assert_eq!(state.version(), 1);

        state.apply(FieldChange::Toggle {
            field: "negative_prompt".to_string(),
            option: "Без текста".to_string(),
        });
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn field_values_deserialize_from_scalar_or_list_json() {
        let scalar: FieldValue = serde_json::from_str(r#""кот""#).expect("scalar parses");
        assert_eq!(scalar, FieldValue::scalar("кот"));

        let list: FieldValue = serde_json::from_str(r#"["a", "b"]"#).expect("list parses");
        assert_eq!(list, FieldValue::List(vec!["a".to_string(), "b".to_string()]));
    }
}
