use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::llm::media::detect_mime_type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Text,
    Image,
    Video,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = detect_mime_type(&bytes).unwrap_or_else(|| "image/png".to_string());
        Attachment { bytes, mime_type }
    }
}

pub const REFERENCE_SLOT_COUNT: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct ReferenceSlot {
    pub image: Option<Attachment>,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pub slots: [ReferenceSlot; REFERENCE_SLOT_COUNT],
    pub main_prompt: String,
}

impl ReferenceSet {
    pub fn has_attachment(&self) -> bool {
        self.slots.iter().any(|slot| slot.image.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescriptor {
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledRequest {
    #[serde(rename = "type")]
    pub mode: GenerationMode,
    pub prompt: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceDescriptor>,
    #[serde(rename = "mainPrompt", default, skip_serializing_if = "Option::is_none")]
    pub main_prompt: Option<String>,
}

mod base64_bytes {
    use base64::engine::general_purpose;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_the_bridge_key_set() {
        let request = AssembledRequest {
            mode: GenerationMode::Image,
            prompt: "cat, high quality, 1K".to_string(),
            params: BTreeMap::from([
                ("aspectRatio".to_string(), "1:1".to_string()),
                ("resolution".to_string(), "1K".to_string()),
            ]),
            references: Vec::new(),
            main_prompt: None,
        };

        let json = serde_json::to_value(&request).expect("serializes");
        assert_eq!(json["type"], "image");
        assert_eq!(json["prompt"], "cat, high quality, 1K");
        assert_eq!(json["params"]["aspectRatio"], "1:1");
        assert!(json.get("references").is_none());
        assert!(json.get("mainPrompt").is_none());
    }

    #[test]
    fn reference_payload_round_trips_through_json() {
        let request = AssembledRequest {
            mode: GenerationMode::Reference,
            prompt: "неоновый город".to_string(),
            params: BTreeMap::new(),
            references: vec![ReferenceDescriptor {
                description: "как на первом фото".to_string(),
                mime_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            }],
            main_prompt: Some("неоновый город".to_string()),
        };

        let json = serde_json::to_string(&request).expect("serializes");
        assert!(json.contains("\"mainPrompt\""));
        let parsed: AssembledRequest = serde_json::from_str(&json).expect("parses back");
        assert_eq!(parsed, request);
    }

    #[test]
    fn tolerates_a_missing_params_object() {
        let parsed: AssembledRequest =
            serde_json::from_str(r#"{"type": "text", "prompt": "привет"}"#).expect("parses");
        assert_eq!(parsed.mode, GenerationMode::Text);
        assert!(parsed.params.is_empty());
    }
}
