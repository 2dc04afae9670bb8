use std::collections::BTreeMap;

use crate::form::{FieldValue, FormState};
use crate::prompt::error::ValidationError;
use crate::prompt::request::{
    AssembledRequest, GenerationMode, ReferenceDescriptor, ReferenceSet,
};
use crate::prompt::template::{
    render_segment, ASPECT_RATIO_FIELD, DEFAULT_ASPECT_RATIO, DEFAULT_ORIENTATION,
    DEFAULT_RESOLUTION, IMAGE_ORDER, MESSAGE_FIELD, NEGATIVE_PROMPT_FIELD, ORIENTATION_FIELD,
    RESOLUTION_FIELD, SUBJECT_FIELD, VIDEO_ORDER, VIDEO_PROMPT_FIELD,
};
use crate::schema::{Schema, CAMERA_BLOCK_ID};

pub fn assemble(
    mode: GenerationMode,
    state: &FormState,
    schema: &Schema,
    references: Option<&ReferenceSet>,
) -> Result<AssembledRequest, ValidationError> {
    match mode {
        GenerationMode::Text => assemble_text(state),
        GenerationMode::Image | GenerationMode::Video => assemble_structured(mode, state),
        // A missing reference set carries no attachments and no main prompt.
        GenerationMode::Reference => match references {
            Some(references) => assemble_reference(state, schema, references),
            None => Err(ValidationError::MissingReference),
        },
    }
}

fn assemble_text(state: &FormState) -> Result<AssembledRequest, ValidationError> {
    let value = state.get(MESSAGE_FIELD);
    let prompt = match value {
        Some(value) if !value.is_empty() => match value {
            FieldValue::Scalar(text) => text.clone(),
            FieldValue::List(parts) => parts.join(", "),
        },
        _ => return Err(ValidationError::MissingRequired(MESSAGE_FIELD.to_string())),
    };

    Ok(AssembledRequest {
        mode: GenerationMode::Text,
        prompt,
        params: BTreeMap::new(),
        references: Vec::new(),
        main_prompt: None,
    })
}

fn assemble_structured(
    mode: GenerationMode,
    state: &FormState,
) -> Result<AssembledRequest, ValidationError> {
    let (order, required) = match mode {
        GenerationMode::Image => (IMAGE_ORDER, SUBJECT_FIELD),
        GenerationMode::Video => (VIDEO_ORDER, VIDEO_PROMPT_FIELD),
        _ => unreachable!("structured assembly only handles image and video"),
    };
    require_non_empty(state, required)?;

    let mut prompt = collect_segments(state, order.iter().copied()).join(", ");
    prompt.push_str(", high quality, ");
    prompt.push_str(&field_or_default(state, RESOLUTION_FIELD, DEFAULT_RESOLUTION));
    append_negative_suffix(&mut prompt, state);

    let mut params = BTreeMap::new();
    match mode {
        GenerationMode::Image => {
            params.insert(
                "aspectRatio".to_string(),
                field_or_default(state, ASPECT_RATIO_FIELD, DEFAULT_ASPECT_RATIO),
            );
            params.insert(
                "resolution".to_string(),
                field_or_default(state, RESOLUTION_FIELD, DEFAULT_RESOLUTION),
            );
        }
        GenerationMode::Video => {
            params.insert(
                "orientation".to_string(),
                field_or_default(state, ORIENTATION_FIELD, DEFAULT_ORIENTATION),
            );
        }
        _ => {}
    }

    Ok(AssembledRequest {
        mode,
        prompt,
        params,
        references: Vec::new(),
        main_prompt: None,
    })
}

pub fn assemble_reference(
    state: &FormState,
    schema: &Schema,
    references: &ReferenceSet,
) -> Result<AssembledRequest, ValidationError> {
    let main_prompt = references.main_prompt.as_str();
    if !references.has_attachment() && main_prompt.trim().is_empty() {
        return Err(ValidationError::MissingReference);
    }

    // Camera fields reuse the block's declared order; slot descriptions are
    // never folded into the prompt string.
    let mut segments = Vec::new();
    if !main_prompt.trim().is_empty() {
        segments.push(main_prompt.to_string());
    }
    let camera_fields = schema
        .block(CAMERA_BLOCK_ID)
        .map(|block| block.fields.iter().map(|field| field.id.as_str()).collect::<Vec<_>>())
        .unwrap_or_default();
    segments.extend(collect_segments(state, camera_fields.into_iter()));

    let descriptors = references
        .slots
        .iter()
        .filter_map(|slot| {
            slot.image.as_ref().map(|image| ReferenceDescriptor {
                description: slot.description.clone(),
                mime_type: image.mime_type.clone(),
                data: image.bytes.clone(),
            })
        })
        .collect();

    Ok(AssembledRequest {
        mode: GenerationMode::Reference,
        prompt: segments.join(", "),
        params: BTreeMap::new(),
        references: descriptors,
        main_prompt: if main_prompt.trim().is_empty() {
            None
        } else {
            Some(main_prompt.to_string())
        },
    })
}

fn require_non_empty(state: &FormState, field_id: &str) -> Result<(), ValidationError> {
    match state.get(field_id) {
        Some(value) if !value.is_empty() => Ok(()),
        _ => Err(ValidationError::MissingRequired(field_id.to_string())),
    }
}

fn collect_segments<'a>(
    state: &FormState,
    order: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    order
        .filter_map(|field_id| {
            state
                .get(field_id)
                .and_then(|value| render_segment(field_id, value))
        })
        .collect()
}

fn append_negative_suffix(prompt: &mut String, state: &FormState) {
    if let Some(negative) = state.get(NEGATIVE_PROMPT_FIELD) {
        if !negative.is_empty() {
            prompt.push_str(" --no ");
            prompt.push_str(&negative.joined());
        }
    }
}

fn field_or_default(state: &FormState, field_id: &str, default: &str) -> String {
    match state.get(field_id) {
        Some(value) if !value.is_empty() => value.joined(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::request::{Attachment, ReferenceSlot};
    use crate::schema::default_schema;

    fn state_with(pairs: &[(&str, &str)]) -> FormState {
        let mut state = FormState::default();
        for (field, value) in pairs {
            state.set(field.to_string(), FieldValue::scalar(*value));
        }
        state
    }

    #[test]
    fn image_mode_requires_a_subject() {
        let schema = default_schema();
        let empty = FormState::default();
        assert_eq!(
            assemble(GenerationMode::Image, &empty, &schema, None),
            Err(ValidationError::MissingRequired("subject".to_string()))
        );

        let whitespace = state_with(&[("subject", "   ")]);
        assert_eq!(
            assemble(GenerationMode::Image, &whitespace, &schema, None),
            Err(ValidationError::MissingRequired("subject".to_string()))
        );
    }

    #[test]
    fn subject_alone_yields_the_minimal_prompt() {
        let schema = default_schema();
        let state = state_with(&[("subject", "cat")]);
        let request = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(request.prompt, "cat, high quality, 1K");
        assert_eq!(request.params.get("aspectRatio").map(String::as_str), Some("1:1"));
        assert_eq!(request.params.get("resolution").map(String::as_str), Some("1K"));
    }

    #[test]
    fn segment_order_ignores_insertion_order() {
        let schema = default_schema();
        let mut style_first = FormState::default();
        style_first.set("style", FieldValue::scalar("Киберпанк"));
        style_first.set("subject", FieldValue::scalar("cat"));
        style_first.set("environment", FieldValue::scalar("space"));

        let mut subject_first = FormState::default();
        subject_first.set("subject", FieldValue::scalar("cat"));
        subject_first.set("environment", FieldValue::scalar("space"));
        subject_first.set("style", FieldValue::scalar("Киберпанк"));

        let a = assemble(GenerationMode::Image, &style_first, &schema, None).expect("assembles");
        let b = assemble(GenerationMode::Image, &subject_first, &schema, None).expect("assembles");
        assert_eq!(a.prompt, b.prompt);
        assert_eq!(a.prompt, "cat, in space, Киберпанк style, high quality, 1K");
    }

    #[test]
    fn full_image_template_renders_in_canonical_order() {
        let schema = default_schema();
        let mut state = state_with(&[
            ("subject", "Кот в костюме"),
            ("action", "Танцует"),
            ("environment", "Улица"),
            ("time_of_day", "Ночь (Night)"),
            ("atmosphere", "Мрачная (Moody)"),
            ("style", "Киберпанк"),
            ("materials", "Неоновые трубки (Neon Tubes)"),
            ("lighting", "Неоновый свет (Neon)"),
            ("colors", "Vaporwave (Розовый/Бирюзовый)"),
            ("camera_angle", "Вид снизу (Low Angle)"),
            ("shot_size", "Полный рост (Full Body)"),
            ("focus", "Размытый фон (Bokeh / f1.8)"),
            ("text_on_photo", "SALE"),
            ("resolution", "2K"),
            ("aspect_ratio", "9:16"),
        ]);
        state.set(
            "negative_prompt",
            FieldValue::List(vec!["Без текста (Убрать водяные знаки, подписи, логотипы)".to_string()]),
        );

        let request = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(
            request.prompt,
            "Кот в костюме, Танцует, in Улица, during Ночь (Night), \
             in Мрачная (Moody) setting, Киберпанк style, \
             made of Неоновые трубки (Neon Tubes), Неоновый свет (Neon), \
             Vaporwave (Розовый/Бирюзовый) color palette, shot from Вид снизу (Low Angle), \
             Полный рост (Full Body), Размытый фон (Bokeh / f1.8), Text: \"SALE\", \
             high quality, 2K --no Без текста (Убрать водяные знаки, подписи, логотипы)"
        );
        assert_eq!(request.params.get("aspectRatio").map(String::as_str), Some("9:16"));
    }

    #[test]
    fn negative_suffix_is_pinned_after_the_quality_suffix() {
        let schema = default_schema();
        let mut state = state_with(&[("subject", "cat"), ("resolution", "2K")]);
        state.set(
            "negative_prompt",
            FieldValue::List(vec!["blurry".to_string(), "watermark".to_string()]),
        );

        let request = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(request.prompt, "cat, high quality, 2K --no blurry, watermark");
        assert_eq!(request.prompt.matches("--no").count(), 1);
    }

    #[test]
    fn assembly_is_idempotent_over_one_snapshot() {
        let schema = default_schema();
        let mut state = state_with(&[("subject", "cat"), ("style", "Киберпанк")]);
        state.set(
            "negative_prompt",
            FieldValue::List(vec!["blurry".to_string()]),
        );

        let first = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        let second = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(first, second);
    }

    #[test]
    fn multi_valued_fields_join_before_decoration() {
        let schema = default_schema();
        let mut state = state_with(&[("subject", "chair")]);
        state.set(
            "materials",
            FieldValue::List(vec!["glass".to_string(), "chrome".to_string()]),
        );

        let request = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(request.prompt, "chair, made of glass, chrome, high quality, 1K");
    }

    #[test]
    fn enumerated_params_pass_through_uncritically() {
        let schema = default_schema();
        let state = state_with(&[("subject", "cat"), ("resolution", "8K-experimental")]);
        let request = assemble(GenerationMode::Image, &state, &schema, None).expect("assembles");
        assert_eq!(
            request.params.get("resolution").map(String::as_str),
            Some("8K-experimental")
        );
        assert!(request.prompt.ends_with("high quality, 8K-experimental"));
    }

    #[test]
    fn video_mode_orders_camera_fields_after_the_scene() {
        let schema = default_schema();
        let state = state_with(&[
            ("video_prompt", "Кот бежит по крыше"),
            ("camera_angle", "Вид с дрона (Bird's Eye)"),
            ("orientation", "16:9"),
        ]);

        let request = assemble(GenerationMode::Video, &state, &schema, None).expect("assembles");
        assert_eq!(
            request.prompt,
            "Кот бежит по крыше, shot from Вид с дрона (Bird's Eye), high quality, 1K"
        );
        assert_eq!(request.params.get("orientation").map(String::as_str), Some("16:9"));
    }

    #[test]
    fn video_mode_defaults_orientation() {
        let schema = default_schema();
        let state = state_with(&[("video_prompt", "город будущего")]);
        let request = assemble(GenerationMode::Video, &state, &schema, None).expect("assembles");
        assert_eq!(request.params.get("orientation").map(String::as_str), Some("9:16"));
        assert!(request.references.is_empty());
    }

    #[test]
    fn video_mode_requires_the_scene_text() {
        let schema = default_schema();
        assert_eq!(
            assemble(GenerationMode::Video, &FormState::default(), &schema, None),
            Err(ValidationError::MissingRequired("video_prompt".to_string()))
        );
    }

    #[test]
    fn text_mode_passes_the_message_through_verbatim() {
        let schema = default_schema();
        let state = state_with(&[("message", "Привет! Придумай слоган.")]);
        let request = assemble(GenerationMode::Text, &state, &schema, None).expect("assembles");
        assert_eq!(request.prompt, "Привет! Придумай слоган.");
        assert!(request.params.is_empty());

        assert_eq!(
            assemble(GenerationMode::Text, &FormState::default(), &schema, None),
            Err(ValidationError::MissingRequired("message".to_string()))
        );
    }

    #[test]
    fn reference_mode_needs_an_image_or_a_main_prompt() {
        let schema = default_schema();
        let state = FormState::default();

        assert_eq!(
            assemble(GenerationMode::Reference, &state, &schema, None),
            Err(ValidationError::MissingReference)
        );

        let empty = ReferenceSet::default();
        assert_eq!(
            assemble_reference(&state, &schema, &empty),
            Err(ValidationError::MissingReference)
        );

        let mut png = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        png.extend_from_slice(&[0; 16]);
        let mut with_image = ReferenceSet::default();
        with_image.slots[0].image = Some(Attachment::from_bytes(png));
        with_image.slots[0].description = "как на фото".to_string();
        let request = assemble(GenerationMode::Reference, &state, &schema, Some(&with_image))
            .expect("assembles");
        assert_eq!(request.references.len(), 1);
        assert_eq!(request.references[0].description, "как на фото");
        assert_eq!(request.references[0].mime_type, "image/png");
        assert_eq!(request.main_prompt, None);
    }

    #[test]
    fn reference_mode_concatenates_only_camera_fields() {
        let schema = default_schema();
        let state = state_with(&[
            ("subject", "должен игнорироваться"),
            ("camera_angle", "Селфи (Selfie)"),
            ("shot_size", "Крупный план (Close-up Face)"),
        ]);
        let mut references = ReferenceSet::default();
        references.main_prompt = "в стиле референсов".to_string();
        references.slots[2] = ReferenceSlot {
            image: Some(Attachment {
                bytes: vec![9, 9],
                mime_type: "image/jpeg".to_string(),
            }),
            description: String::new(),
        };

        let request = assemble_reference(&state, &schema, &references).expect("assembles");
        assert_eq!(
            request.prompt,
            "в стиле референсов, shot from Селфи (Selfie), Крупный план (Close-up Face)"
        );
        assert_eq!(request.main_prompt.as_deref(), Some("в стиле референсов"));
        assert!(request.params.is_empty());
        assert!(!request.prompt.contains("игнорироваться"));
    }
}
