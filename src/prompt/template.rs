use crate::form::FieldValue;

pub const SUBJECT_FIELD: &str = "subject";
pub const VIDEO_PROMPT_FIELD: &str = "video_prompt";
pub const MESSAGE_FIELD: &str = "message";
pub const NEGATIVE_PROMPT_FIELD: &str = "negative_prompt";
pub const ASPECT_RATIO_FIELD: &str = "aspect_ratio";
pub const RESOLUTION_FIELD: &str = "resolution";
pub const ORIENTATION_FIELD: &str = "orientation";

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";
pub const DEFAULT_RESOLUTION: &str = "1K";
pub const DEFAULT_ORIENTATION: &str = "9:16";

// Decoration table: how a populated field is rendered into a prompt segment.
// Ordering lives in the per-mode field lists below, not here.
const DECORATIONS: &[(&str, &str, &str)] = &[
    ("environment", "in ", ""),
    ("time_of_day", "during ", ""),
    ("atmosphere", "in ", " setting"),
    ("style", "", " style"),
    ("materials", "made of ", ""),
    ("colors", "", " color palette"),
    ("camera_angle", "shot from ", ""),
    ("text_on_photo", "Text: \"", "\""),
];

pub const IMAGE_ORDER: &[&str] = &[
    "subject",
    "action",
    "environment",
    "time_of_day",
    "atmosphere",
    "style",
    "materials",
    "lighting",
    "colors",
    "camera_angle",
    "shot_size",
    "focus",
    "text_on_photo",
];

pub const VIDEO_ORDER: &[&str] = &[
    "video_prompt",
    "camera_angle",
    "shot_size",
    "focus",
];

pub fn decoration(field_id: &str) -> (&'static str, &'static str) {
    DECORATIONS
        .iter()
        .find(|(id, _, _)| *id == field_id)
        .map(|(_, prefix, suffix)| (*prefix, *suffix))
        .unwrap_or(("", ""))
}

pub fn render_segment(field_id: &str, value: &FieldValue) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let (prefix, suffix) = decoration(field_id);
    Some(format!("{prefix}{}{suffix}", value.joined()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_render_no_segment() {
        assert_eq!(render_segment("subject", &FieldValue::scalar("  ")), None);
        assert_eq!(
            render_segment("negative_prompt", &FieldValue::List(Vec::new())),
            None
        );
    }

    #[test]
    fn decorations_wrap_the_value() {
        assert_eq!(
            render_segment("environment", &FieldValue::scalar("Космос")),
            Some("in Космос".to_string())
        );
        assert_eq!(
            render_segment("atmosphere", &FieldValue::scalar("Мрачная (Moody)")),
            Some("in Мрачная (Moody) setting".to_string())
        );
        assert_eq!(
            render_segment("text_on_photo", &FieldValue::scalar("SALE")),
            Some("Text: \"SALE\"".to_string())
        );
    }

    #[test]
    fn list_values_join_before_decoration() {
        let value = FieldValue::List(vec!["glass".to_string(), "chrome".to_string()]);
        assert_eq!(
            render_segment("materials", &value),
            Some("made of glass, chrome".to_string())
        );
    }

    #[test]
    fn undecorated_fields_pass_through() {
        assert_eq!(
            render_segment("shot_size", &FieldValue::scalar("Общий план (Wide Shot)")),
            Some("Общий план (Wide Shot)".to_string())
        );
    }
}
