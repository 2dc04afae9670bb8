use std::env;

use anyhow::Result;
use once_cell::sync::Lazy;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub log_level: String,
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_image_model: String,
    pub gemini_video_model: String,
    pub gemini_temperature: f32,
    pub gemini_top_k: i32,
    pub gemini_top_p: f32,
    pub gemini_max_output_tokens: i32,
    pub gemini_safety_settings: String,
    pub ui_config_url: String,
    pub webapp_url: String,
    pub trial_credits: i64,
    pub generation_cost: i64,
    pub selection_timeout: u64,
    pub video_poll_interval_seconds: u64,
    pub video_poll_max_attempts: u64,
}

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_database_url(value: String) -> String {
    if value.starts_with("sqlite+aiosqlite://") {
        return value.replacen("sqlite+aiosqlite://", "sqlite://", 1);
    }
    value
}

fn normalize_gemini_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("BOT_TOKEN is required"));
        }

        Ok(Config {
            bot_token,
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            database_url: normalize_database_url(env_string(
                "DATABASE_URL",
                "sqlite://studio_bot.db",
            )),
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            gemini_model: env_string("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-3-pro-image-preview"),
            gemini_video_model: env_string("GEMINI_VIDEO_MODEL", "veo-3.1-fast-generate-preview"),
            gemini_temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            gemini_top_k: env_i32("GEMINI_TOP_K", 40),
            gemini_top_p: env_f32("GEMINI_TOP_P", 0.95),
            gemini_max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 2048),
            gemini_safety_settings: normalize_gemini_safety_settings(env_string(
                "GEMINI_SAFETY_SETTINGS",
                "permissive",
            )),
            ui_config_url: env_string("UI_CONFIG_URL", ""),
            webapp_url: env_string("WEBAPP_URL", ""),
            trial_credits: env_i64("TRIAL_CREDITS", 10),
            generation_cost: env_i64("GENERATION_COST", 1),
            selection_timeout: env_u64("SELECTION_TIMEOUT_SECONDS", 30),
            video_poll_interval_seconds: env_u64("VIDEO_POLL_INTERVAL_SECONDS", 10),
            video_poll_max_attempts: env_u64("VIDEO_POLL_MAX_ATTEMPTS", 60),
        })
    }
}

pub const STUDIO_SYSTEM_PROMPT: &str = r#"You are the Studio assistant, an advanced AI helper inside a Telegram Mini App for generating premium marketing content.

Bot features:
1. **Chat**: general AI assistance for writing, brainstorming, and coding.
2. **Image Gen**: structured prompt builder with aspect ratio and resolution settings.
3. **Video Studio**: short video generation from a scene description.
4. **Credits**: users spend credits per generation.

YOUR ROLE: Cinematic Prompt Guide.
You are an expert in cinematography, photography, and visual arts.
When a user wants to generate an image or video:
1. Analyze their request (and any reference images if provided).
2. Suggest improvements based on lighting (cinematic, golden hour, volumetric, studio), composition (rule of thirds, symmetry, leading lines), camera (35mm, 85mm portrait, wide angle, depth of field), and style (photorealistic, cyberpunk, oil painting, 3D render).
3. Ask clarifying questions if the request is vague.
4. Generate a detailed, high-quality prompt for them to use.

Be concise, helpful, and professional. Speak in Russian unless asked otherwise."#;

pub const ENHANCE_INSTRUCTION: &str = r#"Act as a professional {media_type} prompt engineer.
Enhance the following user prompt to be more cinematic, detailed, and artistic.
Keep it concise but descriptive. Return only the enhanced prompt.
User Prompt: "{prompt}""#;
