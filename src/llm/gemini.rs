use std::time::Duration;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::{CONFIG, ENHANCE_INSTRUCTION, STUDIO_SYSTEM_PROMPT};
use crate::prompt::{GenerationMode, ReferenceDescriptor};
use crate::utils::http::get_http_client;

#[derive(Debug, thiserror::Error)]
#[error("Image generation failed: {0}")]
pub struct ImageGenerationError(pub String);

#[derive(Debug, Clone, Default)]
pub struct GeminiImageConfig {
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

const GEMINI_MAX_RETRY_ATTEMPTS: usize = 2;
const GEMINI_RETRY_BASE_DELAY_MS: u64 = 900;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

fn redact_gemini_api_key(text: &str) -> String {
    let key = CONFIG.gemini_api_key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn gemini_should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn gemini_should_retry_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn gemini_retry_delay(attempt: usize) -> Duration {
    let attempt = attempt.max(1) as u64;
    Duration::from_millis(GEMINI_RETRY_BASE_DELAY_MS.saturating_mul(attempt))
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }

    truncate_for_log(trimmed, 2000)
}

fn build_safety_settings() -> Vec<Value> {
    let profile = CONFIG.gemini_safety_settings.as_str();
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        _ => "OFF",
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

fn build_image_config(config: &GeminiImageConfig) -> Option<Value> {
    let mut map = Map::new();

    if let Some(aspect_ratio) = config.aspect_ratio.as_deref() {
        let trimmed = aspect_ratio.trim();
        if !trimmed.is_empty() {
            map.insert("aspectRatio".to_string(), json!(trimmed));
        }
    }

    if let Some(image_size) = config.image_size.as_deref() {
        let trimmed = image_size.trim();
        if !trimmed.is_empty() {
            map.insert("imageSize".to_string(), json!(trimmed));
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

async fn post_gemini(url: &str, payload: &Value, timeout: Duration) -> Result<Value> {
    let client = get_http_client();
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let response = match client.post(url).timeout(timeout).json(payload).send().await {
            Ok(response) => response,
            Err(err) => {
                let err_text = redact_gemini_api_key(&err.to_string());
                let should_retry =
                    gemini_should_retry_error(&err) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, retrying={})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    should_retry
                );
                if should_retry {
                    tokio::time::sleep(gemini_retry_delay(attempt)).await;
                    continue;
                }
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = summarize_error_body(&body);
            let should_retry =
                gemini_should_retry_status(status) && attempt < GEMINI_MAX_RETRY_ATTEMPTS;
            warn!(
                "Gemini API error: status={}, detail={}, retrying={}",
                status, detail, should_retry
            );
            if should_retry {
                tokio::time::sleep(gemini_retry_delay(attempt)).await;
                continue;
            }
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                detail
            ));
        }

        return Ok(response.json::<Value>().await?);
    }
}

async fn call_generate_content(model: &str, payload: Value) -> Result<GeminiResponse> {
    let url = format!(
        "{API_BASE}/models/{}:generateContent?key={}",
        model, CONFIG.gemini_api_key
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        let part_count = payload
            .pointer("/contents/0/parts")
            .and_then(|parts| parts.as_array())
            .map(|parts| parts.len())
            .unwrap_or(0);
        debug!(target: "llm.gemini", model = model, parts = part_count, "sending generateContent");
    }

    let value = post_gemini(&url, &payload, Duration::from_secs(90)).await?;
    Ok(serde_json::from_value(value)?)
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text);
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

fn extract_images_from_response(response: GeminiResponse) -> Vec<Vec<u8>> {
    let mut images = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::InlineData { inline_data } = part {
                        if inline_data.mime_type.starts_with("image/") {
                            if let Ok(bytes) = general_purpose::STANDARD.decode(inline_data.data) {
                                images.push(bytes);
                            }
                        }
                    }
                }
            }
        }
    }
    images
}

pub async fn call_gemini(user_content: &str) -> Result<String> {
    let payload = json!({
        "systemInstruction": { "parts": [{ "text": STUDIO_SYSTEM_PROMPT }] },
        "contents": [{ "role": "user", "parts": [{ "text": user_content }] }],
        "generationConfig": {
            "temperature": CONFIG.gemini_temperature,
            "topK": CONFIG.gemini_top_k,
            "topP": CONFIG.gemini_top_p,
            "maxOutputTokens": CONFIG.gemini_max_output_tokens,
        },
        "safetySettings": build_safety_settings(),
    });

    let response = call_generate_content(&CONFIG.gemini_model, payload).await?;
    let text = extract_text_from_response(response);
    if text.trim().is_empty() {
        return Err(anyhow!("Gemini returned an empty response"));
    }
    Ok(text)
}

pub async fn enhance_prompt(draft: &str, mode: GenerationMode) -> Result<String> {
    let media_type = match mode {
        GenerationMode::Video => "video",
        _ => "image",
    };
    let instruction = ENHANCE_INSTRUCTION
        .replace("{media_type}", media_type)
        .replace("{prompt}", draft);

    let payload = json!({
        "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
        "generationConfig": {
            "temperature": CONFIG.gemini_temperature,
            "topK": CONFIG.gemini_top_k,
            "topP": CONFIG.gemini_top_p,
            "maxOutputTokens": CONFIG.gemini_max_output_tokens,
        },
        "safetySettings": build_safety_settings(),
    });

    let response = call_generate_content(&CONFIG.gemini_model, payload).await?;
    let enhanced = extract_text_from_response(response);
    if enhanced.trim().is_empty() {
        return Err(anyhow!("Prompt enhancement returned an empty response"));
    }
    Ok(enhanced.trim().to_string())
}

pub async fn generate_image(
    prompt: &str,
    image_config: &GeminiImageConfig,
    references: &[ReferenceDescriptor],
) -> Result<Vec<Vec<u8>>, ImageGenerationError> {
    let base_instruction = if references.is_empty() {
        "Generate an image based on the prompt. CRITICAL: response must be an image, NOT TEXT."
    } else {
        "Generate an image based on the prompt, using the attached images as references. \
         CRITICAL: response must be an image, NOT TEXT."
    };

    // Reference slots: description (when present) immediately before its image.
    let mut parts = Vec::new();
    for reference in references {
        if !reference.description.trim().is_empty() {
            parts.push(json!({ "text": reference.description }));
        }
        parts.push(json!({
            "inlineData": {
                "mimeType": reference.mime_type,
                "data": general_purpose::STANDARD.encode(&reference.data)
            }
        }));
    }
    parts.push(json!({ "text": prompt }));

    let mut generation_config = json!({
        "responseModalities": ["TEXT", "IMAGE"]
    });
    if let Some(image_config) = build_image_config(image_config) {
        if let Some(config_object) = generation_config.as_object_mut() {
            config_object.insert("imageConfig".to_string(), image_config);
        }
    }

    let payload = json!({
        "systemInstruction": { "parts": [{ "text": base_instruction }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config,
        "safetySettings": build_safety_settings(),
    });

    let model = &CONFIG.gemini_image_model;
    let response = call_generate_content(model, payload)
        .await
        .map_err(|err| ImageGenerationError(err.to_string()))?;

    let images = extract_images_from_response(response);
    if images.is_empty() {
        return Err(ImageGenerationError(format!(
            "No images returned by Gemini (model: {})",
            model
        )));
    }

    Ok(images)
}

pub async fn generate_video(prompt: &str, orientation: &str) -> Result<Vec<u8>> {
    let model = &CONFIG.gemini_video_model;
    let url = format!(
        "{API_BASE}/models/{}:predictLongRunning?key={}",
        model, CONFIG.gemini_api_key
    );
    let payload = json!({
        "instances": [{ "prompt": prompt }],
        "parameters": { "aspectRatio": orientation }
    });

    let started = post_gemini(&url, &payload, Duration::from_secs(90)).await?;
    let operation_name = started
        .get("name")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("Veo did not return an operation name"))?
        .to_string();
    info!("Veo operation started: {}", operation_name);

    let operation = poll_video_operation(&operation_name).await?;
    extract_video_bytes(&operation).await
}

async fn poll_video_operation(operation_name: &str) -> Result<Value> {
    let client = get_http_client();
    let url = format!(
        "{API_BASE}/{}?key={}",
        operation_name, CONFIG.gemini_api_key
    );

    for _ in 0..CONFIG.video_poll_max_attempts {
        tokio::time::sleep(Duration::from_secs(CONFIG.video_poll_interval_seconds)).await;

        let operation = client
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| anyhow!("Veo operation poll failed: {}", redact_gemini_api_key(&err.to_string())))?
            .json::<Value>()
            .await?;

        if let Some(error) = operation.get("error") {
            return Err(anyhow!(
                "Veo operation failed: {}",
                summarize_error_body(&error.to_string())
            ));
        }

        if operation
            .get("done")
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
        {
            return Ok(operation);
        }
    }

    Err(anyhow!(
        "Veo operation {} did not finish within the polling budget",
        operation_name
    ))
}

async fn extract_video_bytes(operation: &Value) -> Result<Vec<u8>> {
    let video = operation
        .pointer("/response/generateVideoResponse/generatedSamples/0/video")
        .ok_or_else(|| anyhow!("Veo operation finished without a generated video"))?;

    if let Some(encoded) = video
        .get("bytesBase64Encoded")
        .and_then(|value| value.as_str())
    {
        return Ok(general_purpose::STANDARD.decode(encoded)?);
    }

    let uri = video
        .get("uri")
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("Veo video has neither inline bytes nor a download uri"))?;

    let response = get_http_client()
        .get(uri)
        .query(&[("key", CONFIG.gemini_api_key.as_str())])
        .timeout(Duration::from_secs(120))
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
