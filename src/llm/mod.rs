pub mod gemini;
pub mod media;

pub use gemini::{
    call_gemini, enhance_prompt, generate_image, generate_video, GeminiImageConfig,
    ImageGenerationError,
};
