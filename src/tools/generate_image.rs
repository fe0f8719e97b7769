//! Image generation tool
//!
//! Produces a Markdown image directive pointing at a prompt-addressed image
//! service. The URL is derived from the prompt alone, so the same prompt
//! always yields the same reference.

use super::{decode_input, string_object_schema, DecodeError, Tool};
use serde::Deserialize;
use serde_json::{Map, Value};

const IMAGE_ENDPOINT: &str = "https://image.pollinations.ai/prompt/";

pub struct GenerateImageTool;

#[derive(Debug, Deserialize)]
struct GenerateImageInput {
    prompt: String,
}

impl GenerateImageTool {
    pub fn image_url(prompt: &str) -> String {
        format!("{IMAGE_ENDPOINT}{}", urlencoding::encode(prompt))
    }
}

impl Tool for GenerateImageTool {
    fn name(&self) -> &'static str {
        "generate_image"
    }

    fn description(&self) -> String {
        "Generate an image from a text description. Returns a Markdown image reference that should be included in the reply as-is.".to_string()
    }

    fn input_schema(&self) -> Value {
        string_object_schema(&[(
            "prompt",
            "Detailed description of the image to generate",
        )])
    }

    fn run(&self, args: Map<String, Value>) -> Result<String, DecodeError> {
        let input: GenerateImageInput = decode_input(self.name(), args)?;
        let prompt = input.prompt.trim();
        if prompt.is_empty() {
            return Err(DecodeError::new(self.name(), "prompt must not be empty"));
        }

        // Brackets would terminate the alt text early
        let alt = prompt.replace(['[', ']'], "");
        Ok(format!("![{alt}]({})", Self::image_url(prompt)))
    }
}
