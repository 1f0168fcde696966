use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::Config;
use crate::error::GatewayError;
use crate::gateway::GenerationGateway;
use crate::images::{preview, GeneratedImage, ReferenceImage};
use crate::models::{DiagnosisResult, ExtractedProductInfo, ImagePlan, OptimizationResult, Platform, ProductInput};
use crate::normalize::parse_as;
use crate::prompts;

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(body: &str) -> String {
    if body.len() <= 1000 {
        return body.to_string();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(mut value) => {
            truncate_base64_in_json(&mut value);
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| preview(body))
        }
        Err(_) => format!("{}...", body.chars().take(1000).collect::<String>()),
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &Config) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GeminiResponse, GatewayError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let mut logged = body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string().replace(&self.api_key, "***")))?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        let response_text = response.text().await.map_err(|e| GatewayError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GatewayError::Status { status: status.as_u16(), body: response_text });
        }
        info!("📥 Raw Gemini API response: {}", loggable(&response_text));

        serde_json::from_str(&response_text).map_err(|e| GatewayError::Decode(format!("{}: {}", e, preview(&response_text))))
    }
}

fn text_contents(prompt: &str) -> Value {
    json!([{ "parts": [{ "text": prompt }] }])
}

fn system_instruction() -> Value {
    json!({ "parts": [{ "text": prompts::SYSTEM_INSTRUCTION }] })
}

/// Search-grounded request. The search tool cannot be combined with a response schema.
fn grounded_request(prompt: &str, with_system: bool) -> Value {
    let mut body = json!({
        "contents": text_contents(prompt),
        "tools": [{ "googleSearch": {} }],
    });
    if with_system {
        body["systemInstruction"] = system_instruction();
    }
    body
}

fn schema_request(prompt: &str, schema: Value) -> Value {
    json!({
        "contents": text_contents(prompt),
        "systemInstruction": system_instruction(),
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": schema,
        }
    })
}

fn image_request(reference: &ReferenceImage, prompt: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": reference.mime_type, "data": reference.base64() } },
                { "text": prompt }
            ]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": "1:1", "imageSize": "1K" }
        }
    })
}

#[async_trait]
impl GenerationGateway for GeminiClient {
    async fn extract_product_info(&self, url: &str) -> Result<ExtractedProductInfo, GatewayError> {
        info!("🔎 Extracting product info from {}", url);
        let body = grounded_request(&prompts::extraction_prompt(url), false);
        let text = first_text(&self.generate_content(&self.text_model, &body).await?)?;
        Ok(parse_as(&text)?)
    }

    async fn perform_diagnosis(&self, platform: Platform, input: &ProductInput) -> Result<DiagnosisResult, GatewayError> {
        info!("🩺 Running diagnosis for '{}' on {}", input.title, platform);
        let body = grounded_request(&prompts::diagnosis_prompt(platform, input), true);
        let text = first_text(&self.generate_content(&self.text_model, &body).await?)?;
        Ok(parse_as(&text)?)
    }

    async fn generate_optimizations(
        &self,
        platform: Platform,
        input: &ProductInput,
        diagnosis: &DiagnosisResult,
    ) -> Result<OptimizationResult, GatewayError> {
        info!("🧭 Generating optimization plans on {}", platform);
        let prompt = prompts::optimization_prompt(platform, input, diagnosis);
        let body = schema_request(&prompt, prompts::optimization_schema());
        let text = first_text(&self.generate_content(&self.text_model, &body).await?)?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn generate_listing_image(
        &self,
        reference: &ReferenceImage,
        plan: &ImagePlan,
        product_description: &str,
    ) -> Result<GeneratedImage, GatewayError> {
        info!("🎯 Generating image {} ({})", plan.id, plan.kind);
        let body = image_request(reference, &prompts::image_prompt(plan, product_description));
        let parsed = self.generate_content(&self.image_model, &body).await?;
        let inline = extract_first_image(&parsed).ok_or(GatewayError::NoImage)?;
        info!("🖼️ Extracted {} image: {}", inline.mime_type, preview(&inline.data));
        GeneratedImage::from_base64(plan.id, &inline.mime_type, &inline.data)
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default = "default_mime")]
    mime_type: String,
}

fn default_mime() -> String {
    "image/png".to_string()
}

/// Joins the text parts of the first candidate; grounded answers often arrive split.
fn first_text(resp: &GeminiResponse) -> Result<String, GatewayError> {
    let text: String = resp
        .candidates
        .first()
        .map(|c| {
            c.content.parts.iter().filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            }).collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn extract_first_image(resp: &GeminiResponse) -> Option<&InlineData> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return Some(inline_data);
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn joins_split_text_parts() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"title\":" }, { "text": "\"x\"}" }] } }]
        }));
        assert_eq!(first_text(&resp).unwrap(), "{\"title\":\"x\"}");
    }

    #[test]
    fn blank_or_missing_text_is_empty_response() {
        assert!(matches!(first_text(&response(json!({}))), Err(GatewayError::EmptyResponse)));
        let resp = response(json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] }));
        assert!(matches!(first_text(&resp), Err(GatewayError::EmptyResponse)));
    }

    #[test]
    fn finds_inline_image_after_text() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
            ] } }]
        }));
        let inline = extract_first_image(&resp).unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "iVBORw0KGgo=");
    }

    #[test]
    fn text_only_response_has_no_image() {
        let resp = response(json!({ "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }] }));
        assert!(extract_first_image(&resp).is_none());
    }

    #[test]
    fn grounded_requests_never_carry_a_schema() {
        let body = grounded_request("p", true);
        assert_eq!(body["tools"], json!([{ "googleSearch": {} }]));
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_some());
        assert!(grounded_request("p", false).get("systemInstruction").is_none());
    }

    #[test]
    fn schema_request_asks_for_json() {
        let body = schema_request("p", json!({ "type": "OBJECT" }));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn truncates_long_base64_in_logs() {
        let mut value = json!({ "parts": [{ "inlineData": { "data": "A".repeat(200) } }] });
        truncate_base64_in_json(&mut value);
        let data = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert_eq!(data, format!("{}...[truncated 150 chars]", "A".repeat(50)));
    }
}
