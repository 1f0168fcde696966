use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

/// Model output that could not be reduced to JSON. Keeps the raw text for diagnostics.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to parse JSON response from AI")]
pub struct ParseError {
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("status={status} body={body}")] Status { status: u16, body: String },
    #[error("empty response from AI")] EmptyResponse,
    #[error("no image generated in response")] NoImage,
    #[error(transparent)] Parse(#[from] ParseError),
    #[error("decode error: {0}")] Decode(String),
}

/// A gateway failure caught at the step that issued the call.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("extraction failed: {0}")] Extraction(#[source] GatewayError),
    #[error("diagnosis failed: {0}")] Diagnosis(#[source] GatewayError),
    #[error("optimization failed: {0}")] Optimization(#[source] GatewayError),
    #[error("image {id} generation failed: {source}")]
    ImageGeneration { id: u32, #[source] source: GatewayError },
}

impl StepError {
    /// Short localized message shown on the step that failed.
    pub fn user_message(&self) -> String {
        match self {
            StepError::Extraction(_) => "无法从链接提取信息，请检查链接或手动输入。".to_string(),
            StepError::Diagnosis(_) => "生成诊断失败，请检查您的输入或稍后重试。".to_string(),
            StepError::Optimization(_) => "生成优化方案失败。".to_string(),
            StepError::ImageGeneration { id, .. } => format!("图片 {id} 生成失败，请重试。"),
        }
    }
}

/// A user action that the current wizard state does not allow. Nothing was changed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("action not available in step {0}")] WrongStep(&'static str),
    #[error("another request is already in flight")] Busy,
    #[error("no platform selected")] NoPlatform,
    #[error("product title is empty")] EmptyTitle,
    #[error("product URL is empty")] EmptyUrl,
    #[error("diagnosis result is missing")] NoDiagnosis,
    #[error("no plan at index {0}")] NoSuchPlan(usize),
    #[error("reference image has not been uploaded")] NoReferenceImage,
    #[error("image {0} is not part of the selected plan")] NoSuchImage(u32),
    #[error("image {0} is already being generated")] SlotBusy(u32),
    #[error("at most {0} competitor URLs are allowed")] TooManyCompetitors(usize),
    #[error("at least one competitor URL slot is required")] LastCompetitor,
    #[error("no competitor URL at index {0}")] NoSuchCompetitor(usize),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found")] NotFound,
    #[error(transparent)] Conflict(#[from] Rejection),
    #[error("bad request: {0}")] BadRequest(String),
    #[error("internal error: {0}")] Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_failure_message_names_the_slot() {
        let err = StepError::ImageGeneration { id: 3, source: GatewayError::NoImage };
        assert_eq!(err.user_message(), "图片 3 生成失败，请重试。");
    }

    #[test]
    fn parse_error_converts_into_gateway_error() {
        let err: GatewayError = ParseError { raw: "nope".into() }.into();
        assert!(matches!(err, GatewayError::Parse(ParseError { ref raw }) if raw == "nope"));
    }
}
