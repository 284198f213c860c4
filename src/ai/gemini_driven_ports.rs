use crate::app_env;
use crate::domain::task_parser::driven_ports::{GenerationRequest, GenerativeModel, ModelError};
use crate::external_connections::{ExternalConnectivity, failure_body};
use anyhow::{Context, anyhow};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::env;

/// Header carrying the API key on every Generative Language API call
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generative model backed by the Google Generative Language REST API
#[derive(Debug, Clone)]
pub struct GeminiModel {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>, model: &str, base_url: &str) -> GeminiModel {
        GeminiModel {
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.trim().trim_start_matches("models/").to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Reads the model configuration from the environment. A missing API key is not an error
    /// here; parse requests fail with [ModelError::MissingCredential] instead.
    pub fn from_env() -> GeminiModel {
        let model = env::var(app_env::GEMINI_MODEL)
            .unwrap_or_else(|_| app_env::DEFAULT_GEMINI_MODEL.to_owned());
        let base_url = env::var(app_env::GEMINI_BASE_URL)
            .unwrap_or_else(|_| app_env::DEFAULT_GEMINI_BASE_URL.to_owned());

        Self::new(env::var(app_env::GEMINI_API_KEY).ok(), &model, &base_url)
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn list_models_url(&self) -> String {
        format!("{}/v1beta/models?pageSize=1000", self.base_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'req> {
    contents: Vec<Content<'req>>,
    generation_config: GenerationConfig<'req>,
}

#[derive(Serialize)]
struct Content<'req> {
    role: &'static str,
    parts: Vec<RequestPart<'req>>,
}

#[derive(Serialize)]
struct RequestPart<'req> {
    text: &'req str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'req> {
    response_mime_type: &'static str,
    response_schema: &'req serde_json::Value,
    temperature: f32,
}

impl<'req> From<&GenerationRequest<'req>> for GenerateContentRequest<'req> {
    fn from(request: &GenerationRequest<'req>) -> Self {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart {
                    text: request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema,
                temperature: 0.1,
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// Concatenated text of the first candidate, if it has any
fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    (!text.trim().is_empty()).then_some(text)
}

/// Sorts an unsuccessful generateContent answer into "the configured model can't be used" and
/// every other failure
fn classify_failure(model: &str, status: StatusCode, body: &str) -> ModelError {
    let (message, api_status) = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_owned(), None),
    };
    let lowered = message.to_lowercase();
    let cause = anyhow!(
        "model provider answered {status} ({}): {message}",
        api_status.as_deref().unwrap_or("no status")
    );

    if status == StatusCode::NOT_FOUND
        || lowered.contains("not found")
        || lowered.contains("is not supported")
    {
        ModelError::ModelUnavailable {
            model: model.to_owned(),
            cause,
        }
    } else {
        ModelError::CommsFailure(cause)
    }
}

/// Short names of the listed models which can serve generateContent
fn generation_capable(list: ModelList) -> Vec<String> {
    list.models
        .into_iter()
        .filter(|model| {
            model
                .supported_generation_methods
                .iter()
                .any(|method| method == "generateContent")
        })
        .map(|model| model.name.trim_start_matches("models/").to_owned())
        .collect()
}

impl GenerativeModel for GeminiModel {
    async fn generate_json(
        &self,
        request: &GenerationRequest<'_>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<String, ModelError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ModelError::MissingCredential)?;

        let response = ext_cxn
            .http_client()
            .post(self.generate_url())
            .header(API_KEY_HEADER, api_key)
            .json(&GenerateContentRequest::from(request))
            .send()
            .await
            .context("sending a generateContent request to the model provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = failure_body(response).await;
            return Err(classify_failure(&self.model, status, &body));
        }

        let decoded: GenerateContentResponse = response
            .json()
            .await
            .context("decoding the generateContent response")?;

        first_candidate_text(decoded)
            .ok_or_else(|| ModelError::CommsFailure(anyhow!("the model returned no text candidates")))
    }

    async fn available_models(
        &self,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<String>, anyhow::Error> {
        let api_key = self
            .api_key
            .as_deref()
            .context("listing models requires an API key")?;

        let list: ModelList = ext_cxn
            .http_client()
            .get(self.list_models_url())
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .context("requesting the model list")?
            .error_for_status()
            .context("model list request was rejected")?
            .json()
            .await
            .context("decoding the model list")?;

        Ok(generation_capable(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external_connections;
    use serde_json::json;
    use speculoos::prelude::*;

    #[test]
    fn normalizes_configuration() {
        let model = GeminiModel::new(
            Some("  ".to_owned()),
            "models/gemini-2.0-flash",
            "https://example.test/",
        );

        assert_eq!("gemini-2.0-flash", model.model_name());
        assert!(!model.has_credential());
        assert_eq!(
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent",
            model.generate_url()
        );
    }

    #[test]
    fn request_asks_for_schema_constrained_json() {
        let schema = json!({ "type": "OBJECT" });
        let request = GenerationRequest {
            prompt: "Task text: buy milk",
            response_schema: &schema,
        };

        let body = serde_json::to_value(GenerateContentRequest::from(&request))
            .expect("request serializes");
        assert_eq!(json!("Task text: buy milk"), body["contents"][0]["parts"][0]["text"]);
        assert_eq!(json!("application/json"), body["generationConfig"]["responseMimeType"]);
        assert_eq!(schema, body["generationConfig"]["responseSchema"]);
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"title\":" }, { "text": "\"x\"}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }))
        .expect("response deserializes");

        assert_that!(first_candidate_text(response)).contains_value("{\"title\":\"x\"}".to_owned());
    }

    #[test]
    fn blocked_response_has_no_text() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .expect("response deserializes");

        assert!(first_candidate_text(response).is_none());
    }

    mod classify_failure {
        use super::*;

        #[test]
        fn missing_model_is_unavailable() {
            let body = r#"{"error":{"code":404,"message":"models/gemini-9 is not found for API version v1beta","status":"NOT_FOUND"}}"#;

            let err = classify_failure("gemini-9", StatusCode::NOT_FOUND, body);
            assert!(matches!(err, ModelError::ModelUnavailable { model, .. } if model == "gemini-9"));
        }

        #[test]
        fn unsupported_method_is_unavailable() {
            let body = r#"{"error":{"code":400,"message":"Model is not supported for generateContent","status":"INVALID_ARGUMENT"}}"#;

            let err = classify_failure("embedding-001", StatusCode::BAD_REQUEST, body);
            assert!(matches!(err, ModelError::ModelUnavailable { .. }));
        }

        #[test]
        fn quota_errors_are_plain_failures() {
            let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;

            let err = classify_failure("gemini-2.0-flash", StatusCode::TOO_MANY_REQUESTS, body);
            assert!(matches!(err, ModelError::CommsFailure(_)));
        }

        #[test]
        fn non_json_bodies_are_tolerated() {
            let err = classify_failure("gemini-2.0-flash", StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
            assert!(matches!(err, ModelError::CommsFailure(_)));
        }
    }

    #[test]
    fn lists_only_generation_capable_models() {
        let list: ModelList = serde_json::from_value(json!({
            "models": [
                { "name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                { "name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"] }
            ]
        }))
        .expect("model list deserializes");

        assert_eq!(vec!["gemini-2.0-flash".to_owned()], generation_capable(list));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let model = GeminiModel::new(None, "gemini-2.0-flash", "http://127.0.0.1:9");
        let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
        let schema = json!({});
        let request = GenerationRequest {
            prompt: "buy milk",
            response_schema: &schema,
        };

        let result = model.generate_json(&request, &mut ext_cxn).await;
        assert!(matches!(result, Err(ModelError::MissingCredential)));
    }
}
