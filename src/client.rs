use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

use crate::app::ChatMessage;

/// System prompt sent with every chat request. The backend feeds it to the
/// model verbatim; the `<AI_ANALYSIS>` block it demands is what the analysis
/// parser later picks apart.
pub const SYSTEM_PROMPT: &str = "You are a helpful and friendly AI assistant specializing in dietary information. Your name is Nutri-Chat. You must answer user questions based *only* on the context provided. After your user-facing reply, you MUST include a special <AI_ANALYSIS> block. In this block, you will 'think out loud'. First, state which specific sentences from the context you used to form your answer. Second, explain your reasoning step-by-step. Third, state your confidence level (High, Medium, or Low). If the context does not contain the answer, you must state that and explain why the provided context is insufficient.";

pub const DEFAULT_PROMPT_FILENAME: &str = "default.md";

#[derive(Serialize)]
struct ChatRequest<'a> {
    system_prompt: &'a str,
    system_prompt_filename: &'a str,
    diet: &'a str,
    history: &'a [ChatMessage],
    user_message: &'a str,
}

/// Decoded body of a successful `/api/chat` response. `analysis` is omitted
/// by older backend versions.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub analysis: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<String>,
}

#[derive(Clone)]
pub struct NutriClient {
    client: Client,
    base_url: String,
}

impl NutriClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run one chat exchange. `history` is the conversation before the new
    /// user message; the backend re-threads it into the model context.
    pub async fn chat(
        &self,
        diet: &str,
        prompt_filename: &str,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<ChatReply> {
        let url = format!("{}/api/chat", self.base_url);

        let request = ChatRequest {
            system_prompt: SYSTEM_PROMPT,
            system_prompt_filename: prompt_filename,
            diet,
            history,
            user_message,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chat request failed with status: {}. Make sure the Nutri-Chat backend is running at {}",
                response.status(),
                self.base_url
            ));
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply)
    }

    /// List the system prompt files the backend knows about.
    pub async fn list_prompts(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/prompts", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("failed to list prompts: {}", response.status()));
        }

        let prompts: Vec<String> = response.json().await?;
        Ok(prompts)
    }

    /// List the models the backend can route requests to.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/models", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("failed to list models: {}", response.status()));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ChatRole;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_chat_sends_fixed_prompt_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "system_prompt": SYSTEM_PROMPT,
                "system_prompt_filename": "default.md",
                "diet": "SCD",
                "history": [{"role": "user", "content": "Hi"}],
                "user_message": "What about honey?",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": "Honey is allowed.",
                "analysis": "Confidence Level: High",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let history = vec![ChatMessage {
            role: ChatRole::User,
            content: "Hi".to_string(),
        }];
        let reply = client
            .chat("SCD", DEFAULT_PROMPT_FILENAME, &history, "What about honey?")
            .await
            .unwrap();

        assert_eq!(reply.reply, "Honey is allowed.");
        assert_eq!(reply.analysis.as_deref(), Some("Confidence Level: High"));
    }

    #[tokio::test]
    async fn test_chat_without_analysis_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "Hello"})))
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let reply = client
            .chat("GAPS", DEFAULT_PROMPT_FILENAME, &[], "hi")
            .await
            .unwrap();

        assert_eq!(reply.reply, "Hello");
        assert!(reply.analysis.is_none());
    }

    #[tokio::test]
    async fn test_chat_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let result = client
            .chat("SCD", DEFAULT_PROMPT_FILENAME, &[], "hi")
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_chat_undecodable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let result = client
            .chat("SCD", DEFAULT_PROMPT_FILENAME, &[], "hi")
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_prompts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/prompts"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!(["default.md", "strict.md"])),
            )
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let prompts = client.list_prompts().await.unwrap();
        assert_eq!(prompts, vec!["default.md", "strict.md"]);
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/models"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"models": ["gemini-2.5-pro", "gemini-2.5-flash"]})),
            )
            .mount(&server)
            .await;

        let client = NutriClient::new(&server.uri());
        let models = client.list_models().await.unwrap();
        assert_eq!(models, vec!["gemini-2.5-pro", "gemini-2.5-flash"]);
    }
}
