use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Map, Value};

use crate::{
    configuration::ExtractorSettings, domain::BusinessRecord, error::ExtractionError,
};

use super::FieldExtractor;

const NAME_KEY: &str = "Business Name";
const TYPE_KEY: &str = "Business Type";
const ADDRESS_KEY: &str = "Address";
const PHONE_KEY: &str = "Phone Number";
const EMAIL_KEY: &str = "Email";
const WEBSITE_KEY: &str = "Website";

/// Chat-completions client used to turn listing text into a [`BusinessRecord`].
///
/// Any OpenAI compatible endpoint works; the default configuration points at
/// Gemini's compatibility layer.
pub struct OpenaiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_attempts: u32,
    backoff: Duration,
    max_input_chars: usize,
}

impl OpenaiClient {
    pub fn new(settings: &ExtractorSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        let config = OpenAIConfig::new()
            .with_api_key(settings.api_key.as_str())
            .with_api_base(settings.api_base.as_str());

        // The library retries 429s on its own for up to 15 minutes. Zero elapsed
        // time turns that off so `complete_with_retries` is the only retry loop.
        let no_retries = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        Ok(OpenaiClient {
            client: Client::with_config(config)
                .with_http_client(http_client)
                .with_backoff(no_retries),
            model: settings.model.clone(),
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.backoff(),
            max_input_chars: settings.max_input_chars,
        })
    }

    pub async fn extract_business(&self, raw_text: &str) -> Result<BusinessRecord, ExtractionError> {
        let prompt = build_extraction_prompt(raw_text, self.max_input_chars);
        let request = self.build_request(&prompt)?;
        let reply = self.complete_with_retries(request).await?;

        parse_extraction_reply(&reply)
    }

    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest, ExtractionError> {
        let to_error = |e: async_openai::error::OpenAIError| ExtractionError::Api {
            attempts: 0,
            message: e.to_string(),
        };

        CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(to_error)?
                .into()])
            .temperature(0.0)
            .build()
            .map_err(to_error)
    }

    async fn complete_with_retries(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<String, ExtractionError> {
        let mut attempt = 1;

        loop {
            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    log::debug!("Extraction API usage: {:?}", response.usage);
                    return response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                        .filter(|content| !content.trim().is_empty())
                        .ok_or(ExtractionError::EmptyResponse);
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(ExtractionError::Api {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..500));
                    let delay = self.backoff * attempt + jitter;
                    log::warn!(
                        "Extraction API error (attempt {}/{}), retrying in {:?}: {}",
                        attempt,
                        self.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl FieldExtractor for OpenaiClient {
    async fn extract(&self, raw_text: &str) -> Result<BusinessRecord, ExtractionError> {
        self.extract_business(raw_text).await
    }
}

pub fn build_extraction_prompt(raw_text: &str, max_chars: usize) -> String {
    let text: String = raw_text.chars().take(max_chars).collect();

    format!(
        r#"Extract the following business details from the text below. Return a JSON object with these keys: {}, {}, {}, {}, {}, {}. If a field is missing, use an empty string.

Text:
{}
"#,
        NAME_KEY, TYPE_KEY, ADDRESS_KEY, PHONE_KEY, EMAIL_KEY, WEBSITE_KEY, text
    )
}

/// Reads the first JSON object out of a model reply. Markdown fences and prose
/// around the object are ignored.
pub fn parse_extraction_reply(reply: &str) -> Result<BusinessRecord, ExtractionError> {
    let fields = first_json_object(reply)
        .ok_or_else(|| ExtractionError::Malformed(preview(reply)))?;

    BusinessRecord::new(
        &field(&fields, NAME_KEY),
        &field(&fields, TYPE_KEY),
        &field(&fields, ADDRESS_KEY),
        &field(&fields, PHONE_KEY),
        &field(&fields, EMAIL_KEY),
        &field(&fields, WEBSITE_KEY),
    )
    .ok_or(ExtractionError::Partial(NAME_KEY))
}

fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn preview(reply: &str) -> String {
    reply.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use super::*;

    #[test]
    fn parse_plain_json_reply() {
        let reply = r#"{"Business Name": "Joe's Coffee", "Business Type": "Cafe", "Address": "1 Main St, Springfield", "Phone Number": "+1 217-555-0134", "Email": "", "Website": "https://joes.coffee"}"#;
        let record = parse_extraction_reply(reply).unwrap();

        assert_eq!(record.name, "Joe's Coffee");
        assert_eq!(record.business_type, "Cafe");
        assert_eq!(record.address, "1 Main St, Springfield");
        assert_eq!(record.phone.as_deref(), Some("+1 217-555-0134"));
        assert_eq!(record.email, None);
        assert_eq!(record.website.as_deref(), Some("https://joes.coffee"));
    }

    #[test]
    fn parse_fenced_reply_with_trailing_prose() {
        let reply = "Here you go:\n```json\n{\"Business Name\": \"Joe's\", \"Address\": \"1 Main St\"}\n```\nLet me know {if} you need more.";
        let record = parse_extraction_reply(reply).unwrap();

        assert_eq!(record.name, "Joe's");
        assert_eq!(record.business_type, "");
        assert_eq!(record.address, "1 Main St");
    }

    #[test]
    fn parse_skips_braces_that_are_not_json() {
        let reply = "{not json} {\"Business Name\": \"Joe's\", \"Phone Number\": 2175550134}";
        let record = parse_extraction_reply(reply).unwrap();

        assert_eq!(record.phone.as_deref(), Some("2175550134"));
    }

    #[test]
    fn parse_reply_without_object_is_malformed() {
        let err = parse_extraction_reply("I could not find a business.").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn parse_reply_without_name_is_partial() {
        let err = parse_extraction_reply(r#"{"Business Name": "", "Address": "1 Main St"}"#)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Partial(NAME_KEY)));
    }

    #[test]
    fn prompt_truncates_listing_text() {
        let prompt = build_extraction_prompt(&"x".repeat(50), 10);
        assert!(prompt.contains(&format!("Text:\n{}\n", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    const RATE_LIMITED: &str = r#"{"error": {"message": "Resource has been exhausted", "type": "rate_limit_exceeded", "param": null, "code": null}}"#;
    const SERVER_ERROR: &str = r#"{"error": {"message": "Internal error", "type": "server_error", "param": null, "code": null}}"#;

    fn completion(content: Option<&str>) -> String {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gemini-2.0-flash",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    fn settings(api_base: &str, max_attempts: u32) -> ExtractorSettings {
        ExtractorSettings {
            api_key: "test-key".to_string(),
            api_base: api_base.to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_attempts,
            backoff_secs: 0,
            request_timeout_secs: 5,
            max_input_chars: 12000,
        }
    }

    /// Local chat-completions endpoint. Answers with `responses` in order,
    /// repeating the last one, and counts the requests it served.
    async fn canned_api(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_base = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                read_request(&mut socket).await;

                let hit = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = &responses[hit.min(responses.len() - 1)];
                let response = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (api_base, hits)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);

            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    async fn extract_with(
        responses: Vec<(u16, String)>,
        max_attempts: u32,
    ) -> (Result<BusinessRecord, ExtractionError>, usize) {
        let (api_base, hits) = canned_api(responses).await;
        let client = OpenaiClient::new(&settings(&api_base, max_attempts)).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client.extract_business("Joe's Coffee\n1 Main St"),
        )
        .await
        .expect("extraction should give up well before the timeout");

        (result, hits.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn rate_limited_calls_stop_after_max_attempts() {
        let (result, hits) = extract_with(vec![(429, RATE_LIMITED.to_string())], 2).await;

        assert!(matches!(result, Err(ExtractionError::Api { attempts: 2, .. })));
        assert_eq!(hits, 2);
    }

    #[tokio::test]
    async fn single_attempt_is_not_retried() {
        let (result, hits) = extract_with(vec![(429, RATE_LIMITED.to_string())], 1).await;

        assert!(matches!(result, Err(ExtractionError::Api { attempts: 1, .. })));
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn api_error_is_retried_until_a_reply_arrives() {
        let reply = completion(Some(r#"{"Business Name": "Joe's Coffee", "Address": "1 Main St"}"#));
        let (result, hits) =
            extract_with(vec![(500, SERVER_ERROR.to_string()), (200, reply)], 3).await;

        assert_eq!(result.unwrap().name, "Joe's Coffee");
        assert_eq!(hits, 2);
    }

    #[tokio::test]
    async fn reply_without_choices_is_empty() {
        let no_choices = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gemini-2.0-flash",
            "choices": []
        })
        .to_string();
        let (result, hits) = extract_with(vec![(200, no_choices)], 3).await;

        assert!(matches!(result, Err(ExtractionError::EmptyResponse)));
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn blank_content_is_empty() {
        let (result, hits) = extract_with(vec![(200, completion(Some("  \n")))], 3).await;

        assert!(matches!(result, Err(ExtractionError::EmptyResponse)));
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn malformed_reply_is_not_retried() {
        let reply = completion(Some("Sorry, I could not find a business."));
        let (result, hits) = extract_with(vec![(200, reply)], 3).await;

        assert!(matches!(result, Err(ExtractionError::Malformed(_))));
        assert_eq!(hits, 1);
    }
}
