// src/llm_extract.rs

use crate::config::{LlmBackend, LlmSection};
use crate::error::{Error, Result};
use crate::record::PartialRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// The prompt template that instructs the model to extract export invoice fields.
const SYSTEM_PROMPT: &str = r#"You are an export invoice data extraction assistant.
Given raw text extracted from a commercial export invoice PDF, return ONLY valid JSON.
All keys must exist. Use null if unknown.

The JSON must match this schema exactly:
{
  "invoice_number": "string or null",
  "invoice_date": "string or null",
  "seller_name": "string or null",
  "buyer_name": "string or null",
  "gstin": "string or null (15 characters)",
  "iec_code": "string or null (10 digits)",
  "currency": "string or null (e.g. USD, EUR, GBP, INR)",
  "subtotal": number or null,
  "tax_amount": number or null,
  "total_amount": number or null,
  "hsn_code": "string or null (6-8 digits)",
  "incoterms": "string or null (EXW, FOB, CIF, DAP, DDP or CFR)",
  "lut_reference": "string or null",
  "line_items": [
    {
      "description": "string",
      "quantity": number or null,
      "unit_price": number or null,
      "amount": number or null,
      "hsn_code": "string or null"
    }
  ]
}

Notes:
- The text may be garbled due to PDF column extraction issues. Do your best to reconstruct the data.
- Never guess codes that are not printed on the invoice; use null instead.
- Return ONLY the JSON object, no markdown fences, no commentary."#;

/// Something that can turn invoice text into candidate fields.
///
/// Output is untrusted and only fills gaps. Any failure is `None`; callers
/// cannot and need not tell a failed call from an empty invoice.
#[async_trait]
pub trait FieldInference: Send + Sync {
    async fn infer(&self, text: &str) -> Option<PartialRecord>;

    /// Short name for logs and reports.
    fn name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

/// Chat-completions client for Ollama or any OpenAI-compatible service.
pub struct LlmExtractor {
    client: Client,
    backend: LlmBackend,
    endpoint: ResolvedEndpoint,
    max_prompt_chars: usize,
}

impl LlmExtractor {
    /// `None` when the configured backend is plain heuristics.
    pub fn from_config(llm: &LlmSection) -> Result<Option<Self>> {
        let Some(endpoint) = resolve_endpoint(llm)? else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            backend: llm.backend,
            endpoint,
            max_prompt_chars: llm.max_prompt_chars,
        }))
    }

    async fn extract(&self, text: &str) -> Result<PartialRecord> {
        let text = truncate_chars(text, self.max_prompt_chars);

        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Invoice text:\n\n{text}"),
                },
            ],
            temperature: 0.0,
        };

        let url = format!(
            "{}/chat/completions",
            self.endpoint.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.endpoint.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::inference(format!("API error {status}: {body}")));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::inference("empty response"))?;

        parse_reply(content)
    }
}

#[async_trait]
impl FieldInference for LlmExtractor {
    async fn infer(&self, text: &str) -> Option<PartialRecord> {
        if text.trim().is_empty() {
            return None;
        }

        if self.backend == LlmBackend::Ollama
            && !check_ollama_health(&self.client, &self.endpoint.base_url).await
        {
            return None;
        }

        match self.extract(text).await {
            Ok(partial) => {
                info!(model = %self.endpoint.model, "Inference returned fields");
                Some(partial)
            }
            Err(e) => {
                warn!(error = %e, model = %self.endpoint.model, "Inference failed, using rules only");
                None
            }
        }
    }

    fn name(&self) -> &str {
        &self.endpoint.model
    }
}

/// Resolve the LLM config section into a concrete endpoint.
fn resolve_endpoint(llm: &LlmSection) -> Result<Option<ResolvedEndpoint>> {
    match llm.backend {
        LlmBackend::Heuristics => Ok(None),
        LlmBackend::Ollama => {
            info!(
                url = %llm.ollama.base_url,
                model = %llm.ollama.model,
                "Using Ollama (local) backend"
            );
            Ok(Some(ResolvedEndpoint {
                base_url: llm.ollama.base_url.clone(),
                model: llm.ollama.model.clone(),
                api_key: "ollama".to_string(), // required by API but ignored
            }))
        }
        LlmBackend::Remote => {
            let api_key = std::env::var("LLM_API_KEY").map_err(|_| {
                Error::inference("LLM_API_KEY env var required for remote backend")
            })?;
            info!(
                url = %llm.remote.base_url,
                model = %llm.remote.model,
                "Using remote API backend"
            );
            Ok(Some(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            }))
        }
    }
}

/// Check if the Ollama server is reachable.
async fn check_ollama_health(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches('/').trim_end_matches("/v1");

    match client
        .get(health_url)
        .timeout(Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => true,
        Ok(resp) => {
            warn!(status = %resp.status(), "Ollama server returned non-OK status");
            false
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

/// Turn raw model output into fields.
fn parse_reply(content: &str) -> Result<PartialRecord> {
    // Strip markdown fences if the model added them despite instructions
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Reasoning models may prepend text; keep the outermost object only.
    let json_str = extract_json_object(json_str)?;
    Ok(serde_json::from_str(json_str)?)
}

/// Extract the outermost JSON object from a string that may contain
/// surrounding text.
fn extract_json_object(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| Error::inference("no '{' in model reply"))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| Error::inference("no '}' in model reply"))?;
    if end <= start {
        return Err(Error::inference("malformed JSON in model reply"));
    }
    Ok(&s[start..=end])
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointSection;
    use serde_json::json;

    #[test]
    fn reply_with_fences_and_chatter() {
        let reply = "```json\nSure! Here it is:\n{\"iec_code\": \"0123456789\", \"total_amount\": \"5,000\", \"incoterms\": null}\n```";
        let partial = parse_reply(reply).unwrap();
        assert_eq!(partial.iec_code.as_deref(), Some("0123456789"));
        assert_eq!(partial.total_amount, json!("5,000"));
        assert_eq!(partial.incoterms, None);
    }

    #[test]
    fn reply_without_object_is_an_error() {
        assert!(matches!(
            parse_reply("I could not read the invoice."),
            Err(Error::Inference(_))
        ));
        assert!(matches!(parse_reply("} oops {"), Err(Error::Inference(_))));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(parse_reply("{\"iec_code\": }"), Err(Error::Json(_))));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn heuristics_backend_builds_no_client() {
        let llm = LlmSection::default();
        assert!(LlmExtractor::from_config(&llm).unwrap().is_none());
    }

    #[test]
    fn ollama_backend_resolves_without_key() {
        let llm = LlmSection {
            backend: LlmBackend::Ollama,
            ollama: EndpointSection {
                base_url: "http://localhost:11434/v1".into(),
                model: "llama3.1".into(),
            },
            ..Default::default()
        };
        let extractor = LlmExtractor::from_config(&llm).unwrap().unwrap();
        assert_eq!(extractor.name(), "llama3.1");
    }
}
