use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::engine::models::Verdict;

const GRADING_SYSTEM: &str = "You are a strict programming-challenge grader. \
Reply with ONLY a JSON object shaped as \
{\"verdict\": \"correct\" | \"incorrect\", \"explanation\": string, \"steps\": [string]} \
where steps holds at most 3 short remediation sentences. No prose outside the JSON.";

const HINTS_SYSTEM: &str = "Provide 3 short hints for the following programming question. \
Each hint is a single concise sentence. Return ONLY a JSON array of strings, nothing else.";

const MAX_TIMEOUT_MS: u64 = 30_000;

/// Best-effort delegate to an OpenAI-compatible chat-completions endpoint.
/// Every failure mode (missing credentials, transport error, non-200,
/// unparseable body) collapses to `None`; the deterministic graders are the
/// fallback and this path is never the sole grading mechanism.
#[derive(Clone)]
pub struct AiGrader {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AiGrader {
    /// Construct the client if AI_API_KEY is set; otherwise return None and
    /// let the engine run deterministic-only.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("AI_API_KEY").ok()?;
        let base_url = std::env::var("AI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let timeout_ms = std::env::var("AI_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(20_000)
            .min(MAX_TIMEOUT_MS);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key,
            base_url,
            model,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn try_grade(&self, prompt: &str, submission: &str) -> Option<Verdict> {
        let user = format!("Challenge:\n{prompt}\n\nSubmission:\n{submission}");
        let content = self.chat(GRADING_SYSTEM, &user, true).await?;
        let verdict = parse_verdict(&content);
        if verdict.is_none() {
            tracing::warn!("AI grading response did not match the required shape");
        }
        verdict
    }

    pub async fn suggest_hints(&self, prompt: &str) -> Option<Vec<String>> {
        let user = format!("Question: {prompt}");
        let content = self.chat(HINTS_SYSTEM, &user, false).await?;
        parse_hints(&content)
    }

    async fn chat(&self, system: &str, user: &str, json_mode: bool) -> Option<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature: 0.2,
            response_format: json_mode.then(|| ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = match self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "AI request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "AI endpoint returned an error status");
            return None;
        }

        let body: ChatCompletionResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "AI response body was not valid JSON");
                return None;
            }
        };

        body.choices.into_iter().next()?.message.content
    }
}

#[derive(Debug, Deserialize)]
struct AiVerdict {
    verdict: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    steps: Vec<String>,
}

/// Best-effort mapping of a model reply onto a `Verdict`. Returns None for
/// anything that does not contain the required JSON shape.
pub fn parse_verdict(content: &str) -> Option<Verdict> {
    let span = extract_json_object(content)?;
    let raw: AiVerdict = serde_json::from_str(span).ok()?;
    let passed = match raw.verdict.to_ascii_lowercase().as_str() {
        "correct" => true,
        "incorrect" => false,
        _ => return None,
    };
    let mut hints = raw.steps;
    hints.truncate(3);
    let missing = if passed {
        Vec::new()
    } else {
        vec!["solution does not meet the challenge requirements".to_string()]
    };
    Some(Verdict {
        passed,
        missing,
        hints,
        notes: raw.explanation,
        raw_output: None,
    })
}

pub fn parse_hints(content: &str) -> Option<Vec<String>> {
    let span = extract_json_span(content, '[', ']')?;
    let hints: Vec<String> = serde_json::from_str(span).ok()?;
    if hints.is_empty() {
        return None;
    }
    let mut hints = hints;
    hints.truncate(3);
    Some(hints)
}

/// Locate the first balanced `{...}` span, tolerating prose or code fences
/// around it. Quoted strings and escapes are honored so braces inside JSON
/// string values do not unbalance the scan.
pub fn extract_json_object(content: &str) -> Option<&str> {
    extract_json_span(content, '{', '}')
}

fn extract_json_span(content: &str, open: char, close: char) -> Option<&str> {
    let start = content.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in content[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + idx + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{extract_json_object, parse_hints, parse_verdict};

    #[test]
    fn object_is_extracted_from_surrounding_prose() {
        let reply = "Sure! Here is my assessment: {\"verdict\": \"correct\", \
\"explanation\": \"ok\", \"steps\": []} — hope that helps.";
        let span = extract_json_object(reply).unwrap();
        assert!(span.starts_with('{') && span.ends_with('}'));
        assert!(parse_verdict(reply).unwrap().passed);
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance_the_scan() {
        let reply = "{\"verdict\": \"incorrect\", \"explanation\": \"use {} literals\", \"steps\": [\"a\"]}";
        let verdict = parse_verdict(reply).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.notes, "use {} literals");
    }

    #[test]
    fn non_json_replies_are_unavailable() {
        assert!(parse_verdict("I think the answer looks fine.").is_none());
        assert!(parse_verdict("{\"verdict\": \"maybe\"}").is_none());
        assert!(parse_verdict("{ truncated").is_none());
    }

    #[test]
    fn steps_are_capped_at_three_hints() {
        let reply = "{\"verdict\": \"incorrect\", \"explanation\": \"x\", \
\"steps\": [\"a\", \"b\", \"c\", \"d\"]}";
        let verdict = parse_verdict(reply).unwrap();
        assert_eq!(verdict.hints.len(), 3);
        assert_eq!(verdict.missing.len(), 1);
    }

    #[test]
    fn hint_arrays_survive_code_fences() {
        let reply = "```json\n[\"first\", \"second\", \"third\"]\n```";
        assert_eq!(parse_hints(reply).unwrap().len(), 3);
        assert!(parse_hints("no hints here").is_none());
        assert!(parse_hints("[]").is_none());
    }
}
