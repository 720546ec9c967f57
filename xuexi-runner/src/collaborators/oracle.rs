//! Chat-completions vision client for assisted answering
//!
//! Speaks the OpenAI-compatible `chat/completions` protocol. Frames are
//! attached as base64 JPEG data URLs.

use super::{encode_jpeg, Choice, CollaboratorError, CollaboratorResult, Frame, Oracle};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3/chat/completions";
pub const DEFAULT_ORACLE_MODEL: &str = "doubao-1-5-vision-pro-32k-250115";

const TEMPERATURE: f32 = 0.2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const CHOICE_PROMPT: &str = "你是答题助手。图片上半部分是一道选择题，下半部分是题目提示，\
提示中的红色文字即为答案。请找出与答案对应的选项。\
只输出选项字母（A、B、C、D、E 中的一个或多个），不要输出任何其他文字或标点。";

const BLANK_PROMPT: &str = "你是答题助手。图片中是一道填空题。请读懂题目，确定空格数量，\
然后给出应填入空格的内容。只输出填空内容本身，字数与空格数一致，不要解释。";

const BLANK_HINT_SUFFIX: &str = "题目附带提示视频，请结合图片中可见的提示信息作答。";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Assisted-answering client
#[derive(Debug, Clone)]
pub struct ChatOracle {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatOracle {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: Option<String>,
        model: Option<String>,
    ) -> CollaboratorResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ORACLE_ENDPOINT.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string()),
            api_key: api_key.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, images: &[Frame]) -> CollaboratorResult<String> {
        let mut content = Vec::with_capacity(images.len());
        for image in images {
            let jpeg = encode_jpeg(image)?;
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)) },
            }));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                json!({ "role": "system", "content": system }),
                json!({ "role": "user", "content": content }),
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Oracle(format!(
                "{} returned {}",
                self.endpoint, status
            )));
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::Oracle("response carried no choices".to_string()))
    }
}

/// Extract answer letters from model output
///
/// Keeps `A`–`E` in first-seen order and drops everything else, including
/// repeats (tapping a choice twice would deselect it). Returns `None` when
/// no letter survives.
pub fn parse_choice_letters(content: &str) -> Option<Vec<Choice>> {
    let mut letters = Vec::new();
    for choice in content.chars().filter_map(Choice::from_letter) {
        if !letters.contains(&choice) {
            letters.push(choice);
        }
    }
    (!letters.is_empty()).then_some(letters)
}

fn blank_prompt(has_hint: bool, blank_count: Option<usize>) -> String {
    let mut prompt = BLANK_PROMPT.to_string();
    if has_hint {
        prompt.push_str(BLANK_HINT_SUFFIX);
    }
    if let Some(count) = blank_count {
        prompt.push_str(&format!("本题共有 {} 个空格。", count));
    }
    prompt
}

#[async_trait::async_trait]
impl Oracle for ChatOracle {
    async fn resolve_choice(&self, images: &[Frame]) -> Option<Vec<Choice>> {
        match self.complete(CHOICE_PROMPT, images).await {
            Ok(content) => {
                debug!(content = %content, "Oracle choice response");
                let letters = parse_choice_letters(&content);
                if letters.is_none() {
                    warn!(content = %content, "Oracle answer contained no choice letter");
                }
                letters
            }
            Err(e) => {
                warn!(error = %e, "Oracle choice request failed");
                None
            }
        }
    }

    async fn resolve_blank(
        &self,
        images: &[Frame],
        has_hint: bool,
        blank_count: Option<usize>,
    ) -> Option<String> {
        let prompt = blank_prompt(has_hint, blank_count);
        match self.complete(&prompt, images).await {
            Ok(content) => {
                let answer = content.trim();
                if answer.is_empty() {
                    warn!("Oracle returned an empty blank answer");
                    None
                } else {
                    Some(answer.to_string())
                }
            }
            Err(e) => {
                warn!(error = %e, "Oracle blank request failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice_letters_filters() {
        assert_eq!(
            parse_choice_letters("答案：B、D"),
            Some(vec![Choice::B, Choice::D])
        );
        assert_eq!(parse_choice_letters("ACA"), Some(vec![Choice::A, Choice::C]));
        assert_eq!(parse_choice_letters("E"), Some(vec![Choice::E]));
    }

    #[test]
    fn test_parse_choice_letters_rejects_empty() {
        assert_eq!(parse_choice_letters(""), None);
        assert_eq!(parse_choice_letters("不确定"), None);
        assert_eq!(parse_choice_letters("abcF"), None);
    }

    #[test]
    fn test_blank_prompt_variants() {
        assert_eq!(blank_prompt(false, None), BLANK_PROMPT);
        assert!(blank_prompt(true, None).ends_with(BLANK_HINT_SUFFIX));
        assert!(blank_prompt(false, Some(4)).contains("4 个空格"));
    }

    #[test]
    fn test_chat_response_parsing() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"C"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content, "C");
    }
}
