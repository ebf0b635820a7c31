use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use prospector_types::{ProspectorError, Result, Verdict};

use crate::MatchJudge;

const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com";
const DEFAULT_MODEL: &str = "doubao-seed-1-6-lite-251015";
const REQUEST_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// ArkJudge
// ---------------------------------------------------------------------------

/// Judge adapter for an OpenAI-compatible chat-completions endpoint
/// (Volcengine Ark by default).
#[derive(Debug)]
pub struct ArkJudge {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl ArkJudge {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
        }
    }

    pub fn from_env() -> Result<Self> {
        let key = std::env::var("ARK_API_KEY")
            .map_err(|_| ProspectorError::JudgeAuth("ARK_API_KEY not set".into()))?;
        Ok(Self::new(key))
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    fn build_prompt(profile_text: &str, brief: &str) -> String {
        format!(
            "你是一个专业的招聘/访谈助手。你的任务是判断一份简历是否符合访谈提纲的要求。\n\n\
             【访谈提纲】:\n{brief}\n\n\
             【候选人简历】:\n{profile_text}\n\n\
             【你的任务】:\n\
             请仔细阅读提纲和简历，判断该候选人是否符合提纲中的核心要求。\n\n\
             请只回答 \"YES\" 或 \"NO\"。"
        )
    }

    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "max_completion_tokens": 65_535,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                }
            ],
            "reasoning_effort": "medium",
        })
    }

    fn parse_verdict(body: &serde_json::Value) -> Result<Verdict> {
        if let Some(err) = body.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown service error");
            return Err(ProspectorError::JudgeMalformed(message.to_string()));
        }

        let answer = body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default();

        if answer.is_empty() {
            return Err(ProspectorError::JudgeMalformed(
                "response carried no answer text".into(),
            ));
        }

        if answer.contains("YES") {
            Ok(Verdict::Match)
        } else {
            Ok(Verdict::NoMatch)
        }
    }
}

#[async_trait]
impl MatchJudge for ArkJudge {
    async fn judge(&self, profile_text: &str, brief: &str) -> Result<Verdict> {
        let prompt = Self::build_prompt(profile_text, brief);
        let body = self.build_request_body(&prompt);

        let response = self
            .client
            .post(format!("{}/api/v3/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProspectorError::JudgeTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    ProspectorError::JudgeTransport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProspectorError::JudgeStatus {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProspectorError::JudgeMalformed(e.to_string()))?;

        let verdict = Self::parse_verdict(&parsed)?;
        tracing::info!(verdict = ?verdict, "judge verdict");
        Ok(verdict)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_brief_and_profile() {
        let prompt = ArkJudge::build_prompt("简历正文", "提纲要求");
        assert!(prompt.contains("提纲要求"));
        assert!(prompt.contains("简历正文"));
        assert!(prompt.contains("YES"));
        assert!(prompt.contains("NO"));
    }

    #[test]
    fn request_body_shape() {
        let judge = ArkJudge::new("key".into()).with_model("test-model".into());
        let body = judge.build_request_body("hello");

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_completion_tokens"], 65_535);
    }

    #[test]
    fn parse_verdict_affirmative_token_matches() {
        let body = json!({
            "choices": [{"message": {"content": "YES"}}]
        });
        assert_eq!(ArkJudge::parse_verdict(&body).unwrap(), Verdict::Match);

        // Token embedded in prose still counts, case-insensitively.
        let body = json!({
            "choices": [{"message": {"content": "  yes, 符合要求 "}}]
        });
        assert_eq!(ArkJudge::parse_verdict(&body).unwrap(), Verdict::Match);
    }

    #[test]
    fn parse_verdict_anything_else_is_no_match() {
        let body = json!({
            "choices": [{"message": {"content": "NO"}}]
        });
        assert_eq!(ArkJudge::parse_verdict(&body).unwrap(), Verdict::NoMatch);

        let body = json!({
            "choices": [{"message": {"content": "无法判断"}}]
        });
        assert_eq!(ArkJudge::parse_verdict(&body).unwrap(), Verdict::NoMatch);
    }

    #[test]
    fn parse_verdict_empty_answer_is_error() {
        let body = json!({"choices": [{"message": {"content": ""}}]});
        let err = ArkJudge::parse_verdict(&body).unwrap_err();
        assert!(matches!(err, ProspectorError::JudgeMalformed(_)));

        let body = json!({"choices": []});
        assert!(ArkJudge::parse_verdict(&body).is_err());
    }

    #[test]
    fn parse_verdict_service_error_field() {
        let body = json!({"error": {"message": "quota exceeded"}});
        let err = ArkJudge::parse_verdict(&body).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn from_env_without_key_is_auth_error() {
        std::env::remove_var("ARK_API_KEY");
        let err = ArkJudge::from_env().unwrap_err();
        assert!(matches!(err, ProspectorError::JudgeAuth(_)));
    }
}
