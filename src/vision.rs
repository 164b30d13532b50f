use log::{debug, info, warn};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::Config;
use crate::error::VisionError;

const SYSTEM_PROMPT: &str = "You are a precise visual analyst. Describe exactly what is visible \
in the provided video frame, state clearly whether the requested objects or gestures are present, \
and do not speculate beyond what the image shows.";

/// Client for the vision-capable chat completions service.
///
/// Each call sends one system message and one user message carrying the
/// prompt plus the frame as a `data:` URL. Rate-limit responses are retried
/// after the wait the service asks for, within a bounded retry budget; every
/// other failure is returned immediately.
#[derive(Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    api_url: String,
    model: String,
    max_tokens: u32,
    timeout_seconds: u64,
    max_retries: u32,
    max_wait_seconds: u64,
}

impl VisionClient {
    /// Create a new VisionClient.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Chat completions endpoint
    /// * `model` - Model identifier
    /// * `max_tokens` - Response-size budget per call
    /// * `timeout_seconds` - Per-attempt request timeout
    pub fn new(api_url: String, model: String, max_tokens: u32, timeout_seconds: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            model,
            max_tokens,
            timeout_seconds,
            max_retries: 5,
            max_wait_seconds: 300,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.vision_api_url.clone(),
            config.vision_model.clone(),
            config.vision_max_tokens,
            config.vision_timeout_seconds,
        )
        .with_rate_limit_budget(
            config.rate_limit_max_retries,
            config.rate_limit_max_wait_seconds,
        )
    }

    /// Bound the rate-limit loop by retry count and by total sleep time.
    pub fn with_rate_limit_budget(mut self, max_retries: u32, max_wait_seconds: u64) -> Self {
        self.max_retries = max_retries;
        self.max_wait_seconds = max_wait_seconds;
        self
    }

    /// Build the request body for one analysis.
    pub fn compose_payload(&self, image_base64: &str, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": prompt
                        },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/jpeg;base64,{}", image_base64)
                            }
                        }
                    ]
                }
            ],
            "max_tokens": self.max_tokens
        })
    }

    /// Analyze a base64 JPEG frame with the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails at the network level or times out
    /// - The service answers with a non rate-limit error status
    /// - A rate-limit message carries no parseable wait, or the retry budget runs out
    /// - The body is not the expected JSON, or carries an `error` object
    pub async fn analyze(
        &self,
        image_base64: &str,
        prompt: &str,
        api_key: &str,
    ) -> Result<String, VisionError> {
        let payload = self.compose_payload(image_base64, prompt);
        let mut retries = 0u32;
        let mut waited_seconds = 0u64;

        loop {
            let response = self
                .client
                .post(&self.api_url)
                .bearer_auth(api_key)
                .json(&payload)
                .timeout(Duration::from_secs(self.timeout_seconds))
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            let body = response.text().await.map_err(|e| self.transport_error(e))?;

            if status == StatusCode::TOO_MANY_REQUESTS {
                let message = error_message(&body);
                let wait_seconds = parse_wait_time(&message).ok_or_else(|| {
                    VisionError::RateLimitUnparseable {
                        message: message.clone(),
                    }
                })?;

                if retries >= self.max_retries
                    || waited_seconds + wait_seconds > self.max_wait_seconds
                {
                    return Err(VisionError::RateLimitExhausted {
                        attempts: retries,
                        waited_seconds,
                    });
                }

                retries += 1;
                waited_seconds += wait_seconds;
                warn!(
                    "Rate limit exceeded. Waiting for {} seconds (retry {}/{}).",
                    wait_seconds, retries, self.max_retries
                );
                tokio::time::sleep(Duration::from_secs(wait_seconds)).await;
                continue;
            }

            if !status.is_success() {
                return Err(VisionError::Upstream {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }

            let text = parse_completion(&body)?;
            if retries > 0 {
                info!("Vision request succeeded after {} rate-limit retries", retries);
            }
            debug!("Vision response: {} characters", text.len());
            return Ok(text);
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> VisionError {
        if err.is_timeout() {
            VisionError::Timeout {
                timeout_seconds: self.timeout_seconds,
            }
        } else {
            VisionError::from(err)
        }
    }
}

/// Pull the analysis text out of a completion body.
pub fn parse_completion(body: &str) -> Result<String, VisionError> {
    let value: Value = serde_json::from_str(body).map_err(|e| VisionError::Parse {
        reason: e.to_string(),
    })?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(VisionError::Service { message });
    }

    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| VisionError::Parse {
            reason: "response has no choices[0].message.content".to_string(),
        })
}

/// The `error.message` of a JSON error body, or the raw body otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse the wait a rate-limit message asks for, in whole seconds.
///
/// Recognizes `try again in [<m>m][<s>[.<f>]s]`. Fractional seconds are
/// truncated. Returns `None` when there is no such phrase, when the wait is
/// given in milliseconds, when the total truncates to zero, or when it does
/// not fit in a `u64`.
pub fn parse_wait_time(message: &str) -> Option<u64> {
    const MARKER: &str = "try again in ";

    let lower = message.to_lowercase();
    let start = lower.find(MARKER)? + MARKER.len();
    let mut rest = &lower[start..];
    let mut total = 0u64;

    let (digits, after) = take_digits(rest);
    if !digits.is_empty() && after.starts_with('m') && !after.starts_with("ms") {
        total = digits.parse::<u64>().ok()?.checked_mul(60)?;
        rest = &after[1..];
    }

    let (whole, after) = take_digits(rest);
    if !whole.is_empty() {
        let after = match after.strip_prefix('.') {
            Some(fraction) => take_digits(fraction).1,
            None => after,
        };
        if after.starts_with('s') {
            total = total.checked_add(whole.parse::<u64>().ok()?)?;
        }
    }

    (total > 0).then_some(total)
}

fn take_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}
