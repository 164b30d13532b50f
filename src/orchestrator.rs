use log::{debug, info};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::classifier::{self, Category};
use crate::dispatcher::{Alert, Dispatcher};
use crate::error::{SentinelError, ValidationError};
use crate::frame;
use crate::vision::VisionClient;

/// Result of one analysis: the model's text and the alert tasks it spawned.
///
/// The tasks are detached; dropping the handles does not cancel them.
pub struct Analysis {
    pub response: String,
    pub dispatches: Vec<(Category, JoinHandle<()>)>,
}

/// Single entry point sequencing codec, vision call, classifier and alerts.
pub struct Orchestrator {
    vision: VisionClient,
    dispatcher: Arc<Dispatcher>,
    default_api_key: Option<String>,
}

impl Orchestrator {
    pub fn new(
        vision: VisionClient,
        dispatcher: Arc<Dispatcher>,
        default_api_key: Option<String>,
    ) -> Self {
        Self {
            vision,
            dispatcher,
            default_api_key,
        }
    }

    /// Analyze a frame and return the model's answer.
    pub async fn handle(
        &self,
        image: Option<&str>,
        prompt: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<String, SentinelError> {
        Ok(self.analyze(image, prompt, api_key).await?.response)
    }

    /// Like [`Orchestrator::handle`], but also hands back the spawned alert tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The image or prompt is missing, or no credential is available
    /// - The image payload is not valid base64 or not a decodable image
    /// - The vision service call fails
    pub async fn analyze(
        &self,
        image: Option<&str>,
        prompt: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Analysis, SentinelError> {
        let image = image
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| missing("image"))?;
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| missing("prompt"))?;
        let api_key = self.resolve_api_key(api_key)?;

        let bytes = frame::decode_base64(image)?;
        let encoded = frame::prepare(&bytes)?;
        debug!(
            "Prepared frame: {} bytes raw, {} bytes JPEG",
            bytes.len(),
            encoded.jpeg.len()
        );

        let response = self.vision.analyze(&encoded.base64, prompt, api_key).await?;

        let mut dispatches = Vec::new();
        for category in classifier::triggered_categories(prompt) {
            let verdict = classifier::classify(category, prompt, &response);
            if !verdict.fires {
                continue;
            }

            info!(
                "Detected {} event{}",
                category,
                verdict
                    .severity
                    .map(|s| format!(" ({})", s))
                    .unwrap_or_default()
            );

            let alert = Alert {
                category,
                frame: encoded.jpeg.clone(),
                analysis: response.clone(),
                severity: verdict.severity,
            };
            let dispatcher = self.dispatcher.clone();
            let handle = tokio::spawn(async move { dispatcher.dispatch(alert).await });
            dispatches.push((category, handle));
        }

        Ok(Analysis {
            response,
            dispatches,
        })
    }

    fn resolve_api_key<'a>(&'a self, api_key: Option<&'a str>) -> Result<&'a str, SentinelError> {
        api_key
            .filter(|k| !k.trim().is_empty())
            .or(self.default_api_key.as_deref())
            .ok_or_else(|| ValidationError::MissingApiKey.into())
    }
}

fn missing(field: &str) -> SentinelError {
    ValidationError::MissingField {
        field: field.to_string(),
    }
    .into()
}
