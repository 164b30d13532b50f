use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::classifier::{Category, Severity};
use crate::config::{ChannelConfig, Config, constants};
use crate::error::DispatchError;
use crate::messaging::{Connector, Messenger};

/// A detection that should be relayed to its category's channel.
#[derive(Debug, Clone)]
pub struct Alert {
    pub category: Category,
    /// The frame as compressed JPEG bytes.
    pub frame: Vec<u8>,
    pub analysis: String,
    pub severity: Option<Severity>,
}

impl Alert {
    /// Short attention line naming the category and severity.
    pub fn headline(&self) -> String {
        let title = match (self.category, self.severity) {
            (Category::Gesture, _) => "✌️ Peace sign detected!",
            (Category::Weapon, Some(Severity::ToyReplica)) => "⚠️ Toy/replica weapon detected",
            (Category::Weapon, _) => "🚨 WEAPON DETECTED",
        };
        format!("{} ({})", title, chrono::Utc::now().to_rfc3339())
    }

    /// Analysis text cut to the platform caption limit.
    pub fn caption(&self) -> String {
        truncate_chars(&self.analysis, constants::CAPTION_LIMIT)
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Verified,
    Failed,
}

/// How an alert reached its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Photo,
    TextFallback,
}

/// Connectivity state for one alert destination.
pub struct ChannelSession {
    credential: String,
    destination: String,
    state: SessionState,
    retry_count: u32,
    announced: bool,
    messenger: Option<Arc<dyn Messenger>>,
}

impl ChannelSession {
    fn new(channel: &ChannelConfig) -> Self {
        Self {
            credential: channel.bot_token.clone(),
            destination: channel.chat_id.clone(),
            state: SessionState::Uninitialized,
            retry_count: 0,
            announced: false,
            messenger: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Consecutive failed initialization attempts.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn mark_failed(&mut self) {
        self.state = SessionState::Failed;
        self.messenger = None;
    }
}

/// Relays alerts to per-category messaging channels.
///
/// Sessions are created lazily on first use and reused afterwards. Channels
/// configured with the same credential and destination share one session,
/// and sessions with the same credential share one messenger. Each session is
/// behind its own async mutex, so dispatches to one channel run one at a time.
pub struct Dispatcher {
    connector: Arc<dyn Connector>,
    channels: HashMap<Category, Arc<Mutex<ChannelSession>>>,
    messengers: std::sync::Mutex<HashMap<String, Arc<dyn Messenger>>>,
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            channels: HashMap::new(),
            messengers: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Self {
        let mut dispatcher = Self::new(connector);
        if let Some(channel) = &config.gesture_channel {
            dispatcher = dispatcher.with_channel(Category::Gesture, channel);
        }
        if let Some(channel) = &config.weapon_channel {
            dispatcher = dispatcher.with_channel(Category::Weapon, channel);
        }
        dispatcher
    }

    /// Route `category` alerts to `channel`.
    pub fn with_channel(mut self, category: Category, channel: &ChannelConfig) -> Self {
        let existing = self.channels.values().find(|session| {
            session
                .try_lock()
                .map(|s| s.credential == channel.bot_token && s.destination == channel.chat_id)
                .unwrap_or(false)
        });

        let session = match existing {
            Some(session) => session.clone(),
            None => Arc::new(Mutex::new(ChannelSession::new(channel))),
        };
        self.channels.insert(category, session);
        self
    }

    pub fn has_channel(&self, category: Category) -> bool {
        self.channels.contains_key(&category)
    }

    /// Whether two categories resolve to the same session object.
    pub fn shares_session(&self, a: Category, b: Category) -> bool {
        match (self.channels.get(&a), self.channels.get(&b)) {
            (Some(x), Some(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }

    pub async fn session_state(&self, category: Category) -> Option<SessionState> {
        let session = self.channels.get(&category)?;
        Some(session.lock().await.state())
    }

    /// Deliver an alert, logging the outcome. Never fails.
    pub async fn dispatch(&self, alert: Alert) {
        let category = alert.category;
        match self.try_dispatch(alert).await {
            Ok(Delivery::Photo) => info!("Sent {} alert with photo", category),
            Ok(Delivery::TextFallback) => {
                info!("Sent {} alert as text after photo delivery failed", category)
            }
            Err(DispatchError::ChannelNotConfigured { .. }) => {
                debug!("No channel for {} alerts, skipping", category)
            }
            Err(e) => error!(target: "dispatch", "Dropped {} alert: {}", category, e),
        }
    }

    /// Deliver an alert and report how it went.
    ///
    /// Sends the headline, then the photo with the captioned analysis. If the
    /// photo fails, one text message with headline and analysis is sent
    /// instead. A session found in the failed state gets one fresh
    /// construction before the dispatch gives up.
    pub async fn try_dispatch(&self, alert: Alert) -> Result<Delivery, DispatchError> {
        let session = self
            .channels
            .get(&alert.category)
            .ok_or(DispatchError::ChannelNotConfigured {
                category: alert.category,
            })?;
        let mut session = session.lock().await;
        let messenger = self.ensure_ready(&mut session, alert.category).await?;
        let destination = session.destination.clone();

        let headline = alert.headline();
        if let Err(e) = messenger.send_message(&destination, &headline).await {
            session.mark_failed();
            return Err(DispatchError::SendFailed {
                step: "alert headline",
                reason: e.to_string(),
            });
        }

        let caption = alert.caption();
        let photo_err = match messenger
            .send_photo(&destination, &alert.frame, &caption)
            .await
        {
            Ok(()) => return Ok(Delivery::Photo),
            Err(e) => e,
        };

        warn!(
            "Failed to send {} alert photo, falling back to text: {}",
            alert.category, photo_err
        );

        let text = format!("{}\n\n{}", headline, caption);
        match messenger.send_message(&destination, &text).await {
            Ok(()) => Ok(Delivery::TextFallback),
            Err(e) => {
                session.mark_failed();
                Err(DispatchError::FallbackFailed {
                    photo_reason: photo_err.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Handshake every configured channel once, as a connectivity check.
    pub async fn verify_channels(&self) {
        let mut seen: Vec<&Arc<Mutex<ChannelSession>>> = Vec::new();
        for (category, session) in &self.channels {
            if seen.iter().any(|s| Arc::ptr_eq(s, session)) {
                continue;
            }
            seen.push(session);

            let mut session = session.lock().await;
            if let Err(e) = self.ensure_ready(&mut session, *category).await {
                error!(target: "dispatch", "Channel check for {} failed: {}", category, e);
            }
        }
    }

    async fn ensure_ready(
        &self,
        session: &mut ChannelSession,
        category: Category,
    ) -> Result<Arc<dyn Messenger>, DispatchError> {
        if session.state == SessionState::Verified {
            if let Some(messenger) = &session.messenger {
                return Ok(messenger.clone());
            }
        }

        let fresh = session.state == SessionState::Failed;
        if fresh {
            info!(
                "Re-initializing messaging session for {} (attempt {})",
                category,
                session.retry_count + 1
            );
        }

        let messenger = match self.messenger_for(&session.credential, fresh) {
            Ok(messenger) => messenger,
            Err(e) => {
                session.mark_failed();
                session.retry_count += 1;
                return Err(DispatchError::Handshake {
                    reason: e.to_string(),
                });
            }
        };

        match messenger.get_me().await {
            Ok(identity) => {
                info!(
                    "Messaging session verified as {} (@{})",
                    identity.first_name,
                    identity.username.as_deref().unwrap_or("unknown")
                );
                session.state = SessionState::Verified;
                session.retry_count = 0;
                session.messenger = Some(messenger.clone());
            }
            Err(e) => {
                session.mark_failed();
                session.retry_count += 1;
                self.forget_messenger(&session.credential);
                return Err(DispatchError::Handshake {
                    reason: e.to_string(),
                });
            }
        }

        if !session.announced {
            let text = format!("🟢 Frame Sentinel online, watching for {} alerts", category);
            match messenger.send_message(&session.destination, &text).await {
                Ok(()) => session.announced = true,
                Err(e) => warn!("Failed to send online message for {}: {}", category, e),
            }
        }

        Ok(messenger)
    }

    /// Shared messenger for a credential; `fresh` forces a new construction.
    fn messenger_for(&self, credential: &str, fresh: bool) -> anyhow::Result<Arc<dyn Messenger>> {
        let mut messengers = self
            .messengers
            .lock()
            .map_err(|_| anyhow::anyhow!("messenger cache poisoned"))?;

        if !fresh {
            if let Some(messenger) = messengers.get(credential) {
                return Ok(messenger.clone());
            }
        }

        let messenger = self.connector.connect(credential)?;
        messengers.insert(credential.to_string(), messenger.clone());
        Ok(messenger)
    }

    fn forget_messenger(&self, credential: &str) {
        if let Ok(mut messengers) = self.messengers.lock() {
            messengers.remove(credential);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_is_cut_at_limit() {
        let alert = Alert {
            category: Category::Weapon,
            frame: Vec::new(),
            analysis: "é".repeat(constants::CAPTION_LIMIT + 50),
            severity: Some(Severity::Genuine),
        };
        assert_eq!(alert.caption().chars().count(), constants::CAPTION_LIMIT);
    }

    #[test]
    fn headline_carries_rfc3339_timestamp() {
        let alert = Alert {
            category: Category::Gesture,
            frame: Vec::new(),
            analysis: String::new(),
            severity: None,
        };
        let headline = alert.headline();
        let stamp = headline
            .rsplit_once(" (")
            .and_then(|(_, rest)| rest.strip_suffix(')'))
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn headline_names_severity() {
        let toy = Alert {
            category: Category::Weapon,
            frame: Vec::new(),
            analysis: String::new(),
            severity: Some(Severity::ToyReplica),
        };
        assert!(toy.headline().starts_with("⚠️ Toy/replica"));

        let gesture = Alert {
            category: Category::Gesture,
            severity: None,
            ..toy
        };
        assert!(gesture.headline().starts_with("✌️"));
    }
}
