//! Frame Sentinel - vision-model frame analysis with chat alerts.
//!
//! This library accepts a still video frame plus a prompt, asks a
//! vision-capable language model to describe it, scans the description for a
//! peace-sign gesture or a weapon, and relays detections to a messaging
//! channel in the background.
//!
//! # Core Components
//!
//! * [`config`] - Environment configuration and constants
//! * [`frame`] - Decode, normalize and re-encode inbound frames
//! * [`vision`] - Vision service client with rate-limit retries
//! * [`classifier`] - Keyword rules for gesture and weapon events
//! * [`messaging`] - Telegram Bot API transport
//! * [`dispatcher`] - Per-channel sessions, photo alerts and text fallback
//! * [`orchestrator`] - Request entry point wiring the above together
//! * [`routes`] - HTTP JSON surface
//! * [`error`] - Error types and handling
//!
//! # Quick Start
//!
//! ```no_run
//! use frame_sentinel::*;
//! use std::sync::Arc;
//!
//! let config = Config::load()?;
//! let connector = Arc::new(messaging::TelegramConnector::new(config.telegram_api_url.clone()));
//! let dispatcher = Arc::new(Dispatcher::from_config(&config, connector));
//! let orchestrator = Orchestrator::new(
//!     VisionClient::from_config(&config),
//!     dispatcher,
//!     config.default_api_key.clone(),
//! );
//! # Ok::<(), error::ConfigError>(())
//! ```

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod messaging;
pub mod orchestrator;
pub mod routes;
pub mod vision;

// Re-export commonly used types for convenience
pub use classifier::{Category, Classification, Severity};
pub use config::Config;
pub use dispatcher::{Alert, Delivery, Dispatcher};
pub use error::SentinelError;
pub use orchestrator::Orchestrator;
pub use vision::VisionClient;
