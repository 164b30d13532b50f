#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use frame_sentinel::messaging::{BotIdentity, Connector, Messenger};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetMe,
    Message { chat_id: String, text: String },
    Photo { chat_id: String, caption: String, bytes: usize },
}

/// In-memory messenger that records every call in order.
pub struct FakeMessenger {
    pub calls: Mutex<Vec<Call>>,
    pub fail_get_me: AtomicBool,
    pub fail_photo: AtomicBool,
    /// Number of text messages that succeed before every further one fails.
    pub messages_before_failure: AtomicUsize,
    /// When set, `send_photo` records the call and then waits for `photo_gate`.
    pub hold_photo: AtomicBool,
    pub photo_gate: Notify,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_get_me: AtomicBool::new(false),
            fail_photo: AtomicBool::new(false),
            messages_before_failure: AtomicUsize::new(usize::MAX),
            hold_photo: AtomicBool::new(false),
            photo_gate: Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Photo {
                    chat_id, caption, ..
                } => Some((chat_id, caption)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.calls.lock().unwrap().push(Call::GetMe);
        if self.fail_get_me.load(Ordering::SeqCst) {
            anyhow::bail!("getMe failed: Unauthorized");
        }
        Ok(BotIdentity {
            first_name: "Sentinel".to_string(),
            username: Some("sentinel_bot".to_string()),
        })
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Message {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        let remaining = self.messages_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            anyhow::bail!("sendMessage failed");
        }
        if remaining != usize::MAX {
            self.messages_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn send_photo(&self, chat_id: &str, photo: &[u8], caption: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Photo {
            chat_id: chat_id.to_string(),
            caption: caption.to_string(),
            bytes: photo.len(),
        });
        if self.hold_photo.load(Ordering::SeqCst) {
            self.photo_gate.notified().await;
        }
        if self.fail_photo.load(Ordering::SeqCst) {
            anyhow::bail!("sendPhoto failed: file too large");
        }
        Ok(())
    }
}

/// Connector handing out the same fake messenger and counting constructions.
pub struct FakeConnector {
    pub messenger: Arc<FakeMessenger>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
}

impl FakeConnector {
    pub fn new(messenger: Arc<FakeMessenger>) -> Arc<Self> {
        Arc::new(Self {
            messenger,
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _token: &str) -> Result<Arc<dyn Messenger>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            anyhow::bail!("cannot construct bot");
        }
        let messenger: Arc<dyn Messenger> = self.messenger.clone();
        Ok(messenger)
    }
}

/// A small gradient PNG.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 8 % 256) as u8, (y * 8 % 256) as u8, 128])
    });
    encode_png(img)
}

/// A PNG filled with one color.
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    encode_png(image::RgbImage::from_pixel(width, height, image::Rgb(color)))
}

fn encode_png(img: image::RgbImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .expect("encode test PNG");
    buffer
}

pub fn data_url(png: &[u8]) -> String {
    use base64::Engine as _;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

pub fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
