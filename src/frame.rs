use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

use crate::config::constants;
use crate::error::{CodecError, ValidationError};

/// Byte order of the three color channels in a [`Bitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Bgr,
    Rgb,
}

/// A decoded three-channel, eight-bit frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    order: ChannelOrder,
    pixels: Vec<u8>,
}

/// A frame ready for transport: the compressed JPEG and its base64 text.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub jpeg: Vec<u8>,
    pub base64: String,
}

impl Bitmap {
    /// Wrap raw interleaved pixel data.
    ///
    /// Returns `None` when the buffer does not hold exactly
    /// `width * height * 3` bytes.
    pub fn from_raw(width: u32, height: u32, order: ChannelOrder, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            order,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Decode an inbound image container into a bitmap.
///
/// The `image` crate always yields RGB-ordered samples, so decoded frames are
/// tagged [`ChannelOrder::Rgb`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a recognizable image
/// or the image has no pixel data.
pub fn decode(bytes: &[u8]) -> Result<Bitmap, CodecError> {
    let dynamic_image = image::load_from_memory(bytes).map_err(|e| CodecError::Decode {
        reason: e.to_string(),
    })?;

    let rgb = dynamic_image.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(CodecError::Decode {
            reason: "image contains no pixel data".to_string(),
        });
    }

    let (width, height) = rgb.dimensions();
    Ok(Bitmap {
        width,
        height,
        order: ChannelOrder::Rgb,
        pixels: rgb.into_raw(),
    })
}

/// Convert a bitmap to RGB channel order. No other transformation is applied.
pub fn normalize(bitmap: Bitmap) -> Bitmap {
    match bitmap.order {
        ChannelOrder::Rgb => bitmap,
        ChannelOrder::Bgr => {
            let mut pixels = bitmap.pixels;
            for px in pixels.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Bitmap {
                width: bitmap.width,
                height: bitmap.height,
                order: ChannelOrder::Rgb,
                pixels,
            }
        }
    }
}

/// Compress a bitmap to JPEG at the fixed quality level and base64 it.
///
/// BGR bitmaps are normalized first so the JPEG always carries RGB data.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if compression fails.
pub fn encode(bitmap: &Bitmap) -> Result<EncodedFrame, CodecError> {
    let normalized;
    let bitmap = if bitmap.order == ChannelOrder::Rgb {
        bitmap
    } else {
        normalized = normalize(bitmap.clone());
        &normalized
    };

    let mut jpeg = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, constants::JPEG_QUALITY);
        encoder
            .encode(&bitmap.pixels, bitmap.width, bitmap.height, ColorType::Rgb8)
            .map_err(|e| CodecError::Encode {
                reason: e.to_string(),
            })?;
    }

    let base64 = BASE64.encode(&jpeg);
    Ok(EncodedFrame { jpeg, base64 })
}

/// Run the whole pipeline on raw container bytes: decode, normalize, encode.
pub fn prepare(bytes: &[u8]) -> Result<EncodedFrame, CodecError> {
    let bitmap = normalize(decode(bytes)?);
    encode(&bitmap)
}

/// Convert a bitmap into an `image` buffer, e.g. for inspection in tests.
pub fn to_rgb_image(bitmap: &Bitmap) -> RgbImage {
    let bitmap = normalize(bitmap.clone());
    // from_raw only fails on a length mismatch, which Bitmap rules out.
    RgbImage::from_raw(bitmap.width, bitmap.height, bitmap.pixels)
        .unwrap_or_else(|| RgbImage::new(0, 0))
}

/// Strip an optional `data:<mime>;base64,` prefix.
///
/// Everything after the first comma is the payload; strings without a comma
/// are returned unchanged.
pub fn strip_data_url(image: &str) -> &str {
    match image.split_once(',') {
        Some((_, payload)) => payload,
        None => image,
    }
}

/// Decode the text form of an inbound image into container bytes.
pub fn decode_base64(image: &str) -> Result<Vec<u8>, ValidationError> {
    let payload = strip_data_url(image).trim();
    if payload.is_empty() {
        return Err(ValidationError::InvalidImageData {
            reason: "empty image payload".to_string(),
        });
    }

    BASE64
        .decode(payload)
        .map_err(|e| ValidationError::InvalidImageData {
            reason: e.to_string(),
        })
}
