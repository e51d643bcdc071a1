#![warn(missing_docs)]
//! # proctor-watch-encode
//!
//! ## Purpose
//! Turns sampled camera frames into self-contained JPEG data URLs.
//!
//! ## Responsibilities
//! - Rasterize the current frame into a reusable surface sized to the source.
//! - Encode the surface as JPEG at a `0.0..=1.0` quality.
//! - Build and parse `data:image/jpeg;base64,...` URLs.
//!
//! ## Data flow
//! [`Frame`] -> [`Canvas::draw_frame`] -> [`Canvas::encode_jpeg`] ->
//! [`EncodedFrame`] -> [`frame_payload`] -> `video_frame` event.
//!
//! ## Ownership and lifetimes
//! The canvas owns one pixel buffer reused across ticks; encoded output owns
//! its bytes so it can be dropped right after sending.
//!
//! ## Error model
//! Invalid quality, empty surfaces, and encoder failures return
//! [`EncodeError`].

use base64::Engine as _;
use proctor_watch_core::{EncodedFrame, Frame, ImageEncoding, VideoFramePayload};
use thiserror::Error;

/// Drawing surface matching the camera's native dimensions.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Canvas {
    /// Creates an empty 0x0 canvas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resizes the surface, clearing its contents when the size changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }

        self.width = width;
        self.height = height;
        self.rgba.clear();
        self.rgba.resize((width as usize) * (height as usize) * 4, 0);
    }

    /// Draws `frame` over the whole surface.
    ///
    /// Frames whose geometry differs from the surface are scaled to fit.
    ///
    /// # Errors
    /// Returns [`EncodeError::EmptySurface`] when the canvas has zero area and
    /// [`EncodeError::InvalidFrame`] when the frame buffer is inconsistent.
    pub fn draw_frame(&mut self, frame: &Frame) -> Result<(), EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::EmptySurface);
        }

        if frame.width == self.width && frame.height == self.height {
            if frame.rgba.len() != self.rgba.len() {
                return Err(EncodeError::InvalidFrame);
            }
            self.rgba.copy_from_slice(&frame.rgba);
            return Ok(());
        }

        let source = image::RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
            .ok_or(EncodeError::InvalidFrame)?;
        let scaled = image::imageops::resize(
            &source,
            self.width,
            self.height,
            image::imageops::FilterType::Triangle,
        );
        self.rgba.copy_from_slice(scaled.as_raw());
        Ok(())
    }

    /// Surface width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Surface height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA contents.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Encodes the current surface as JPEG.
    ///
    /// # Errors
    /// Returns [`EncodeError::InvalidQuality`] for quality outside `[0, 1]`,
    /// [`EncodeError::EmptySurface`] for a zero-area canvas, and
    /// [`EncodeError::Jpeg`] when the encoder fails.
    pub fn encode_jpeg(
        &self,
        quality: f32,
        captured_at_ms: u64,
    ) -> Result<EncodedFrame, EncodeError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::EmptySurface);
        }

        let bytes = encode_rgba_jpeg(&self.rgba, self.width, self.height, quality)?;
        Ok(EncodedFrame {
            bytes,
            encoding: ImageEncoding::Jpeg,
            quality,
            width: self.width,
            height: self.height,
            captured_at_ms,
        })
    }
}

/// Maps a `0.0..=1.0` quality to the JPEG `1..=100` scale.
///
/// # Errors
/// Returns [`EncodeError::InvalidQuality`] for values outside `[0, 1]` or NaN.
pub fn jpeg_quality_percent(quality: f32) -> Result<u8, EncodeError> {
    if !(0.0..=1.0).contains(&quality) {
        return Err(EncodeError::InvalidQuality(quality));
    }

    Ok(((quality * 100.0).round() as u8).max(1))
}

/// Encodes an RGBA buffer as baseline JPEG.
///
/// # Errors
/// Returns [`EncodeError`] for invalid quality, inconsistent buffers, or
/// encoder failures.
pub fn encode_rgba_jpeg(
    rgba: &[u8],
    width: u32,
    height: u32,
    quality: f32,
) -> Result<Vec<u8>, EncodeError> {
    let percent = jpeg_quality_percent(quality)?;
    if rgba.len() != (width as usize) * (height as usize) * 4 {
        return Err(EncodeError::InvalidFrame);
    }

    let rgb = rgba_to_rgb(rgba);
    let mut jpeg_bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, percent)
        .encode(&rgb, width, height, image::ColorType::Rgb8.into())
        .map_err(|error| EncodeError::Jpeg(error.to_string()))?;

    Ok(jpeg_bytes)
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((rgba.len() / 4) * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

/// Builds a base64 data URL for an encoded frame.
pub fn to_data_url(frame: &EncodedFrame) -> String {
    format!(
        "data:{};base64,{}",
        frame.encoding.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(&frame.bytes)
    )
}

/// Wraps an encoded frame into the `video_frame` payload.
pub fn frame_payload(frame: &EncodedFrame) -> VideoFramePayload {
    VideoFramePayload {
        image: to_data_url(frame),
    }
}

/// Decoded contents of a base64 data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Declared MIME type.
    pub mime_type: String,
    /// Decoded payload bytes.
    pub bytes: Vec<u8>,
}

/// Parses a `data:<mime>;base64,<payload>` URL.
///
/// # Errors
/// Returns [`EncodeError::InvalidDataUrl`] when the header is malformed and
/// [`EncodeError::Base64`] when the payload does not decode.
pub fn parse_data_url(raw: &str) -> Result<DataUrl, EncodeError> {
    let rest = raw
        .strip_prefix("data:")
        .ok_or_else(|| EncodeError::InvalidDataUrl("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| EncodeError::InvalidDataUrl("missing payload separator".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| EncodeError::InvalidDataUrl("payload is not base64".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|error| EncodeError::Base64(error.to_string()))?;

    Ok(DataUrl {
        mime_type: mime_type.to_string(),
        bytes,
    })
}

/// Error type for frame rasterization and encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Quality outside the `0.0..=1.0` scale.
    #[error("invalid jpeg quality {0}: expected 0.0..=1.0")]
    InvalidQuality(f32),
    /// Canvas has zero width or height.
    #[error("canvas surface is empty")]
    EmptySurface,
    /// Frame buffer does not match its declared geometry.
    #[error("frame buffer does not match its geometry")]
    InvalidFrame,
    /// JPEG encoder failure.
    #[error("jpeg encoding failed: {0}")]
    Jpeg(String),
    /// Data URL header is malformed.
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    /// Data URL payload is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for quality mapping and surface handling.

    use super::*;

    #[test]
    fn maps_half_quality_to_fifty() {
        assert_eq!(jpeg_quality_percent(0.5).expect("valid quality"), 50);
        assert_eq!(jpeg_quality_percent(0.0).expect("valid quality"), 1);
        assert!(jpeg_quality_percent(1.5).is_err());
        assert!(jpeg_quality_percent(f32::NAN).is_err());
    }

    #[test]
    fn empty_canvas_refuses_to_encode() {
        let canvas = Canvas::new();
        assert!(matches!(
            canvas.encode_jpeg(0.5, 0),
            Err(EncodeError::EmptySurface)
        ));
    }

    #[test]
    fn draw_scales_mismatched_frames() {
        let mut canvas = Canvas::new();
        canvas.resize(4, 4);
        let frame = Frame::new(2, 2, 0, vec![200; 16]).expect("frame should be valid");
        canvas.draw_frame(&frame).expect("draw should work");
        assert_eq!(canvas.rgba().len(), 64);
        assert!(canvas.rgba().iter().all(|byte| *byte == 200));
    }
}
