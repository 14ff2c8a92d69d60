//! Decoded video frames handed from a frame source to a detector.
//!
//! A `Frame` owns its RGB24 pixels and is dropped as soon as the detector has
//! run; nothing downstream of detection ever sees pixel data.

/// One decoded frame, RGB24, row-major, no padding.
#[derive(Debug)]
pub struct Frame {
    /// 0-based ordinal of the frame in the source.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            pixels,
        }
    }

    /// Read-only pixel access for detectors.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Expected byte length of an RGB24 frame of this size.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(3))
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}
