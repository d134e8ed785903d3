use crate::errors::{Result, RigError};

/// Alpha above this value counts as opaque.
pub const OPAQUE_THRESHOLD: u8 = 10;

/// Single-channel coverage mask of an image, row-major, top-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl AlphaMask {
    /// Wraps one alpha byte per pixel.
    pub fn from_alpha(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RigError::EmptyImage);
        }
        let expected = width as usize * height as usize;
        if alpha.len() != expected {
            return Err(RigError::ImageSizeMismatch { expected, actual: alpha.len() });
        }
        Ok(Self { width, height, alpha })
    }

    /// Extracts the alpha channel of tightly packed RGBA8 pixels.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RigError::EmptyImage);
        }
        let expected = width as usize * height as usize;
        if rgba.len() != expected * 4 {
            return Err(RigError::ImageSizeMismatch { expected, actual: rgba.len() / 4 });
        }
        let alpha = rgba.chunks_exact(4).map(|px| px[3]).collect();
        Ok(Self { width, height, alpha })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.alpha
    }

    /// Alpha at `(x, y)`, zero outside the image.
    #[must_use]
    pub fn alpha(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.alpha[x as usize + y as usize * self.width as usize]
    }

    /// Opacity test with bounds checking.
    #[inline]
    #[must_use]
    pub fn has_alpha(&self, x: i32, y: i32) -> bool {
        self.alpha(x, y) > OPAQUE_THRESHOLD
    }

    /// True if any pixel of the 3×3 block centred on `(x, y)` is opaque.
    #[must_use]
    pub fn has_some_alpha_3x3(&self, x: i32, y: i32) -> bool {
        (-1..=1).any(|dy| (-1..=1).any(|dx| self.has_alpha(x + dx, y + dy)))
    }

    /// Grows every non-transparent run by one pixel, horizontally then
    /// vertically, copying the neighbour's alpha into the new pixel.
    pub fn expand_one_pixel(&mut self) {
        let w = self.width as usize;
        let h = self.height as usize;

        for y in 0..h {
            self.expand_line((0..w).map(|x| x + y * w));
        }
        for x in 0..w {
            self.expand_line((0..h).map(|y| x + y * w));
        }
    }

    fn expand_line(&mut self, mut line: impl Iterator<Item = usize>) {
        let Some(mut prev) = line.next() else {
            return;
        };
        // decisions use the values from before this pass
        let mut prev_a = self.alpha[prev];
        for curr in line {
            let curr_a = self.alpha[curr];
            if prev_a == 0 {
                if curr_a > 0 {
                    self.alpha[prev] = curr_a;
                }
            } else if curr_a == 0 {
                self.alpha[curr] = prev_a;
            }
            prev = curr;
            prev_a = curr_a;
        }
    }
}
