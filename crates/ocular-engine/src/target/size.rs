use std::fmt;

use super::TargetError;

/// Framebuffer dimensions in physical pixels (width x height).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered.
    #[inline]
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub(crate) fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Checks that the size is usable for a framebuffer on a device with `max_dim`.
    pub(crate) fn validate(self, max_dim: u32) -> Result<(), TargetError> {
        if self.is_empty() {
            return Err(TargetError::contract(format!("framebuffer size {self} has a zero axis")));
        }
        if self.width > max_dim || self.height > max_dim {
            return Err(TargetError::Resource(format!(
                "framebuffer size {self} exceeds the device limit of {max_dim}"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}
