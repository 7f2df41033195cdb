//! Host pixel formats and the caller-owned image view reads are written into.

use super::{Size, TargetError};

/// Pixel layout of an [`ImageViewMut`].
///
/// Each read operation accepts only the formats its channel can be expressed in;
/// anything else is rejected before any memory is touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    Rgba8Uint,
    R16Uint,
    R32Uint,
    R32Int,
    R32Float,
    Rg32Float,
    Rgba32Float,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R16Uint => 2,
            Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Rgba8Uint => 4,
            Self::R32Uint | Self::R32Int | Self::R32Float => 4,
            Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    pub const fn channel_count(self) -> usize {
        match self {
            Self::R16Uint | Self::R32Uint | Self::R32Int | Self::R32Float => 1,
            Self::Rg32Float => 2,
            Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Rgba8Uint | Self::Rgba32Float => 4,
        }
    }

    /// Formats the color attachment's bytes can be copied into verbatim.
    pub const fn is_rgba8(self) -> bool {
        matches!(self, Self::Rgba8Unorm | Self::Rgba8Srgb | Self::Rgba8Uint)
    }

    /// Single-channel integer formats whose range covers a 16-bit id.
    pub const fn holds_id(self) -> bool {
        matches!(self, Self::R16Uint | Self::R32Uint | Self::R32Int)
    }
}

/// Mutable, caller-owned image memory of exactly `size` pixels in `format`.
///
/// Rows are tightly packed, top row first.
#[derive(Debug)]
pub struct ImageViewMut<'a> {
    format: PixelFormat,
    size: Size,
    data: &'a mut [u8],
}

impl<'a> ImageViewMut<'a> {
    /// Wraps `data`, which must hold exactly `size.area() * format.bytes_per_pixel()` bytes.
    pub fn new(format: PixelFormat, size: Size, data: &'a mut [u8]) -> Result<Self, TargetError> {
        let expected = size.area() * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(TargetError::contract(format!(
                "{format:?} view of {size} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { format, size, data })
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data
    }

    pub(crate) fn expect_size(&self, size: Size) -> Result<(), TargetError> {
        if self.size != size {
            return Err(TargetError::contract(format!(
                "view is {} but the framebuffer is {size}",
                self.size
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_rgba(view: &ImageViewMut<'_>) -> Result<(), TargetError> {
    if !view.format.is_rgba8() {
        return Err(TargetError::contract(format!(
            "rgba read needs a four-channel 8-bit view, got {:?}",
            view.format
        )));
    }
    Ok(())
}

pub(crate) fn check_depth(view: &ImageViewMut<'_>) -> Result<(), TargetError> {
    if view.format != PixelFormat::R32Float {
        return Err(TargetError::contract(format!(
            "depth read needs an R32Float view, got {:?}",
            view.format
        )));
    }
    Ok(())
}

pub(crate) fn check_ids(view: &ImageViewMut<'_>) -> Result<(), TargetError> {
    if !view.format.holds_id() {
        return Err(TargetError::contract(format!(
            "id read needs an R16Uint, R32Uint or R32Int view, got {:?}",
            view.format
        )));
    }
    Ok(())
}

/// Copies RGBA8 texels verbatim.
pub(crate) fn write_rgba(src: &[u8], view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
    check_rgba(view)?;
    view.data.copy_from_slice(src);
    Ok(())
}

/// Copies linear depth values.
pub(crate) fn write_depth(src: &[f32], view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
    check_depth(view)?;
    view.data.copy_from_slice(bytemuck::cast_slice(src));
    Ok(())
}

/// Writes ids in the view's integer format.
///
/// An id that does not fit the view's range is rejected rather than truncated.
pub(crate) fn write_ids(src: &[u32], view: &mut ImageViewMut<'_>) -> Result<(), TargetError> {
    check_ids(view)?;
    let max = src.iter().copied().max().unwrap_or(0);
    let limit = match view.format {
        PixelFormat::R16Uint => u16::MAX as u32,
        PixelFormat::R32Int => i32::MAX as u32,
        _ => u32::MAX,
    };
    if max > limit {
        return Err(TargetError::contract(format!(
            "id {max} does not fit a {:?} view",
            view.format
        )));
    }

    match view.format {
        PixelFormat::R32Uint => view.data.copy_from_slice(bytemuck::cast_slice(src)),
        PixelFormat::R32Int => {
            for (dst, &id) in view.data.chunks_exact_mut(4).zip(src) {
                dst.copy_from_slice(&(id as i32).to_ne_bytes());
            }
        }
        PixelFormat::R16Uint => {
            for (dst, &id) in view.data.chunks_exact_mut(2).zip(src) {
                dst.copy_from_slice(&(id as u16).to_ne_bytes());
            }
        }
        _ => unreachable!("check_ids admits integer formats only"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: Size = Size::new(2, 2);

    #[test]
    fn view_requires_exact_byte_length() {
        let mut short = vec![0u8; 15];
        assert!(matches!(
            ImageViewMut::new(PixelFormat::Rgba8Unorm, SIZE, &mut short),
            Err(TargetError::Contract(_))
        ));

        let mut exact = vec![0u8; 16];
        assert!(ImageViewMut::new(PixelFormat::Rgba8Unorm, SIZE, &mut exact).is_ok());
    }

    #[test]
    fn view_size_mismatch_is_rejected() {
        let mut buf = vec![0u8; 16];
        let view = ImageViewMut::new(PixelFormat::R32Float, SIZE, &mut buf).unwrap();
        assert!(view.expect_size(Size::new(4, 1)).is_err());
        assert!(view.expect_size(SIZE).is_ok());
    }

    #[test]
    fn rgba_bytes_are_copied_verbatim() {
        let src: Vec<u8> = (0..16).collect();
        let mut buf = vec![0u8; 16];
        let mut view = ImageViewMut::new(PixelFormat::Rgba8Srgb, SIZE, &mut buf).unwrap();
        write_rgba(&src, &mut view).unwrap();
        assert_eq!(buf, src);
    }

    #[test]
    fn depth_rejects_multi_channel_views() {
        let mut buf = vec![0u8; 4 * 16];
        let mut view = ImageViewMut::new(PixelFormat::Rgba32Float, SIZE, &mut buf).unwrap();
        assert!(matches!(write_depth(&[1.0; 4], &mut view), Err(TargetError::Contract(_))));
        // Untouched on rejection.
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn depth_rejects_integer_views() {
        let mut buf = vec![0u8; 16];
        let mut view = ImageViewMut::new(PixelFormat::R32Uint, SIZE, &mut buf).unwrap();
        assert!(write_depth(&[0.5; 4], &mut view).is_err());
    }

    #[test]
    fn ids_widen_into_r32() {
        let ids = [0u32, 7, 65_535, 1];
        let mut buf = vec![0u8; 16];
        let mut view = ImageViewMut::new(PixelFormat::R32Uint, SIZE, &mut buf).unwrap();
        write_ids(&ids, &mut view).unwrap();
        let out: Vec<u32> = buf
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(out, ids);
    }

    #[test]
    fn ids_reinterpret_as_r32_int() {
        let ids = [0u32, 42, 65_535, 3];
        let mut buf = vec![0u8; 16];
        let mut view = ImageViewMut::new(PixelFormat::R32Int, SIZE, &mut buf).unwrap();
        write_ids(&ids, &mut view).unwrap();
        let out: Vec<i32> = buf
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(out, vec![0, 42, 65_535, 3]);
    }

    #[test]
    fn ids_narrow_into_r16_without_loss() {
        let ids = [0u32, 1, 40_000, 65_535];
        let mut buf = vec![0u8; 8];
        let mut view = ImageViewMut::new(PixelFormat::R16Uint, SIZE, &mut buf).unwrap();
        write_ids(&ids, &mut view).unwrap();
        let out: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(out, vec![0, 1, 40_000, 65_535]);
    }

    #[test]
    fn ids_out_of_r16_range_are_rejected() {
        let mut buf = vec![0u8; 8];
        let mut view = ImageViewMut::new(PixelFormat::R16Uint, SIZE, &mut buf).unwrap();
        assert!(matches!(
            write_ids(&[5, 0, 70_000, 0], &mut view),
            Err(TargetError::Contract(_))
        ));
        // Nothing written, not even the ids ahead of the offending one.
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn ids_reject_float_views() {
        let mut buf = vec![0u8; 16];
        let mut view = ImageViewMut::new(PixelFormat::R32Float, SIZE, &mut buf).unwrap();
        assert!(write_ids(&[0; 4], &mut view).is_err());
    }
}
