//! Ocular engine crate.
//!
//! Offscreen render targets with color, depth and id planes, plus the GPU
//! runtime needed to drive them either on a window surface or headless.
//!
//! ```no_run
//! use ocular_engine::device::{GpuInit, HeadlessGpu};
//! use ocular_engine::target::{DepthUnprojection, ImageViewMut, PixelFormat, RenderTarget, Size};
//!
//! # fn main() -> anyhow::Result<()> {
//! let gpu = HeadlessGpu::new_blocking(GpuInit::default())?;
//! let size = Size::new(64, 48);
//! let unproject = DepthUnprojection::from_near_far(0.1, 100.0)?;
//! let mut target = RenderTarget::new(&gpu, size, unproject)?;
//!
//! let session = target.render_enter();
//! session.render_exit();
//!
//! let mut ids = vec![0u8; size.area() * 4];
//! target.read_frame_object_id(&mut ImageViewMut::new(PixelFormat::R32Uint, size, &mut ids)?)?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod logging;
pub mod target;

pub use target::{RenderSession, RenderTarget, Size, TargetError};
