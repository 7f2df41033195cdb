//! Offscreen render target and channel readback.
//!
//! A [`RenderTarget`] owns a framebuffer of fixed size with these planes:
//!
//! | plane       | format          | cleared to | draw location |
//! |-------------|-----------------|------------|---------------|
//! | color       | RGBA8           | (0,0,0,0)  | 0             |
//! | object id   | `R32Uint`       | [`NO_OBJECT`] | 1          |
//! | triangle id | `R32Uint`       | [`NO_OBJECT`] | 2 (feature `triangle-id`) |
//! | depth       | `Depth32Float`  | [`CLEAR_DEPTH`] | depth-stencil |
//! | depth bits  | `R32Uint`       | (written by reads) | none |
//!
//! Channels are read back synchronously into host views ([`ImageViewMut`]), into
//! device buffers (feature `device-export`), or blitted onto a presentation
//! target. Depth is converted to linear distance on the way out; see
//! [`DepthUnprojection`].

mod attachment;
mod blit;
mod depth;
mod error;
#[cfg(feature = "device-export")]
mod export;
mod format;
mod readback;
mod render_target;
mod scope;
mod session;
mod size;
#[cfg(feature = "triangle-id")]
mod triangle;

pub use attachment::{AttachmentKind, CLEAR_DEPTH, DEPTH_BITS_FORMAT, DEPTH_FORMAT, ID_FORMAT, NO_OBJECT};
pub use depth::{DepthShader, DepthUnprojection, DepthUnprojector};
pub use error::TargetError;
pub use format::{ImageViewMut, PixelFormat};
pub use render_target::{Capabilities, RenderTarget, TargetConfig, TargetShaders};
pub use session::RenderSession;
pub use size::Size;
#[cfg(feature = "triangle-id")]
pub use triangle::TriangleShader;

pub(crate) use depth::DepthPath;
