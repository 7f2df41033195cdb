//! GPU device + surface management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue, with or without a window
//! - creating & configuring the Surface (swapchain) used for on-screen presentation
//! - acquiring frames and handing out the encoder + view a blit records into

mod frame;
mod gpu;
mod handles;
mod headless;
mod init;
mod surface;

pub use frame::{FrameTarget, GpuFrame};
pub use gpu::Gpu;
pub use handles::GpuHandles;
pub use headless::HeadlessGpu;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
