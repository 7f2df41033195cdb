//! Texture -> host copies with row de-padding.

use bytemuck::Pod;

use super::attachment::Attachment;
use super::{Size, TargetError};

/// Rounds a row of `width` texels up to wgpu's copy row alignment (256 bytes).
pub(crate) fn padded_bytes_per_row(width: u32, texel_size: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * texel_size).div_ceil(align) * align
}

/// Blocks until every submission on `device` has completed.
pub(crate) fn wait_idle(device: &wgpu::Device) -> Result<(), TargetError> {
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map(|_| ())
        .map_err(|e| TargetError::Device(format!("device poll failed: {e}")))
}

/// Appends a copy of `src` to `encoder`, submits it and returns the texels tightly packed.
///
/// Anything already recorded in `encoder` (e.g. an unprojection pass) runs first.
pub(crate) fn read_attachment<T: Pod>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mut encoder: wgpu::CommandEncoder,
    src: &Attachment,
    size: Size,
) -> Result<Vec<T>, TargetError> {
    let texel_size = src.kind.texel_size();
    let tight_bpr = (size.width * texel_size) as usize;
    let padded_bpr = padded_bytes_per_row(size.width, texel_size);

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("ocular readback staging"),
        size: padded_bpr as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &src.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(size.height),
            },
        },
        size.extent(),
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    wait_idle(device)?;

    rx.recv()
        .map_err(|_| TargetError::Device("map_async callback dropped".into()))?
        .map_err(|e| TargetError::Device(format!("staging map failed: {e}")))?;

    let elements = size.area() * texel_size as usize / std::mem::size_of::<T>();
    let mut out = vec![T::zeroed(); elements];
    {
        let mapped = slice.get_mapped_range();
        let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
        for row in 0..size.height as usize {
            let src_off = row * padded_bpr as usize;
            let dst_off = row * tight_bpr;
            dst[dst_off..dst_off + tight_bpr].copy_from_slice(&mapped[src_off..src_off + tight_bpr]);
        }
    }
    staging.unmap();

    log::trace!("read {:?} {size}", src.kind);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_256_bytes() {
        assert_eq!(padded_bytes_per_row(1, 4), 256);
        assert_eq!(padded_bytes_per_row(64, 4), 256);
        assert_eq!(padded_bytes_per_row(65, 4), 512);
        assert_eq!(padded_bytes_per_row(640, 4), 2560);
    }
}
