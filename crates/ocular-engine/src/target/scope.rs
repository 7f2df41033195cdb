//! Error scopes around resource creation.
//!
//! Without a scope, wgpu routes validation and out-of-memory errors to the
//! device's uncaptured-error handler, which panics by default.

use super::TargetError;

/// Runs `create` inside out-of-memory and validation scopes.
///
/// Any captured error becomes [`TargetError::Resource`]; the value `create`
/// returned is dropped in that case.
pub(crate) fn guarded<T>(
    device: &wgpu::Device,
    what: &str,
    create: impl FnOnce() -> T,
) -> Result<T, TargetError> {
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);

    let value = create();

    // Scopes pop innermost first.
    let invalid = pollster::block_on(validation.pop());
    let exhausted = pollster::block_on(out_of_memory.pop());

    match exhausted.or(invalid) {
        None => Ok(value),
        Some(err) => {
            log::error!("{what}: {err}");
            Err(TargetError::Resource(format!("{what}: {err}")))
        }
    }
}
