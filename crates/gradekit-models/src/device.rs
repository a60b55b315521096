//! Compute device selection.

use candle_core::Device;

/// Pick the first usable accelerator compiled in, else the CPU.
///
/// GPU backends are opt-in through the `metal` and `cuda` features; a device
/// that fails to initialise is logged and skipped.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            tracing::info!("using Metal device for model inference");
            return device;
        }
        Err(e) => tracing::warn!(error = %e, "Metal device unavailable"),
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            tracing::info!("using CUDA device for model inference");
            return device;
        }
        Err(e) => tracing::warn!(error = %e, "CUDA device unavailable"),
    }

    tracing::debug!("using CPU device for model inference");
    Device::Cpu
}
