//! GPU capability probing.

use std::path::Path;

use hs_types::ModelDescriptor;

/// Name fragments of model families known to ship GPU kernels.
const GPU_MODEL_KEYWORDS: &[&str] = &["xgb", "lgb", "cuda", "gpu"];

/// Answers whether GPU execution is possible for a model.
pub trait GpuProbe: Send + Sync {
    fn is_available(&self) -> bool;

    fn supports(&self, model: &ModelDescriptor) -> bool;
}

/// Probe backed by the host environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGpuProbe;

impl GpuProbe for SystemGpuProbe {
    fn is_available(&self) -> bool {
        let env = std::env::var("CUDA_VISIBLE_DEVICES").ok();
        cuda_devices_visible(env.as_deref()).unwrap_or_else(|| Path::new("/dev/nvidia0").exists())
    }

    fn supports(&self, model: &ModelDescriptor) -> bool {
        model_supports_gpu(model)
    }
}

/// Interpret `CUDA_VISIBLE_DEVICES`. `None` when unset, so the caller can
/// fall back to looking for a device node.
fn cuda_devices_visible(value: Option<&str>) -> Option<bool> {
    let value = value?.trim();
    Some(!(value.is_empty() || value == "-1" || value.eq_ignore_ascii_case("none")))
}

/// Models that declare GPU support, or whose family name marks a GPU build.
pub fn model_supports_gpu(model: &ModelDescriptor) -> bool {
    if model.declares_gpu {
        return true;
    }
    let name = model.name.to_ascii_lowercase();
    GPU_MODEL_KEYWORDS.iter().any(|keyword| name.contains(keyword))
}

/// Fixed answers, for hosts where the real probe is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticGpuProbe {
    pub available: bool,
    pub supported: bool,
}

impl StaticGpuProbe {
    pub fn new(available: bool, supported: bool) -> Self {
        Self { available, supported }
    }

    pub fn none() -> Self {
        Self::new(false, false)
    }
}

impl GpuProbe for StaticGpuProbe {
    fn is_available(&self) -> bool {
        self.available
    }

    fn supports(&self, _model: &ModelDescriptor) -> bool {
        self.supported
    }
}
