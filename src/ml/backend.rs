// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// Device placement is decided once, at startup, for the whole run:
//
//   --disable-cuda            → CPU (NdArray)
//   device = "cpu"            → CPU
//   device = "auto"           → Wgpu if compiled with `wgpu`, else CPU
//   device = "accelerator"    → Wgpu, or DeviceError without `wgpu`
//
// Code that needs a concrete backend implements BackendTask once,
// generically, and `dispatch` instantiates it for the chosen one.

use burn::tensor::backend::AutodiffBackend;

use crate::application::config::DevicePreference;
use crate::error::{Result, Seq2SeqError};

pub type CpuBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
pub type AcceleratorBackend = burn::backend::Wgpu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Accelerator,
}

impl DeviceKind {
    pub fn accelerator_compiled() -> bool {
        cfg!(feature = "wgpu")
    }
}

/// Resolve the config's preference and the CLI flag to one device.
pub fn resolve_device(preference: DevicePreference, disable_accelerator: bool) -> Result<DeviceKind> {
    if disable_accelerator {
        return Ok(DeviceKind::Cpu);
    }
    match preference {
        DevicePreference::Cpu  => Ok(DeviceKind::Cpu),
        DevicePreference::Auto => Ok(if DeviceKind::accelerator_compiled() {
            DeviceKind::Accelerator
        } else {
            DeviceKind::Cpu
        }),
        DevicePreference::Accelerator if DeviceKind::accelerator_compiled() => Ok(DeviceKind::Accelerator),
        DevicePreference::Accelerator => Err(Seq2SeqError::Device(
            "an accelerator was requested but this build has no `wgpu` feature".to_string(),
        )),
    }
}

/// Work that runs on whichever autodiff backend `dispatch` picks.
pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output;
}

pub fn dispatch<T: BackendTask>(kind: DeviceKind, task: T) -> Result<T::Output> {
    match kind {
        DeviceKind::Cpu => {
            tracing::info!("Using CPU (NdArray) backend");
            Ok(task.run::<burn::backend::Autodiff<CpuBackend>>(Default::default()))
        }
        DeviceKind::Accelerator => run_accelerated(task),
    }
}

#[cfg(feature = "wgpu")]
fn run_accelerated<T: BackendTask>(task: T) -> Result<T::Output> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);
    Ok(task.run::<burn::backend::Autodiff<AcceleratorBackend>>(device))
}

#[cfg(not(feature = "wgpu"))]
fn run_accelerated<T: BackendTask>(_task: T) -> Result<T::Output> {
    Err(Seq2SeqError::Device("this build has no accelerator backend".to_string()))
}
