//! Backend detection.

use tracing::warn;

/// Execution backends a compiled artifact may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Parallel strips on the host (host plans).
    HostStrips,
    /// Blocks and threads emulated on the host (device plans, emulated API).
    HostTiles,
    /// Generated compute kernels through wgpu (device plans, real APIs).
    Wgpu,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HostStrips => "host-strips",
            Self::HostTiles => "host-tiles",
            Self::Wgpu => "wgpu",
        }
    }
}

/// Information about an execution backend.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    /// Backend type.
    pub backend: Backend,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether backend is available.
    pub available: bool,
    /// Higher is preferred.
    pub priority: u32,
    /// Description.
    pub description: &'static str,
}

/// Detect all execution backends, preferred first.
pub fn detect_backends() -> Vec<BackendInfo> {
    let mut backends = vec![
        BackendInfo {
            backend: Backend::HostStrips,
            name: "host strips",
            available: true,
            priority: 10,
            description: "CPU strips with rayon parallelization",
        },
        BackendInfo {
            backend: Backend::HostTiles,
            name: "host tiles",
            available: true,
            priority: 5,
            description: "GPU blocks and threads emulated on the CPU",
        },
    ];

    let wgpu_available = accelerator_available();
    backends.push(BackendInfo {
        backend: Backend::Wgpu,
        name: "wgpu",
        available: wgpu_available,
        priority: if wgpu_available { 100 } else { 0 },
        description: if cfg!(feature = "wgpu") {
            "GPU via wgpu (Vulkan/Metal/DX12/GL)"
        } else {
            "GPU via wgpu (feature not enabled)"
        },
    });

    backends.sort_by(|a, b| b.priority.cmp(&a.priority));
    backends
}

/// Get description of available backends.
pub fn describe_backends() -> String {
    let mut desc = String::new();
    for info in detect_backends() {
        let status = if info.available { "+" } else { "-" };
        desc.push_str(&format!("[{}] {}: {}\n", status, info.name, info.description));
    }
    desc
}

/// Whether a hardware accelerator is reachable through any API.
///
/// Software rasterizers (llvmpipe, WARP) do not count.
pub fn accelerator_available() -> bool {
    #[cfg(feature = "wgpu")]
    {
        match super::wgpu_backend::probe_adapter(wgpu::Backends::all()) {
            Some(info) => info.device_type != wgpu::DeviceType::Cpu,
            None => {
                warn!("no wgpu adapter found");
                false
            }
        }
    }
    #[cfg(not(feature = "wgpu"))]
    {
        warn!("built without the wgpu feature, no accelerator");
        false
    }
}

/// Whether `api` can run device plans on this machine.
pub fn accelerator_available_for(api: crate::target::DeviceApi) -> bool {
    if api.is_emulated() {
        return true;
    }
    #[cfg(feature = "wgpu")]
    {
        super::wgpu_backend::probe_adapter(api.backends()).is_some()
    }
    #[cfg(not(feature = "wgpu"))]
    {
        false
    }
}
