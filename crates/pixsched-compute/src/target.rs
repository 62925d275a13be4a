//! Compile targets: host CPU plus an optional device API.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Device API used for device-mapped stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceApi {
    Vulkan,
    Metal,
    Dx12,
    Gl,
    /// Device semantics emulated on the host: tiled execution into a
    /// separate allocation that must be copied back explicitly.
    Emulated,
}

impl DeviceApi {
    /// All APIs, real devices first.
    pub const ALL: [DeviceApi; 5] = [
        DeviceApi::Vulkan,
        DeviceApi::Metal,
        DeviceApi::Dx12,
        DeviceApi::Gl,
        DeviceApi::Emulated,
    ];

    /// The platform's preferred API: Metal on macOS, Vulkan elsewhere.
    pub fn native() -> Self {
        if cfg!(target_os = "macos") {
            Self::Metal
        } else {
            Self::Vulkan
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vulkan => "vulkan",
            Self::Metal => "metal",
            Self::Dx12 => "dx12",
            Self::Gl => "gl",
            Self::Emulated => "emulated",
        }
    }

    pub fn is_emulated(&self) -> bool {
        matches!(self, Self::Emulated)
    }

    /// wgpu backend set for this API (empty for the emulated device).
    #[cfg(feature = "wgpu")]
    pub(crate) fn backends(&self) -> wgpu::Backends {
        match self {
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Metal => wgpu::Backends::METAL,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Gl => wgpu::Backends::GL,
            Self::Emulated => wgpu::Backends::empty(),
        }
    }
}

impl fmt::Display for DeviceApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DeviceApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|api| api.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown device API '{s}'"))
    }
}

/// Optional target capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// Log every device call (upload, dispatch, copy, map) under the
    /// `pixsched::device` tracing target.
    Debug,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
        }
    }
}

/// What a schedule is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Target {
    device: Option<DeviceApi>,
    features: BTreeSet<Feature>,
}

impl Target {
    /// Host CPU only.
    pub fn host() -> Self {
        Self::default()
    }

    /// Host CPU plus `api` for device-mapped stages.
    pub fn for_device(api: DeviceApi) -> Self {
        Self {
            device: Some(api),
            features: BTreeSet::new(),
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn device_api(&self) -> Option<DeviceApi> {
        self.device
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_debug(&self) -> bool {
        self.has_feature(Feature::Debug)
    }
}

/// Formats as `host[-<api>][-<feature>...]`, e.g. `host-vulkan-debug`.
impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("host")?;
        if let Some(api) = self.device {
            write!(f, "-{api}")?;
        }
        for feature in &self.features {
            write!(f, "-{}", feature.name())?;
        }
        Ok(())
    }
}
