use std::fmt;
use std::str::FromStr;

use super::{FilterBackend, HostBackend};
use crate::common::{Error, Result};

/// Which accelerator to bring up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// GPU when an adapter is available, otherwise the host backend.
    #[default]
    Auto,
    Gpu,
    Host,
}

impl FromStr for BackendPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(BackendPreference::Auto),
            "gpu" => Ok(BackendPreference::Gpu),
            "host" | "cpu" => Ok(BackendPreference::Host),
            other => Err(Error::Usage(format!(
                "unknown backend '{}', expected auto, gpu or host",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Gpu => write!(f, "gpu"),
            BackendPreference::Host => write!(f, "host"),
        }
    }
}

/// The one accelerator used for the lifetime of the process.
///
/// Created once before any image is processed; every image borrows it.
pub struct AcceleratorContext {
    backend: Box<dyn FilterBackend>,
    name: String,
}

impl AcceleratorContext {
    pub fn new(preference: BackendPreference) -> Result<Self> {
        let context = match preference {
            BackendPreference::Host => Self::with_backend(HostBackend::new()),
            BackendPreference::Gpu => Self::gpu()?,
            BackendPreference::Auto => match Self::gpu() {
                Ok(ctx) => ctx,
                Err(e) => {
                    tracing::warn!("GPU initialization failed, falling back to host: {}", e);
                    Self::with_backend(HostBackend::new())
                }
            },
        };

        tracing::info!("Using device: {}", context.name);

        Ok(context)
    }

    pub fn with_backend<B: FilterBackend + 'static>(backend: B) -> Self {
        let name = backend.name();
        Self {
            backend: Box::new(backend),
            name,
        }
    }

    #[cfg(feature = "wgpu")]
    fn gpu() -> Result<Self> {
        super::GpuBackend::new().map(Self::with_backend)
    }

    #[cfg(not(feature = "wgpu"))]
    fn gpu() -> Result<Self> {
        Err(Error::Device(
            "built without GPU support (enable the `wgpu` feature)".to_string(),
        ))
    }

    pub fn backend(&self) -> &dyn FilterBackend {
        self.backend.as_ref()
    }

    pub fn device_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for AcceleratorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcceleratorContext")
            .field("device", &self.name)
            .finish()
    }
}

impl Drop for AcceleratorContext {
    fn drop(&mut self) {
        tracing::debug!("Shutting down device: {}", self.name);
    }
}
