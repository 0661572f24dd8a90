use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use log::{info, warn};
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;

use crate::ClassifierError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Compute device the model session runs on.
///
/// `Auto` is only a request; [`resolve_device`] turns it into `Cpu` or `Cuda` once, at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device '{}', expected auto, cpu or cuda", other)),
        }
    }
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
    pub device: Device,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
            device: Device::Auto,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
            device: self.device,
        }
    }
}

fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

/// Maps the numeric `--opt-level` flag (0-3) onto ONNX Runtime's graph optimization levels.
pub fn optimization_level_from_u8(level: u8) -> Result<GraphOptimizationLevel, ClassifierError> {
    match level {
        0 => Ok(GraphOptimizationLevel::Disable),
        1 => Ok(GraphOptimizationLevel::Level1),
        2 => Ok(GraphOptimizationLevel::Level2),
        3 => Ok(GraphOptimizationLevel::Level3),
        other => Err(ClassifierError::ValidationError(format!(
            "Optimization level must be between 0 and 3, got {}",
            other
        ))),
    }
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("florascope")
        .commit()?;
    Ok(())
}

pub fn ensure_initialized() -> Result<(), ClassifierError> {
    INIT.get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| ClassifierError::BuildError(format!("Failed to initialize ONNX Runtime: {}", e)))
}

#[cfg(feature = "cuda")]
fn cuda_available() -> bool {
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(not(feature = "cuda"))]
fn cuda_available() -> bool {
    false
}

/// Settles the requested device into the one the process will use for its whole lifetime.
pub fn resolve_device(requested: Device) -> Result<Device, ClassifierError> {
    let resolved = match requested {
        Device::Cpu => Device::Cpu,
        Device::Cuda if cuda_available() => Device::Cuda,
        Device::Cuda => {
            return Err(ClassifierError::ConfigError(
                "CUDA was requested but the CUDA execution provider is not available".into(),
            ))
        }
        Device::Auto if cuda_available() => Device::Cuda,
        Device::Auto => {
            if cfg!(feature = "cuda") {
                warn!("CUDA execution provider not available, falling back to CPU");
            }
            Device::Cpu
        }
    };
    info!("Compute device: {} (requested {})", resolved, requested);
    Ok(resolved)
}

/// Builds a session builder for `config` and reports the device it was bound to.
pub fn create_session_builder(config: &RuntimeConfig) -> Result<(SessionBuilder, Device), ClassifierError> {
    ensure_initialized()?;
    let device = resolve_device(config.device)?;
    let mut builder = Session::builder()?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(copy_level(&config.optimization_level))?;

    builder = match device {
        #[cfg(feature = "cuda")]
        Device::Cuda => builder.with_execution_providers([CUDAExecutionProvider::default().build()])?,
        _ => builder.with_execution_providers([CPUExecutionProvider::default().build()])?,
    };

    Ok((builder, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_initialization() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok()); // Second call should be fine
    }

    #[test]
    fn test_session_builder_config() {
        let config = RuntimeConfig {
            inter_threads: 2,
            intra_threads: 2,
            optimization_level: GraphOptimizationLevel::Level1,
            device: Device::Cpu,
        };
        let (_, device) = create_session_builder(&config).unwrap();
        assert_eq!(device, Device::Cpu);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("CPU".parse::<Device>(), Ok(Device::Cpu));
        assert_eq!("gpu".parse::<Device>(), Ok(Device::Cuda));
        assert_eq!("auto".parse::<Device>(), Ok(Device::Auto));
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_auto_never_stays_auto() {
        let device = resolve_device(Device::Auto).unwrap();
        assert_ne!(device, Device::Auto);
    }

    #[test]
    fn test_optimization_level_bounds() {
        assert!(optimization_level_from_u8(3).is_ok());
        assert!(optimization_level_from_u8(4).is_err());
    }
}
