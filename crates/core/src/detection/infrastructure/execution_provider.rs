use std::path::Path;

use ort::execution_providers::{ExecutionProvider, ExecutionProviderDispatch};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::detection::domain::runtime::{Backend, BackendError, RuntimeSettings};

/// Whether the given backend can be used on this machine.
pub fn is_available(backend: Backend) -> bool {
    match backend {
        Backend::Auto | Backend::Cpu => true,
        #[cfg(target_os = "macos")]
        Backend::CoreMl => ort::execution_providers::CoreMLExecutionProvider::default()
            .is_available()
            .unwrap_or(false),
        #[cfg(target_os = "windows")]
        Backend::DirectMl => ort::execution_providers::DirectMLExecutionProvider::default()
            .is_available()
            .unwrap_or(false),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Execution providers for a backend, in priority order.
///
/// An empty list means "CPU only"; ONNX Runtime always falls back to CPU.
pub fn execution_providers(
    backend: Backend,
) -> Result<Vec<ExecutionProviderDispatch>, BackendError> {
    if !is_available(backend) {
        return Err(BackendError::Unavailable(backend));
    }
    let providers = match backend {
        Backend::Auto => preferred_execution_providers(),
        Backend::Cpu => {
            vec![ort::execution_providers::CPUExecutionProvider::default().build()]
        }
        #[cfg(target_os = "macos")]
        Backend::CoreMl => {
            vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
        }
        #[cfg(target_os = "windows")]
        Backend::DirectMl => {
            vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
        }
        #[allow(unreachable_patterns)]
        other => return Err(BackendError::Unavailable(other)),
    };
    Ok(providers)
}

/// Return the preferred ONNX execution providers for the current platform.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Create an inference session for `model_path` using the runtime settings.
pub fn build_session(
    model_path: &Path,
    runtime: &RuntimeSettings,
) -> Result<Session, Box<dyn std::error::Error>> {
    let providers = execution_providers(runtime.backend)?;
    let level = if runtime.flags.optimize_graph {
        GraphOptimizationLevel::Level3
    } else {
        GraphOptimizationLevel::Disable
    };

    let mut builder = Session::builder()?
        .with_optimization_level(level)?
        .with_execution_providers(providers)?;
    if runtime.flags.intra_threads > 0 {
        builder = builder.with_intra_threads(runtime.flags.intra_threads)?;
    }
    Ok(builder.commit_from_file(model_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_and_auto_always_available() {
        assert!(is_available(Backend::Cpu));
        assert!(is_available(Backend::Auto));
    }

    #[test]
    fn test_cpu_backend_yields_one_provider() {
        assert_eq!(execution_providers(Backend::Cpu).unwrap().len(), 1);
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    #[test]
    fn test_platform_backends_unavailable_on_linux() {
        assert!(matches!(
            execution_providers(Backend::CoreMl),
            Err(BackendError::Unavailable(Backend::CoreMl))
        ));
        assert!(matches!(
            execution_providers(Backend::DirectMl),
            Err(BackendError::Unavailable(Backend::DirectMl))
        ));
    }
}
