use crate::detection::domain::runtime::{
    Backend, BackendError, RuntimeConfigurator, RuntimeFlags, RuntimeSettings,
};

use super::execution_provider;

/// Runtime configurator for ONNX Runtime.
///
/// Sessions pick up execution providers and flags when they are built, so
/// configuring only validates the choice and records it for the next build.
#[derive(Debug, Default)]
pub struct OrtRuntime {
    current: Option<RuntimeSettings>,
}

impl OrtRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&RuntimeSettings> {
        self.current.as_ref()
    }
}

impl RuntimeConfigurator for OrtRuntime {
    fn configure(
        &mut self,
        backend: Backend,
        flags: &RuntimeFlags,
    ) -> Result<RuntimeSettings, BackendError> {
        if !execution_provider::is_available(backend) {
            return Err(BackendError::Unavailable(backend));
        }
        let settings = RuntimeSettings {
            backend,
            flags: *flags,
        };
        log::info!(
            "Inference runtime: backend={backend}, intra_threads={}, optimize_graph={}",
            flags.intra_threads,
            flags.optimize_graph
        );
        self.current = Some(settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_cpu_records_settings() {
        let mut runtime = OrtRuntime::new();
        let flags = RuntimeFlags {
            intra_threads: 2,
            optimize_graph: false,
        };
        let settings = runtime.configure(Backend::Cpu, &flags).unwrap();
        assert_eq!(settings.backend, Backend::Cpu);
        assert_eq!(settings.flags, flags);
        assert_eq!(runtime.current(), Some(&settings));
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    #[test]
    fn test_configure_unavailable_backend_keeps_previous() {
        let mut runtime = OrtRuntime::new();
        runtime.configure(Backend::Auto, &RuntimeFlags::default()).unwrap();
        let err = runtime
            .configure(Backend::DirectMl, &RuntimeFlags::default())
            .unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(Backend::DirectMl)));
        assert_eq!(runtime.current().unwrap().backend, Backend::Auto);
    }
}
