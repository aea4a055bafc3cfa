//! Inference runtime selection: which execution backend and which numeric
//! flags newly built detectors use.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Platform-preferred accelerator, CPU fallback.
    #[default]
    Auto,
    Cpu,
    CoreMl,
    DirectMl,
}

impl Backend {
    pub const ALL: &[Backend] = &[Backend::Auto, Backend::Cpu, Backend::CoreMl, Backend::DirectMl];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Cpu => "cpu",
            Backend::CoreMl => "coreml",
            Backend::DirectMl => "directml",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown backend '{s}', expected one of: auto, cpu, coreml, directml"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeFlags {
    /// Intra-op thread count; 0 leaves the runtime default.
    pub intra_threads: usize,
    pub optimize_graph: bool,
}

impl Default for RuntimeFlags {
    fn default() -> Self {
        Self {
            intra_threads: 0,
            optimize_graph: true,
        }
    }
}

/// Validated runtime configuration handed to the detector factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub backend: Backend,
    pub flags: RuntimeFlags,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend '{0}' is not available on this platform")]
    Unavailable(Backend),
    #[error("failed to configure runtime: {0}")]
    Runtime(String),
}

/// Applies backend and flag choices to the inference runtime.
pub trait RuntimeConfigurator: Send {
    fn configure(
        &mut self,
        backend: Backend,
        flags: &RuntimeFlags,
    ) -> Result<RuntimeSettings, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("auto", Backend::Auto)]
    #[case("CPU", Backend::Cpu)]
    #[case("coreml", Backend::CoreMl)]
    #[case("DirectML", Backend::DirectMl)]
    fn test_backend_from_str(#[case] input: &str, #[case] expected: Backend) {
        assert_eq!(input.parse::<Backend>().unwrap(), expected);
    }

    #[test]
    fn test_backend_from_str_unknown() {
        let err = "webgl".parse::<Backend>().unwrap_err();
        assert!(err.contains("webgl"));
    }

    #[test]
    fn test_backend_serde_lowercase() {
        let json = serde_json::to_string(&Backend::CoreMl).unwrap();
        assert_eq!(json, "\"coreml\"");
        let back: Backend = serde_json::from_str("\"directml\"").unwrap();
        assert_eq!(back, Backend::DirectMl);
    }

    #[test]
    fn test_flags_default_fill_missing_fields() {
        let flags: RuntimeFlags = serde_json::from_str(r#"{"intra_threads": 2}"#).unwrap();
        assert_eq!(flags.intra_threads, 2);
        assert!(flags.optimize_graph);
    }
}
