//! Codec configuration
//!
//! Selects which kernel the dispatch table routes to and whether `pack`
//! validates value ranges. Loadable from JSON or from `LANEPACK_*`
//! environment variables.

use crate::error::{Error, Result};
use crate::structures::Kernel;
use crate::structures::simd;
use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable naming the kernel preference
pub const KERNEL_ENV: &str = "LANEPACK_KERNEL";
/// Environment variable enabling value-range checks in `pack`
pub const CHECK_VALUES_ENV: &str = "LANEPACK_CHECK_VALUES";

/// Requested kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelPreference {
    /// Explicit SIMD when the CPU has it, portable lanes otherwise
    #[default]
    Auto,
    Reference,
    Portable,
    Simd,
}

impl KernelPreference {
    /// Concrete kernel for this CPU
    pub fn resolve(self) -> Kernel {
        match self {
            KernelPreference::Reference => Kernel::Reference,
            KernelPreference::Portable => Kernel::Portable,
            KernelPreference::Auto => {
                if simd::is_available() {
                    Kernel::Simd
                } else {
                    Kernel::Portable
                }
            }
            KernelPreference::Simd => {
                if simd::is_available() {
                    Kernel::Simd
                } else {
                    warn!("SIMD kernel requested but not available on this CPU, using portable lanes");
                    Kernel::Portable
                }
            }
        }
    }
}

impl FromStr for KernelPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(KernelPreference::Auto),
            "reference" | "scalar" => Ok(KernelPreference::Reference),
            "portable" => Ok(KernelPreference::Portable),
            "simd" => Ok(KernelPreference::Simd),
            other => Err(Error::Config(format!("unknown kernel '{}'", other))),
        }
    }
}

/// Configuration for a `BitPacker`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub kernel: KernelPreference,
    /// Reject values that do not fit the bit width instead of masking them
    #[serde(default)]
    pub check_values: bool,
}

impl CodecConfig {
    pub fn with_kernel(mut self, kernel: KernelPreference) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_check_values(mut self, check_values: bool) -> Self {
        self.check_values = check_values;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read `LANEPACK_KERNEL` and `LANEPACK_CHECK_VALUES`; unset variables keep defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(kernel) = lookup(KERNEL_ENV) {
            config.kernel = kernel.parse()?;
        }
        if let Some(flag) = lookup(CHECK_VALUES_ENV) {
            config.check_values = parse_flag(&flag).ok_or_else(|| {
                Error::Config(format!("{} must be a boolean, got '{}'", CHECK_VALUES_ENV, flag))
            })?;
        }
        Ok(config)
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CodecConfig::default();
        assert_eq!(config.kernel, KernelPreference::Auto);
        assert!(!config.check_values);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = CodecConfig::default()
            .with_kernel(KernelPreference::Reference)
            .with_check_values(true);
        let json = config.to_json().unwrap();
        assert_eq!(json, r#"{"kernel":"reference","check_values":true}"#);
        assert_eq!(CodecConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_json_missing_fields_use_defaults() {
        let config = CodecConfig::from_json("{}").unwrap();
        assert_eq!(config, CodecConfig::default());

        let config = CodecConfig::from_json(r#"{"kernel":"portable"}"#).unwrap();
        assert_eq!(config.kernel, KernelPreference::Portable);
        assert!(!config.check_values);
    }

    #[test]
    fn test_json_rejects_unknown_kernel() {
        let err = CodecConfig::from_json(r#"{"kernel":"avx512"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_lookup() {
        let config = CodecConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CodecConfig::default());

        let config = CodecConfig::from_lookup(lookup(&[
            (KERNEL_ENV, "Simd"),
            (CHECK_VALUES_ENV, "1"),
        ]))
        .unwrap();
        assert_eq!(config.kernel, KernelPreference::Simd);
        assert!(config.check_values);
    }

    #[test]
    fn test_env_lookup_errors() {
        let err = CodecConfig::from_lookup(lookup(&[(KERNEL_ENV, "fast")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = CodecConfig::from_lookup(lookup(&[(CHECK_VALUES_ENV, "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resolve() {
        assert_eq!(KernelPreference::Reference.resolve(), Kernel::Reference);
        assert_eq!(KernelPreference::Portable.resolve(), Kernel::Portable);

        let expected = if simd::is_available() {
            Kernel::Simd
        } else {
            Kernel::Portable
        };
        assert_eq!(KernelPreference::Auto.resolve(), expected);
        assert_eq!(KernelPreference::Simd.resolve(), expected);
    }
}
