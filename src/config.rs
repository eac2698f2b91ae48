//! Environment-derived configuration.
//!
//! Every value is optional and read at call time: a long-lived process picks
//! up changes to the environment on its next tool call. Nothing here is
//! cached in global state.
//!
//! | Variable | Meaning | Fallback |
//! |----------|---------|----------|
//! | `AWS_REGION` | Region of the execution service | service default |
//! | `BRAKET_WORKSPACE_DIR` | Base directory for saved programs | current directory |
//! | `BRAKET_DEFAULT_DEVICE_ARN` | Device used when a call names none | [`DEFAULT_DEVICE_ARN`] |

use std::path::PathBuf;

/// Environment variable selecting the service region.
pub const REGION_ENV: &str = "AWS_REGION";
/// Environment variable selecting the workspace directory.
pub const WORKSPACE_DIR_ENV: &str = "BRAKET_WORKSPACE_DIR";
/// Environment variable overriding the default device.
pub const DEFAULT_DEVICE_ENV: &str = "BRAKET_DEFAULT_DEVICE_ARN";

/// The on-demand state-vector simulator (SV1).
pub const DEFAULT_DEVICE_ARN: &str = "arn:aws:braket:::device/quantum-simulator/amazon/sv1";

/// A snapshot of the configuration at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Service region, if configured.
    pub region: Option<String>,
    /// Base directory for relative file paths.
    pub workspace_dir: PathBuf,
    /// Raw value of the default-device override.
    pub default_device_override: Option<String>,
}

impl Settings {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let region = lookup(REGION_ENV)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let workspace_dir = lookup(WORKSPACE_DIR_ENV)
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            region,
            workspace_dir,
            default_device_override: lookup(DEFAULT_DEVICE_ENV),
        }
    }

    /// Device to use when a call does not name one.
    pub fn default_device_arn(&self) -> String {
        resolve_default_device(self.default_device_override.as_deref())
    }
}

/// Resolve the default device from an optional override.
///
/// Absent or whitespace-only overrides fall back to [`DEFAULT_DEVICE_ARN`].
pub fn resolve_default_device(override_arn: Option<&str>) -> String {
    match override_arn.map(str::trim) {
        Some(arn) if !arn.is_empty() => arn.to_string(),
        _ => DEFAULT_DEVICE_ARN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let env: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_device_without_override() {
        assert_eq!(resolve_default_device(None), DEFAULT_DEVICE_ARN);
        assert_eq!(settings(&[]).default_device_arn(), DEFAULT_DEVICE_ARN);
    }

    #[test]
    fn test_blank_override_falls_back() {
        assert_eq!(resolve_default_device(Some("")), DEFAULT_DEVICE_ARN);
        assert_eq!(
            settings(&[(DEFAULT_DEVICE_ENV, "   \t")]).default_device_arn(),
            DEFAULT_DEVICE_ARN
        );
    }

    #[test]
    fn test_override_is_trimmed() {
        let arn = "arn:aws:braket:us-east-1::device/qpu/ionq/Aria-1";
        let s = settings(&[(DEFAULT_DEVICE_ENV, &format!("  {arn} "))]);
        assert_eq!(s.default_device_arn(), arn);
    }

    #[test]
    fn test_workspace_and_region() {
        let s = settings(&[(WORKSPACE_DIR_ENV, "/tmp/braket"), (REGION_ENV, "eu-north-1")]);
        assert_eq!(s.workspace_dir, PathBuf::from("/tmp/braket"));
        assert_eq!(s.region.as_deref(), Some("eu-north-1"));

        let blank = settings(&[(REGION_ENV, " ")]);
        assert!(blank.region.is_none());
    }
}
