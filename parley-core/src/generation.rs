//! Sampling controls sent with every provider request

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accepted temperature range
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.0..=2.0;
/// Accepted nucleus sampling range
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.0..=1.0;
/// Upper bound for `top_k`
pub const TOP_K_MAX: u32 = 100;

pub const DEFAULT_TEMPERATURE: f64 = 0.8;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_TOP_P: f64 = 0.9;

/// Sampling parameters for a single provider call.
///
/// These are supplied fresh on every turn and never stored in a
/// [`Session`](crate::Session). Construction through [`GenerationParameters::new`]
/// validates the ranges; the fields stay public so front-ends that already
/// clamp their inputs can build the value directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Sampling temperature in `[0.0, 2.0]`
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Top-k sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Nucleus sampling mass in `[0.0, 1.0]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_k: Some(DEFAULT_TOP_K),
            top_p: Some(DEFAULT_TOP_P),
        }
    }
}

impl GenerationParameters {
    /// Build validated parameters
    pub fn new(temperature: f64, top_k: Option<u32>, top_p: Option<f64>) -> crate::Result<Self> {
        let params = Self {
            temperature,
            top_k,
            top_p,
        };
        params.validate()?;
        Ok(params)
    }

    /// Temperature-only parameters, the shape hosted chat endpoints accept
    pub fn with_temperature(temperature: f64) -> Self {
        Self {
            temperature,
            top_k: None,
            top_p: None,
        }
    }

    /// Check every field against its range and report all violations at once
    pub fn validate(&self) -> crate::Result<()> {
        let mut errors = Vec::new();

        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            errors.push(format!(
                "temperature must be in [0.0, 2.0], got {}",
                self.temperature
            ));
        }
        if let Some(top_k) = self.top_k {
            if top_k > TOP_K_MAX {
                errors.push(format!("top_k must be at most {}, got {}", TOP_K_MAX, top_k));
            }
        }
        if let Some(top_p) = self.top_p {
            if !TOP_P_RANGE.contains(&top_p) {
                errors.push(format!("top_p must be in [0.0, 1.0], got {}", top_p));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(errors.join("; ")))
        }
    }

    /// Pull every field into the range a slider widget would allow
    pub fn clamped(self) -> Self {
        let temperature = if self.temperature.is_nan() {
            DEFAULT_TEMPERATURE
        } else {
            self.temperature
                .clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end())
        };
        let top_p = self.top_p.map(|p| {
            if p.is_nan() {
                DEFAULT_TOP_P
            } else {
                p.clamp(*TOP_P_RANGE.start(), *TOP_P_RANGE.end())
            }
        });

        Self {
            temperature,
            top_k: self.top_k.map(|k| k.min(TOP_K_MAX)),
            top_p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_slider_defaults() {
        let params = GenerationParameters::default();
        assert_eq!(params.temperature, 0.8);
        assert_eq!(params.top_k, Some(40));
        assert_eq!(params.top_p, Some(0.9));
        params.validate().unwrap();
    }

    #[test]
    fn test_temperature_extremes_are_valid() {
        GenerationParameters::new(0.0, None, None).unwrap();
        GenerationParameters::new(2.0, None, None).unwrap();
    }

    #[test]
    fn test_validate_reports_all_violations() {
        let err = GenerationParameters::new(2.5, Some(10), Some(1.5)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("temperature"));
        assert!(message.contains("top_p"));
    }

    #[test]
    fn test_top_k_upper_bound() {
        GenerationParameters::new(0.8, Some(TOP_K_MAX), None).unwrap();
        let err = GenerationParameters::new(0.8, Some(1000), None).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_nan_temperature_is_rejected() {
        assert!(GenerationParameters::new(f64::NAN, None, None).is_err());
    }

    #[test]
    fn test_clamped() {
        let params = GenerationParameters {
            temperature: 3.0,
            top_k: Some(500),
            top_p: Some(-0.2),
        }
        .clamped();
        assert_eq!(params.temperature, 2.0);
        assert_eq!(params.top_k, Some(100));
        assert_eq!(params.top_p, Some(0.0));

        let params = GenerationParameters::with_temperature(f64::NAN).clamped();
        assert_eq!(params.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_deserialize_fills_temperature_default() {
        let params: GenerationParameters = serde_json::from_str(r#"{"top_k": 5}"#).unwrap();
        assert_eq!(params.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(params.top_k, Some(5));
        assert_eq!(params.top_p, None);
    }
}
