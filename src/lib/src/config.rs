//! CA configuration file
//!
//! ```json
//! {
//!   "slot": "9c",
//!   "algorithm": "ec256",
//!   "validity": "87660h",
//!   "subject": {
//!     "C": ["US"],
//!     "O": ["Example Corp"],
//!     "OU": ["Security"],
//!     "ST": ["California"],
//!     "L": ["San Francisco"],
//!     "CN": "Example Root CA"
//!   },
//!   "crl": ["http://crl.example.com/root.crl"]
//! }
//! ```
//!
//! Unknown fields are rejected. Durations use `humantime` syntax (`24h`,
//! `8766h`, `1h 30m`).

use crate::certificate::DistinguishedName;
use crate::error::CAError;
use crate::platform::{KeyAlgorithm, Slot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Subject name as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnConfig {
    #[serde(rename = "C", default)]
    pub country: Vec<String>,
    #[serde(rename = "O", default)]
    pub organization: Vec<String>,
    #[serde(rename = "OU", default)]
    pub organizational_unit: Vec<String>,
    #[serde(rename = "ST", default)]
    pub province: Vec<String>,
    #[serde(rename = "L", default)]
    pub locality: Vec<String>,
    #[serde(rename = "CN", default)]
    pub common_name: String,
}

impl From<&DnConfig> for DistinguishedName {
    fn from(dn: &DnConfig) -> Self {
        DistinguishedName {
            country: dn.country.clone(),
            province: dn.province.clone(),
            locality: dn.locality.clone(),
            organization: dn.organization.clone(),
            organizational_unit: dn.organizational_unit.clone(),
            common_name: dn.common_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CAConfig {
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub validity: String,
    #[serde(default)]
    pub subject: DnConfig,
    #[serde(default)]
    pub crl: Vec<String>,
}

/// A configuration with every field parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub slot: Slot,
    pub algorithm: KeyAlgorithm,
    pub validity: Duration,
    pub subject: DistinguishedName,
    pub crl: Vec<String>,
}

impl CAConfig {
    /// Load and validate the configuration at `path`.
    pub fn from_file(path: &Path) -> Result<Self, CAError> {
        let data = std::fs::read(path)?;
        let config = Self::from_json(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn from_json(data: &[u8]) -> Result<Self, CAError> {
        serde_json::from_slice(data)
            .map_err(|e| CAError::Parse(format!("could not read config: {}", e)))
    }

    /// Check every field, reporting the first problem.
    pub fn validate(&self) -> Result<(), CAError> {
        self.resolve().map(|_| ())
    }

    /// Parse every field into its typed form.
    pub fn resolve(&self) -> Result<ResolvedConfig, CAError> {
        if self.slot.is_empty() {
            return Err(invalid("slot", "slot is required", SLOT_HELP));
        }
        let slot = self.slot.parse::<Slot>().map_err(|_| {
            invalid("slot", format!("unknown slot type {:?}", self.slot), SLOT_HELP)
        })?;

        if self.algorithm.is_empty() {
            return Err(invalid("algorithm", "algorithm is required", ALGORITHM_HELP));
        }
        let algorithm = self.algorithm.parse::<KeyAlgorithm>().map_err(|_| {
            invalid(
                "algorithm",
                format!("unknown algorithm {:?}", self.algorithm),
                ALGORITHM_HELP,
            )
        })?;

        if self.validity.is_empty() {
            return Err(invalid("validity", "validity is required", VALIDITY_HELP));
        }
        let validity = parse_validity(&self.validity)
            .map_err(|e| invalid("validity", e.to_string(), VALIDITY_HELP))?;

        if self.subject.common_name.trim().is_empty() {
            return Err(invalid(
                "subject.CN",
                "subject common name is required",
                "set subject.CN to the name of this certificate authority",
            ));
        }

        for url in &self.crl {
            if url.is_empty() || !url.is_ascii() {
                return Err(invalid(
                    "crl",
                    format!("invalid CRL URL {:?}", url),
                    "CRL distribution points must be non-empty ASCII URLs",
                ));
            }
        }

        Ok(ResolvedConfig {
            slot,
            algorithm,
            validity,
            subject: DistinguishedName::from(&self.subject),
            crl: self.crl.clone(),
        })
    }
}

const SLOT_HELP: &str = "slot must be one of 9a, 9c, 9d or 9e";
const ALGORITHM_HELP: &str = "algorithm must be one of ec256, ec384, ed25519, rsa1024 or rsa2048";
const VALIDITY_HELP: &str = "validity is a duration such as 8766h or 30days";

fn invalid(field: &'static str, message: impl Into<String>, help: &'static str) -> CAError {
    CAError::InvalidConfiguration {
        field,
        message: message.into(),
        help,
    }
}

/// Parse a validity duration such as `24h` or `8766h`.
///
/// Sub-second parts are dropped; the result must be at least one second.
pub fn parse_validity(value: &str) -> Result<Duration, CAError> {
    let parsed = humantime::parse_duration(value.trim()).map_err(|e| CAError::InvalidValidity {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    let whole = Duration::from_secs(parsed.as_secs());
    if whole.is_zero() {
        return Err(CAError::InvalidValidity {
            value: value.to_string(),
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(whole)
}
