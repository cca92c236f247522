//! Mask precedence classes.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed-precedence category governing the order filters are applied in.
///
/// The derived ordering is the application order: `Fundamental` first,
/// `Arbitrary` last. The numeric codes follow the historical ECHO
/// numbering (000, 100, 200, 300).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MaskClass {
    /// Hardware or physical exclusions supplied from outside.
    Fundamental,
    /// Readout anomalies: subarray restriction and value trims.
    Anomalous,
    /// Soft value thresholds.
    Soft,
    /// User-chosen geometric and statistical filters.
    Arbitrary,
}

impl MaskClass {
    /// All classes, in application order.
    pub const ALL: [MaskClass; 4] = [
        MaskClass::Fundamental,
        MaskClass::Anomalous,
        MaskClass::Soft,
        MaskClass::Arbitrary,
    ];

    /// Historical ECHO class code.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            MaskClass::Fundamental => 0,
            MaskClass::Anomalous => 100,
            MaskClass::Soft => 200,
            MaskClass::Arbitrary => 300,
        }
    }

    /// Lowercase class name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MaskClass::Fundamental => "fundamental",
            MaskClass::Anomalous => "anomalous",
            MaskClass::Soft => "soft",
            MaskClass::Arbitrary => "arbitrary",
        }
    }
}

impl fmt::Display for MaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MaskClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "fundamental" | "echo-000" | "echo000" => Ok(MaskClass::Fundamental),
            "anomalous" | "echo-100" | "echo100" => Ok(MaskClass::Anomalous),
            "soft" | "echo-200" | "echo200" => Ok(MaskClass::Soft),
            "arbitrary" | "echo-300" | "echo300" => Ok(MaskClass::Arbitrary),
            _ => Err(format!("unknown mask class `{s}`")),
        }
    }
}
