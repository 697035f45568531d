use crate::{
    Result,
    constants::{LED_RING_OBJECT_PATH, PI_HAT_OBJECT_PATH, PRO_HAT_OBJECT_PATH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of add-on board served by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardKind {
    /// Speaker LED ring (10 RGB LEDs).
    #[default]
    LedRing,
    /// Pi hat with LED ring and power button.
    PiHat,
    /// Pro hat with battery monitor and power button.
    ProHat,
}

impl BoardKind {
    /// Bus object path at which the board service is published.
    #[must_use]
    pub fn object_path(&self) -> &'static str {
        match self {
            Self::LedRing => LED_RING_OBJECT_PATH,
            Self::PiHat => PI_HAT_OBJECT_PATH,
            Self::ProHat => PRO_HAT_OBJECT_PATH,
        }
    }

    /// Human-readable resource name used in log lines.
    #[must_use]
    pub fn resource_name(&self) -> &'static str {
        match self {
            Self::LedRing => "LED ring",
            Self::PiHat => "Pi hat",
            Self::ProHat => "pro hat",
        }
    }

    /// Whether the board carries an addressable LED ring.
    #[must_use]
    pub fn has_leds(&self) -> bool {
        matches!(self, Self::LedRing | Self::PiHat)
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::LedRing => "led_ring",
            Self::PiHat => "pi_hat",
            Self::ProHat => "pro_hat",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for BoardKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "led_ring" | "speaker_led" => Ok(Self::LedRing),
            "pi_hat" => Ok(Self::PiHat),
            "pro_hat" | "ck2_pro_hat" => Ok(Self::ProHat),
            other => Err(Error::UnknownBoard(other.to_string())),
        }
    }
}
