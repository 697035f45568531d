//! Colour type written to LED rings.

use serde::{Deserialize, Serialize};

/// RGB intensity of a single LED.
///
/// Each component is an intensity in `[0.0, 1.0]`. Values outside that range
/// (and NaN) are clamped on construction and on deserialization, so a driver
/// never sees them.
///
/// # Examples
///
/// ```
/// use hatd_hardware::Rgb;
///
/// let colour = Rgb::new(1.5, 0.25, -1.0);
/// assert_eq!(colour, Rgb::new(1.0, 0.25, 0.0));
/// assert_eq!(colour.r(), 1.0);
/// assert!(Rgb::OFF.is_off());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawRgb")]
pub struct Rgb {
    r: f64,
    g: f64,
    b: f64,
}

/// Wire shape of [`Rgb`] before clamping.
#[derive(Deserialize)]
struct RawRgb {
    r: f64,
    g: f64,
    b: f64,
}

impl From<RawRgb> for Rgb {
    fn from(raw: RawRgb) -> Self {
        Self::new(raw.r, raw.g, raw.b)
    }
}

impl Rgb {
    /// LED off.
    pub const OFF: Self = Self { r: 0.0, g: 0.0, b: 0.0 };

    /// Full white.
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0 };

    /// Create a colour, clamping each component into `[0.0, 1.0]`.
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
        }
    }

    /// Red intensity.
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Green intensity.
    pub fn g(&self) -> f64 {
        self.g
    }

    /// Blue intensity.
    pub fn b(&self) -> f64 {
        self.b
    }

    /// Whether all components are zero.
    pub fn is_off(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }
}

impl From<(f64, f64, f64)> for Rgb {
    fn from((r, g, b): (f64, f64, f64)) -> Self {
        Self::new(r, g, b)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_clamps_components() {
        assert_eq!(Rgb::new(2.0, -0.5, 0.5), Rgb::new(1.0, 0.0, 0.5));
        assert_eq!(Rgb::new(f64::NAN, 0.0, 0.0), Rgb::OFF);
    }

    #[test]
    fn test_rgb_from_tuple() {
        let colour: Rgb = (0.1, 0.2, 3.0).into();
        assert_eq!(colour, Rgb::new(0.1, 0.2, 1.0));
        assert_eq!(colour.b(), 1.0);
    }

    #[test]
    fn test_rgb_serialization() {
        let colour = Rgb::new(0.5, 0.0, 1.0);
        let json = serde_json::to_string(&colour).unwrap();
        assert_eq!(json, r#"{"r":0.5,"g":0.0,"b":1.0}"#);
        let deserialized: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(colour, deserialized);
    }

    #[test]
    fn test_rgb_deserialization_clamps() {
        let colour: Rgb = serde_json::from_str(r#"{"r":5.0,"g":-3.0,"b":0.5}"#).unwrap();
        assert_eq!(colour, Rgb::new(1.0, 0.0, 0.5));
        assert_eq!(colour.r(), 1.0);
        assert_eq!(colour.g(), 0.0);
    }
}
