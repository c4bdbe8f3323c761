//! Packed ARGB colors

use crate::result::ColorError;
use std::fmt;
use std::str::FromStr;

/// A packed `0xAARRGGBB` color.
///
/// Script literals are either `#RRGGBB` (opaque), `#AARRGGBB`, or a signed or
/// unsigned packed integer such as `-65536` or `4294901760`.
///
/// # Examples
///
/// ```
/// use autoscript::Color;
///
/// let red: Color = "#FF0000".parse().unwrap();
/// assert_eq!(red.argb(), 0xFFFF0000);
/// assert_eq!("-65536".parse::<Color>().unwrap(), red);
/// assert!(red.matches(Color::from_argb(0xFFFA0305), 5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u32);

impl Color {
    /// Wrap a packed value.
    pub fn from_argb(argb: u32) -> Self {
        Color(argb)
    }

    /// Opaque color from channels.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// The packed value.
    pub fn argb(self) -> u32 {
        self.0
    }

    /// Red channel
    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// Green channel
    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Blue channel
    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Compare against a sampled pixel.
    ///
    /// With `tolerance == 0` the packed values must be identical. Otherwise
    /// each of the red, green and blue channels may differ by at most
    /// `tolerance`.
    pub fn matches(self, other: Color, tolerance: u8) -> bool {
        if tolerance == 0 {
            return self == other;
        }
        let close = |a: u8, b: u8| a.abs_diff(b) <= tolerance;
        close(self.red(), other.red())
            && close(self.green(), other.green())
            && close(self.blue(), other.blue())
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let value =
                u32::from_str_radix(hex, 16).map_err(|_| ColorError::InvalidHex(s.to_string()))?;
            return match hex.len() {
                6 => Ok(Color(0xFF00_0000 | value)),
                8 => Ok(Color(value)),
                _ => Err(ColorError::InvalidHex(s.to_string())),
            };
        }
        if let Ok(signed) = s.parse::<i32>() {
            return Ok(Color(signed as u32));
        }
        s.parse::<u32>()
            .map(Color)
            .map_err(|_| ColorError::Invalid(s.to_string()))
    }
}

impl fmt::Display for Color {
    /// `#RRGGBB` for opaque colors, `#AARRGGBB` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >> 24 == 0xFF {
            write!(f, "#{:06X}", self.0 & 0x00FF_FFFF)
        } else {
            write!(f, "#{:08X}", self.0)
        }
    }
}
