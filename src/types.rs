use geo::MultiPolygon;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Position of a region in its map's load order. Unique within one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionId(pub usize);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    pub color: Color,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}: expected #RRGGBB, #RGB, black or white")]
pub struct ColorParseError(pub String);

/// 24-bit RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const AZURE: Color = Color::rgb(0x00, 0x7F, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "black" => return Ok(Color::BLACK),
            "white" => return Ok(Color::WHITE),
            _ => {}
        }

        let err = || ColorParseError(s.to_string());
        let hex = trimmed.strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        match hex.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
                Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                // #RGB expands each nibble, so #0AF == #00AAFF
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| err())
                };
                Ok(Color::rgb(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#007FFF".parse::<Color>().unwrap(), Color::AZURE);
        assert_eq!("#ff9933".parse::<Color>().unwrap(), Color::rgb(0xFF, 0x99, 0x33));
        assert_eq!("#0AF".parse::<Color>().unwrap(), Color::rgb(0x00, 0xAA, 0xFF));
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!("black".parse::<Color>().unwrap(), Color::BLACK);
        assert_eq!("White".parse::<Color>().unwrap(), Color::WHITE);
    }

    #[test]
    fn rejects_garbage() {
        assert!("007FFF".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("red".parse::<Color>().is_err());
    }

    #[test]
    fn displays_as_uppercase_hex() {
        assert_eq!(Color::rgb(0xFF, 0x00, 0x3F).to_string(), "#FF003F");
    }
}
