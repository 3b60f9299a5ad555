/*!
 * Color representation used throughout the pipeline.
 *
 * String parsing (`"#RRGGBB"`, named colors, ...) is treated as an injected
 * utility rather than core logic — see [`ColorParser`] — since it is an
 * external collaborator the context may call rather than something this
 * module needs to implement itself.
 */

use serde::{Deserialize, Serialize};

/// RGBA color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const RED: Color = Color { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const GREEN: Color = Color { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };
    pub const BLUE: Color = Color { r: 0.0, g: 0.0, b: 1.0, a: 1.0 };
    pub const TRANSPARENT: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Quantized `[u8; 4]` for pixel-buffer comparisons, as used by the
    /// software backend's test assertions.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

impl From<[f32; 4]> for Color {
    fn from(arr: [f32; 4]) -> Self {
        Self { r: arr[0], g: arr[1], b: arr[2], a: arr[3] }
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.to_array()
    }
}

/// A fill or stroke style: either unset (no paint) or a concrete color.
pub type ColorOrNull = Option<Color>;

/// Injected color-string parser. The core never hard-codes a CSS color
/// grammar; [`BasicColorParser`] is the default used by standalone
/// construction and the test suite.
pub trait ColorParser: std::fmt::Debug {
    fn parse(&self, text: &str) -> Option<Color>;
}

/// Parses `#RGB`, `#RRGGBB`, `#RRGGBBAA`, and a handful of CSS-style names.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicColorParser;

impl ColorParser for BasicColorParser {
    fn parse(&self, text: &str) -> Option<Color> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex);
        }
        named_color(text)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let expand = |c: char| -> Option<u8> {
        let v = c.to_digit(16)? as u8;
        Some(v * 16 + v)
    };
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();

    match hex.len() {
        3 => {
            let mut chars = hex.chars();
            let r = expand(chars.next()?)?;
            let g = expand(chars.next()?)?;
            let b = expand(chars.next()?)?;
            Some(rgb8(r, g, b, 255))
        }
        6 => {
            let r = byte(&hex[0..2])?;
            let g = byte(&hex[2..4])?;
            let b = byte(&hex[4..6])?;
            Some(rgb8(r, g, b, 255))
        }
        8 => {
            let r = byte(&hex[0..2])?;
            let g = byte(&hex[2..4])?;
            let b = byte(&hex[4..6])?;
            let a = byte(&hex[6..8])?;
            Some(rgb8(r, g, b, a))
        }
        _ => None,
    }
}

fn rgb8(r: u8, g: u8, b: u8, a: u8) -> Color {
    Color::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    )
}

fn named_color(name: &str) -> Option<Color> {
    match name.to_ascii_lowercase().as_str() {
        "white" => Some(Color::WHITE),
        "black" => Some(Color::BLACK),
        "red" => Some(Color::RED),
        "green" => Some(Color::GREEN),
        "blue" => Some(Color::BLUE),
        "transparent" => Some(Color::TRANSPARENT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_six_digit_hex() {
        let c = BasicColorParser.parse("#FF0000").unwrap();
        assert_eq!(c.to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn parses_three_digit_hex() {
        let c = BasicColorParser.parse("#0f0").unwrap();
        assert_eq!(c.to_rgba8(), [0, 255, 0, 255]);
    }

    #[test]
    fn parses_eight_digit_hex_with_alpha() {
        let c = BasicColorParser.parse("#0000ff80").unwrap();
        assert_eq!(c.to_rgba8(), [0, 0, 255, 128]);
    }

    #[test]
    fn parses_named_colors() {
        assert_eq!(BasicColorParser.parse("blue").unwrap().to_rgba8(), [0, 0, 255, 255]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(BasicColorParser.parse("not-a-color").is_none());
    }
}
