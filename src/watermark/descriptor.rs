//! Watermark style descriptor
//!
//! A descriptor is a compact, comma separated list of `key:value` pairs:
//!
//! ```text
//! font:Helvetica, points:12, pos:bc, off:0 10, fillc:#808080, op:0.5, rot:0
//! ```
//!
//! Keys are case-insensitive and may be given in short or long form
//! (`pos`/`position`, `off`/`offset`, `fillc`/`fillcolor`, `op`/`opacity`,
//! `rot`/`rotation`). Keys that are left out keep their default value.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::metrics;

/// Descriptor applied to every uploaded PDF
pub const DEFAULT_DESCRIPTOR: &str =
    "font:Helvetica, points:12, pos:bc, off:0 10, fillc:#808080, op:0.5, rot:0";

/// Descriptor parse errors
#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("expected key:value, got '{0}'")]
    MissingSeparator(String),

    #[error("unknown descriptor key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be within {range}, got {value}")]
    OutOfRange {
        key: &'static str,
        range: &'static str,
        value: String,
    },

    #[error("unsupported font '{0}' (only the Helvetica family is available)")]
    UnsupportedFont(String),
}

type Result<T> = std::result::Result<T, DescriptorError>;

// ============================================================================
// Font
// ============================================================================

/// Standard Type1 fonts every PDF reader ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
}

impl StandardFont {
    /// PostScript name used as `/BaseFont`
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::HelveticaOblique => "Helvetica-Oblique",
            StandardFont::HelveticaBoldOblique => "Helvetica-BoldOblique",
        }
    }

    fn is_bold(self) -> bool {
        matches!(
            self,
            StandardFont::HelveticaBold | StandardFont::HelveticaBoldOblique
        )
    }

    /// Width of `text` in points when set at `size`
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|c| metrics::glyph_width(c, self.is_bold()) as u32)
            .sum();
        units as f32 * size / 1000.0
    }
}

impl FromStr for StandardFont {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "helvetica" => Ok(StandardFont::Helvetica),
            "helvetica-bold" => Ok(StandardFont::HelveticaBold),
            "helvetica-oblique" => Ok(StandardFont::HelveticaOblique),
            "helvetica-boldoblique" => Ok(StandardFont::HelveticaBoldOblique),
            _ => Err(DescriptorError::UnsupportedFont(s.trim().to_string())),
        }
    }
}

// ============================================================================
// Anchor
// ============================================================================

/// Where on the page the text box is anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

/// Horizontal part of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical part of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

impl Anchor {
    pub fn code(self) -> &'static str {
        match self {
            Anchor::TopLeft => "tl",
            Anchor::TopCenter => "tc",
            Anchor::TopRight => "tr",
            Anchor::Left => "l",
            Anchor::Center => "c",
            Anchor::Right => "r",
            Anchor::BottomLeft => "bl",
            Anchor::BottomCenter => "bc",
            Anchor::BottomRight => "br",
        }
    }

    pub fn alignment(self) -> (HAlign, VAlign) {
        match self {
            Anchor::TopLeft => (HAlign::Left, VAlign::Top),
            Anchor::TopCenter => (HAlign::Center, VAlign::Top),
            Anchor::TopRight => (HAlign::Right, VAlign::Top),
            Anchor::Left => (HAlign::Left, VAlign::Middle),
            Anchor::Center => (HAlign::Center, VAlign::Middle),
            Anchor::Right => (HAlign::Right, VAlign::Middle),
            Anchor::BottomLeft => (HAlign::Left, VAlign::Bottom),
            Anchor::BottomCenter => (HAlign::Center, VAlign::Bottom),
            Anchor::BottomRight => (HAlign::Right, VAlign::Bottom),
        }
    }
}

impl FromStr for Anchor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tl" => Ok(Anchor::TopLeft),
            "tc" => Ok(Anchor::TopCenter),
            "tr" => Ok(Anchor::TopRight),
            "l" => Ok(Anchor::Left),
            "c" => Ok(Anchor::Center),
            "r" => Ok(Anchor::Right),
            "bl" => Ok(Anchor::BottomLeft),
            "bc" => Ok(Anchor::BottomCenter),
            "br" => Ok(Anchor::BottomRight),
            _ => Err(DescriptorError::InvalidValue {
                key: "position",
                value: s.trim().to_string(),
            }),
        }
    }
}

// ============================================================================
// Colour
// ============================================================================

/// DeviceRGB fill colour, components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const GRAY: Rgb = Rgb {
        r: 128.0 / 255.0,
        g: 128.0 / 255.0,
        b: 128.0 / 255.0,
    };
}

impl FromStr for Rgb {
    type Err = DescriptorError;

    /// Accepts `#RRGGBB` or three space separated floats (`0.5 0.5 0.5`)
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || DescriptorError::InvalidValue {
            key: "fillcolor",
            value: s.to_string(),
        };

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map(|v| v as f32 / 255.0)
                    .map_err(|_| invalid())
            };
            return Ok(Rgb {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
            });
        }

        let parts: Vec<f32> = s
            .split_whitespace()
            .map(|p| p.parse::<f32>().map_err(|_| invalid()))
            .collect::<Result<_>>()?;
        match parts.as_slice() {
            [r, g, b] if [r, g, b].iter().all(|c| (0.0..=1.0).contains(*c)) => Ok(Rgb {
                r: *r,
                g: *g,
                b: *b,
            }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(f, "#{:02X}{:02X}{:02X}", byte(self.r), byte(self.g), byte(self.b))
    }
}

// ============================================================================
// Style
// ============================================================================

/// Parsed watermark descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    pub font: StandardFont,
    pub points: u32,
    pub position: Anchor,
    /// Horizontal and vertical offset from the anchor, y pointing up
    pub offset: (f32, f32),
    pub fill: Rgb,
    pub opacity: f32,
    /// Degrees, counter-clockwise
    pub rotation: f32,
    /// Stamp over the page content (true) or place it beneath (false)
    pub on_top: bool,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font: StandardFont::Helvetica,
            points: 12,
            position: Anchor::BottomCenter,
            offset: (0.0, 10.0),
            fill: Rgb::GRAY,
            opacity: 0.5,
            rotation: 0.0,
            on_top: true,
        }
    }
}

/// Per-request adjustments applied on top of the default descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOverrides {
    pub points: Option<u32>,
    pub opacity: Option<f32>,
    pub position: Option<Anchor>,
    pub rotation: Option<f32>,
    pub on_top: Option<bool>,
}

impl StyleOverrides {
    pub fn is_empty(&self) -> bool {
        *self == StyleOverrides::default()
    }
}

impl WatermarkStyle {
    /// Parse a descriptor; keys not present keep their default value.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut style = WatermarkStyle::default();

        for pair in descriptor.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| DescriptorError::MissingSeparator(pair.to_string()))?;

            match key.trim().to_ascii_lowercase().as_str() {
                "font" | "fontname" => style.font = value.parse()?,
                "points" => style.points = parse_points(value)?,
                "pos" | "position" => style.position = value.parse()?,
                "off" | "offset" => style.offset = parse_offset(value)?,
                "fillc" | "fillcolor" => style.fill = value.parse()?,
                "op" | "opacity" => style.opacity = parse_opacity(value)?,
                "rot" | "rotation" => style.rotation = parse_rotation(value)?,
                "ontop" => style.on_top = parse_flag("ontop", value)?,
                other => return Err(DescriptorError::UnknownKey(other.to_string())),
            }
        }

        Ok(style)
    }

    pub fn with_overrides(mut self, overrides: &StyleOverrides) -> Self {
        if let Some(points) = overrides.points {
            self.points = points;
        }
        if let Some(opacity) = overrides.opacity {
            self.opacity = opacity;
        }
        if let Some(position) = overrides.position {
            self.position = position;
        }
        if let Some(rotation) = overrides.rotation {
            self.rotation = rotation;
        }
        if let Some(on_top) = overrides.on_top {
            self.on_top = on_top;
        }
        self
    }
}

impl FromStr for WatermarkStyle {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self> {
        WatermarkStyle::parse(s)
    }
}

impl fmt::Display for WatermarkStyle {
    /// Canonical descriptor form; `ontop` is only written when it differs
    /// from the default so the stock descriptor renders unchanged.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "font:{}, points:{}, pos:{}, off:{} {}, fillc:{}, op:{}, rot:{}",
            self.font.base_font(),
            self.points,
            self.position.code(),
            self.offset.0,
            self.offset.1,
            self.fill,
            self.opacity,
            self.rotation,
        )?;
        if !self.on_top {
            write!(f, ", ontop:false")?;
        }
        Ok(())
    }
}

// ============================================================================
// Value parsers (shared with request field parsing)
// ============================================================================

pub fn parse_points(value: &str) -> Result<u32> {
    let value = value.trim();
    let points: u32 = value.parse().map_err(|_| DescriptorError::InvalidValue {
        key: "points",
        value: value.to_string(),
    })?;
    if !(1..=400).contains(&points) {
        return Err(DescriptorError::OutOfRange {
            key: "points",
            range: "1..=400",
            value: value.to_string(),
        });
    }
    Ok(points)
}

pub fn parse_opacity(value: &str) -> Result<f32> {
    let value = value.trim();
    let opacity: f32 = value.parse().map_err(|_| DescriptorError::InvalidValue {
        key: "opacity",
        value: value.to_string(),
    })?;
    if !(0.0..=1.0).contains(&opacity) {
        return Err(DescriptorError::OutOfRange {
            key: "opacity",
            range: "0..=1",
            value: value.to_string(),
        });
    }
    Ok(opacity)
}

pub fn parse_rotation(value: &str) -> Result<f32> {
    let value = value.trim();
    let rotation: f32 = value.parse().map_err(|_| DescriptorError::InvalidValue {
        key: "rotation",
        value: value.to_string(),
    })?;
    if !(-180.0..=180.0).contains(&rotation) {
        return Err(DescriptorError::OutOfRange {
            key: "rotation",
            range: "-180..=180",
            value: value.to_string(),
        });
    }
    Ok(rotation)
}

pub fn parse_flag(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        other => Err(DescriptorError::InvalidValue {
            key,
            value: other.to_string(),
        }),
    }
}

fn parse_offset(value: &str) -> Result<(f32, f32)> {
    let invalid = || DescriptorError::InvalidValue {
        key: "offset",
        value: value.trim().to_string(),
    };
    let mut parts = value.split_whitespace().map(|p| p.parse::<f32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(dx)), Some(Ok(dy)), None) if dx.is_finite() && dy.is_finite() => Ok((dx, dy)),
        _ => Err(invalid()),
    }
}
