//! Declarative configuration of a viewer.
//!
//! The host describes a viewer through string attributes (`model-url`,
//! `background`, ...). [`ViewConfig`] is the parsed form. Unparseable values
//! never surface as errors: they are logged and replaced by the documented
//! default, so a typo in markup can't break the page.

use std::fmt;

use wgpu::Color;

use crate::error::AttributeError;

pub const DEFAULT_WIDTH: &str = "100%";
pub const DEFAULT_HEIGHT: &str = "300px";
pub const DEFAULT_ROTATE_SPEED: f32 = 0.005;
pub const DEFAULT_SCALE: f32 = 1.0;

/// The attributes a viewer reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    Width,
    Height,
    ModelUrl,
    Background,
    AutoRotate,
    RotateSpeed,
    Scale,
}

impl Attribute {
    pub const ALL: [Attribute; 7] = [
        Attribute::Width,
        Attribute::Height,
        Attribute::ModelUrl,
        Attribute::Background,
        Attribute::AutoRotate,
        Attribute::RotateSpeed,
        Attribute::Scale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Width => "width",
            Attribute::Height => "height",
            Attribute::ModelUrl => "model-url",
            Attribute::Background => "background",
            Attribute::AutoRotate => "auto-rotate",
            Attribute::RotateSpeed => "rotate-speed",
            Attribute::Scale => "scale",
        }
    }

    /// Attribute names are matched case-insensitively like HTML attributes.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the viewer clears its surface with.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Background {
    #[default]
    Transparent,
    Colour(Color),
}

impl Background {
    pub fn clear_colour(&self) -> Color {
        match self {
            Background::Transparent => Color::TRANSPARENT,
            Background::Colour(colour) => *colour,
        }
    }

    /// Parses a CSS-style colour.
    ///
    /// Accepts `transparent`, `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(r, g, b)`, `rgba(r, g, b, a)` and a handful of named colours.
    pub fn parse(value: &str) -> Result<Self, AttributeError> {
        let value = value.trim().to_ascii_lowercase();
        if value.is_empty() || value == "transparent" {
            return Ok(Background::Transparent);
        }
        let invalid = || AttributeError::InvalidColour(value.clone());
        let rgba = if let Some(hex) = value.strip_prefix('#') {
            parse_hex(hex).ok_or_else(invalid)?
        } else if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
        {
            let args = args.strip_suffix(')').ok_or_else(invalid)?;
            parse_rgb_function(args).ok_or_else(invalid)?
        } else {
            named_colour(&value).ok_or_else(invalid)?
        };
        Ok(Background::Colour(Color {
            r: rgba[0],
            g: rgba[1],
            b: rgba[2],
            a: rgba[3],
        }))
    }
}

fn parse_hex(hex: &str) -> Option<[f64; 4]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let channels: Vec<u8> = match hex.len() {
        3 | 4 => (0..hex.len())
            .map(|i| digit(i).map(|d| d * 17))
            .collect::<Option<_>>()?,
        6 | 8 => (0..hex.len() / 2)
            .map(|i| pair(i * 2))
            .collect::<Option<_>>()?,
        _ => return None,
    };
    let alpha = channels.get(3).copied().unwrap_or(255);
    Some([
        channels[0] as f64 / 255.0,
        channels[1] as f64 / 255.0,
        channels[2] as f64 / 255.0,
        alpha as f64 / 255.0,
    ])
}

fn parse_rgb_function(args: &str) -> Option<[f64; 4]> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let mut rgba = [0.0, 0.0, 0.0, 1.0];
    for (i, part) in parts.iter().enumerate().take(3) {
        let channel: f64 = part.parse().ok()?;
        if !(0.0..=255.0).contains(&channel) {
            return None;
        }
        rgba[i] = channel / 255.0;
    }
    if let Some(alpha) = parts.get(3) {
        let alpha: f64 = alpha.parse().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        rgba[3] = alpha;
    }
    Some(rgba)
}

fn named_colour(name: &str) -> Option<[f64; 4]> {
    let rgb: [u8; 3] = match name {
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "navy" => [0, 0, 128],
        _ => return None,
    };
    Some([
        rgb[0] as f64 / 255.0,
        rgb[1] as f64 / 255.0,
        rgb[2] as f64 / 255.0,
        1.0,
    ])
}

/// Parses a finite float attribute.
pub fn parse_number(name: &'static str, value: &str) -> Result<f32, AttributeError> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| AttributeError::InvalidNumber {
            name,
            value: value.to_string(),
        })?;
    if !parsed.is_finite() {
        return Err(AttributeError::OutOfRange {
            name,
            value: parsed,
        });
    }
    Ok(parsed)
}

/// Parsed attribute state of one viewer. Read every frame, written only
/// through [`ViewConfig::apply`].
#[derive(Clone, Debug, PartialEq)]
pub struct ViewConfig {
    pub width: String,
    pub height: String,
    pub model_url: Option<String>,
    pub background: Background,
    pub auto_rotate: bool,
    pub rotate_speed: f32,
    pub scale: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH.to_string(),
            height: DEFAULT_HEIGHT.to_string(),
            model_url: None,
            background: Background::Transparent,
            auto_rotate: false,
            rotate_speed: DEFAULT_ROTATE_SPEED,
            scale: DEFAULT_SCALE,
        }
    }
}

impl ViewConfig {
    /// Builds a configuration from `(name, value)` pairs. Unknown names are ignored.
    pub fn from_attributes<'a, I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (name, value) in attributes {
            if let Some(attribute) = Attribute::from_name(name) {
                config.apply(attribute, Some(value));
            }
        }
        config
    }

    /**
     * Stores a new attribute value. `None` means the attribute was removed and
     * restores the default. Returns `true` if the parsed value changed.
     */
    pub fn apply(&mut self, attribute: Attribute, value: Option<&str>) -> bool {
        let before = self.clone();
        match attribute {
            Attribute::Width => {
                self.width = non_empty(value).unwrap_or(DEFAULT_WIDTH).to_string();
            }
            Attribute::Height => {
                self.height = non_empty(value).unwrap_or(DEFAULT_HEIGHT).to_string();
            }
            Attribute::ModelUrl => {
                self.model_url = non_empty(value).map(str::to_string);
            }
            Attribute::Background => {
                self.background = value
                    .map(|v| {
                        Background::parse(v).unwrap_or_else(|e| {
                            log::warn!("{}, falling back to a transparent background.", e);
                            Background::Transparent
                        })
                    })
                    .unwrap_or_default();
            }
            // boolean attribute: presence means enabled, whatever the value
            Attribute::AutoRotate => self.auto_rotate = value.is_some(),
            Attribute::RotateSpeed => {
                self.rotate_speed = value
                    .map(|v| {
                        parse_number("rotate-speed", v).unwrap_or_else(|e| {
                            log::warn!("{}, using {}.", e, DEFAULT_ROTATE_SPEED);
                            DEFAULT_ROTATE_SPEED
                        })
                    })
                    .unwrap_or(DEFAULT_ROTATE_SPEED);
            }
            Attribute::Scale => {
                self.scale = value
                    .map(|v| {
                        parse_number("scale", v)
                            .and_then(|scale| {
                                if scale > 0.0 {
                                    Ok(scale)
                                } else {
                                    Err(AttributeError::OutOfRange {
                                        name: "scale",
                                        value: scale,
                                    })
                                }
                            })
                            .unwrap_or_else(|e| {
                                log::warn!("{}, using {}.", e, DEFAULT_SCALE);
                                DEFAULT_SCALE
                            })
                    })
                    .unwrap_or(DEFAULT_SCALE);
            }
        }
        *self != before
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
