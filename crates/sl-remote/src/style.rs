//! Vector layer styling
//!
//! [`StyleOptions`] is both the payload persisted with a project layer and
//! what the renderer receives. Colors are written as `"#rrggbb"` strings;
//! opacity is kept separate so the renderer can build a CSS `rgba()` value.
//!
//! Styles saved by the web client hold CSS `rgba(r, g, b, a)` colors and no
//! opacity fields. Those decode too: the alpha becomes the opacity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Style validation and parsing errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StyleError {
    /// Color string is not `#rrggbb`, `rgb()` or `rgba()`
    #[error("invalid color {0:?}: expected #rrggbb, rgb() or rgba()")]
    InvalidColor(String),

    /// Line width negative or not finite
    #[error("line width must be a finite number >= 0, got {0}")]
    InvalidLineWidth(f64),

    /// Opacity outside `[0, 1]`
    #[error("{field} must be within [0, 1], got {value}")]
    OpacityOutOfRange {
        /// Offending field name
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

/// RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Color {
    /// Create from channels
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS `rgba()` string at the given opacity
    #[must_use]
    pub fn to_css_rgba(self, opacity: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, opacity)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", hex::encode([self.r, self.g, self.b]))
    }
}

impl FromStr for Color {
    type Err = StyleError;

    /// Parse `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)`; any alpha is dropped
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_css(s).map(|(color, _)| color)
    }
}

/// Color and the alpha it carried, if any
fn parse_css(s: &str) -> Result<(Color, Option<f64>), StyleError> {
    let invalid = || StyleError::InvalidColor(s.to_string());
    let trimmed = s.trim();

    if let Some(digits) = trimmed.strip_prefix('#') {
        let bytes = hex::decode(digits).map_err(|_| invalid())?;
        return match bytes.as_slice() {
            [r, g, b] => Ok((Color::rgb(*r, *g, *b), None)),
            _ => Err(invalid()),
        };
    }

    let args = trimmed
        .strip_prefix("rgba(")
        .or_else(|| trimmed.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let channel = |raw: &str| raw.parse::<u8>().map_err(|_| invalid());
    let (rgb, alpha) = match parts.as_slice() {
        [r, g, b] => ((*r, *g, *b), None),
        [r, g, b, a] => {
            let alpha = a.parse::<f64>().map_err(|_| invalid())?;
            if !alpha.is_finite() {
                return Err(invalid());
            }
            ((*r, *g, *b), Some(alpha))
        }
        _ => return Err(invalid()),
    };
    let color = Color::rgb(channel(rgb.0)?, channel(rgb.1)?, channel(rgb.2)?);
    Ok((color, alpha))
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Color as stored, with its alpha kept for the opacity fields
#[derive(Debug, Clone, Copy)]
struct StoredColor {
    color: Color,
    alpha: Option<f64>,
}

impl<'de> Deserialize<'de> for StoredColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (color, alpha) = parse_css(&raw).map_err(serde::de::Error::custom)?;
        Ok(Self { color, alpha })
    }
}

/// Accepted shape of a stored style; missing values come from
/// [`StyleOptions::DEFAULT`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredStyle {
    fill_color: StoredColor,
    stroke_color: StoredColor,
    #[serde(default)]
    line_width: Option<f64>,
    #[serde(default)]
    fill_opacity: Option<f64>,
    #[serde(default)]
    stroke_opacity: Option<f64>,
}

impl From<StoredStyle> for StyleOptions {
    fn from(stored: StoredStyle) -> Self {
        let fallback = Self::DEFAULT;
        Self {
            fill_color: stored.fill_color.color,
            stroke_color: stored.stroke_color.color,
            line_width: stored.line_width.unwrap_or(fallback.line_width),
            fill_opacity: stored
                .fill_opacity
                .or(stored.fill_color.alpha)
                .unwrap_or(fallback.fill_opacity),
            stroke_opacity: stored
                .stroke_opacity
                .or(stored.stroke_color.alpha)
                .unwrap_or(fallback.stroke_opacity),
        }
    }
}

/// Fill/stroke style of a data layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredStyle")]
pub struct StyleOptions {
    /// Polygon fill color
    pub fill_color: Color,
    /// Outline color
    pub stroke_color: Color,
    /// Outline width in pixels
    pub line_width: f64,
    /// Fill opacity in `[0, 1]`
    pub fill_opacity: f64,
    /// Stroke opacity in `[0, 1]`
    pub stroke_opacity: f64,
}

impl StyleOptions {
    /// Style given to data layers that arrive without one
    ///
    /// Translucent blue fill with a stronger blue outline.
    pub const DEFAULT: Self = Self {
        fill_color: Color::rgb(59, 130, 246),
        stroke_color: Color::rgb(59, 130, 246),
        line_width: 1.0,
        fill_opacity: 0.2,
        stroke_opacity: 0.6,
    };

    /// Solid style in one color
    #[inline]
    #[must_use]
    pub fn solid(color: Color) -> Self {
        Self {
            fill_color: color,
            stroke_color: color,
            line_width: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
        }
    }

    /// With line width
    #[inline]
    #[must_use]
    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }

    /// With fill opacity
    #[inline]
    #[must_use]
    pub fn with_fill_opacity(mut self, opacity: f64) -> Self {
        self.fill_opacity = opacity;
        self
    }

    /// With stroke opacity
    #[inline]
    #[must_use]
    pub fn with_stroke_opacity(mut self, opacity: f64) -> Self {
        self.stroke_opacity = opacity;
        self
    }

    /// Check numeric ranges
    ///
    /// # Errors
    /// Returns the first out-of-range field.
    pub fn validate(&self) -> Result<(), StyleError> {
        if !self.line_width.is_finite() || self.line_width < 0.0 {
            return Err(StyleError::InvalidLineWidth(self.line_width));
        }
        check_opacity("fill_opacity", self.fill_opacity)?;
        check_opacity("stroke_opacity", self.stroke_opacity)
    }

    /// CSS fill value
    #[must_use]
    pub fn fill_css(&self) -> String {
        self.fill_color.to_css_rgba(self.fill_opacity)
    }

    /// CSS stroke value
    #[must_use]
    pub fn stroke_css(&self) -> String {
        self.stroke_color.to_css_rgba(self.stroke_opacity)
    }
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn check_opacity(field: &'static str, value: f64) -> Result<(), StyleError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StyleError::OpacityOutOfRange { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn color_parses_hex() {
        let c: Color = "#3b82f6".parse().unwrap();
        assert_eq!(c, Color::rgb(59, 130, 246));
        assert_eq!(c.to_string(), "#3b82f6");
    }

    #[test]
    fn color_rejects_garbage() {
        assert!("3b82f6".parse::<Color>().is_err());
        assert!("#3b82".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
        assert!("rgba(256, 0, 0, 1)".parse::<Color>().is_err());
        assert!("rgba(1, 2)".parse::<Color>().is_err());
        assert!("rgba(1, 2, 3, NaN)".parse::<Color>().is_err());
        assert!("rgb(1, 2, 3".parse::<Color>().is_err());
    }

    #[test]
    fn color_parses_css_functions() {
        assert_eq!("rgb(59, 130, 246)".parse::<Color>().unwrap(), Color::rgb(59, 130, 246));
        assert_eq!(
            parse_css(" rgba(255,0,0,0.5) ").unwrap(),
            (Color::rgb(255, 0, 0), Some(0.5))
        );
    }

    #[test]
    fn web_client_style_decodes_with_alpha_as_opacity() {
        let style: StyleOptions = serde_json::from_str(
            r#"{"fillColor":"rgba(59, 130, 246, 0.2)","strokeColor":"rgba(255, 0, 0, 1)","lineWidth":3}"#,
        )
        .unwrap();
        assert_eq!(style.fill_color, Color::rgb(59, 130, 246));
        assert_eq!(style.fill_opacity, 0.2);
        assert_eq!(style.stroke_color, Color::rgb(255, 0, 0));
        assert_eq!(style.stroke_opacity, 1.0);
        assert_eq!(style.line_width, 3.0);
    }

    #[test]
    fn missing_opacity_and_width_fall_back_to_default() {
        let style: StyleOptions =
            serde_json::from_str(r##"{"fillColor":"#ff0000","strokeColor":"rgb(0, 0, 0)"}"##).unwrap();
        assert_eq!(style.fill_opacity, StyleOptions::DEFAULT.fill_opacity);
        assert_eq!(style.stroke_opacity, StyleOptions::DEFAULT.stroke_opacity);
        assert_eq!(style.line_width, StyleOptions::DEFAULT.line_width);
    }

    #[test]
    fn explicit_opacity_beats_alpha() {
        let style: StyleOptions = serde_json::from_str(
            r#"{"fillColor":"rgba(0, 0, 0, 0.1)","strokeColor":"rgba(0, 0, 0, 0.1)","lineWidth":1,"fillOpacity":0.9,"strokeOpacity":0.8}"#,
        )
        .unwrap();
        assert_eq!(style.fill_opacity, 0.9);
        assert_eq!(style.stroke_opacity, 0.8);
    }

    #[test]
    fn default_style_css() {
        let style = StyleOptions::default();
        assert_eq!(style.fill_css(), "rgba(59, 130, 246, 0.2)");
        assert_eq!(style.stroke_css(), "rgba(59, 130, 246, 0.6)");
        assert!(style.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let red = StyleOptions::solid(Color::rgb(255, 0, 0));

        assert!(matches!(
            red.with_line_width(-1.0).validate(),
            Err(StyleError::InvalidLineWidth(_))
        ));
        assert!(matches!(
            red.with_fill_opacity(1.5).validate(),
            Err(StyleError::OpacityOutOfRange { field: "fill_opacity", .. })
        ));
        assert!(matches!(
            red.with_stroke_opacity(f64::NAN).validate(),
            Err(StyleError::OpacityOutOfRange { field: "stroke_opacity", .. })
        ));
    }

    #[test]
    fn style_wire_format_is_camel_case() {
        let json = serde_json::to_value(StyleOptions::default()).unwrap();
        assert_eq!(json["fillColor"], "#3b82f6");
        assert_eq!(json["lineWidth"], 1.0);
        assert_eq!(json["strokeOpacity"], 0.6);
    }

    #[test]
    fn written_style_reads_back() {
        let style = StyleOptions::solid(Color::rgb(1, 2, 3)).with_fill_opacity(0.4);
        let json = serde_json::to_string(&style).unwrap();
        assert_eq!(serde_json::from_str::<StyleOptions>(&json).unwrap(), style);
    }

    proptest! {
        #[test]
        fn any_color_survives_display_parse(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let c = Color::rgb(r, g, b);
            prop_assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
        }
    }
}
