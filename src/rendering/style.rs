//! Inline `style` attribute parsing
//!
//! Compositions are styled with inline declarations only. This covers the
//! handful of properties the layout understands: lengths in px or percent,
//! hex/rgb()/named colors and a few keywords.

use image::Rgba;

/// Parsed `style="..."` declarations, later entries winning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(style: &str) -> Self {
        let declarations = style
            .split(';')
            .filter_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().trim_end_matches("!important").trim();
                if name.is_empty() || value.is_empty() {
                    None
                } else {
                    Some((name, value.to_string()))
                }
            })
            .collect();
        Self { declarations }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn length(&self, name: &str) -> Option<Length> {
        self.get(name).and_then(Length::parse)
    }

    pub fn color(&self, name: &str) -> Option<Rgba<u8>> {
        self.get(name).and_then(parse_color)
    }

    /// `background-color`, or the first color token of the `background`
    /// shorthand.
    pub fn background(&self) -> Option<Rgba<u8>> {
        self.color("background-color").or_else(|| {
            self.get("background")?
                .split_whitespace()
                .find_map(parse_color)
        })
    }

    pub fn is_hidden(&self) -> bool {
        self.get("display")
            .is_some_and(|d| d.eq_ignore_ascii_case("none"))
    }

    pub fn is_absolute(&self) -> bool {
        self.get("position")
            .is_some_and(|p| p.eq_ignore_ascii_case("absolute") || p.eq_ignore_ascii_case("fixed"))
    }

    pub fn text_align(&self) -> Option<TextAlign> {
        match self.get("text-align")?.to_ascii_lowercase().as_str() {
            "left" | "start" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" | "end" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

/// Largest length, in logical pixels, a declaration resolves to
pub const MAX_LENGTH: u32 = 1 << 20;

/// A CSS length the layout can resolve
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f32),
    Percent(f32),
}

impl Length {
    /// Accepts `12px`, `12` (px) and `50%`. `auto` and other units yield
    /// `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let parsed = if let Some(pct) = value.strip_suffix('%') {
            Length::Percent(pct.trim().parse().ok()?)
        } else {
            let px = value.strip_suffix("px").unwrap_or(value);
            Length::Px(px.trim().parse().ok()?)
        };
        match parsed {
            Length::Px(v) | Length::Percent(v) if !v.is_finite() => None,
            other => Some(other),
        }
    }

    /// Pixels for this length against `base`, clamped to `0..=MAX_LENGTH`.
    pub fn resolve(self, base: u32) -> u32 {
        let v = match self {
            Length::Px(px) => px as f64,
            Length::Percent(pct) => base as f64 * pct as f64 / 100.0,
        };
        v.clamp(0.0, MAX_LENGTH as f64).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()` and a
/// small set of named colors.
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim().to_ascii_lowercase();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(args);
    }
    let named = match value.as_str() {
        "transparent" => [0, 0, 0, 0],
        "black" => [0, 0, 0, 255],
        "white" => [255, 255, 255, 255],
        "red" => [255, 0, 0, 255],
        "green" => [0, 128, 0, 255],
        "blue" => [0, 0, 255, 255],
        "gray" | "grey" => [128, 128, 128, 255],
        "yellow" => [255, 255, 0, 255],
        "orange" => [255, 165, 0, 255],
        _ => return None,
    };
    Some(Rgba(named))
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

fn parse_rgb_function(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        let v: f32 = s.parse().ok()?;
        Some(v.clamp(0.0, 255.0).round() as u8)
    };
    let alpha = match parts.get(3) {
        Some(a) => {
            let v: f32 = match a.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => a.parse().ok()?,
            };
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}
