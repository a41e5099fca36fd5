//! Value parsers for directive arguments.
//!
//! Numbers and hex colours follow the lenient prefix rules of the settings
//! format: the longest valid prefix is used and trailing garbage is ignored.
//! A token without any valid prefix is an error, which [`Diagnostics`] turns
//! into a logged warning and a zero value.

use crate::{
    data_structures::color::Color,
    error::{SettingsIssue, ValueKind, ValueParseError},
};

/// Parses the longest float prefix of `token`, e.g. `"3.5"` -> `3.5`, `"2m"` -> `2.0`.
pub fn parse_number(token: &str) -> Result<f32, ValueParseError> {
    let trimmed = token.trim_start();
    let len = float_prefix_len(trimmed);
    trimmed[..len]
        .parse::<f32>()
        .ok()
        .filter(|n| !n.is_nan())
        .ok_or_else(|| ValueParseError {
            kind: ValueKind::Number,
            token: token.to_string(),
        })
}

fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return i + "Infinity".len();
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

/// Parses a hex colour such as `#FF0000` or `FF0000` into `0xFF0000`.
///
/// Only the low 32 bits are kept, so overlong values wrap instead of failing.
pub fn parse_hex(token: &str) -> Result<u32, ValueParseError> {
    let trimmed = token.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let len = digits
        .bytes()
        .take_while(|b| b.is_ascii_hexdigit())
        .count();
    let low = &digits[len.saturating_sub(8)..len];
    u32::from_str_radix(low, 16).map_err(|_| ValueParseError {
        kind: ValueKind::Hex,
        token: token.to_string(),
    })
}

/// Parses a CSS colour: `#rgb`, `#rrggbb`, `rgb(...)`, `rgba(...)`, `hsl(...)`, `hsla(...)` or a keyword.
pub fn parse_css_color(value: &str) -> Result<Color, ValueParseError> {
    let invalid = || ValueParseError {
        kind: ValueKind::Color,
        token: value.to_string(),
    };
    let value_lower = value.trim().to_ascii_lowercase();
    let v = value_lower.as_str();

    if let Some(hex) = v.strip_prefix('#') {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        return match hex.len() {
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16)
                    .map(Color::from_hex)
                    .map_err(|_| invalid())
            }
            6 => u32::from_str_radix(hex, 16)
                .map(Color::from_hex)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        };
    }

    if let Some(args) = functional_args(v, &["rgba", "rgb"]) {
        if args.len() < 3 {
            return Err(invalid());
        }
        let mut channels = [0.0; 3];
        for (channel, arg) in channels.iter_mut().zip(&args) {
            *channel = match arg.strip_suffix('%') {
                Some(percent) => percent.parse::<f32>().map_err(|_| invalid())? / 100.0,
                None => arg.parse::<f32>().map_err(|_| invalid())? / 255.0,
            }
            .clamp(0.0, 1.0);
        }
        return Ok(Color::new(channels[0], channels[1], channels[2]));
    }

    if let Some(args) = functional_args(v, &["hsla", "hsl"]) {
        if args.len() < 3 {
            return Err(invalid());
        }
        let h = args[0]
            .trim_end_matches("deg")
            .parse::<f32>()
            .map_err(|_| invalid())?;
        let percent = |s: &str| {
            s.strip_suffix('%')
                .and_then(|p| p.parse::<f32>().ok())
                .map(|p| (p / 100.0).clamp(0.0, 1.0))
        };
        let (Some(s), Some(l)) = (percent(args[1]), percent(args[2])) else {
            return Err(invalid());
        };
        return Ok(hsl_to_rgb(h, s, l));
    }

    named_color(v).map(Color::from_hex).ok_or_else(invalid)
}

/// Splits `name(a, b, c)` / `name(a b c)` into its arguments if `v` uses one of `names`.
fn functional_args<'a>(v: &'a str, names: &[&str]) -> Option<Vec<&'a str>> {
    let (name, rest) = v.split_once('(')?;
    if !names.contains(&name.trim()) {
        return None;
    }
    let inner = rest.strip_suffix(')')?;
    Some(
        inner
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> Color {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        return Color::new(l, l, l);
    }
    let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * 6.0 * (2.0 / 3.0 - t)
        } else {
            p
        }
    };
    Color::new(hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0))
}

/// CSS colour keywords, sorted by name.
const CSS_KEYWORDS: &[(&str, u32)] = &[
    ("aliceblue", 0xF0F8FF),
    ("antiquewhite", 0xFAEBD7),
    ("aqua", 0x00FFFF),
    ("aquamarine", 0x7FFFD4),
    ("azure", 0xF0FFFF),
    ("beige", 0xF5F5DC),
    ("bisque", 0xFFE4C4),
    ("black", 0x000000),
    ("blanchedalmond", 0xFFEBCD),
    ("blue", 0x0000FF),
    ("blueviolet", 0x8A2BE2),
    ("brown", 0xA52A2A),
    ("burlywood", 0xDEB887),
    ("cadetblue", 0x5F9EA0),
    ("chartreuse", 0x7FFF00),
    ("chocolate", 0xD2691E),
    ("coral", 0xFF7F50),
    ("cornflowerblue", 0x6495ED),
    ("cornsilk", 0xFFF8DC),
    ("crimson", 0xDC143C),
    ("cyan", 0x00FFFF),
    ("darkblue", 0x00008B),
    ("darkcyan", 0x008B8B),
    ("darkgoldenrod", 0xB8860B),
    ("darkgray", 0xA9A9A9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xA9A9A9),
    ("darkkhaki", 0xBDB76B),
    ("darkmagenta", 0x8B008B),
    ("darkolivegreen", 0x556B2F),
    ("darkorange", 0xFF8C00),
    ("darkorchid", 0x9932CC),
    ("darkred", 0x8B0000),
    ("darksalmon", 0xE9967A),
    ("darkseagreen", 0x8FBC8F),
    ("darkslateblue", 0x483D8B),
    ("darkslategray", 0x2F4F4F),
    ("darkslategrey", 0x2F4F4F),
    ("darkturquoise", 0x00CED1),
    ("darkviolet", 0x9400D3),
    ("deeppink", 0xFF1493),
    ("deepskyblue", 0x00BFFF),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1E90FF),
    ("firebrick", 0xB22222),
    ("floralwhite", 0xFFFAF0),
    ("forestgreen", 0x228B22),
    ("fuchsia", 0xFF00FF),
    ("gainsboro", 0xDCDCDC),
    ("ghostwhite", 0xF8F8FF),
    ("gold", 0xFFD700),
    ("goldenrod", 0xDAA520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xADFF2F),
    ("grey", 0x808080),
    ("honeydew", 0xF0FFF0),
    ("hotpink", 0xFF69B4),
    ("indianred", 0xCD5C5C),
    ("indigo", 0x4B0082),
    ("ivory", 0xFFFFF0),
    ("khaki", 0xF0E68C),
    ("lavender", 0xE6E6FA),
    ("lavenderblush", 0xFFF0F5),
    ("lawngreen", 0x7CFC00),
    ("lemonchiffon", 0xFFFACD),
    ("lightblue", 0xADD8E6),
    ("lightcoral", 0xF08080),
    ("lightcyan", 0xE0FFFF),
    ("lightgoldenrodyellow", 0xFAFAD2),
    ("lightgray", 0xD3D3D3),
    ("lightgreen", 0x90EE90),
    ("lightgrey", 0xD3D3D3),
    ("lightpink", 0xFFB6C1),
    ("lightsalmon", 0xFFA07A),
    ("lightseagreen", 0x20B2AA),
    ("lightskyblue", 0x87CEFA),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xB0C4DE),
    ("lightyellow", 0xFFFFE0),
    ("lime", 0x00FF00),
    ("limegreen", 0x32CD32),
    ("linen", 0xFAF0E6),
    ("magenta", 0xFF00FF),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66CDAA),
    ("mediumblue", 0x0000CD),
    ("mediumorchid", 0xBA55D3),
    ("mediumpurple", 0x9370DB),
    ("mediumseagreen", 0x3CB371),
    ("mediumslateblue", 0x7B68EE),
    ("mediumspringgreen", 0x00FA9A),
    ("mediumturquoise", 0x48D1CC),
    ("mediumvioletred", 0xC71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xF5FFFA),
    ("mistyrose", 0xFFE4E1),
    ("moccasin", 0xFFE4B5),
    ("navajowhite", 0xFFDEAD),
    ("navy", 0x000080),
    ("oldlace", 0xFDF5E6),
    ("olive", 0x808000),
    ("olivedrab", 0x6B8E23),
    ("orange", 0xFFA500),
    ("orangered", 0xFF4500),
    ("orchid", 0xDA70D6),
    ("palegoldenrod", 0xEEE8AA),
    ("palegreen", 0x98FB98),
    ("paleturquoise", 0xAFEEEE),
    ("palevioletred", 0xDB7093),
    ("papayawhip", 0xFFEFD5),
    ("peachpuff", 0xFFDAB9),
    ("peru", 0xCD853F),
    ("pink", 0xFFC0CB),
    ("plum", 0xDDA0DD),
    ("powderblue", 0xB0E0E6),
    ("purple", 0x800080),
    ("rebeccapurple", 0x663399),
    ("red", 0xFF0000),
    ("rosybrown", 0xBC8F8F),
    ("royalblue", 0x4169E1),
    ("saddlebrown", 0x8B4513),
    ("salmon", 0xFA8072),
    ("sandybrown", 0xF4A460),
    ("seagreen", 0x2E8B57),
    ("seashell", 0xFFF5EE),
    ("sienna", 0xA0522D),
    ("silver", 0xC0C0C0),
    ("skyblue", 0x87CEEB),
    ("slateblue", 0x6A5ACD),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xFFFAFA),
    ("springgreen", 0x00FF7F),
    ("steelblue", 0x4682B4),
    ("tan", 0xD2B48C),
    ("teal", 0x008080),
    ("thistle", 0xD8BFD8),
    ("tomato", 0xFF6347),
    ("turquoise", 0x40E0D0),
    ("violet", 0xEE82EE),
    ("wheat", 0xF5DEB3),
    ("white", 0xFFFFFF),
    ("whitesmoke", 0xF5F5F5),
    ("yellow", 0xFFFF00),
    ("yellowgreen", 0x9ACD32),
];

fn named_color(name: &str) -> Option<u32> {
    CSS_KEYWORDS
        .binary_search_by_key(&name, |&(keyword, _)| keyword)
        .ok()
        .map(|i| CSS_KEYWORDS[i].1)
}

/// Collects recoverable problems for one settings load and substitutes defaults.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    line: usize,
    issues: Vec<SettingsIssue>,
}

impl Diagnostics {
    pub(crate) fn at_line(&mut self, line: usize) {
        self.line = line;
    }

    pub(crate) fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn report(&mut self, issue: SettingsIssue) {
        match &issue {
            SettingsIssue::InvalidValue { .. } => log::warn!("{}", issue),
            _ => log::error!("{}", issue),
        }
        self.issues.push(issue);
    }

    fn invalid(&mut self, err: ValueParseError) {
        self.report(SettingsIssue::InvalidValue {
            line: self.line,
            kind: err.kind,
            token: err.token,
        });
    }

    /// A missing token is reported like an unparsable empty one.
    pub(crate) fn number(&mut self, token: Option<&str>) -> f32 {
        parse_number(token.unwrap_or("")).unwrap_or_else(|e| {
            self.invalid(e);
            0.0
        })
    }

    pub(crate) fn hex(&mut self, token: Option<&str>) -> u32 {
        parse_hex(token.unwrap_or("")).unwrap_or_else(|e| {
            self.invalid(e);
            0
        })
    }

    pub(crate) fn css_color(&mut self, value: &str) -> Color {
        parse_css_color(value).unwrap_or_else(|e| {
            self.invalid(e);
            Color::BLACK
        })
    }

    pub(crate) fn vector3(&mut self, tokens: &[&str]) -> [f32; 3] {
        [
            self.number(tokens.first().copied()),
            self.number(tokens.get(1).copied()),
            self.number(tokens.get(2).copied()),
        ]
    }

    pub(crate) fn invalid_shape(&mut self, token: &str) {
        self.invalid(ValueParseError {
            kind: ValueKind::Shape,
            token: token.to_string(),
        });
    }

    pub(crate) fn into_issues(self) -> Vec<SettingsIssue> {
        self.issues
    }
}
