use std::fmt::Write as _;

/// Horizontal anchoring of a text run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAnchor {
    Start,
    Middle,
}

impl HAnchor {
    fn as_svg(self) -> &'static str {
        match self {
            HAnchor::Start => "start",
            HAnchor::Middle => "middle",
        }
    }
}

/// Styled text run, vertically centered on `y`.
#[derive(Clone, Copy, Debug)]
pub struct TextStyle {
    pub font_size: f32,
    pub rgb: [u8; 3],
    pub alpha: u8,
    pub anchor: HAnchor,
}

/// Escape text for use inside SVG character data or attribute values.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Approximate advance width of `text` in a proportional sans face.
///
/// Layout happens before glyph shaping, so wrapping uses per-character width classes
/// rather than real font metrics.
pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .map(|c| {
            let em = match c {
                ' ' => 0.28,
                'i' | 'j' | 'l' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' => 0.28,
                'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.38,
                'm' | 'w' | 'M' | 'W' => 0.85,
                c if c.is_ascii_uppercase() || c.is_ascii_digit() => 0.64,
                c if c.is_ascii() => 0.55,
                // CJK and other wide scripts.
                _ => 1.0,
            };
            em * font_size
        })
        .sum()
}

/// Greedy word wrap to `max_width`. A single word wider than the limit gets its own line.
pub fn wrap_words(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate_width = estimate_text_width(&current, font_size)
            + estimate_text_width(" ", font_size)
            + estimate_text_width(word, font_size);
        if candidate_width > max_width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Height of one line of text (ascent + descent) for a font size.
pub fn line_height(font_size: f32) -> f32 {
    (font_size * 1.17).round()
}

/// Append one `<text>` element centered vertically on `y`.
pub fn push_text(svg: &mut String, x: f32, y: f32, text: &str, style: TextStyle) {
    // Shift from the visual center to the alphabetic baseline.
    let baseline = y + style.font_size * 0.35;
    let [r, g, b] = style.rgb;
    let _ = write!(
        svg,
        r#"<text x="{x:.1}" y="{baseline:.1}" font-family="sans-serif" font-size="{size}" fill="rgb({r},{g},{b})" fill-opacity="{alpha:.4}" text-anchor="{anchor}">{body}</text>"#,
        size = style.font_size,
        alpha = f32::from(style.alpha) / 255.0,
        anchor = style.anchor.as_svg(),
        body = escape_xml(text),
    );
}

/// Append wrapped text whose block is vertically centered on `y`.
///
/// Lines are spaced at 1.5x the line height.
pub fn push_wrapped_text(
    svg: &mut String,
    x: f32,
    y: f32,
    max_width: f32,
    text: &str,
    style: TextStyle,
) -> usize {
    let lines = wrap_words(text, max_width, style.font_size);
    let lh = line_height(style.font_size);
    let step = lh * 1.5;
    let total = step * lines.len() as f32;
    let first = y - (total / 2.0).floor() + (lh / 2.0).floor();
    for (i, line) in lines.iter().enumerate() {
        push_text(svg, x, first + step * i as f32, line, style);
    }
    lines.len()
}

#[cfg(test)]
#[path = "../../tests/unit/layout/text.rs"]
mod tests;
