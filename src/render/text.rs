use crate::render::metrics::{string_width, Font};

/// Leading used for body paragraphs, as a multiple of the font size.
pub const LEADING: f32 = 1.2;

pub const ELLIPSIS: &str = "...";

/// Keep the first `max_words` words of `text`; when anything was dropped the
/// result ends in an ellipsis.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    let mut short = words[..max_words].join(" ");
    short.push_str(ELLIPSIS);
    short
}

/// Greedy word wrap measured with the font's advance widths. A word wider
/// than the line is broken between characters so no line overflows.
pub fn wrap_text(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let space = string_width(" ", font, size);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for word in text.split_whitespace() {
        let tail: String;
        let mut word = word;
        let mut word_width = string_width(word, font, size);
        if word_width > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut pieces = break_word(word, font, size, max_width);
            tail = pieces.pop().unwrap_or_default();
            word = &tail;
            word_width = string_width(word, font, size);
            lines.extend(pieces);
        }
        if current.is_empty() {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + space + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += space + word_width;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split a word into the longest runs of characters that fit `max_width`.
/// A run always holds at least one character.
fn break_word(word: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        piece.push(c);
        if piece.chars().count() > 1 && string_width(&piece, font, size) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

fn widest_word(text: &str, font: Font, size: f32) -> f32 {
    text.split_whitespace()
        .map(|word| string_width(word, font, size))
        .fold(0.0, f32::max)
}

/// A paragraph laid out at a concrete size.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub lines: Vec<String>,
    pub size: f32,
    pub leading: f32,
}

impl FittedText {
    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.leading
    }
}

/// Smallest scale the shrink loop will go to before clipping lines instead.
const MIN_SCALE: f32 = 0.3;
const SCALE_STEP: f32 = 0.05;

/// Lay out `text` in a `width × height` box, shrinking the font in 5% steps
/// until the wrapped paragraph fits and every word fits on a line whole. At
/// the minimum scale overlong words are broken and trailing lines dropped, so
/// the result never overflows the box in either direction.
pub fn shrink_to_fit(text: &str, font: Font, size: f32, width: f32, height: f32) -> FittedText {
    let mut scale = 1.0_f32;
    loop {
        let scaled = size * scale;
        let fitted = FittedText {
            lines: wrap_text(text, font, scaled, width),
            size: scaled,
            leading: scaled * LEADING,
        };
        if fitted.height() <= height && widest_word(text, font, scaled) <= width {
            return fitted;
        }
        if scale - SCALE_STEP < MIN_SCALE {
            let keep = (height / fitted.leading).floor().max(0.0) as usize;
            return FittedText {
                lines: fitted.lines.into_iter().take(keep).collect(),
                ..fitted
            };
        }
        scale -= SCALE_STEP;
    }
}

/// Shorten `text` with a trailing ellipsis until it fits on one line.
pub fn fit_line(text: &str, font: Font, size: f32, max_width: f32) -> String {
    if string_width(text, font, size) <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate = format!("{}{ELLIPSIS}", chars.iter().collect::<String>().trim_end());
        if string_width(&candidate, font, size) <= max_width {
            return candidate;
        }
    }
    String::new()
}
