//! Advance widths for the two standard Type1 faces cards are set in.
//!
//! Widths are in 1000ths of an em, indexed by code point from 0x20 to 0x7E,
//! as published in the Adobe core-font AFM files.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Width used for anything outside printable ASCII.
const FALLBACK_WIDTH: u16 = 556;

impl Font {
    /// The PostScript name written into the PDF font dictionary.
    pub fn base_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn parse(name: &str) -> Option<Font> {
        match name {
            "Helvetica" => Some(Font::Helvetica),
            "Helvetica-Bold" => Some(Font::HelveticaBold),
            _ => None,
        }
    }

    /// Height above the baseline, in 1000ths of an em.
    pub fn ascent(&self) -> f32 {
        718.0
    }

    /// Depth below the baseline, in 1000ths of an em (negative).
    pub fn descent(&self) -> f32 {
        -207.0
    }

    fn glyph_width(&self, c: char) -> u16 {
        let table = match self {
            Font::Helvetica => &HELVETICA,
            Font::HelveticaBold => &HELVETICA_BOLD,
        };
        let code = c as u32;
        if (0x20..=0x7E).contains(&code) {
            table[(code - 0x20) as usize]
        } else {
            FALLBACK_WIDTH
        }
    }
}

/// Width of `text` set in `font` at `size` points.
pub fn string_width(text: &str, font: Font, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| font.glyph_width(c) as u32).sum();
    units as f32 * size / 1000.0
}
