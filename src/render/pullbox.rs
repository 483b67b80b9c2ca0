//! The numbered checkbox-plus-rule used to tally how often a card was pulled
//! back out of progress:
//!
//! ```text
//! leading:   [ 1 ]   ______________
//! trailing:  ______________   [ 1 ]
//! ```

use crate::render::metrics::{string_width, Font};
use crate::render::page::{Color, Page};

/// Gap between box and rule, as a fraction of the total width.
const SPACING_RATIO: f32 = 0.05;
const LINE_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Box on the left, rule to its right.
    Leading,
    /// Box on the right, rule to its left.
    Trailing,
}

const DEFAULT_FONT_SIZE: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullBoxSpec {
    pub total_width: f32,
    pub total_height: f32,
    pub ordinal: u32,
    pub alignment: Alignment,
    pub font: Font,
    pub font_size: f32,
}

/// Positions along the widget, relative to its bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PullBoxGeometry {
    pub box_start: f32,
    pub box_side: f32,
    pub rule_start: f32,
    pub rule_end: f32,
    pub number_x: f32,
    pub number_y: f32,
}

impl PullBoxSpec {
    pub fn new(total_width: f32, total_height: f32, ordinal: u32, alignment: Alignment) -> Self {
        Self {
            total_width,
            total_height,
            ordinal,
            alignment,
            font: Font::Helvetica,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn layout(&self) -> PullBoxGeometry {
        let box_side = self.total_height;
        let spacing = self.total_width * SPACING_RATIO;
        let rule_width = self.total_width - spacing - box_side;

        let (box_start, rule_start, rule_end) = match self.alignment {
            Alignment::Leading => (0.0, box_side + spacing, self.total_width),
            Alignment::Trailing => (self.total_width - box_side, 0.0, rule_width),
        };

        // Digits sit on the baseline, so only the ascent matters. The ascent
        // is scaled by the width of "M" rather than the font size; existing
        // cards are calibrated against this approximation of the em height.
        let number = self.ordinal.to_string();
        let m_width = string_width("M", self.font, self.font_size);
        let number_height = self.font.ascent() * m_width / 1000.0;
        let number_width = string_width(&number, self.font, self.font_size);

        PullBoxGeometry {
            box_start,
            box_side,
            rule_start,
            rule_end,
            number_x: box_start + box_side / 2.0 - number_width / 2.0,
            number_y: box_side / 2.0 - number_height / 2.0,
        }
    }

    /// Draw with the widget's bottom-left corner at (x, y).
    pub fn draw(&self, page: &mut Page, x: f32, y: f32) {
        let g = self.layout();
        page.rect(
            x + g.box_start,
            y,
            g.box_side,
            g.box_side,
            None,
            Some((Color::BLACK, LINE_WIDTH)),
        );
        page.line(
            (x + g.rule_start, y),
            (x + g.rule_end, y),
            Color::BLACK,
            LINE_WIDTH,
        );
        page.text(
            x + g.number_x,
            y + g.number_y,
            self.ordinal.to_string(),
            self.font,
            self.font_size,
            Color::LIGHT_GREY,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::page::DrawOp;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn leading_box_then_rule() {
        let (w, h) = (200.0, 20.0);
        let g = PullBoxSpec::new(w, h, 1, Alignment::Leading).layout();

        assert!(approx(g.box_start, 0.0));
        assert!(approx(g.box_start + g.box_side, h));
        assert!(approx(g.rule_start, h + 0.05 * w));
        assert!(approx(g.rule_end, w));
    }

    #[test]
    fn trailing_rule_then_box() {
        let (w, h) = (200.0, 20.0);
        let g = PullBoxSpec::new(w, h, 1, Alignment::Trailing).layout();

        assert!(approx(g.box_start, w - h));
        assert!(approx(g.box_start + g.box_side, w));
        assert!(approx(g.rule_start, 0.0));
        assert!(approx(g.rule_end, w - h - 0.05 * w));
    }

    #[test]
    fn geometry_holds_across_sizes() {
        for &(w, h) in &[(50.0_f32, 5.0_f32), (157.2, 10.8), (400.0, 40.0)] {
            let lead = PullBoxSpec::new(w, h, 2, Alignment::Leading).layout();
            let trail = PullBoxSpec::new(w, h, 2, Alignment::Trailing).layout();
            // Rule length is the same on both sides.
            assert!(approx(lead.rule_end - lead.rule_start, trail.rule_end - trail.rule_start));
            assert!(approx(trail.rule_end + 0.05 * w, trail.box_start));
        }
    }

    #[test]
    fn number_is_centered_with_m_width_ascent() {
        let spec = PullBoxSpec::new(200.0, 20.0, 3, Alignment::Leading).with_font_size(10.0);
        let g = spec.layout();

        // "3" is 556/1000 em, "M" is 833/1000 em, ascent 718.
        let number_width = 5.56;
        let number_height = 718.0 * 8.33 / 1000.0;
        assert!(approx(g.number_x, 10.0 - number_width / 2.0));
        assert!(approx(g.number_y, 10.0 - number_height / 2.0));
    }

    #[test]
    fn number_defaults_to_eight_point_helvetica() {
        let spec = PullBoxSpec::new(200.0, 20.0, 1, Alignment::Leading);
        assert_eq!(spec.font, Font::Helvetica);
        assert_eq!(spec.font_size, 8.0);
    }

    #[test]
    fn trailing_number_sits_in_the_right_hand_box() {
        let g = PullBoxSpec::new(200.0, 20.0, 1, Alignment::Trailing)
            .with_font_size(10.0)
            .layout();
        assert!(g.number_x > 180.0 && g.number_x < 200.0);
    }

    #[test]
    fn draw_offsets_by_origin() {
        let mut page = Page::new(360.0, 216.0);
        PullBoxSpec::new(100.0, 10.0, 1, Alignment::Leading).draw(&mut page, 20.0, 30.0);

        match &page.ops()[0] {
            DrawOp::Rect { x, y, width, height, .. } => {
                assert!(approx(*x, 20.0));
                assert!(approx(*y, 30.0));
                assert!(approx(*width, 10.0));
                assert!(approx(*height, 10.0));
            }
            other => panic!("expected box, got {other:?}"),
        }
        match &page.ops()[1] {
            DrawOp::Line { from, to, .. } => {
                assert!(approx(from.0, 35.0));
                assert!(approx(to.0, 120.0));
            }
            other => panic!("expected rule, got {other:?}"),
        }
        assert_eq!(page.texts().collect::<Vec<_>>(), vec!["1"]);
    }
}
