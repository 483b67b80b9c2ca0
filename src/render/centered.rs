use crate::errors::RenderError;
use crate::render::metrics::{string_width, Font};
use crate::render::page::{AssetCache, Color, Page};
use crate::render::schema::{FieldDescriptor, FieldKind, Value, Values};
use crate::render::theme::INCH;
use crate::render::Renderer;

const FONTS: &[&str] = &["Helvetica", "Helvetica-Bold"];
const COLORS: &[&str] = &["Black", "Pink", "Red", "Blue", "Green", "Light Grey", "Dark Grey"];
const PAGE_SIZES: &[&str] = &["U.S. Letter", "U.S. Legal", "A4"];

/// Extra height allowance on the "M" em estimate, so descenders and accents
/// stay inside the centered band.
const EM_FUDGE: f32 = 1.3;

fn named_color(name: &str) -> Color {
    match name {
        "Pink" => Color::rgb(1.0, 0.753, 0.796),
        "Red" => Color::rgb(1.0, 0.0, 0.0),
        "Blue" => Color::rgb(0.0, 0.0, 1.0),
        "Green" => Color::rgb(0.0, 0.502, 0.0),
        "Light Grey" => Color::LIGHT_GREY,
        "Dark Grey" => Color::gray(0.663),
        _ => Color::BLACK,
    }
}

fn page_size(name: &str) -> (f32, f32) {
    match name {
        "U.S. Legal" => (8.5 * INCH, 14.0 * INCH),
        "A4" => (595.28, 841.89),
        _ => (8.5 * INCH, 11.0 * INCH),
    }
}

/// Vertical extent of a line of text, from the em estimate.
fn text_height(font: Font, size: f32) -> f32 {
    let m_width = string_width("M", font, size) * EM_FUDGE;
    (font.ascent() - font.descent()) * m_width / 1000.0
}

/// A single message printed in the middle of a full page.
pub struct CenteredRenderer;

impl Renderer for CenteredRenderer {
    fn name(&self) -> &'static str {
        "centered"
    }

    fn title(&self) -> &'static str {
        "Message Centered On a Page"
    }

    fn description(&self) -> &'static str {
        "Prints a message in the exact center of a page, inside configurable margins."
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        let margin = |name, title, default| {
            FieldDescriptor::new(name, title, FieldKind::Number)
                .describe("Inches")
                .range(0.0, 4.0)
                .default_value(Value::Number(default))
        };
        vec![
            FieldDescriptor::new("message", "Message", FieldKind::Text)
                .describe("Text to print in the center of the page")
                .required(),
            FieldDescriptor::new("font", "Font", FieldKind::Text)
                .describe("What font to use to render the text")
                .one_of(FONTS)
                .default_value(Value::Text("Helvetica".into())),
            FieldDescriptor::new("fontsize", "Font Size", FieldKind::Number)
                .describe("The font size to render the text in.")
                .range(4.0, 144.0)
                .default_value(Value::Number(24.0)),
            FieldDescriptor::new("color", "Text Color", FieldKind::Text)
                .describe("What color should the text be?")
                .one_of(COLORS)
                .default_value(Value::Text("Black".into())),
            FieldDescriptor::new("pagesize", "Page Size", FieldKind::Text)
                .describe("Select a size for the page to print on")
                .one_of(PAGE_SIZES)
                .default_value(Value::Text("U.S. Letter".into())),
            margin("margin_left", "Left Margin", 0.5),
            margin("margin_bottom", "Bottom Margin", 1.0),
            margin("margin_right", "Right Margin", 0.5),
            margin("margin_top", "Top Margin", 1.0),
        ]
    }

    fn render(&self, values: &Values, _assets: &AssetCache) -> Result<Page, RenderError> {
        let number = |name: &'static str| {
            values
                .number(name)
                .map(|n| n as f32)
                .ok_or(RenderError::BadValue(name))
        };
        let message = values.text("message").ok_or(RenderError::BadValue("message"))?;
        let font = values
            .text("font")
            .and_then(Font::parse)
            .ok_or(RenderError::BadValue("font"))?;
        let size = number("fontsize")?;
        let color = named_color(values.text("color").unwrap_or("Black"));
        let (width, height) = page_size(values.text("pagesize").unwrap_or_default());

        let left = number("margin_left")? * INCH;
        let bottom = number("margin_bottom")? * INCH;
        let frame_w = width - left - number("margin_right")? * INCH;
        let frame_h = height - bottom - number("margin_top")? * INCH;
        if frame_w <= 0.0 || frame_h <= 0.0 {
            return Err(RenderError::BadValue("margin_left"));
        }

        let mut page = Page::new(width, height);
        page.rect(left, bottom, frame_w, frame_h, None, Some((Color::LIGHT_GREY, 1.0)));

        let x = left + frame_w / 2.0 - string_width(message, font, size) / 2.0;
        let y = bottom + frame_h / 2.0 - text_height(font, size) / 2.0;
        page.text(x, y, message, font, size, color);
        Ok(page)
    }
}
