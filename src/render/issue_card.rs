use std::path::Path;

use crate::errors::RenderError;
use crate::model::card::CardModel;
use crate::render::metrics::{string_width, Font};
use crate::render::page::{AssetCache, Color, Page};
use crate::render::pullbox::{Alignment, PullBoxSpec};
use crate::render::schema::{FieldDescriptor, FieldKind, Value, Values};
use crate::render::text::{fit_line, shrink_to_fit, truncate_words, wrap_text, LEADING};
use crate::render::theme::{CardTheme, INCH, ISSUE_PRIORITIES, ISSUE_TYPES, UNKNOWN};
use crate::render::Renderer;

const HEADER_COLUMNS: [f32; 3] = [0.6 * INCH, 1.2 * INCH, 0.6 * INCH];
const CELL_PADDING: f32 = 3.0;
const ICON_SIZE: f32 = 0.4 * INCH;
const STACK_GAP: f32 = 2.0;
const BOX_LINE_WIDTH: f32 = 0.5;

const ID_SIZE: f32 = 18.0;
const TYPE_SIZE: f32 = 8.0;
const REPORTER_SIZE: f32 = 16.0;
const OPENED_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 12.0;
const BODY_GAP: f32 = 6.0;

const DETAIL_WORDS: usize = 50;

const WATERMARK_SIZE: f32 = 20.0;
const WATERMARK_ANGLE: f32 = 15.0;
/// Drop below the rotated anchor, in rotated coordinates.
const WATERMARK_DROP: f32 = 10.0;

const PULL_BOX_HEIGHT: f32 = 0.15 * INCH;
const PULL_BOX_FONT_SIZE: f32 = 8.0;
const PULL_ROW_PADDING: f32 = 3.0;
const PULL_COLUMN_GUTTER: f32 = 6.0;
const PULL_ROWS: u32 = 3;

/// Draws one issue onto a 5in × 3in index card.
pub struct IssueCardRenderer {
    theme: CardTheme,
}

impl IssueCardRenderer {
    pub fn new(theme: CardTheme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &CardTheme {
        &self.theme
    }

    pub fn render_card(&self, card: &CardModel, assets: &AssetCache) -> Result<Page, RenderError> {
        let t = &self.theme;
        let mut page = Page::new(t.page_width, t.page_height);
        let frame = Frame {
            x: t.margin,
            y: t.margin,
            width: t.page_width - 2.0 * t.margin,
            height: t.page_height - 2.0 * t.margin,
        };

        if card.border {
            page.rect(
                1.0,
                1.0,
                t.page_width - 2.0,
                t.page_height - 2.0,
                None,
                Some((Color::BLACK, BOX_LINE_WIDTH)),
            );
        }

        draw_watermarks(&mut page, &frame, t.margin);
        let footer_top = draw_footer(&mut page, &frame);
        let header_bottom = draw_header(&mut page, &frame, card, assets)?;
        draw_body(&mut page, &frame, card, header_bottom - BODY_GAP, footer_top);

        Ok(page)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Frame {
    fn top(&self) -> f32 {
        self.y + self.height
    }
}

fn draw_watermarks(page: &mut Page, frame: &Frame, margin: f32) {
    let (sin, cos) = WATERMARK_ANGLE.to_radians().sin_cos();
    let anchors = [
        ("INTERRUPTED", 2.0 * margin),
        ("BLOCKED", frame.width / 2.0 + 0.6 * INCH),
    ];
    for (label, x) in anchors {
        let y = 2.0 * margin;
        page.rotated_text(
            x + WATERMARK_DROP * sin,
            y - WATERMARK_DROP * cos,
            label,
            Font::HelveticaBold,
            WATERMARK_SIZE,
            Color::WATERMARK,
            WATERMARK_ANGLE,
        );
    }
}

/// Two columns of pull boxes pinned to the bottom of the frame. Returns the
/// footer's top edge.
fn draw_footer(page: &mut Page, frame: &Frame) -> f32 {
    let row_pitch = PULL_BOX_HEIGHT + 2.0 * PULL_ROW_PADDING;
    let footer_height = PULL_ROWS as f32 * row_pitch;
    let column_width = frame.width / 2.0 - PULL_COLUMN_GUTTER;
    let columns = [
        (frame.x, Alignment::Leading),
        (frame.x + frame.width / 2.0 + PULL_COLUMN_GUTTER, Alignment::Trailing),
    ];

    for (x, alignment) in columns {
        for ordinal in 1..=PULL_ROWS {
            let row_top = frame.y + footer_height - (ordinal - 1) as f32 * row_pitch;
            let y = row_top - PULL_ROW_PADDING - PULL_BOX_HEIGHT;
            PullBoxSpec::new(column_width, PULL_BOX_HEIGHT, ordinal, alignment)
                .with_font_size(PULL_BOX_FONT_SIZE)
                .draw(page, x, y);
        }
    }

    frame.y + footer_height
}

fn stack_height(first: f32, second: f32) -> f32 {
    first * LEADING + STACK_GAP + second * LEADING
}

/// Baseline for a line whose box starts at `line_top`.
fn baseline(line_top: f32, size: f32) -> f32 {
    line_top - size
}

/// Header band across the top of the frame. Returns its bottom edge.
fn draw_header(page: &mut Page, frame: &Frame, card: &CardModel, assets: &AssetCache) -> Result<f32, RenderError> {
    let [icon_w, id_w, priority_w] = HEADER_COLUMNS;
    let center_w = frame.width - icon_w - id_w - priority_w;

    let left_stack = stack_height(ID_SIZE, TYPE_SIZE);
    let center_stack = stack_height(REPORTER_SIZE, OPENED_SIZE);
    let inner = ICON_SIZE.max(left_stack).max(center_stack);
    let height = inner + 2.0 * CELL_PADDING;

    let top = frame.top();
    let bottom = top - height;
    page.rect(
        frame.x,
        bottom,
        frame.width,
        height,
        Some(card.accent),
        Some((Color::BLACK, BOX_LINE_WIDTH)),
    );

    let middle = bottom + height / 2.0;
    let icon_y = middle - ICON_SIZE / 2.0;

    // Type icon, left aligned.
    let x = frame.x;
    draw_icon(page, assets, card.type_icon.as_deref(), x + CELL_PADDING, icon_y)?;

    // Identifier over type, left aligned.
    let x = x + icon_w;
    let text_w = id_w - 2.0 * CELL_PADDING;
    let mut line_top = middle + left_stack / 2.0;
    page.text(
        x + CELL_PADDING,
        baseline(line_top, ID_SIZE),
        fit_line(&card.key, Font::HelveticaBold, ID_SIZE, text_w),
        Font::HelveticaBold,
        ID_SIZE,
        Color::BLACK,
    );
    line_top -= ID_SIZE * LEADING + STACK_GAP;
    page.text(
        x + CELL_PADDING,
        baseline(line_top, TYPE_SIZE),
        fit_line(&card.type_name, Font::Helvetica, TYPE_SIZE, text_w),
        Font::Helvetica,
        TYPE_SIZE,
        Color::BLACK,
    );

    // Reporter over opened date, centered.
    let x = x + id_w;
    let text_w = center_w - 2.0 * CELL_PADDING;
    let mut line_top = middle + center_stack / 2.0;
    let reporter = fit_line(&card.reporter_name, Font::Helvetica, REPORTER_SIZE, text_w);
    let reporter_w = string_width(&reporter, Font::Helvetica, REPORTER_SIZE);
    let reporter_x = x + (center_w - reporter_w) / 2.0;
    let reporter_y = baseline(line_top, REPORTER_SIZE);
    page.text(reporter_x, reporter_y, reporter, Font::Helvetica, REPORTER_SIZE, Color::BLACK);
    let underline_y = reporter_y - REPORTER_SIZE * 0.1;
    page.line(
        (reporter_x, underline_y),
        (reporter_x + reporter_w, underline_y),
        Color::BLACK,
        REPORTER_SIZE / 20.0,
    );
    line_top -= REPORTER_SIZE * LEADING + STACK_GAP;
    let opened = fit_line(&card.opened_label(), Font::HelveticaBold, OPENED_SIZE, text_w);
    let opened_w = string_width(&opened, Font::HelveticaBold, OPENED_SIZE);
    page.text(
        x + (center_w - opened_w) / 2.0,
        baseline(line_top, OPENED_SIZE),
        opened,
        Font::HelveticaBold,
        OPENED_SIZE,
        Color::BLACK,
    );

    // Priority icon, centered.
    let x = x + center_w;
    draw_icon(page, assets, card.priority_icon.as_deref(), x + (priority_w - ICON_SIZE) / 2.0, icon_y)?;

    Ok(bottom)
}

/// Without an icon directory a thin outline marks where the icon goes.
fn draw_icon(page: &mut Page, assets: &AssetCache, path: Option<&Path>, x: f32, y: f32) -> Result<(), RenderError> {
    match path {
        Some(path) => {
            let image = assets.image(path)?;
            page.image(image, x, y, ICON_SIZE, ICON_SIZE);
        }
        None => page.rect(x, y, ICON_SIZE, ICON_SIZE, None, Some((Color::BLACK, 0.25))),
    }
    Ok(())
}

/// Summary and detail between `top` and `floor`. Summary lines that would run
/// into the footer are dropped; the detail is shrunk to fit what remains, up
/// to a third of the frame.
fn draw_body(page: &mut Page, frame: &Frame, card: &CardModel, top: f32, floor: f32) {
    let leading = BODY_SIZE * LEADING;
    let mut cursor = top;

    for line in wrap_text(&card.summary, Font::HelveticaBold, BODY_SIZE, frame.width) {
        if cursor - leading < floor {
            break;
        }
        page.text(
            frame.x,
            baseline(cursor, BODY_SIZE),
            line,
            Font::HelveticaBold,
            BODY_SIZE,
            Color::BLACK,
        );
        cursor -= leading;
    }

    if card.detail.trim().is_empty() {
        return;
    }
    let available = (frame.height / 3.0).min(cursor - floor);
    if available <= 0.0 {
        return;
    }
    let excerpt = truncate_words(&card.detail, DETAIL_WORDS);
    let fitted = shrink_to_fit(&excerpt, Font::Helvetica, BODY_SIZE, frame.width, available);
    for line in fitted.lines {
        page.text(
            frame.x,
            baseline(cursor, fitted.size),
            line,
            Font::Helvetica,
            fitted.size,
            Color::BLACK,
        );
        cursor -= fitted.leading;
    }
}

impl Renderer for IssueCardRenderer {
    fn name(&self) -> &'static str {
        "issuecard"
    }

    fn title(&self) -> &'static str {
        "Generic Issue/Bug/Story"
    }

    fn description(&self) -> &'static str {
        "Renders a generic card that can be used for any bug tracking or other issue system."
    }

    fn fields(&self) -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("summary", "Summary", FieldKind::Text)
                .describe("A one-sentence description of the issue")
                .required(),
            FieldDescriptor::new("detail", "Details", FieldKind::LongText)
                .describe("Elaborated details about the issue."),
            FieldDescriptor::new("issue_id", "Identifier", FieldKind::Text)
                .describe("A (probably) unique identifier that this issue is known by")
                .required(),
            FieldDescriptor::new("issue_type", "Issue Type", FieldKind::Text)
                .describe("The type of issue.")
                .one_of(&ISSUE_TYPES)
                .default_value(Value::Text(UNKNOWN.into())),
            FieldDescriptor::new("reporter", "Reporter", FieldKind::Text)
                .describe("The name of the person who reported this issue")
                .required(),
            FieldDescriptor::new("date", "Date", FieldKind::DateTime)
                .describe("The date/time that the issue was created, or modified")
                .required(),
            FieldDescriptor::new("priority", "Priority", FieldKind::Text)
                .describe("How urgent is this issue?")
                .one_of(&ISSUE_PRIORITIES)
                .default_value(Value::Text(UNKNOWN.into())),
            FieldDescriptor::new("border", "Draw Border?", FieldKind::Boolean)
                .describe("Should a border be drawn around the perimeter of the card?")
                .default_value(Value::Bool(true)),
        ]
    }

    fn render(&self, values: &Values, assets: &AssetCache) -> Result<Page, RenderError> {
        let text = |name: &'static str| values.text(name).ok_or(RenderError::BadValue(name));
        let type_name = text("issue_type")?.to_string();
        let priority_name = text("priority")?.to_string();

        let card = CardModel {
            key: text("issue_id")?.to_string(),
            summary: text("summary")?.to_string(),
            detail: values.text("detail").unwrap_or_default().to_string(),
            type_icon: self.theme.type_icon_path(&type_name),
            priority_icon: self.theme.priority_icon_path(&priority_name),
            accent: self.theme.accent_color(&priority_name),
            type_name,
            priority_name,
            reporter_name: text("reporter")?.to_string(),
            created: values.datetime("date").ok_or(RenderError::BadValue("date"))?,
            border: values.flag("border").unwrap_or(self.theme.border),
        };
        self.render_card(&card, assets)
    }
}
