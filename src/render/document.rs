use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str};

use crate::render::metrics::Font;
use crate::render::page::{Color, DrawOp, Page, RasterImage};
use crate::util::fsync::write_atomic;

const FONT_NAMES: [(Font, &[u8]); 2] = [(Font::Helvetica, b"F1"), (Font::HelveticaBold, b"F2")];

/// Pages accumulated in memory and written out in one go.
#[derive(Debug, Default)]
pub struct Document {
    pages: Vec<Page>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Write the document as a PDF, flushed to disk before returning.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        write_atomic(path, &self.to_pdf())
    }

    pub fn to_pdf(&self) -> Vec<u8> {
        let mut alloc = Ref::new(1);
        let catalog_id = alloc.bump();
        let tree_id = alloc.bump();
        let font_ids: Vec<(Font, &[u8], Ref)> = FONT_NAMES
            .iter()
            .map(|&(font, name)| (font, name, alloc.bump()))
            .collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);

        for &(font, _, id) in &font_ids {
            pdf.type1_font(id)
                .base_font(Name(font.base_name().as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
        }

        // Each distinct image is embedded once and referenced by every page.
        let mut image_ids: HashMap<*const RasterImage, (Ref, String)> = HashMap::new();
        for page in &self.pages {
            for op in page.ops() {
                if let DrawOp::Image { image, .. } = op {
                    let key = Arc::as_ptr(image);
                    if image_ids.contains_key(&key) {
                        continue;
                    }
                    let id = alloc.bump();
                    let mask_id = image.alpha.as_ref().map(|_| alloc.bump());
                    write_image(&mut pdf, id, mask_id, image);
                    image_ids.insert(key, (id, format!("Im{}", image_ids.len())));
                }
            }
        }

        let mut page_ids = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let page_id = alloc.bump();
            let content_id = alloc.bump();
            page_ids.push(page_id);

            let mut used_images: Vec<(&str, Ref)> = Vec::new();
            let mut content = Content::new();
            for op in page.ops() {
                if let DrawOp::Image { image, .. } = op {
                    if let Some((id, name)) = image_ids.get(&Arc::as_ptr(image)) {
                        if !used_images.iter().any(|(n, _)| *n == name.as_str()) {
                            used_images.push((name.as_str(), *id));
                        }
                        write_op(&mut content, op, name.as_bytes());
                    }
                } else {
                    write_op(&mut content, op, b"");
                }
            }
            pdf.stream(content_id, &content.finish());

            let mut pdf_page = pdf.page(page_id);
            pdf_page.media_box(Rect::new(0.0, 0.0, page.width, page.height));
            pdf_page.parent(tree_id);
            pdf_page.contents(content_id);
            let mut resources = pdf_page.resources();
            {
                let mut fonts = resources.fonts();
                for &(_, name, id) in &font_ids {
                    fonts.pair(Name(name), id);
                }
                fonts.finish();
            }
            if !used_images.is_empty() {
                let mut x_objects = resources.x_objects();
                for (name, id) in &used_images {
                    x_objects.pair(Name(name.as_bytes()), *id);
                }
                x_objects.finish();
            }
            resources.finish();
            pdf_page.finish();
        }

        pdf.pages(tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        pdf.finish()
    }
}

fn write_image(pdf: &mut Pdf, id: Ref, mask_id: Option<Ref>, image: &RasterImage) {
    let mut xobject = pdf.image_xobject(id, &image.rgb);
    xobject.width(image.width as i32);
    xobject.height(image.height as i32);
    xobject.color_space().device_rgb();
    xobject.bits_per_component(8);
    if let Some(mask_id) = mask_id {
        xobject.s_mask(mask_id);
    }
    xobject.finish();

    if let (Some(mask_id), Some(alpha)) = (mask_id, image.alpha.as_ref()) {
        let mut mask = pdf.image_xobject(mask_id, alpha);
        mask.width(image.width as i32);
        mask.height(image.height as i32);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask.finish();
    }
}

fn font_resource(font: Font) -> &'static [u8] {
    FONT_NAMES
        .iter()
        .find(|(f, _)| *f == font)
        .map(|(_, name)| *name)
        .unwrap_or(b"F1")
}

/// WinAnsi bytes for `text`; characters outside Latin-1 become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn write_op(content: &mut Content, op: &DrawOp, image_name: &[u8]) {
    match op {
        DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        } => {
            if let Some(Color { r, g, b }) = fill {
                content.set_fill_rgb(*r, *g, *b);
                content.rect(*x, *y, *width, *height);
                content.fill_nonzero();
            }
            if let Some((Color { r, g, b }, line_width)) = stroke {
                content.set_stroke_rgb(*r, *g, *b);
                content.set_line_width(*line_width);
                content.rect(*x, *y, *width, *height);
                content.stroke();
            }
        }
        DrawOp::Line {
            from,
            to,
            color,
            width,
        } => {
            content.set_stroke_rgb(color.r, color.g, color.b);
            content.set_line_width(*width);
            content.move_to(from.0, from.1);
            content.line_to(to.0, to.1);
            content.stroke();
        }
        DrawOp::Text {
            x,
            y,
            text,
            font,
            size,
            color,
            angle,
        } => {
            let (sin, cos) = angle.to_radians().sin_cos();
            content.set_fill_rgb(color.r, color.g, color.b);
            content.begin_text();
            content.set_font(Name(font_resource(*font)), *size);
            content.set_text_matrix([cos, sin, -sin, cos, *x, *y]);
            content.show(Str(&encode_win_ansi(text)));
            content.end_text();
        }
        DrawOp::Image {
            x,
            y,
            width,
            height,
            ..
        } => {
            content.save_state();
            content.transform([*width, 0.0, 0.0, *height, *x, *y]);
            content.x_object(Name(image_name));
            content.restore_state();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn empty_document_has_no_pages() {
        let doc = Document::new();
        assert!(doc.is_empty());
        let bytes = doc.to_pdf();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"/Count 0"));
    }

    #[test]
    fn pages_and_fonts_are_written() {
        let mut doc = Document::new();
        for key in ["CI-1", "CI-2"] {
            let mut page = Page::new(360.0, 216.0);
            page.text(10.0, 10.0, key, Font::HelveticaBold, 18.0, Color::BLACK);
            doc.push(page);
        }

        let bytes = doc.to_pdf();

        assert_eq!(doc.len(), 2);
        assert!(contains(&bytes, b"/Count 2"));
        assert!(contains(&bytes, b"/Helvetica-Bold"));
        assert!(contains(&bytes, b"/WinAnsiEncoding"));
        assert!(contains(&bytes, b"(CI-1)"));
        assert!(contains(&bytes, b"(CI-2)"));
    }

    #[test]
    fn shared_images_are_embedded_once() {
        let image = Arc::new(RasterImage {
            source: "icon.png".into(),
            width: 1,
            height: 1,
            rgb: vec![255, 0, 0],
            alpha: None,
        });
        let mut doc = Document::new();
        for _ in 0..3 {
            let mut page = Page::new(360.0, 216.0);
            page.image(image.clone(), 0.0, 0.0, 28.8, 28.8);
            doc.push(page);
        }

        let bytes = doc.to_pdf();

        assert_eq!(count(&bytes, b"/Subtype /Image"), 1);
        assert_eq!(count(&bytes, b"/Im0 Do"), 3);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(encode_win_ansi("Café ☕"), vec![b'C', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[test]
    fn save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.pdf");
        let mut doc = Document::new();
        doc.push(Page::new(360.0, 216.0));

        doc.save(&path).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF-"));
    }
}
