use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::RenderError;
use crate::render::metrics::Font;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::gray(0.0);
    pub const WHITE: Color = Color::gray(1.0);
    /// Light grey used for pull-box numbers.
    pub const LIGHT_GREY: Color = Color::rgb(0.827, 0.827, 0.827);
    /// Fill for the rotated footer watermarks.
    pub const WATERMARK: Color = Color::gray(0.9);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: f32) -> Self {
        Self::rgb(level, level, level)
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color::rgb(
            channel(0)? as f32 / 255.0,
            channel(2)? as f32 / 255.0,
            channel(4)? as f32 / 255.0,
        ))
    }
}

/// Decoded raster image ready for embedding.
#[derive(Debug)]
pub struct RasterImage {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    /// 8-bit RGB samples, row-major.
    pub rgb: Vec<u8>,
    /// 8-bit alpha samples, present only when some pixel is not opaque.
    pub alpha: Option<Vec<u8>>,
}

impl RasterImage {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        if !path.is_file() {
            return Err(RenderError::MissingAsset {
                path: path.to_path_buf(),
            });
        }
        let decoded = image::open(path).map_err(|source| RenderError::DecodeAsset {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let alpha = alpha.iter().any(|&a| a != u8::MAX).then_some(alpha);

        Ok(Self {
            source: path.to_path_buf(),
            width,
            height,
            rgb,
            alpha,
        })
    }
}

/// Images decoded once per run and shared by every page that shows them.
#[derive(Default)]
pub struct AssetCache {
    images: Mutex<HashMap<PathBuf, Arc<RasterImage>>>,
}

impl AssetCache {
    pub fn image(&self, path: &Path) -> Result<Arc<RasterImage>, RenderError> {
        if let Some(image) = self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return Ok(image.clone());
        }
        let image = Arc::new(RasterImage::load(path)?);
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), image.clone());
        Ok(image)
    }
}

/// One drawing instruction. Coordinates are PDF points with the origin at the
/// bottom-left corner of the page.
#[derive(Debug, Clone)]
pub enum DrawOp {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Color>,
        stroke: Option<(Color, f32)>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        width: f32,
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        font: Font,
        size: f32,
        color: Color,
        /// Counter-clockwise rotation about (x, y), in degrees.
        angle: f32,
    },
    Image {
        image: Arc<RasterImage>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// A single page recorded as a display list.
#[derive(Debug, Clone)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    ops: Vec<DrawOp>,
}

impl Page {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, fill: Option<Color>, stroke: Option<(Color, f32)>) {
        self.ops.push(DrawOp::Rect {
            x,
            y,
            width,
            height,
            fill,
            stroke,
        });
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            width,
        });
    }

    pub fn text(&mut self, x: f32, y: f32, text: impl Into<String>, font: Font, size: f32, color: Color) {
        self.rotated_text(x, y, text, font, size, color, 0.0);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rotated_text(
        &mut self,
        x: f32,
        y: f32,
        text: impl Into<String>,
        font: Font,
        size: f32,
        color: Color,
        angle: f32,
    ) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            text: text.into(),
            font,
            size,
            color,
            angle,
        });
    }

    pub fn image(&mut self, image: Arc<RasterImage>, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::Image {
            image,
            x,
            y,
            width,
            height,
        });
    }

    /// All text drawn on the page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
