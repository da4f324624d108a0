//! Request-scoped drawing surface for the blueprint raster.
//!
//! Each render allocates its own [`Canvas`] on a `tiny_skia::Pixmap`, draws
//! into it and hands the finished [`RgbaImage`] back by value. Labels are
//! laid out as SVG text with the embedded font and rasterized by `resvg`.

use image::{Rgba, RgbaImage};
use palette::Srgb;
use resvg::usvg::{self, Transform};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke};

use crate::error::{BlueprintError, Result};
use crate::fonts::{self, LABEL_FONT_FAMILY};

/// Largest surface side we agree to allocate.
pub const MAX_SURFACE_SIDE: u64 = 32_767;

pub struct Canvas {
    pixmap: Pixmap,
}

/// A pre-rendered label, stamped onto every cell that carries it.
pub struct Label {
    sprite: Pixmap,
}

impl Canvas {
    /// Allocate a transparent surface, refusing empty or oversized targets.
    pub fn new(width: u64, height: u64) -> Result<Self> {
        if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(BlueprintError::RenderTarget { width, height });
        }
        let pixmap = Pixmap::new(width as u32, height as u32)
            .ok_or(BlueprintError::RenderTarget { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn fill(&mut self, color: Srgb<u8>) {
        self.pixmap
            .fill(Color::from_rgba8(color.red, color.green, color.blue, 255));
    }

    /// Opaque square, clipped to the surface.
    pub fn fill_cell(&mut self, x: u32, y: u32, side: u32, color: Srgb<u8>) {
        let Some(rect) = Rect::from_xywh(x as f32, y as f32, side as f32, side as f32) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.red, color.green, color.blue, 255);
        paint.anti_alias = false;
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// One-pixel black outline at `opacity`, covering the square's own border
    /// pixels.
    pub fn outline_cell(&mut self, x: u32, y: u32, side: u32, opacity: f32) {
        // stroke centred half a pixel in so the line lands on whole pixels
        let inset = side as f32 - 1.0;
        let Some(rect) = Rect::from_xywh(x as f32 + 0.5, y as f32 + 0.5, inset, inset) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, (opacity.clamp(0.0, 1.0) * 255.0).round() as u8);
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Composite `label` with its top-left corner at `(x, y)`.
    pub fn stamp(&mut self, label: &Label, x: u32, y: u32) {
        self.pixmap.draw_pixmap(
            x as i32,
            y as i32,
            label.sprite.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    pub fn into_image(self) -> RgbaImage {
        let (w, h) = (self.width(), self.height());
        let mut out = RgbaImage::new(w, h);
        for (dst, src) in out.pixels_mut().zip(self.pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }
}

impl Label {
    /// Lay out `text` centred in a transparent `side × side` square at
    /// `font_size` pixels.
    pub fn render(text: &str, side: u32, font_size: f32, color: &str) -> Result<Self> {
        let half = side as f32 / 2.0;
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{side}" height="{side}" viewBox="0 0 {side} {side}"><text x="{half}" y="{half}" font-family="{LABEL_FONT_FAMILY}" font-weight="bold" font-size="{font_size}" fill="{color}" text-anchor="middle" dominant-baseline="central">{text}</text></svg>"#
        );
        let options = usvg::Options {
            fontdb: fonts::database(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &options)
            .map_err(|e| BlueprintError::Label(e.to_string()))?;

        let mut sprite = Pixmap::new(side, side).ok_or(BlueprintError::RenderTarget {
            width: side as u64,
            height: side as u64,
        })?;
        resvg::render(&tree, Transform::identity(), &mut sprite.as_mut());
        Ok(Self { sprite })
    }
}

#[cfg(test)]
impl Label {
    /// Rows of the sprite that carry visible ink.
    pub fn ink_rows(&self) -> Option<(u32, u32)> {
        self.ink_span(|_, y| y)
    }

    /// Columns of the sprite that carry visible ink.
    pub fn ink_columns(&self) -> Option<(u32, u32)> {
        self.ink_span(|x, _| x)
    }

    fn ink_span(&self, axis: impl Fn(u32, u32) -> u32) -> Option<(u32, u32)> {
        let w = self.sprite.width();
        let mut span: Option<(u32, u32)> = None;
        for (i, px) in self.sprite.pixels().iter().enumerate() {
            if px.alpha() <= 128 {
                continue;
            }
            let v = axis(i as u32 % w, i as u32 / w);
            span = Some(match span {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        span
    }
}
