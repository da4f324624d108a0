//! Grid rasterization: downsample, classify every cell against the palette and
//! paint the enlarged, labelled blueprint.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use palette::Srgb;
use tracing::debug;

use crate::canvas::{Canvas, Label};
use crate::color::{distance_sq, is_opaque};
use crate::error::{BlueprintError, Result};
use crate::options::BlueprintOptions;
use crate::quantize::{build_palette_with, PaletteItem};

/// Smallest on-screen size of a grid cell, in output pixels.
const MIN_CELL_SCALE: u32 = 16;
/// Output width the cell scale aims for.
const TARGET_OUTPUT_SIDE: u32 = 1200;
const GRID_LINE_OPACITY: f32 = 0.15;
const LABEL_SIZE_RATIO: f32 = 0.4;

/// Palette id of every grid cell, row-major. Id 0 marks a transparent cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelIndexMap {
    width: u32,
    height: u32,
    ids: Vec<u32>,
}

impl PixelIndexMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Id at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.ids.get((y * self.width + x) as usize).copied()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }
}

/// A finished blueprint: the rendered raster and the palette it uses.
#[derive(Clone, Debug)]
pub struct Blueprint {
    pub image: RgbaImage,
    /// Entries that cover at least one cell, ascending by id.
    pub palette: Vec<PaletteItem>,
    pub resolution: u32,
    pub indices: PixelIndexMap,
}

impl Blueprint {
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        {
            let mut cursor = Cursor::new(&mut buf);
            self.image
                .write_to(&mut cursor, ImageFormat::Png)
                .map_err(BlueprintError::Encode)?;
        }
        Ok(buf)
    }
}

/// Decode `input` and render it as a `resolution × resolution` blueprint with
/// at most `max_colors` colors.
pub fn render(input: &[u8], resolution: u32, max_colors: usize) -> Result<Blueprint> {
    let img = image::load_from_memory(input).map_err(BlueprintError::Decode)?;
    render_image(&img, &BlueprintOptions::new(resolution, max_colors))
}

/// Render an already decoded raster. Callers re-rendering at a new
/// resolution pass the same source again.
pub fn render_image(source: &DynamicImage, options: &BlueprintOptions) -> Result<Blueprint> {
    let resolution = options.resolution;
    if resolution == 0 {
        return Err(BlueprintError::RenderTarget { width: 0, height: 0 });
    }

    let cells = downsample(&source.to_rgba8(), resolution, resolution);
    let mut palette = build_palette_with(&cells, &options.quantize());
    let indices = classify(&cells, &mut palette);

    let draft_len = palette.len();
    finalize_palette(&mut palette);
    debug!(resolution, draft = draft_len, used = palette.len(), "classified grid");

    let image = render_grid(&indices, &palette)?;

    Ok(Blueprint {
        image,
        palette,
        resolution,
        indices,
    })
}

/// Drop entries no cell was assigned to and order the rest by id. Ids are
/// kept as assigned, so gaps remain where entries were dropped.
pub fn finalize_palette(palette: &mut Vec<PaletteItem>) {
    palette.retain(|item| item.count > 0);
    palette.sort_by_key(|item| item.id);
}

/// Output pixels per grid cell.
pub fn cell_scale(resolution: u32) -> u32 {
    (TARGET_OUTPUT_SIDE / resolution.max(1)).max(MIN_CELL_SCALE)
}

// ------------------------------------------------------------
// Area-averaging downsample
// ------------------------------------------------------------

/// Source span `[start, end)` covered by destination index `i` when `len_in`
/// source pixels map onto `len_out` destination pixels.
#[inline(always)]
fn span(i: u32, len_in: u32, len_out: u32) -> (u32, u32) {
    let (i, n, m) = (i as u64, len_in as u64, len_out as u64);
    let start = i * n / m;
    let end = ((i + 1) * n).div_ceil(m);
    (start as u32, end.max(start + 1).min(n) as u32)
}

/// Resample to `out_w × out_h` by averaging every source pixel that overlaps
/// each destination cell. Color is averaged alpha-weighted so transparent
/// pixels do not darken their neighbours.
pub fn downsample(img: &RgbaImage, out_w: u32, out_h: u32) -> RgbaImage {
    let (in_w, in_h) = img.dimensions();

    // Fast path – no scaling required.
    if out_w == in_w && out_h == in_h {
        return img.clone();
    }
    if in_w == 0 || in_h == 0 {
        return RgbaImage::new(out_w, out_h);
    }

    let raw = img.as_raw();

    // --------------------------------------------------------
    // First pass: vertical reduction, premultiplied
    // --------------------------------------------------------
    let mut vertical: Vec<[f32; 4]> = vec![[0.0; 4]; (in_w * out_h) as usize];

    for x in 0..in_w {
        for y_out in 0..out_h {
            let (y_start, y_end) = span(y_out, in_h, out_h);
            let mut acc = [0f32; 4];
            for y in y_start..y_end {
                let idx = ((y * in_w + x) * 4) as usize;
                let a = raw[idx + 3] as f32;
                acc[0] += raw[idx] as f32 * a;
                acc[1] += raw[idx + 1] as f32 * a;
                acc[2] += raw[idx + 2] as f32 * a;
                acc[3] += a;
            }
            let n = (y_end - y_start) as f32;
            vertical[(y_out * in_w + x) as usize] = acc.map(|v| v / n);
        }
    }

    // --------------------------------------------------------
    // Second pass: horizontal reduction, then unpremultiply
    // --------------------------------------------------------
    let mut out = RgbaImage::new(out_w, out_h);

    for y_out in 0..out_h {
        for x_out in 0..out_w {
            let (x_start, x_end) = span(x_out, in_w, out_w);
            let mut acc = [0f32; 4];
            for x in x_start..x_end {
                let pix = vertical[(y_out * in_w + x) as usize];
                for c in 0..4 {
                    acc[c] += pix[c];
                }
            }
            let n = (x_end - x_start) as f32;
            let alpha = acc[3] / n;
            let channel = |sum: f32| {
                if acc[3] > 0.0 {
                    (sum / acc[3]).round().clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            };
            out.put_pixel(
                x_out,
                y_out,
                Rgba([
                    channel(acc[0]),
                    channel(acc[1]),
                    channel(acc[2]),
                    alpha.round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }

    out
}

// ------------------------------------------------------------
// Classification
// ------------------------------------------------------------

/// Assign every opaque cell the id of its nearest palette entry and tally
/// `count` on that entry. Ties go to the entry listed first.
pub fn classify(cells: &RgbaImage, palette: &mut [PaletteItem]) -> PixelIndexMap {
    let colors: Vec<Srgb<u8>> = palette.iter().map(PaletteItem::color).collect();
    let mut ids = Vec::with_capacity((cells.width() * cells.height()) as usize);

    for px in cells.pixels() {
        let [r, g, b, a] = px.0;
        if !is_opaque(a) || colors.is_empty() {
            ids.push(0);
            continue;
        }
        let sample = Srgb::new(r, g, b);
        let mut best_idx = 0usize;
        let mut best_dist = u32::MAX;
        for (i, &c) in colors.iter().enumerate() {
            let dist = distance_sq(sample, c);
            if dist < best_dist {
                best_dist = dist;
                best_idx = i;
            }
        }
        palette[best_idx].count += 1;
        ids.push(palette[best_idx].id);
    }

    PixelIndexMap {
        width: cells.width(),
        height: cells.height(),
        ids,
    }
}

// ------------------------------------------------------------
// Blueprint painting
// ------------------------------------------------------------

/// Paint the enlarged grid: white base, one filled and outlined square per
/// opaque cell, labelled with its palette id. `palette` must be sorted by id.
pub fn render_grid(indices: &PixelIndexMap, palette: &[PaletteItem]) -> Result<RgbaImage> {
    let scale = cell_scale(indices.width().max(indices.height()));
    let mut canvas = Canvas::new(
        indices.width() as u64 * scale as u64,
        indices.height() as u64 * scale as u64,
    )?;
    canvas.fill(Srgb::new(255, 255, 255));

    // one label per palette entry, reused for every cell it covers
    let font_size = LABEL_SIZE_RATIO * scale as f32;
    let labels = palette
        .iter()
        .map(|item| Label::render(&item.id.to_string(), scale, font_size, item.text_color.hex()))
        .collect::<Result<Vec<_>>>()?;

    let width = indices.width() as usize;
    for (i, &id) in indices.ids().iter().enumerate() {
        if id == 0 {
            continue;
        }
        let Ok(slot) = palette.binary_search_by_key(&id, |item| item.id) else {
            continue;
        };
        let (px, py) = ((i % width) as u32 * scale, (i / width) as u32 * scale);
        canvas.fill_cell(px, py, scale, palette[slot].color());
        canvas.outline_cell(px, py, scale, GRID_LINE_OPACITY);
        canvas.stamp(&labels[slot], px, py);
    }

    Ok(canvas.into_image())
}
