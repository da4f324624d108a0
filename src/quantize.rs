//! Palette construction.
//!
//! Opaque pixels are bucketed into a histogram, the histogram is reduced by
//! repeatedly fusing its two closest colors, and the survivors become the
//! palette, most-used color first.

use std::collections::HashMap;

use image::RgbaImage;
use palette::Srgb;
use serde::Serialize;
use tracing::{debug, warn};

use crate::color::{bucket, distance_sq, is_opaque, text_color_for, to_hex, TextColor};

/// One bucketed color and how many pixels fell into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistogramEntry {
    pub color: Srgb<u8>,
    pub count: u32,
}

/// A palette color as handed to the UI layer.
///
/// `count` is zero straight out of [`build_palette`]; the rasterizer fills it
/// with the number of grid cells assigned to this entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteItem {
    pub id: u32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
    pub count: u32,
    pub text_color: TextColor,
}

impl PaletteItem {
    fn new(id: u32, color: Srgb<u8>) -> Self {
        Self {
            id,
            r: color.red,
            g: color.green,
            b: color.blue,
            hex: to_hex(color),
            count: 0,
            text_color: text_color_for(color),
        }
    }

    pub fn color(&self) -> Srgb<u8> {
        Srgb::new(self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantizeOptions {
    /// Upper bound on palette size. Zero yields an empty palette.
    pub max_colors: usize,
    /// Maximum number of pair merges. `None` merges until the palette fits;
    /// with a budget the palette may end up larger than `max_colors`.
    pub merge_limit: Option<usize>,
}

impl QuantizeOptions {
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors,
            merge_limit: None,
        }
    }
}

/// Build a palette of at most `max_colors` entries from the opaque pixels of
/// `pixels`. Ids start at 1 and follow descending pixel count.
pub fn build_palette(pixels: &RgbaImage, max_colors: usize) -> Vec<PaletteItem> {
    build_palette_with(pixels, &QuantizeOptions::new(max_colors))
}

pub fn build_palette_with(pixels: &RgbaImage, options: &QuantizeOptions) -> Vec<PaletteItem> {
    if options.max_colors == 0 {
        return Vec::new();
    }

    let mut entries = build_histogram(pixels);
    let distinct = entries.len();
    let merges = reduce(&mut entries, options.max_colors, options.merge_limit);
    debug!(distinct, merges, remaining = entries.len(), "reduced histogram");

    if entries.len() > options.max_colors {
        warn!(
            remaining = entries.len(),
            max_colors = options.max_colors,
            "merge budget exhausted before the palette fit"
        );
    }

    // Stable sort: equal counts keep histogram order.
    entries.sort_by(|a, b| b.count.cmp(&a.count));

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| PaletteItem::new(i as u32 + 1, entry.color))
        .collect()
}

/// Count opaque pixels per bucketed color, in order of first appearance.
pub fn build_histogram(pixels: &RgbaImage) -> Vec<HistogramEntry> {
    let mut entries: Vec<HistogramEntry> = Vec::new();
    let mut slots: HashMap<[u8; 3], usize> = HashMap::new();

    for px in pixels.pixels() {
        let [r, g, b, a] = px.0;
        if !is_opaque(a) {
            continue;
        }
        let color = bucket(Srgb::new(r, g, b));
        let key = [color.red, color.green, color.blue];
        match slots.get(&key) {
            Some(&i) => entries[i].count += 1,
            None => {
                slots.insert(key, entries.len());
                entries.push(HistogramEntry { color, count: 1 });
            }
        }
    }

    entries
}

/// Fuse nearest pairs until at most `max_colors` entries remain or the merge
/// budget runs out. Returns the number of merges performed.
pub fn reduce(
    entries: &mut Vec<HistogramEntry>,
    max_colors: usize,
    merge_limit: Option<usize>,
) -> usize {
    let mut merges = 0usize;

    while entries.len() > max_colors.max(1) {
        if merge_limit.is_some_and(|limit| merges >= limit) {
            break;
        }
        let Some((keep, gone)) = closest_pair(entries) else {
            break;
        };
        let absorbed = entries.remove(gone);
        let target = &mut entries[keep];
        target.color = weighted_mean(target, &absorbed);
        target.count += absorbed.count;
        merges += 1;
    }

    merges
}

/// Lowest-index pair at minimum distance; an exact duplicate ends the scan.
fn closest_pair(entries: &[HistogramEntry]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut best_dist = u32::MAX;

    'scan: for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let dist = distance_sq(entries[i].color, entries[j].color);
            if dist < best_dist {
                best_dist = dist;
                best = Some((i, j));
                if dist == 0 {
                    break 'scan;
                }
            }
        }
    }

    best
}

fn weighted_mean(a: &HistogramEntry, b: &HistogramEntry) -> Srgb<u8> {
    let (wa, wb) = (a.count as f64, b.count as f64);
    let total = wa + wb;
    let mix = |x: u8, y: u8| ((x as f64 * wa + y as f64 * wb) / total).round() as u8;
    Srgb::new(
        mix(a.color.red, b.color.red),
        mix(a.color.green, b.color.green),
        mix(a.color.blue, b.color.blue),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_tone(size: u32) -> RgbaImage {
        // top three quarters red, bottom quarter blue
        RgbaImage::from_fn(size, size, |_, y| {
            if y < size * 3 / 4 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    fn entry(r: u8, g: u8, b: u8, count: u32) -> HistogramEntry {
        HistogramEntry {
            color: Srgb::new(r, g, b),
            count,
        }
    }

    #[test]
    fn histogram_skips_transparent_and_buckets() {
        let img = RgbaImage::from_fn(4, 1, |x, _| match x {
            0 => Rgba([10, 10, 10, 255]),
            1 => Rgba([9, 11, 10, 200]),
            2 => Rgba([200, 0, 0, 128]),
            _ => Rgba([40, 40, 40, 129]),
        });
        let hist = build_histogram(&img);
        assert_eq!(
            hist,
            vec![entry(8, 8, 8, 1), entry(8, 12, 8, 1), entry(40, 40, 40, 1)]
        );
    }

    #[test]
    fn two_colors_fit_without_merging() {
        let palette = build_palette(&two_tone(64), 32);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette[0].id, 1);
        assert_eq!(palette[0].color(), Srgb::new(255, 0, 0));
        assert_eq!(palette[1].id, 2);
        assert_eq!(palette[1].color(), Srgb::new(0, 0, 255));
        assert!(palette.iter().all(|p| p.count == 0));
    }

    #[test]
    fn single_slot_takes_weighted_average() {
        let palette = build_palette(&two_tone(64), 1);
        assert_eq!(palette.len(), 1);
        assert_eq!(palette[0].color(), Srgb::new(191, 0, 64));
        assert_eq!(palette[0].hex, "#BF0040");
    }

    #[test]
    fn flat_image_is_bucketed() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([10, 10, 10, 255]));
        let palette = build_palette(&img, 8);
        assert_eq!(palette.len(), 1);
        assert_eq!(palette[0].color(), Srgb::new(8, 8, 8));
        assert_eq!(palette[0].text_color, TextColor::White);
    }

    #[test]
    fn transparent_or_zero_budget_is_empty() {
        let clear = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0]));
        assert!(build_palette(&clear, 16).is_empty());
        assert!(build_palette(&two_tone(8), 0).is_empty());
    }

    #[test]
    fn merges_closest_pair_first() {
        let mut hist = vec![
            entry(0, 0, 0, 1),
            entry(100, 100, 100, 3),
            entry(104, 100, 100, 1),
        ];
        let merges = reduce(&mut hist, 2, None);
        assert_eq!(merges, 1);
        assert_eq!(hist, vec![entry(0, 0, 0, 1), entry(101, 100, 100, 4)]);
    }

    #[test]
    fn equal_distances_merge_lowest_index_pair() {
        let mut hist = vec![
            entry(0, 0, 0, 1),
            entry(8, 0, 0, 1),
            entry(16, 0, 0, 1),
        ];
        reduce(&mut hist, 2, None);
        assert_eq!(hist, vec![entry(4, 0, 0, 2), entry(16, 0, 0, 1)]);
    }

    #[test]
    fn exact_duplicates_merge_immediately() {
        let mut hist = vec![
            entry(0, 0, 0, 1),
            entry(200, 0, 0, 1),
            entry(100, 0, 0, 2),
            entry(200, 0, 0, 5),
        ];
        reduce(&mut hist, 3, None);
        assert_eq!(hist, vec![entry(0, 0, 0, 1), entry(200, 0, 0, 6), entry(100, 0, 0, 2)]);
    }

    #[test]
    fn reduction_preserves_pixel_count() {
        let img = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 32) as u8, (y * 32) as u8, 77, 255]));
        let mut hist = build_histogram(&img);
        assert_eq!(hist.len(), 64);
        reduce(&mut hist, 5, None);
        assert_eq!(hist.len(), 5);
        assert_eq!(hist.iter().map(|e| e.count).sum::<u32>(), 64);
    }

    #[test]
    fn merge_budget_stops_early() {
        let img = RgbaImage::from_fn(16, 1, |x, _| Rgba([(x * 16) as u8, 0, 0, 255]));
        let options = QuantizeOptions {
            max_colors: 2,
            merge_limit: Some(3),
        };
        let palette = build_palette_with(&img, &options);
        assert_eq!(palette.len(), 13);
    }

    #[test]
    fn ids_follow_descending_count() {
        let img = RgbaImage::from_fn(10, 1, |x, _| match x {
            0 => Rgba([0, 0, 0, 255]),
            1..=3 => Rgba([0, 255, 0, 255]),
            _ => Rgba([255, 255, 255, 255]),
        });
        let palette = build_palette(&img, 8);
        let ids: Vec<u32> = palette.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(palette[0].color(), Srgb::new(255, 255, 255));
        assert_eq!(palette[1].color(), Srgb::new(0, 255, 0));
        assert_eq!(palette[2].color(), Srgb::new(0, 0, 0));
        assert_eq!(palette[0].text_color, TextColor::Black);
    }
}
