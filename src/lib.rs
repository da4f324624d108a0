//! Pixel-art blueprints.
//!
//! An input image is reduced to a `resolution × resolution` grid, its colors
//! are merged down to a small palette, and every grid cell is drawn as a large
//! outlined square labelled with its palette id, ready to be copied by hand
//! as a mosaic or cross-stitch chart.
//!
//! The pipeline is exposed to JavaScript through `wasm-bindgen` and to Rust
//! callers through [`render`], [`render_image`] and [`build_palette`].

use image::RgbaImage;
use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

pub mod canvas;
pub mod color;
pub mod error;
pub mod fonts;
pub mod options;
pub mod quantize;
pub mod raster;

pub use color::TextColor;
pub use error::{BlueprintError, Result};
pub use options::BlueprintOptions;
pub use quantize::{build_palette, build_palette_with, PaletteItem, QuantizeOptions};
pub use raster::{render, render_image, Blueprint, PixelIndexMap};

/// Wrap a raw RGBA buffer (e.g. canvas `ImageData`) without copying it.
pub fn pixel_buffer(data: Vec<u8>, width: u32, height: u32) -> Result<RgbaImage> {
    let len = data.len();
    if width as usize * height as usize * 4 != len {
        return Err(BlueprintError::DimensionMismatch { len, width, height });
    }
    RgbaImage::from_raw(width, height, data)
        .ok_or(BlueprintError::DimensionMismatch { len, width, height })
}

/// Render a blueprint from encoded image bytes.
///
/// Returns `{ image: Uint8Array (PNG), palette: Array, resolution: number }`.
/// Palette entries carry `id`, `r`, `g`, `b`, `hex`, `count` and `textColor`.
#[wasm_bindgen]
pub fn render_blueprint(input: Vec<u8>, resolution: u32, max_colors: usize) -> Result<Object, JsValue> {
    let blueprint = render(&input, resolution, max_colors).map_err(to_js)?;
    let encoded = blueprint.encode_png().map_err(to_js)?;

    let image = Uint8Array::from(encoded.as_slice());
    let palette = palette_to_js(&blueprint.palette)?;

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("image"), &image.into())?;
    Reflect::set(&result, &JsValue::from_str("palette"), &palette.into())?;
    Reflect::set(
        &result,
        &JsValue::from_str("resolution"),
        &JsValue::from_f64(blueprint.resolution as f64),
    )?;

    Ok(result)
}

/// Draft palette for a raw RGBA buffer. Every `count` is zero.
#[wasm_bindgen]
pub fn palette_from_rgba(data: Vec<u8>, width: u32, height: u32, max_colors: usize) -> Result<Array, JsValue> {
    let pixels = pixel_buffer(data, width, height).map_err(to_js)?;
    palette_to_js(&build_palette(&pixels, max_colors))
}

fn palette_to_js(items: &[PaletteItem]) -> Result<Array, JsValue> {
    let out = Array::new();
    for item in items {
        let entry = Object::new();
        Reflect::set(&entry, &JsValue::from_str("id"), &JsValue::from_f64(item.id as f64))?;
        Reflect::set(&entry, &JsValue::from_str("r"), &JsValue::from_f64(item.r as f64))?;
        Reflect::set(&entry, &JsValue::from_str("g"), &JsValue::from_f64(item.g as f64))?;
        Reflect::set(&entry, &JsValue::from_str("b"), &JsValue::from_f64(item.b as f64))?;
        Reflect::set(&entry, &JsValue::from_str("hex"), &JsValue::from_str(&item.hex))?;
        Reflect::set(&entry, &JsValue::from_str("count"), &JsValue::from_f64(item.count as f64))?;
        Reflect::set(
            &entry,
            &JsValue::from_str("textColor"),
            &JsValue::from_str(item.text_color.hex()),
        )?;
        out.push(&entry.into());
    }
    Ok(out)
}

fn to_js(err: BlueprintError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_checks_length() {
        assert!(pixel_buffer(vec![0; 16], 2, 2).is_ok());
        let err = pixel_buffer(vec![0; 15], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            BlueprintError::DimensionMismatch { len: 15, width: 2, height: 2 }
        ));
    }
}
