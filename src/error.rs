use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("unable to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch { len: usize, width: u32, height: u32 },

    #[error("cannot allocate a {width}x{height} drawing surface")]
    RenderTarget { width: u64, height: u64 },

    #[error("label layout failed: {0}")]
    Label(String),

    #[error("PNG encode error: {0}")]
    Encode(#[source] image::ImageError),
}

pub type Result<T, E = BlueprintError> = std::result::Result<T, E>;
