pub mod engine;
pub mod motion;
pub mod params;
pub mod render;
pub mod wall;

pub use engine::TextWall;
pub use motion::gradient::{Gradient, GradientStop};
pub use params::{EffectParams, EffectVariant, Palette, ParamChange};
pub use render::{
    canvas::{CellGlyph, GlyphGrid},
    pixels::PixelCanvas,
    surface::{GlyphPaint, GlyphStyle, Rgb, Surface},
};
pub use wall::{
    charset::{FillMode, Orientation, Script},
    font::{BitmapFont, Typeface},
};

#[derive(Debug, thiserror::Error)]
pub enum TextWallError {
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("failed to decode parameters: {0}")]
    Params(#[from] serde_json::Error),
    #[error("failed to parse TOML parameters: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}
