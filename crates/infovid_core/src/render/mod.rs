//! Infographic card rendering.
//!
//! Each script section becomes one still: a PNG card drawn with the `image`
//! crate plus an SVG companion carrying the section text.

mod card;
mod error;
mod palette;

pub use card::{card_path, CardRenderer, CardSpec};
pub use error::RenderError;
pub use palette::Palette;
