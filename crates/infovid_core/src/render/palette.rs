//! Colour palettes per visual style.

use image::Rgb;

/// Colours used to draw a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb<u8>,
    pub header: Rgb<u8>,
    pub tile: Rgb<u8>,
    pub accent: Rgb<u8>,
    pub track: Rgb<u8>,
    /// Text colour for the SVG companion.
    pub text: Rgb<u8>,
}

impl Palette {
    /// Palette for a style name; unknown styles get `modern`.
    pub fn for_style(style: &str) -> Self {
        match style.trim().to_ascii_lowercase().as_str() {
            "minimal" => Self {
                background: Rgb([250, 250, 250]),
                header: Rgb([33, 33, 33]),
                tile: Rgb([230, 230, 230]),
                accent: Rgb([0, 150, 136]),
                track: Rgb([210, 210, 210]),
                text: Rgb([33, 33, 33]),
            },
            "playful" => Self {
                background: Rgb([255, 248, 225]),
                header: Rgb([255, 112, 67]),
                tile: Rgb([255, 224, 178]),
                accent: Rgb([126, 87, 194]),
                track: Rgb([255, 204, 128]),
                text: Rgb([62, 39, 35]),
            },
            "corporate" => Self {
                background: Rgb([236, 239, 241]),
                header: Rgb([21, 101, 192]),
                tile: Rgb([207, 216, 220]),
                accent: Rgb([255, 179, 0]),
                track: Rgb([176, 190, 197]),
                text: Rgb([38, 50, 56]),
            },
            _ => Self {
                background: Rgb([18, 24, 38]),
                header: Rgb([32, 201, 151]),
                tile: Rgb([36, 48, 72]),
                accent: Rgb([32, 201, 151]),
                track: Rgb([52, 64, 90]),
                text: Rgb([240, 244, 248]),
            },
        }
    }

    /// `#rrggbb` form of a colour.
    pub fn hex(color: Rgb<u8>) -> String {
        format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
    }
}
