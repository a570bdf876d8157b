//! Card renderer.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use super::error::RenderError;
use super::palette::Palette;
use crate::models::{ImageFormat, InfographicAsset, Section};

/// What to draw for one section.
#[derive(Debug, Clone)]
pub struct CardSpec {
    pub index: usize,
    /// Number of sections in the script.
    pub total: usize,
    pub title: String,
    pub content: String,
    pub visual_suggestions: Vec<String>,
    pub code_examples: Vec<String>,
}

impl CardSpec {
    pub fn from_section(index: usize, total: usize, section: &Section) -> Self {
        Self {
            index,
            total,
            title: section.title.clone(),
            content: section.content.clone(),
            visual_suggestions: section.visual_suggestions.clone(),
            code_examples: section.code_examples.clone(),
        }
    }
}

/// Draws section cards at a fixed size.
#[derive(Debug, Clone)]
pub struct CardRenderer {
    width: u32,
    height: u32,
    palette: Palette,
}

impl CardRenderer {
    pub fn new(width: u32, height: u32, style: &str) -> Self {
        Self {
            width,
            height,
            palette: Palette::for_style(style),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Render `card` into `out_dir` as `section_NN.png` and `section_NN.svg`.
    pub fn render(&self, card: &CardSpec, out_dir: &Path) -> Result<InfographicAsset, RenderError> {
        if self.width < 16 || self.height < 16 {
            return Err(RenderError::InvalidSize {
                width: self.width,
                height: self.height,
            });
        }

        fs::create_dir_all(out_dir).map_err(|source| RenderError::Io {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let stem = format!("section_{:02}", card.index + 1);
        let png_path = out_dir.join(format!("{}.png", stem));
        let svg_path = out_dir.join(format!("{}.svg", stem));

        let image = self.draw(card);
        image
            .save_with_format(&png_path, image::ImageFormat::Png)
            .map_err(|source| RenderError::Encode {
                path: png_path.clone(),
                source,
            })?;

        fs::write(&svg_path, self.svg(card)).map_err(|source| RenderError::Io {
            path: svg_path.clone(),
            source,
        })?;

        Ok(InfographicAsset {
            section_index: card.index,
            path: png_path,
            width: self.width,
            height: self.height,
            format: ImageFormat::Png,
        })
    }

    /// Raster layout: header band, one tile per visual suggestion, and a
    /// progress track showing where the section sits in the video.
    pub fn draw(&self, card: &CardSpec) -> RgbImage {
        let (w, h) = (self.width, self.height);
        let p = self.palette;
        let mut img = RgbImage::from_pixel(w, h, p.background);

        let header_h = h * 18 / 100;
        fill_rect(&mut img, 0, 0, w, header_h, p.header);

        let margin = w / 20;
        let tiles = card.visual_suggestions.len().clamp(1, 6) as u32;
        let gap = margin / 2;
        let tile_top = header_h + margin;
        let tile_bottom = h - h * 15 / 100;
        let usable = w.saturating_sub(2 * margin + gap * (tiles - 1));
        let tile_w = usable / tiles;
        for i in 0..tiles {
            let x = margin + i * (tile_w + gap);
            fill_rect(
                &mut img,
                x,
                tile_top,
                tile_w,
                tile_bottom.saturating_sub(tile_top),
                p.tile,
            );
            // Accent strip on top of each tile
            fill_rect(&mut img, x, tile_top, tile_w, (h / 90).max(2), p.accent);
        }

        let track_h = (h / 60).max(2);
        let track_y = h - margin.min(h / 10) - track_h;
        let track_w = w - 2 * margin;
        fill_rect(&mut img, margin, track_y, track_w, track_h, p.track);
        let total = card.total.max(1) as u32;
        let done = (card.index as u32 + 1).min(total);
        fill_rect(&mut img, margin, track_y, track_w * done / total, track_h, p.accent);

        img
    }

    /// Vector companion with the section text.
    pub fn svg(&self, card: &CardSpec) -> String {
        let p = self.palette;
        let (w, h) = (self.width, self.height);
        let header_h = h * 18 / 100;
        let font = (h / 18).max(8);
        let body_font = (h / 36).max(6);

        let mut out = String::new();
        out.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        ));
        out.push('\n');
        out.push_str(&format!(
            r#"  <rect width="{w}" height="{h}" fill="{}"/>"#,
            Palette::hex(p.background)
        ));
        out.push('\n');
        out.push_str(&format!(
            r#"  <rect width="{w}" height="{header_h}" fill="{}"/>"#,
            Palette::hex(p.header)
        ));
        out.push('\n');
        out.push_str(&format!(
            r#"  <text x="{}" y="{}" font-size="{font}" font-family="sans-serif" fill="{}">{}</text>"#,
            w / 20,
            header_h * 2 / 3,
            Palette::hex(p.text),
            xml_escape(&card.title)
        ));
        out.push('\n');

        let mut y = header_h + w / 20 + body_font * 2;
        let lines = wrap_words(&card.content, 70)
            .into_iter()
            .chain(card.visual_suggestions.iter().map(|s| format!("• {}", s)))
            .chain(card.code_examples.iter().flat_map(|c| c.lines().map(str::to_string)));
        for line in lines {
            out.push_str(&format!(
                r#"  <text x="{}" y="{y}" font-size="{body_font}" font-family="sans-serif" fill="{}">{}</text>"#,
                w / 20 + body_font,
                Palette::hex(p.text),
                xml_escape(&line)
            ));
            out.push('\n');
            y += body_font * 3 / 2;
        }

        out.push_str("</svg>\n");
        out
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn wrap_words(text: &str, width: usize) -> Vec<String> {
    crate::subtitles::chunk_text(text, width)
}

/// Path of the PNG a section renders to, for callers that only need the name.
pub fn card_path(out_dir: &Path, index: usize) -> PathBuf {
    out_dir.join(format!("section_{:02}.png", index + 1))
}
