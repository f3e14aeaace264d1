/// Rasterizador de quadros em CPU
/// Mesmo desenho para a janela ao vivo e para o vídeo do PiP

use crate::config::{BG_COLOR, PADDING_X};
use crate::prompter::{HighlightBand, WrappedLines, row_style, trailing_padding_rows};
use crate::settings::{Rgba, TeleprompterSettings};

use super::glyph::{Glyph, GlyphSource};

/// Quadro RGBA8, linha a linha
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&BG_COLOR);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&BG_COLOR);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

/// Geometria de um quadro
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameLayout {
    pub width: u32,
    pub height: u32,
    pub line_height: f32,
    pub padding_x: f32,
}

impl FrameLayout {
    pub fn new(width: u32, height: u32, settings: &TeleprompterSettings) -> Self {
        Self {
            width,
            height,
            line_height: settings.line_height(),
            padding_x: PADDING_X,
        }
    }

    pub fn wrap_width(&self) -> f32 {
        (self.width as f32 - self.padding_x * 2.0).max(1.0)
    }

    pub fn band(&self) -> HighlightBand {
        HighlightBand::new(self.height as f32, self.line_height)
    }

    pub fn trailing_rows(&self) -> usize {
        let band = self.band();
        trailing_padding_rows(band.viewport_height, band.fraction, band.line_height)
    }
}

pub struct FrameRasterizer<'a, G: GlyphSource + ?Sized> {
    layout: FrameLayout,
    glyphs: &'a G,
    accent: Rgba,
}

impl<'a, G: GlyphSource + ?Sized> FrameRasterizer<'a, G> {
    pub fn new(layout: FrameLayout, glyphs: &'a G, accent: Rgba) -> Self {
        Self {
            layout,
            glyphs,
            accent,
        }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn render(&self, scroll_offset: f32, lines: &WrappedLines) -> Frame {
        let mut frame = Frame::new(self.layout.width, self.layout.height);
        self.render_into(&mut frame, scroll_offset, lines);
        frame
    }

    /// Fundo + cada linha visível na sua posição e cor
    pub fn render_into(&self, frame: &mut Frame, scroll_offset: f32, lines: &WrappedLines) {
        frame.clear();
        let band = self.layout.band();
        let rows = lines.rows();

        for index in band.visible_rows(scroll_offset, rows.len()) {
            let y = band.screen_y(index, scroll_offset);
            let row = &rows[index];
            if row.is_empty() || !band.is_visible(y) {
                continue;
            }

            let style = row_style(band.is_highlighted(y), self.accent);
            let baseline = y + self.glyphs.ascent();
            let mut pen_x = self.layout.padding_x;
            for c in row.chars() {
                match self.glyphs.glyph(c) {
                    Some(glyph) => {
                        blend_glyph(frame, glyph, pen_x, baseline, style.color);
                        pen_x += glyph.advance;
                    }
                    None => pen_x += self.glyphs.advance(c),
                }
                if pen_x > frame.width as f32 {
                    break;
                }
            }
        }
    }
}

/// Compõe a cobertura do glifo sobre o quadro
fn blend_glyph(frame: &mut Frame, glyph: &Glyph, pen_x: f32, baseline: f32, color: Rgba) {
    if glyph.width == 0 || glyph.height == 0 {
        return;
    }
    let x0 = (pen_x + glyph.xmin as f32).round() as i64;
    let y0 = (baseline - glyph.ymin as f32 - glyph.height as f32).round() as i64;
    let [r, g, b, _] = color.0;
    let alpha = color.alpha();

    for gy in 0..glyph.height {
        let py = y0 + gy as i64;
        if py < 0 || py >= frame.height as i64 {
            continue;
        }
        for gx in 0..glyph.width {
            let px = x0 + gx as i64;
            if px < 0 || px >= frame.width as i64 {
                continue;
            }
            let coverage = glyph.coverage[gy * glyph.width + gx];
            if coverage == 0 {
                continue;
            }
            let a = coverage as f32 / 255.0 * alpha;
            let idx = ((py as u32 * frame.width + px as u32) * 4) as usize;
            let dst = &mut frame.pixels[idx..idx + 4];
            let mix = |d: u8, s: u8| (d as f32 + (s as f32 - d as f32) * a).round() as u8;
            dst[0] = mix(dst[0], r);
            dst[1] = mix(dst[1], g);
            dst[2] = mix(dst[2], b);
            dst[3] = dst[3].max((a * 255.0).round() as u8);
        }
    }
}
