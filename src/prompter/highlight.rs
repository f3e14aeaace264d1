/// Seletor da faixa de leitura
/// Decide se uma linha está sendo lida e qual cor usar

use crate::config::{DIMMED_ALPHA, DIMMED_COLOR, HIGHLIGHT_FRACTION, HIGHLIGHT_TOLERANCE};
use crate::settings::Rgba;

/// Geometria da faixa para uma viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HighlightBand {
    pub viewport_height: f32,
    pub line_height: f32,
    /// Fração da altura, a partir do topo
    pub fraction: f32,
    /// Tolerância em alturas de linha (K)
    pub tolerance: f32,
}

impl HighlightBand {
    pub fn new(viewport_height: f32, line_height: f32) -> Self {
        Self {
            viewport_height,
            line_height,
            fraction: HIGHLIGHT_FRACTION,
            tolerance: HIGHLIGHT_TOLERANCE,
        }
    }

    pub fn band_y(&self) -> f32 {
        self.viewport_height * self.fraction
    }

    pub fn row_base(&self, index: usize) -> f32 {
        index as f32 * self.line_height
    }

    /// Y da linha na tela; offset maior move o conteúdo para cima
    pub fn screen_y(&self, index: usize, scroll_offset: f32) -> f32 {
        self.row_base(index) - scroll_offset + self.band_y()
    }

    pub fn is_highlighted(&self, screen_y: f32) -> bool {
        (screen_y - self.band_y()).abs() < self.line_height * self.tolerance
    }

    /// Linhas totalmente fora da tela não são desenhadas
    pub fn is_visible(&self, screen_y: f32) -> bool {
        screen_y >= -self.line_height && screen_y <= self.viewport_height + self.line_height
    }

    /// Faixa de índices potencialmente visíveis para um offset
    pub fn visible_rows(&self, scroll_offset: f32, row_count: usize) -> std::ops::Range<usize> {
        if row_count == 0 || self.line_height <= 0.0 {
            return 0..0;
        }
        let first = ((scroll_offset - self.band_y() - self.line_height) / self.line_height).floor();
        let last = ((scroll_offset - self.band_y() + self.viewport_height + self.line_height)
            / self.line_height)
            .ceil();
        let first = first.max(0.0) as usize;
        let last = (last.max(0.0) as usize + 1).min(row_count);
        first.min(last)..last
    }
}

/// Cor de uma linha
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowStyle {
    pub color: Rgba,
    pub highlighted: bool,
}

pub fn row_style(highlighted: bool, accent: Rgba) -> RowStyle {
    let color = if highlighted {
        accent
    } else {
        let [r, g, b] = DIMMED_COLOR;
        Rgba([r, g, b, (DIMMED_ALPHA * 255.0) as u8])
    };
    RowStyle { color, highlighted }
}
