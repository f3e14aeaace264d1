/// Glyph Cache - bitmaps de caracteres rasterizados com fontdue
/// Depois de preparado para um roteiro, é somente leitura e compartilhado entre threads

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::FONT_CANDIDATES;
use crate::prompter::TextMeasure;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("falha ao ler fonte {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fonte inválida {path}: {reason}")]
    Parse { path: PathBuf, reason: &'static str },
    #[error("nenhuma fonte encontrada; use --font")]
    NotFound,
}

/// Carrega a fonte indicada, ou a primeira candidata do sistema
pub fn load_font(path: Option<&Path>) -> Result<fontdue::Font, FontError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .ok_or(FontError::NotFound)?,
    };
    let data = std::fs::read(&path).map_err(|source| FontError::Io {
        path: path.clone(),
        source,
    })?;
    let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
        .map_err(|reason| FontError::Parse {
            path: path.clone(),
            reason,
        })?;
    log::info!("fonte carregada: {}", path.display());
    Ok(font)
}

/// Bitmap de cobertura (0-255) de um caractere
#[derive(Clone, Debug, Default)]
pub struct Glyph {
    pub width: usize,
    pub height: usize,
    /// Deslocamento do bitmap a partir da origem da caneta
    pub xmin: i32,
    /// Base do bitmap acima da linha de base
    pub ymin: i32,
    pub advance: f32,
    pub coverage: Vec<u8>,
}

/// Fonte de glifos para o rasterizador de quadros
pub trait GlyphSource: TextMeasure + Sync {
    fn glyph(&self, c: char) -> Option<&Glyph>;
    /// Distância do topo da linha até a linha de base
    fn ascent(&self) -> f32;
}

pub struct GlyphCache {
    font: Arc<fontdue::Font>,
    size: f32,
    ascent: f32,
    cache: HashMap<char, Glyph>,
}

impl GlyphCache {
    pub fn new(font: Arc<fontdue::Font>, size: f32) -> Self {
        let ascent = font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size * 0.8);

        let mut cache = Self {
            font,
            size,
            ascent,
            cache: HashMap::new(),
        };

        // Pre-rasteriza ASCII printable
        for c in 32u8..127 {
            cache.rasterize(c as char);
        }

        cache
    }

    /// Rasteriza os caracteres do roteiro que ainda não estão no cache
    pub fn prepare(&mut self, text: &str) {
        for c in text.chars() {
            if !c.is_control() && !self.cache.contains_key(&c) {
                self.rasterize(c);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn rasterize(&mut self, c: char) {
        let (metrics, bitmap) = self.font.rasterize(c, self.size);
        self.cache.insert(
            c,
            Glyph {
                width: metrics.width,
                height: metrics.height,
                xmin: metrics.xmin,
                ymin: metrics.ymin,
                advance: metrics.advance_width,
                coverage: bitmap,
            },
        );
    }
}

impl TextMeasure for GlyphCache {
    fn advance(&self, c: char) -> f32 {
        match self.cache.get(&c) {
            Some(glyph) => glyph.advance,
            None => self.font.metrics(c, self.size).advance_width,
        }
    }

    fn font_size(&self) -> f32 {
        self.size
    }
}

impl GlyphSource for GlyphCache {
    fn glyph(&self, c: char) -> Option<&Glyph> {
        self.cache.get(&c)
    }

    fn ascent(&self) -> f32 {
        self.ascent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompter::wrap_text;

    #[test]
    fn missing_font_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nao-existe.ttf");
        let err = load_font(Some(&path)).unwrap_err();
        assert!(matches!(err, FontError::Io { path: p, .. } if p == path));
    }

    #[test]
    fn garbage_font_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lixo.ttf");
        std::fs::write(&path, b"isto nao e uma fonte").unwrap();
        let err = load_font(Some(&path)).unwrap_err();
        assert!(matches!(err, FontError::Parse { .. }));
    }

    #[test]
    fn cache_from_system_font_measures_and_wraps() {
        let font = match load_font(None) {
            Ok(font) => font,
            // máquina sem nenhuma das fontes candidatas
            Err(FontError::NotFound) => return,
            Err(e) => panic!("{e}"),
        };
        let mut cache = GlyphCache::new(Arc::new(font), 24.0);
        assert_eq!(cache.font_size(), 24.0);
        assert!(cache.advance('A') > 0.0);
        assert!(cache.glyph('A').is_some_and(|g| g.width > 0 && !g.coverage.is_empty()));
        assert!(cache.ascent() > 0.0);

        let ascii = cache.len();
        cache.prepare("ação\n");
        assert_eq!(cache.len(), ascii + 2);
        assert!(cache.glyph('ç').is_some());
        assert!(cache.glyph('\n').is_none());

        let width = 200.0;
        let lines = wrap_text("Olá mundo, ação e reação no teleprompter de hoje", width, &cache, 1);
        assert!(lines.content_rows().len() > 1);
        for row in lines.content_rows() {
            let used: f32 = row.chars().map(|c| cache.advance(c)).sum();
            assert!(used <= width, "{row:?} ocupa {used}");
        }
    }
}
