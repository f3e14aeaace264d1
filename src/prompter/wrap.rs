/// Quebra do roteiro em linhas que cabem na largura da tela
/// Política: linhas vazias do roteiro são descartadas

use std::sync::Arc;

/// Mede o avanço horizontal de um caractere no tamanho de fonte atual
pub trait TextMeasure {
    fn advance(&self, c: char) -> f32;
    fn font_size(&self) -> f32;
}

/// Linhas prontas para desenhar, com o preenchimento de rolagem incluído
#[derive(Clone, Debug, PartialEq)]
pub struct WrappedLines {
    rows: Vec<String>,
    trailing: usize,
}

impl WrappedLines {
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Linhas com texto (sem o preenchimento)
    pub fn content_rows(&self) -> &[String] {
        &self.rows[1..self.rows.len() - self.trailing]
    }

    pub fn trailing(&self) -> usize {
        self.trailing
    }
}

/// Linhas em branco ao final para que a última linha saia da faixa e da tela
pub fn trailing_padding_rows(viewport_height: f32, highlight_fraction: f32, line_height: f32) -> usize {
    if line_height <= 0.0 || !viewport_height.is_finite() {
        return 1;
    }
    let rows = (viewport_height * (1.0 - highlight_fraction) / line_height).ceil();
    (rows as usize).max(1)
}

/// Quebra `text` em linhas de no máximo `max_width` pixels
pub fn wrap_text(text: &str, max_width: f32, measure: &dyn TextMeasure, trailing: usize) -> WrappedLines {
    let mut rows = vec![String::new()];

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        wrap_line(line, max_width, measure, &mut rows);
    }

    rows.extend(std::iter::repeat_n(String::new(), trailing));
    WrappedLines { rows, trailing }
}

fn wrap_line(line: &str, max_width: f32, measure: &dyn TextMeasure, rows: &mut Vec<String>) {
    let mut current = String::new();
    let mut width = 0.0;
    let mut continuation = false;

    for c in line.chars() {
        // Continuação não começa com espaço
        if continuation && current.is_empty() && c.is_whitespace() {
            continue;
        }
        let advance = measure.advance(c);
        if !current.is_empty() && width + advance > max_width {
            rows.push(std::mem::take(&mut current));
            width = 0.0;
            continuation = true;
            if c.is_whitespace() {
                continue;
            }
        }
        current.push(c);
        width += advance;
    }

    if !current.trim().is_empty() {
        rows.push(current);
    }
}

#[derive(Clone, Debug, PartialEq)]
struct WrapKey {
    text: String,
    max_width: u32,
    font_size: u32,
    trailing: usize,
}

/// Guarda o último resultado; recalcula (sem mutar) quando a chave muda
#[derive(Default)]
pub struct WrapCache {
    entry: Option<(WrapKey, Arc<WrappedLines>)>,
}

impl WrapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        text: &str,
        max_width: f32,
        measure: &dyn TextMeasure,
        trailing: usize,
    ) -> Arc<WrappedLines> {
        let key = WrapKey {
            text: text.to_string(),
            max_width: max_width.to_bits(),
            font_size: measure.font_size().to_bits(),
            trailing,
        };
        if let Some((cached, lines)) = &self.entry {
            if *cached == key {
                return Arc::clone(lines);
            }
        }
        let lines = Arc::new(wrap_text(text, max_width, measure, trailing));
        log::debug!("roteiro requebrado: {} linhas", lines.len());
        self.entry = Some((key, Arc::clone(&lines)));
        lines
    }
}
