/// Núcleo do teleprompter
/// Quebra de linhas, relógio de rolagem e faixa de leitura

pub mod clock;
pub mod highlight;
pub mod wrap;

pub use clock::ScrollClock;
pub use highlight::{HighlightBand, RowStyle, row_style};
pub use wrap::{TextMeasure, WrapCache, WrappedLines, trailing_padding_rows, wrap_text};
