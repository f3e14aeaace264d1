/// Configurações do teleprompter
/// Valor puro consumido pelos renderizadores, persistido como chave-valor plano

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LINE_SPACING;

pub const SCROLL_SPEED_RANGE: (f32, f32) = (1.0, 10.0);
pub const FONT_SIZE_RANGE: (f32, f32) = (16.0, 48.0);

/// Cor RGBA em 8 bits por canal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    /// Converte componentes 0.0-1.0 truncando, como o conversor hex
    pub fn from_unit(r: f32, g: f32, b: f32, a: f32) -> Self {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
        Self([c(r), c(g), c(b), c(a)])
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
    }

    /// Aceita "#RRGGBBAA" ou "#RRGGBB" (opaco), com ou sem '#'
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            8 => Some(Self(value.to_be_bytes())),
            6 => {
                let [_, r, g, b] = value.to_be_bytes();
                Some(Self([r, g, b, 255]))
            }
            _ => None,
        }
    }

    pub fn alpha(self) -> f32 {
        self.0[3] as f32 / 255.0
    }
}

/// Paleta fixa oferecida na tela de configurações
pub fn palette() -> [Rgba; 8] {
    [
        Rgba::from_unit(1.0, 1.0, 1.0, 1.0), // branco
        Rgba::from_unit(1.0, 0.4, 0.4, 1.0), // vermelho
        Rgba::from_unit(1.0, 0.6, 0.2, 1.0), // laranja
        Rgba::from_unit(1.0, 0.8, 0.3, 1.0), // amarelo-laranja
        Rgba::from_unit(0.8, 1.0, 0.4, 1.0), // amarelo-verde
        Rgba::from_unit(0.2, 0.9, 0.4, 1.0), // verde
        Rgba::from_unit(0.3, 1.0, 0.8, 1.0), // ciano
        Rgba::from_unit(0.4, 0.8, 1.0, 1.0), // azul
    ]
}

pub const DEFAULT_PALETTE_INDEX: usize = 5;

/// Rotação do texto em passos de 90 graus
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Botão de girar: +90 e volta a 0 depois de 270
    pub fn next(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// Largura e altura trocam de lugar em 90/270
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TeleprompterSettings {
    /// Segundos por linha
    pub scroll_speed: f32,
    pub font_size: f32,
    pub rotation: Rotation,
    pub text_color: Rgba,
}

impl Default for TeleprompterSettings {
    fn default() -> Self {
        Self {
            scroll_speed: 3.0,
            font_size: 24.0,
            rotation: Rotation::Deg0,
            text_color: palette()[DEFAULT_PALETTE_INDEX],
        }
    }
}

impl TeleprompterSettings {
    /// Limita velocidade e fonte às faixas aceitas
    pub fn sanitized(mut self) -> Self {
        self.scroll_speed = clamp_or(self.scroll_speed, SCROLL_SPEED_RANGE, 3.0);
        self.font_size = clamp_or(self.font_size, FONT_SIZE_RANGE, 24.0);
        self
    }

    pub fn line_height(&self) -> f32 {
        self.font_size + LINE_SPACING
    }

    /// Pixels por segundo
    pub fn scroll_rate(&self) -> f32 {
        self.line_height() / self.scroll_speed
    }
}

fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() { value.clamp(min, max) } else { fallback }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("falha de E/S em {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configuração inválida em {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persistência das configurações
pub trait SettingsStore {
    fn load(&mut self) -> Result<Option<TeleprompterSettings>, SettingsError>;
    fn save(&mut self, settings: &TeleprompterSettings) -> Result<(), SettingsError>;
}

/// Formato chave-valor gravado em disco
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    scroll_speed: f64,
    font_size: f64,
    rotation: i32,
    text_color_hex: String,
}

impl From<&TeleprompterSettings> for StoredSettings {
    fn from(s: &TeleprompterSettings) -> Self {
        Self {
            scroll_speed: s.scroll_speed as f64,
            font_size: s.font_size as f64,
            rotation: s.rotation.degrees(),
            text_color_hex: s.text_color.to_hex(),
        }
    }
}

impl StoredSettings {
    fn into_settings(self) -> TeleprompterSettings {
        let defaults = TeleprompterSettings::default();
        TeleprompterSettings {
            scroll_speed: self.scroll_speed as f32,
            font_size: self.font_size as f32,
            rotation: Rotation::from_degrees(self.rotation).unwrap_or(defaults.rotation),
            text_color: Rgba::from_hex(&self.text_color_hex).unwrap_or(defaults.text_color),
        }
        .sanitized()
    }
}

/// Configurações num arquivo JSON
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// <config dir>/rprompter/settings.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rprompter").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<TeleprompterSettings>, SettingsError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let stored: StoredSettings =
            serde_json::from_str(&data).map_err(|source| SettingsError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(stored.into_settings()))
    }

    fn save(&mut self, settings: &TeleprompterSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(&StoredSettings::from(settings)).map_err(|source| {
            SettingsError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        log::debug!("configurações salvas em {}", self.path.display());
        Ok(())
    }
}
