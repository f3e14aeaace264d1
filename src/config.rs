/// Configurações do rprompter
/// Constantes de layout, tempo e vídeo compartilhadas pelo modo ao vivo e pelo vídeo PiP

use std::time::Duration;

/// Dimensões padrão da janela
pub const DEFAULT_WIDTH: u32 = 900;
pub const DEFAULT_HEIGHT: u32 = 360;

/// Fontes procuradas quando nenhuma é passada via --font
pub const FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/SFNS.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Espaço vertical entre linhas (somado ao tamanho da fonte)
pub const LINE_SPACING: f32 = 12.0;

/// Margem horizontal do texto
pub const PADDING_X: f32 = 24.0;

/// Cadência do relógio de rolagem (ticks por segundo)
pub const TICK_RATE: f32 = 30.0;

/// Faixa de leitura: fração da altura a partir do topo
pub const HIGHLIGHT_FRACTION: f32 = 0.3;

/// Tolerância da faixa, em alturas de linha
/// Acima de 1 para a primeira linha de conteúdo já estar na faixa com offset zero
pub const HIGHLIGHT_TOLERANCE: f32 = 1.25;

/// Cores (RGBA 8 bits)
pub const BG_COLOR: [u8; 4] = [0, 0, 0, 255];
pub const DIMMED_COLOR: [u8; 3] = [128, 128, 128];
pub const DIMMED_ALPHA: f32 = 0.7;

/// Vídeo para picture-in-picture
pub const VIDEO_WIDTH: u32 = 1920;
pub const VIDEO_HEIGHT: u32 = 960;
pub const VIDEO_FPS: u32 = 30;
pub const BATCH_SIZE: usize = 30;
pub const MIN_VIDEO_SECONDS: f32 = 10.0;
pub const MAX_VIDEO_SECONDS: f32 = 300.0;

/// Espera pela superfície PiP
pub const READY_RETRY_ATTEMPTS: u32 = 10;
pub const READY_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Janela do ffplay usada como PiP no desktop
pub const PIP_WINDOW_WIDTH: u32 = 480;
pub const PIP_WINDOW_HEIGHT: u32 = 240;
