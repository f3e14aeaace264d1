/// Câmera de fundo do teleprompter
/// O vídeo da câmera fica atrás do texto; sem câmera o fundo é preto

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraPosition {
    #[default]
    Front,
    Back,
}

impl CameraPosition {
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }
}

pub trait CameraFeed {
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn position(&self) -> CameraPosition;
    fn switch(&mut self, position: CameraPosition);
}

/// Câmera ausente: só registra o estado pedido
#[derive(Debug, Default)]
pub struct NoCamera {
    running: bool,
    position: CameraPosition,
}

impl CameraFeed for NoCamera {
    fn start(&mut self) {
        if !self.running {
            log::debug!("câmera indisponível, usando fundo preto");
        }
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn position(&self) -> CameraPosition {
        self.position
    }

    fn switch(&mut self, position: CameraPosition) {
        self.position = position;
    }
}
