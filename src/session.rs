/// Sessão ao vivo do teleprompter
/// Junta relógio, quebra de linhas, câmera e rasterizador para a janela

use std::sync::Arc;
use std::time::Instant;

use crate::camera::CameraFeed;
use crate::prompter::{ScrollClock, WrapCache, WrappedLines};
use crate::renderer::{Frame, FrameLayout, FrameRasterizer, GlyphSource};
use crate::script::Script;
use crate::settings::TeleprompterSettings;

/// Comandos da view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    TogglePause,
    Restart,
    SwitchCamera,
    Close,
}

pub struct LiveSession<G: GlyphSource> {
    settings: TeleprompterSettings,
    text: String,
    glyphs: Arc<G>,
    wrap: WrapCache,
    clock: ScrollClock,
    camera: Box<dyn CameraFeed>,
    open: bool,
}

impl<G: GlyphSource> LiveSession<G> {
    pub fn new(
        script: &Script,
        settings: TeleprompterSettings,
        glyphs: Arc<G>,
        camera: Box<dyn CameraFeed>,
    ) -> Self {
        let settings = settings.sanitized();
        let clock = ScrollClock::new(settings.scroll_speed, settings.line_height());
        Self {
            settings,
            text: script.content.clone(),
            glyphs,
            wrap: WrapCache::new(),
            clock,
            camera,
            open: false,
        }
    }

    pub fn settings(&self) -> &TeleprompterSettings {
        &self.settings
    }

    /// Abre a view: câmera ligada e rolagem a partir do topo
    pub fn open(&mut self, now: Instant) {
        self.camera.start();
        self.clock.reset();
        self.clock.start(now);
        self.open = true;
        log::info!(
            "teleprompter aberto: {:.1} s/linha, fonte {}",
            self.settings.scroll_speed,
            self.settings.font_size
        );
    }

    /// Aplica um comando. Retorna `false` quando a sessão foi fechada
    pub fn handle(&mut self, action: Action) -> bool {
        match action {
            Action::TogglePause => {
                self.clock.toggle_pause();
                log::debug!("rolagem {}", if self.clock.is_running() { "retomada" } else { "pausada" });
            }
            Action::Restart => self.clock.restart(),
            Action::SwitchCamera => {
                let position = self.camera.position().flipped();
                self.camera.switch(position);
            }
            Action::Close => self.close(),
        }
        self.open
    }

    /// Consome os ticks vencidos
    pub fn tick(&mut self, now: Instant) -> u32 {
        self.clock.advance_to(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.clock.next_deadline()
    }

    pub fn offset(&self) -> f32 {
        self.clock.offset()
    }

    pub fn is_paused(&self) -> bool {
        !self.clock.is_running()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn camera(&self) -> &dyn CameraFeed {
        self.camera.as_ref()
    }

    pub fn layout(&self, width: u32, height: u32) -> FrameLayout {
        FrameLayout::new(width, height, &self.settings)
    }

    /// Linhas para o tamanho de viewport atual; só requebra quando algo mudou
    pub fn lines(&mut self, width: u32, height: u32) -> Arc<WrappedLines> {
        let layout = self.layout(width, height);
        self.wrap.get(
            &self.text,
            layout.wrap_width(),
            self.glyphs.as_ref(),
            layout.trailing_rows(),
        )
    }

    pub fn frame(&mut self, width: u32, height: u32) -> Frame {
        let mut frame = Frame::new(width, height);
        self.render_into(&mut frame);
        frame
    }

    pub fn render_into(&mut self, frame: &mut Frame) {
        let lines = self.lines(frame.width, frame.height);
        let layout = self.layout(frame.width, frame.height);
        let raster = FrameRasterizer::new(layout, self.glyphs.as_ref(), self.settings.text_color);
        raster.render_into(frame, self.clock.offset(), &lines);
    }

    /// Fecha a view: cancela o timer e desliga a câmera
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.clock.stop();
        self.camera.stop();
        self.open = false;
        log::info!("teleprompter fechado em {:.1} px", self.clock.offset());
    }
}

impl<G: GlyphSource> Drop for LiveSession<G> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraPosition, NoCamera};
    use crate::renderer::raster::tests::BlockGlyphs;
    use crate::script::ScriptId;
    use std::time::Duration;

    fn session(content: &str, seconds_per_line: f32) -> LiveSession<BlockGlyphs> {
        let script = Script::new(ScriptId(1), "", content);
        let settings = TeleprompterSettings {
            scroll_speed: seconds_per_line,
            ..Default::default()
        };
        LiveSession::new(&script, settings, Arc::new(BlockGlyphs::new()), Box::new(NoCamera::default()))
    }

    #[test]
    fn open_starts_clock_and_camera() {
        let mut live = session("Hello\nWorld", 2.0);
        assert!(!live.is_open());
        live.open(Instant::now());
        assert!(live.is_open());
        assert!(live.camera().is_running());
        assert!(live.next_deadline().is_some());
    }

    #[test]
    fn scrolls_one_line_in_seconds_per_line() {
        let mut live = session("Hello\nWorld", 2.0);
        let t0 = Instant::now();
        live.open(t0);
        live.tick(t0 + Duration::from_secs(2));
        assert!((live.offset() - 36.0).abs() <= 0.61, "offset = {}", live.offset());
    }

    #[test]
    fn pause_freezes_offset() {
        let mut live = session("Hello\nWorld", 2.0);
        let t0 = Instant::now();
        live.open(t0);
        live.tick(t0 + Duration::from_secs(1));
        assert!(live.handle(Action::TogglePause));
        assert!(live.is_paused());
        let frozen = live.offset();
        live.tick(t0 + Duration::from_secs(3));
        assert_eq!(live.offset(), frozen);

        live.handle(Action::TogglePause);
        live.tick(t0 + Duration::from_secs(4));
        assert!(live.offset() > frozen);
    }

    #[test]
    fn restart_returns_to_top() {
        let mut live = session("Hello\nWorld", 2.0);
        let t0 = Instant::now();
        live.open(t0);
        live.tick(t0 + Duration::from_secs(1));
        live.handle(Action::Restart);
        assert_eq!(live.offset(), 0.0);
        assert!(!live.is_paused());
    }

    #[test]
    fn switch_camera_flips_position() {
        let mut live = session("Hello", 2.0);
        live.open(Instant::now());
        live.handle(Action::SwitchCamera);
        assert_eq!(live.camera().position(), CameraPosition::Back);
    }

    #[test]
    fn close_cancels_timer_and_camera() {
        let mut live = session("Hello\nWorld", 2.0);
        let t0 = Instant::now();
        live.open(t0);
        assert!(!live.handle(Action::Close));
        assert!(live.next_deadline().is_none());
        assert!(!live.camera().is_running());

        let offset = live.offset();
        assert_eq!(live.tick(t0 + Duration::from_secs(5)), 0);
        assert_eq!(live.offset(), offset);
    }

    #[test]
    fn lines_are_cached_per_viewport() {
        let mut live = session("Hello\nWorld", 2.0);
        let a = live.lines(320, 200);
        let b = live.lines(320, 200);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.content_rows(), ["Hello", "World"]);
        assert_eq!(a.rows()[0], "");

        let c = live.lines(200, 320);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn first_line_is_lit_in_first_frame() {
        let mut live = session("Hello\nWorld", 2.0);
        live.open(Instant::now());
        let frame = live.frame(320, 200);
        let accent = TeleprompterSettings::default().text_color.0;
        let lit = (0..frame.height)
            .flat_map(|y| (0..frame.width).map(move |x| (x, y)))
            .any(|(x, y)| frame.pixel(x, y) == accent);
        assert!(lit);
    }
}
