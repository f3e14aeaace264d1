/// Sessão picture-in-picture
/// Interface única para a superfície PiP da plataforma, com canal de eventos

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;

use crate::config::{PIP_WINDOW_HEIGHT, PIP_WINDOW_WIDTH, READY_RETRY_ATTEMPTS, READY_RETRY_DELAY};
use crate::renderer::GlyphSource;
use crate::video::{BakeJob, BakeProgress, RenderError, SinkFactory, VideoFile, bake_to_file};

#[derive(Debug, Error)]
pub enum PipError {
    #[error("picture-in-picture não é suportado neste dispositivo")]
    Unsupported,
    #[error("a superfície PiP não ficou pronta após {attempts} tentativas")]
    NotReady { attempts: u32 },
    #[error("falha ao gerar o vídeo: {0}")]
    Render(#[from] RenderError),
    #[error("falha na sessão PiP: {0}")]
    Session(String),
}

impl PipError {
    /// Mensagem fixa mostrada ao usuário
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unsupported => "Este dispositivo não suporta picture-in-picture",
            Self::NotReady { .. } => "Não foi possível abrir o picture-in-picture, tente novamente",
            Self::Render(RenderError::Cancelled) => "Geração do vídeo cancelada",
            Self::Render(_) => "Falha ao gerar o vídeo do teleprompter",
            Self::Session(_) => "Falha ao iniciar o picture-in-picture",
        }
    }
}

/// Notificações da superfície PiP
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipEvent {
    Active,
    Stopped,
    Failed(String),
}

/// Sessão iniciada
#[derive(Clone, Debug)]
pub struct ActivePip {
    pub video: PathBuf,
    pub started_at: Instant,
}

/// Adaptador da plataforma
pub trait PipSession {
    fn is_supported(&self) -> bool;
    /// A superfície pode ficar pronta com atraso depois de suportada
    fn is_ready(&mut self) -> bool;
    fn start(&mut self, video: &VideoFile) -> Result<ActivePip, PipError>;
    fn stop(&mut self);
    fn events(&self) -> Receiver<PipEvent>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: READY_RETRY_ATTEMPTS,
            delay: READY_RETRY_DELAY,
        }
    }
}

/// Espera a capacidade ficar pronta com tentativas limitadas. Retorna a tentativa que deu certo
pub fn await_ready(mut probe: impl FnMut() -> bool, policy: RetryPolicy) -> Result<u32, PipError> {
    for attempt in 1..=policy.attempts {
        if probe() {
            return Ok(attempt);
        }
        log::warn!("superfície PiP não está pronta (tentativa {attempt}/{})", policy.attempts);
        if attempt < policy.attempts {
            thread::sleep(policy.delay);
        }
    }
    Err(PipError::NotReady {
        attempts: policy.attempts,
    })
}

/// PiP de desktop: janela ffplay sem borda, sempre no topo, em loop
pub struct FfplayPip {
    binary: String,
    supported: OnceLock<bool>,
    child: Arc<Mutex<Option<Child>>>,
    stopping: Arc<AtomicBool>,
    tx: Sender<PipEvent>,
    rx: Receiver<PipEvent>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl FfplayPip {
    pub fn new() -> Self {
        let binary = std::env::var("RPROMPTER_FFPLAY").unwrap_or_else(|_| "ffplay".to_string());
        Self::with_binary(binary)
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            binary: binary.into(),
            supported: OnceLock::new(),
            child: Arc::new(Mutex::new(None)),
            stopping: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
            watcher: None,
        }
    }

    /// Acompanha o processo em thread separada
    fn watch_loop(child: Arc<Mutex<Option<Child>>>, stopping: Arc<AtomicBool>, tx: Sender<PipEvent>) {
        loop {
            let status = {
                let Ok(mut guard) = child.lock() else { break };
                let Some(process) = guard.as_mut() else { break };
                let status = process.try_wait();
                if let Ok(Some(_)) = status {
                    // já encerrado: stop() não notifica de novo
                    *guard = None;
                }
                status
            };
            match status {
                Ok(Some(status)) => {
                    let event = if stopping.load(Ordering::SeqCst) || status.success() {
                        PipEvent::Stopped
                    } else {
                        PipEvent::Failed(format!("ffplay terminou com {status}"))
                    };
                    let _ = tx.send(event);
                    break;
                }
                Ok(None) => thread::sleep(Duration::from_millis(100)),
                Err(e) => {
                    let _ = tx.send(PipEvent::Failed(e.to_string()));
                    break;
                }
            }
        }
    }

    fn spawn_watcher(&mut self) {
        let child = Arc::clone(&self.child);
        let stopping = Arc::clone(&self.stopping);
        let tx = self.tx.clone();
        self.watcher = Some(thread::spawn(move || Self::watch_loop(child, stopping, tx)));
    }
}

impl Default for FfplayPip {
    fn default() -> Self {
        Self::new()
    }
}

impl PipSession for FfplayPip {
    fn is_supported(&self) -> bool {
        *self.supported.get_or_init(|| {
            Command::new(&self.binary)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }

    fn is_ready(&mut self) -> bool {
        cfg!(any(target_os = "macos", target_os = "windows"))
            || std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    fn start(&mut self, video: &VideoFile) -> Result<ActivePip, PipError> {
        self.stop();
        self.stopping.store(false, Ordering::SeqCst);

        let process = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-loop")
            .arg("0")
            .arg("-alwaysontop")
            .arg("-noborder")
            .arg("-an")
            .arg("-x")
            .arg(PIP_WINDOW_WIDTH.to_string())
            .arg("-y")
            .arg(PIP_WINDOW_HEIGHT.to_string())
            .arg("-window_title")
            .arg("rprompter")
            .arg(video.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PipError::Unsupported,
                _ => PipError::Session(e.to_string()),
            })?;

        if let Ok(mut guard) = self.child.lock() {
            *guard = Some(process);
        }
        self.spawn_watcher();

        let _ = self.tx.send(PipEvent::Active);
        log::info!("PiP iniciado com {}", video.path().display());
        Ok(ActivePip {
            video: video.path().to_path_buf(),
            started_at: Instant::now(),
        })
    }

    fn stop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        let process = self.child.lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut process) = process {
            let _ = process.kill();
            let _ = process.wait();
            let _ = self.tx.send(PipEvent::Stopped);
            log::info!("PiP encerrado");
        }
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }

    fn events(&self) -> Receiver<PipEvent> {
        self.rx.clone()
    }
}

impl Drop for FfplayPip {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipState {
    Idle,
    Rendering,
    WaitingForSurface,
    Active,
    Failed,
}

/// Orquestra vídeo + sessão: renderiza, espera a superfície e inicia
pub struct PipController<S: PipSession> {
    session: S,
    events: Receiver<PipEvent>,
    retry: RetryPolicy,
    state: PipState,
    error_message: Option<String>,
    unsupported: bool,
    video: Option<VideoFile>,
}

impl<S: PipSession> PipController<S> {
    pub fn new(session: S, retry: RetryPolicy) -> Self {
        let events = session.events();
        Self {
            session,
            events,
            retry,
            state: PipState::Idle,
            error_message: None,
            unsupported: false,
            video: None,
        }
    }

    pub fn state(&self) -> PipState {
        self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn events(&self) -> Receiver<PipEvent> {
        self.events.clone()
    }

    /// Gera o vídeo do roteiro e abre o PiP com ele. Bloqueia até iniciar ou falhar
    pub fn present<G: GlyphSource + ?Sized>(
        &mut self,
        job: &BakeJob<G>,
        make_sink: SinkFactory,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(BakeProgress),
    ) -> Result<ActivePip, PipError> {
        if self.unsupported {
            return Err(PipError::Unsupported);
        }
        if !self.session.is_supported() {
            self.unsupported = true;
            return Err(self.fail(PipError::Unsupported));
        }

        self.stop();
        // eventos da sessão anterior não valem para a nova
        self.events.try_iter().for_each(drop);
        self.error_message = None;
        self.state = PipState::Rendering;
        let video = match bake_to_file(job, VideoFile::temporary(), make_sink, cancel, progress) {
            Ok(video) => video,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.state = PipState::WaitingForSurface;
        let session = &mut self.session;
        if let Err(e) = await_ready(|| session.is_ready(), self.retry) {
            return Err(self.fail(e));
        }

        match self.session.start(&video) {
            Ok(active) => {
                self.video = Some(video);
                self.state = PipState::Active;
                Ok(active)
            }
            Err(e) => {
                if matches!(e, PipError::Unsupported) {
                    self.unsupported = true;
                }
                Err(self.fail(e))
            }
        }
    }

    /// Encerra a sessão e apaga o vídeo
    pub fn stop(&mut self) {
        if self.state == PipState::Active {
            self.session.stop();
        }
        self.video = None;
        if self.state != PipState::Failed {
            self.state = PipState::Idle;
        }
    }

    pub fn handle_event(&mut self, event: &PipEvent) {
        match event {
            PipEvent::Active => self.state = PipState::Active,
            PipEvent::Stopped => {
                self.video = None;
                self.state = PipState::Idle;
            }
            PipEvent::Failed(reason) => {
                self.video = None;
                let _ = self.fail(PipError::Session(reason.clone()));
            }
        }
    }

    /// Processa eventos pendentes sem bloquear
    pub fn poll_events(&mut self) -> Vec<PipEvent> {
        let pending: Vec<PipEvent> = self.events.try_iter().collect();
        for event in &pending {
            self.handle_event(event);
        }
        pending
    }

    fn fail(&mut self, error: PipError) -> PipError {
        log::error!("{error}");
        self.error_message = Some(error.user_message().to_string());
        self.state = PipState::Failed;
        error
    }
}
