/// rprompter - Teleprompter com faixa de leitura
/// Janela ao vivo via wgpu/winit, vídeo para PiP via ffmpeg

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::WindowBuilder,
};

use rprompter::camera::NoCamera;
use rprompter::config::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use rprompter::pip::{FfplayPip, PipController, PipEvent, RetryPolicy};
use rprompter::renderer::{Frame, GlyphCache, Renderer, load_font};
use rprompter::script::{Script, ScriptId};
use rprompter::session::{Action, LiveSession};
use rprompter::settings::{
    DEFAULT_PALETTE_INDEX, JsonFileStore, Rgba, Rotation, SettingsStore, TeleprompterSettings, palette,
};
use rprompter::video::{BakeConfig, BakeEvent, BakeJob, BakeProgress, VideoFile, ffmpeg_sink, spawn_bake};

#[derive(Parser)]
#[command(name = "rprompter", version, about = "Teleprompter com faixa de leitura e vídeo para PiP")]
struct Cli {
    /// Arquivo de configurações (padrão: <config>/rprompter/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Abre a janela do teleprompter
    Live(ScriptArgs),
    /// Gera o vídeo MP4 do roteiro
    Bake {
        #[command(flatten)]
        script: ScriptArgs,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Gera o vídeo e abre em picture-in-picture
    Pip(ScriptArgs),
    /// Mostra ou altera as configurações salvas
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
    /// Lista as cores disponíveis
    Palette,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set(Overrides),
    Reset,
}

#[derive(Args)]
struct ScriptArgs {
    /// Arquivo de texto com o roteiro
    script: PathBuf,
    /// Fonte TrueType/OpenType
    #[arg(long)]
    font: Option<PathBuf>,
    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args, Default)]
struct Overrides {
    /// Segundos por linha (1-10)
    #[arg(long)]
    speed: Option<f32>,
    /// Tamanho da fonte (16-48)
    #[arg(long)]
    font_size: Option<f32>,
    /// 0, 90, 180 ou 270
    #[arg(long)]
    rotation: Option<i32>,
    /// Índice da paleta (0-7) ou #RRGGBB[AA]
    #[arg(long)]
    color: Option<String>,
}

impl Overrides {
    fn apply(&self, mut settings: TeleprompterSettings) -> Result<TeleprompterSettings> {
        if let Some(speed) = self.speed {
            settings.scroll_speed = speed;
        }
        if let Some(size) = self.font_size {
            settings.font_size = size;
        }
        if let Some(degrees) = self.rotation {
            settings.rotation =
                Rotation::from_degrees(degrees).ok_or_else(|| anyhow!("rotação inválida: {degrees}"))?;
        }
        if let Some(color) = &self.color {
            settings.text_color = parse_color(color)?;
        }
        Ok(settings.sanitized())
    }
}

fn parse_color(value: &str) -> Result<Rgba> {
    if let Ok(index) = value.parse::<usize>() {
        return palette()
            .get(index)
            .copied()
            .ok_or_else(|| anyhow!("índice de cor fora da paleta: {index}"));
    }
    Rgba::from_hex(value).ok_or_else(|| anyhow!("cor inválida: {value}"))
}

fn settings_store(path: Option<&Path>) -> Result<JsonFileStore> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => JsonFileStore::default_path().context("diretório de configuração indisponível")?,
    };
    Ok(JsonFileStore::new(path))
}

/// Configurações salvas; arquivo ausente ou inválido cai nos padrões
fn load_settings(store: &mut JsonFileStore) -> TeleprompterSettings {
    match store.load() {
        Ok(Some(settings)) => settings,
        Ok(None) => TeleprompterSettings::default(),
        Err(e) => {
            log::warn!("{e}; usando configurações padrão");
            TeleprompterSettings::default()
        }
    }
}

fn read_script(path: &Path) -> Result<Script> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("falha ao ler roteiro {}", path.display()))?;
    let script = Script::new(ScriptId(1), "", content);
    if script.is_draft() {
        log::warn!("roteiro vazio: {}", path.display());
    }
    Ok(script)
}

fn load_glyphs(font: Option<&Path>, settings: &TeleprompterSettings, text: &str) -> Result<GlyphCache> {
    let font = load_font(font)?;
    let mut glyphs = GlyphCache::new(Arc::new(font), settings.font_size);
    glyphs.prepare(text);
    Ok(glyphs)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut store = settings_store(cli.settings.as_deref())?;

    match cli.command {
        Command::Live(args) => {
            let settings = args.overrides.apply(load_settings(&mut store))?;
            run_live(&args, settings)
        }
        Command::Bake { script, output } => {
            let settings = script.overrides.apply(load_settings(&mut store))?;
            run_bake(&script, settings, output)
        }
        Command::Pip(args) => {
            let settings = args.overrides.apply(load_settings(&mut store))?;
            run_pip(&args, settings)
        }
        Command::Settings { action } => run_settings(&mut store, action.unwrap_or(SettingsAction::Show)),
        Command::Palette => {
            for (index, color) in palette().iter().enumerate() {
                let marker = if index == DEFAULT_PALETTE_INDEX { " (padrão)" } else { "" };
                println!("{index}: {}{marker}", color.to_hex());
            }
            Ok(())
        }
    }
}

fn run_live(args: &ScriptArgs, settings: TeleprompterSettings) -> Result<()> {
    let script = read_script(&args.script)?;
    let glyphs = Arc::new(load_glyphs(args.font.as_deref(), &settings, &script.content)?);
    let mut session = LiveSession::new(&script, settings, glyphs, Box::new(NoCamera::default()));
    let mut rotation = session.settings().rotation;

    let event_loop = EventLoop::new()?;

    // Cria a janela
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("rprompter - {}", script.display_title()))
            .with_inner_size(winit::dpi::LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT))
            .build(&event_loop)?,
    );

    // Inicializa renderer
    let mut renderer = pollster::block_on(Renderer::new(window.clone(), rotation))?;
    let (width, height) = renderer.frame_dimensions();
    let mut frame = Frame::new(width, height);

    session.open(Instant::now());

    // Loop principal
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    session.handle(Action::Close);
                    elwt.exit();
                }

                WindowEvent::Resized(physical_size) => {
                    renderer.resize(physical_size);
                    window.request_redraw();
                }

                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key,
                            ..
                        },
                    ..
                } => {
                    let action = match logical_key.as_ref() {
                        Key::Named(NamedKey::Space) => Some(Action::TogglePause),
                        Key::Named(NamedKey::Escape) => Some(Action::Close),
                        Key::Character("r" | "R") => Some(Action::Restart),
                        Key::Character("c" | "C") => Some(Action::SwitchCamera),
                        Key::Character("t" | "T") => {
                            rotation = rotation.next();
                            renderer.set_rotation(rotation);
                            log::info!("rotação: {}°", rotation.degrees());
                            None
                        }
                        _ => None,
                    };

                    if let Some(action) = action {
                        if !session.handle(action) {
                            elwt.exit();
                            return;
                        }
                    }
                    window.request_redraw();
                }

                WindowEvent::RedrawRequested => {
                    let (width, height) = renderer.frame_dimensions();
                    if (frame.width, frame.height) != (width, height) {
                        frame = Frame::new(width, height);
                    }
                    session.render_into(&mut frame);
                    if let Err(e) = renderer.render(&frame) {
                        log::error!("Erro de renderização: {:?}", e);
                    }
                }

                _ => {}
            },

            Event::AboutToWait => {
                // Acorda no próximo tick do relógio em vez de girar em Poll
                if session.tick(Instant::now()) > 0 {
                    window.request_redraw();
                }
                match session.next_deadline() {
                    Some(deadline) => elwt.set_control_flow(ControlFlow::WaitUntil(deadline)),
                    None => elwt.set_control_flow(ControlFlow::Wait),
                }
            }

            _ => {}
        }
    })?;

    Ok(())
}

fn bake_job(args: &ScriptArgs, settings: TeleprompterSettings) -> Result<BakeJob<GlyphCache>> {
    let script = read_script(&args.script)?;
    let glyphs = load_glyphs(args.font.as_deref(), &settings, &script.content)?;
    Ok(BakeJob::for_script(
        Arc::new(glyphs),
        &script.content,
        settings,
        BakeConfig::default(),
    ))
}

/// Loga o progresso a cada 10%
fn progress_logger() -> impl FnMut(BakeProgress) {
    let mut last = 0;
    move |p: BakeProgress| {
        let percent = (p.fraction() * 100.0) as u32;
        if percent / 10 > last / 10 || p.written == p.total {
            log::info!("renderizando: {}/{} quadros ({percent}%)", p.written, p.total);
            last = percent;
        }
    }
}

fn run_bake(args: &ScriptArgs, settings: TeleprompterSettings, output: PathBuf) -> Result<()> {
    let job = bake_job(args, settings)?;
    log::info!("gerando {} quadros em {}", job.frame_count(), output.display());

    let handle = spawn_bake(job, VideoFile::new(&output), ffmpeg_sink());
    let mut report = progress_logger();
    for event in handle.events.iter() {
        match event {
            BakeEvent::Progress(p) => report(p),
            BakeEvent::Finished(video) => {
                println!("{}", video.keep().display());
                return Ok(());
            }
            BakeEvent::Failed(e) => return Err(e).context("falha ao gerar o vídeo"),
        }
    }
    bail!("renderização terminou sem resultado")
}

fn run_pip(args: &ScriptArgs, settings: TeleprompterSettings) -> Result<()> {
    let job = bake_job(args, settings)?;
    let mut controller = PipController::new(FfplayPip::new(), RetryPolicy::default());
    let cancel = AtomicBool::new(false);
    let mut report = progress_logger();

    if let Err(e) = controller.present(&job, ffmpeg_sink(), &cancel, &mut report) {
        if let Some(message) = controller.error_message() {
            eprintln!("{message}");
        }
        return Err(e.into());
    }

    // Bloqueia até a janela PiP fechar
    let events = controller.events();
    for event in events.iter() {
        controller.handle_event(&event);
        if let PipEvent::Failed(reason) = &event {
            bail!("PiP encerrado com erro: {reason}");
        }
        if event == PipEvent::Stopped {
            break;
        }
    }
    controller.stop();
    Ok(())
}

fn run_settings(store: &mut JsonFileStore, action: SettingsAction) -> Result<()> {
    let settings = match action {
        SettingsAction::Show => load_settings(store),
        SettingsAction::Set(overrides) => {
            let settings = overrides.apply(load_settings(store))?;
            store.save(&settings)?;
            settings
        }
        SettingsAction::Reset => {
            let settings = TeleprompterSettings::default();
            store.save(&settings)?;
            settings
        }
    };

    println!("arquivo:    {}", store.path().display());
    println!("velocidade: {:.1} s/linha", settings.scroll_speed);
    println!("fonte:      {}", settings.font_size);
    println!("rotação:    {}°", settings.rotation.degrees());
    println!("cor:        {}", settings.text_color.to_hex());
    Ok(())
}
