/// Vídeo pré-renderizado para o picture-in-picture
/// Quadros gerados em lotes paralelos e gravados em ordem estrita

pub mod encoder;

pub use encoder::{FfmpegEncoder, FrameSink, RenderError, VideoFile};

use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::config::{
    BATCH_SIZE, MAX_VIDEO_SECONDS, MIN_VIDEO_SECONDS, VIDEO_FPS, VIDEO_HEIGHT, VIDEO_WIDTH,
};
use crate::prompter::{WrappedLines, wrap_text};
use crate::renderer::{FrameLayout, FrameRasterizer, GlyphSource};
use crate::settings::TeleprompterSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BakeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub batch_size: usize,
    pub workers: usize,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            width: VIDEO_WIDTH,
            height: VIDEO_HEIGHT,
            fps: VIDEO_FPS,
            batch_size: BATCH_SIZE,
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        }
    }
}

/// Total de quadros: duração limitada a [10, 300] s
pub fn frame_count(row_count: usize, seconds_per_line: f32, fps: u32) -> usize {
    let seconds = (row_count as f32 * seconds_per_line).clamp(MIN_VIDEO_SECONDS, MAX_VIDEO_SECONDS);
    (seconds * fps as f32).round() as usize
}

/// Offset de rolagem do quadro `index`
pub fn frame_offset(index: usize, rate: f32, fps: u32) -> f32 {
    index as f32 * (rate / fps as f32)
}

/// Gera os itens de `range` em paralelo e devolve ordenados pelo índice
pub fn generate_batch<T, F>(range: Range<usize>, workers: usize, render: F) -> Result<Vec<(usize, T)>, RenderError>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let results = Mutex::new(Vec::with_capacity(range.len()));
    let next = AtomicUsize::new(range.start);
    let workers = workers.clamp(1, range.len().max(1));

    thread::scope(|s| -> Result<(), RenderError> {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(s.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= range.end {
                        break;
                    }
                    let item = render(index);
                    if let Ok(mut done) = results.lock() {
                        done.push((index, item));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().map_err(|_| RenderError::WorkerPanicked)?;
        }
        Ok(())
    })?;

    let mut items = results.into_inner().map_err(|_| RenderError::WorkerPanicked)?;
    if items.len() != range.len() {
        return Err(RenderError::WorkerPanicked);
    }
    items.sort_by_key(|(index, _)| *index);
    Ok(items)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BakeProgress {
    pub written: usize,
    pub total: usize,
}

impl BakeProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 { 1.0 } else { self.written as f32 / self.total as f32 }
    }
}

/// Tudo que é preciso para renderizar o vídeo de um roteiro
pub struct BakeJob<G: ?Sized> {
    pub glyphs: Arc<G>,
    pub lines: Arc<WrappedLines>,
    pub settings: TeleprompterSettings,
    pub config: BakeConfig,
}

impl<G: GlyphSource> BakeJob<G> {
    /// Quebra o roteiro para a geometria do vídeo
    pub fn for_script(glyphs: Arc<G>, text: &str, settings: TeleprompterSettings, config: BakeConfig) -> Self {
        let settings = settings.sanitized();
        let layout = FrameLayout::new(config.width, config.height, &settings);
        let lines = wrap_text(text, layout.wrap_width(), glyphs.as_ref(), layout.trailing_rows());
        Self {
            glyphs,
            lines: Arc::new(lines),
            settings,
            config,
        }
    }
}

impl<G: GlyphSource + ?Sized> BakeJob<G> {
    pub fn frame_count(&self) -> usize {
        frame_count(self.lines.len(), self.settings.scroll_speed, self.config.fps)
    }

    pub fn layout(&self) -> FrameLayout {
        FrameLayout::new(self.config.width, self.config.height, &self.settings)
    }

    /// Renderiza todos os quadros no `sink`. O cancelamento é verificado entre lotes
    pub fn run(
        &self,
        sink: &mut dyn FrameSink,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(BakeProgress),
    ) -> Result<usize, RenderError> {
        let total = self.frame_count();
        let raster = FrameRasterizer::new(self.layout(), self.glyphs.as_ref(), self.settings.text_color);
        let rate = self.settings.scroll_rate();
        let fps = self.config.fps;
        let batch_size = self.config.batch_size.max(1);
        let lines = self.lines.as_ref();

        let mut start = 0;
        while start < total {
            if cancel.load(Ordering::Relaxed) {
                log::info!("renderização cancelada em {start}/{total}");
                return Err(RenderError::Cancelled);
            }
            let end = (start + batch_size).min(total);
            let batch = generate_batch(start..end, self.config.workers, |index| {
                raster.render(frame_offset(index, rate, fps), lines)
            })?;
            for (index, frame) in &batch {
                sink.write_frame(*index, frame)?;
            }
            start = end;
            progress(BakeProgress {
                written: start,
                total,
            });
        }
        Ok(total)
    }
}

/// Cria o destino dos quadros para um arquivo
pub type SinkFactory =
    Box<dyn FnOnce(&Path, &BakeConfig) -> Result<Box<dyn FrameSink + Send>, RenderError> + Send>;

pub fn ffmpeg_sink() -> SinkFactory {
    Box::new(|path, config| {
        let encoder = FfmpegEncoder::spawn(path, config.width, config.height, config.fps)?;
        Ok(Box::new(encoder) as Box<dyn FrameSink + Send>)
    })
}

/// Renderiza o vídeo inteiro, bloqueando. Em erro o arquivo parcial é apagado
pub fn bake_to_file<G: GlyphSource + ?Sized>(
    job: &BakeJob<G>,
    output: VideoFile,
    make_sink: SinkFactory,
    cancel: &AtomicBool,
    progress: &mut dyn FnMut(BakeProgress),
) -> Result<VideoFile, RenderError> {
    let mut sink = make_sink(output.path(), &job.config)?;
    let frames = match job.run(sink.as_mut(), cancel, progress) {
        Ok(frames) => frames,
        Err(e) => {
            // encoder encerrado antes de o arquivo parcial ser apagado
            drop(sink);
            return Err(e);
        }
    };
    sink.finish()?;
    log::info!("vídeo pronto: {} ({frames} quadros)", output.path().display());
    Ok(output)
}

pub enum BakeEvent {
    Progress(BakeProgress),
    Finished(VideoFile),
    Failed(RenderError),
}

/// Renderização em segundo plano
pub struct BakeHandle {
    pub events: Receiver<BakeEvent>,
    cancel: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BakeHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Espera o resultado final, descartando o progresso
    pub fn wait(mut self) -> Result<VideoFile, RenderError> {
        let mut outcome = Err(RenderError::WorkerPanicked);
        for event in self.events.iter() {
            match event {
                BakeEvent::Progress(_) => {}
                BakeEvent::Finished(video) => outcome = Ok(video),
                BakeEvent::Failed(e) => outcome = Err(e),
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        outcome
    }
}

pub fn spawn_bake<G>(job: BakeJob<G>, output: VideoFile, make_sink: SinkFactory) -> BakeHandle
where
    G: GlyphSource + Send + ?Sized + 'static,
{
    let (tx, rx): (Sender<BakeEvent>, Receiver<BakeEvent>) = unbounded();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let thread = thread::spawn(move || {
        let progress_tx = tx.clone();
        let mut progress = |p: BakeProgress| {
            let _ = progress_tx.send(BakeEvent::Progress(p));
        };
        let event = match bake_to_file(&job, output, make_sink, &flag, &mut progress) {
            Ok(video) => BakeEvent::Finished(video),
            Err(e) => {
                log::error!("falha ao renderizar vídeo: {e}");
                BakeEvent::Failed(e)
            }
        };
        let _ = tx.send(event);
    });

    BakeHandle {
        events: rx,
        cancel,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::raster::tests::BlockGlyphs;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        indices: Arc<Mutex<Vec<usize>>>,
        finished: Arc<AtomicBool>,
    }

    impl FrameSink for Recorder {
        fn write_frame(&mut self, index: usize, _frame: &crate::renderer::Frame) -> Result<(), RenderError> {
            self.indices.lock().unwrap().push(index);
            Ok(())
        }
        fn finish(self: Box<Self>) -> Result<(), RenderError> {
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn job(text: &str, seconds_per_line: f32) -> BakeJob<BlockGlyphs> {
        let glyphs = BlockGlyphs::new();
        let lines = wrap_text(text, 40.0, &glyphs, 2);
        BakeJob {
            glyphs: Arc::new(glyphs),
            lines: Arc::new(lines),
            settings: TeleprompterSettings {
                scroll_speed: seconds_per_line,
                ..Default::default()
            },
            config: BakeConfig {
                width: 64,
                height: 48,
                fps: 30,
                batch_size: 30,
                workers: 4,
            },
        }
    }

    #[test]
    fn frame_count_clamps_duration() {
        assert_eq!(frame_count(10, 3.0, 30), 900);
        // mínimo de 10 s
        assert_eq!(frame_count(0, 3.0, 30), 300);
        assert_eq!(frame_count(2, 1.0, 30), 300);
        // máximo de 300 s
        assert_eq!(frame_count(1000, 10.0, 30), 9000);
    }

    #[test]
    fn for_script_wraps_for_video_geometry() {
        let config = BakeConfig {
            width: 320,
            height: 200,
            fps: 30,
            batch_size: 30,
            workers: 2,
        };
        let job = BakeJob::for_script(
            Arc::new(BlockGlyphs::new()),
            "Hello\n\nWorld",
            TeleprompterSettings::default(),
            config,
        );
        assert_eq!(job.lines.content_rows(), ["Hello", "World"]);
        // ceil(200 * 0.7 / 36)
        assert_eq!(job.lines.trailing(), 4);
    }

    #[test]
    fn frame_offsets_follow_rate() {
        // 36 px/linha a 2 s/linha = 18 px/s
        assert_eq!(frame_offset(0, 18.0, 30), 0.0);
        assert!((frame_offset(60, 18.0, 30) - 36.0).abs() < 1e-4);
    }

    #[test]
    fn batch_is_written_in_index_order_regardless_of_completion() {
        // Quadros menores terminam por último
        let batch = generate_batch(0..30, 8, |index| {
            thread::sleep(Duration::from_millis(((30 - index) % 7) as u64));
            index * 2
        })
        .unwrap();
        let order: Vec<usize> = batch.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..30).collect::<Vec<_>>());
        assert!(batch.iter().all(|(i, v)| *v == i * 2));
    }

    #[test]
    fn run_writes_every_frame_in_order() {
        let job = job("Olá\nMundo", 1.0);
        let mut sink = Recorder::default();
        let indices = Arc::clone(&sink.indices);
        let mut updates = Vec::new();
        let total = job
            .run(&mut sink, &AtomicBool::new(false), &mut |p| updates.push(p))
            .unwrap();

        assert_eq!(total, job.frame_count());
        let written = indices.lock().unwrap().clone();
        assert_eq!(written, (0..total).collect::<Vec<_>>());
        assert_eq!(updates.len(), total.div_ceil(30));
        assert_eq!(updates.last().map(|p| p.written), Some(total));
    }

    #[test]
    fn cancellation_stops_between_batches() {
        let job = job("Olá\nMundo", 1.0);
        let mut sink = Recorder::default();
        let indices = Arc::clone(&sink.indices);
        let cancel = AtomicBool::new(false);
        let result = job.run(&mut sink, &cancel, &mut |_| cancel.store(true, Ordering::Relaxed));

        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(indices.lock().unwrap().len(), 30);
    }

    #[test]
    fn spawned_bake_reports_progress_and_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let output = VideoFile::new(dir.path().join("out.mp4"));
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let make_sink: SinkFactory = Box::new(move |_, _| {
            Ok(Box::new(Recorder {
                finished: flag,
                ..Default::default()
            }) as Box<dyn FrameSink + Send>)
        });

        let handle = spawn_bake(job("Olá", 1.0), output, make_sink);
        let mut progress = 0;
        let mut video = None;
        for event in handle.events.iter() {
            match event {
                BakeEvent::Progress(_) => progress += 1,
                BakeEvent::Finished(v) => video = Some(v),
                BakeEvent::Failed(e) => panic!("falhou: {e}"),
            }
        }
        assert_eq!(progress, 10);
        assert!(video.is_some());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn sink_failure_is_terminal() {
        let output = VideoFile::new(std::env::temp_dir().join("rprompter-never-written.mp4"));
        let make_sink: SinkFactory = Box::new(|_, _| Err(RenderError::EncoderMissing));
        let result = spawn_bake(job("Olá", 1.0), output, make_sink).wait();
        assert!(matches!(result, Err(RenderError::EncoderMissing)));
    }

    struct FailingSink {
        fail_at: usize,
    }

    impl FrameSink for FailingSink {
        fn write_frame(&mut self, index: usize, _frame: &crate::renderer::Frame) -> Result<(), RenderError> {
            if index == self.fail_at {
                return Err(RenderError::EncoderWrite {
                    frame: index,
                    source: std::io::Error::from(std::io::ErrorKind::BrokenPipe),
                });
            }
            Ok(())
        }
        fn finish(self: Box<Self>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn partial_file_is_removed_when_a_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        let make_sink: SinkFactory = Box::new(|path, _| {
            std::fs::write(path, b"parcial").map_err(RenderError::EncoderSpawn)?;
            Ok(Box::new(FailingSink { fail_at: 7 }) as Box<dyn FrameSink + Send>)
        });

        let result = bake_to_file(
            &job("Olá", 1.0),
            VideoFile::new(&path),
            make_sink,
            &AtomicBool::new(false),
            &mut |_| {},
        );
        assert!(matches!(result, Err(RenderError::EncoderWrite { frame: 7, .. })));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_bake_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cancelled.mp4");
        let make_sink: SinkFactory = Box::new(|path, config| {
            let command = encoder::tests::late_writer(path);
            let encoder = FfmpegEncoder::with_command(command, config.width, config.height)?;
            Ok(Box::new(encoder) as Box<dyn FrameSink + Send>)
        });

        let cancel = AtomicBool::new(false);
        let result = bake_to_file(
            &job("Olá", 1.0),
            VideoFile::new(&path),
            make_sink,
            &cancel,
            &mut |_| cancel.store(true, Ordering::Relaxed),
        );
        assert!(matches!(result, Err(RenderError::Cancelled)));
        // o encoder falso gravaria 0.3 s depois do EOF
        thread::sleep(Duration::from_millis(600));
        assert!(!path.exists());
    }
}
