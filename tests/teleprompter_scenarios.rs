use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rprompter::camera::NoCamera;
use rprompter::prompter::{HighlightBand, TextMeasure};
use rprompter::renderer::{Frame, Glyph, GlyphSource};
use rprompter::script::{SaveOutcome, Script, ScriptId, ScriptLibrary};
use rprompter::session::{Action, LiveSession};
use rprompter::settings::TeleprompterSettings;
use rprompter::video::{BakeConfig, BakeJob, FrameSink, RenderError, VideoFile, bake_to_file};

/// Cada caractere visível vira um bloco de 8x16
struct Blocks(Glyph);

impl Blocks {
    fn new() -> Self {
        Self(Glyph {
            width: 8,
            height: 16,
            xmin: 0,
            ymin: 0,
            advance: 10.0,
            coverage: vec![255; 8 * 16],
        })
    }
}

impl TextMeasure for Blocks {
    fn advance(&self, _c: char) -> f32 {
        10.0
    }
    fn font_size(&self) -> f32 {
        24.0
    }
}

impl GlyphSource for Blocks {
    fn glyph(&self, c: char) -> Option<&Glyph> {
        (!c.is_whitespace()).then_some(&self.0)
    }
    fn ascent(&self) -> f32 {
        16.0
    }
}

struct OrderSink(Arc<Mutex<Vec<usize>>>);

impl FrameSink for OrderSink {
    fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), RenderError> {
        assert_eq!((frame.width, frame.height), (160, 64));
        self.0.lock().unwrap().push(index);
        Ok(())
    }
    fn finish(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

fn hello_world_session() -> LiveSession<Blocks> {
    let script = Script::new(ScriptId(7), "", "Hello\nWorld");
    let settings = TeleprompterSettings {
        scroll_speed: 2.0,
        ..Default::default()
    };
    LiveSession::new(&script, settings, Arc::new(Blocks::new()), Box::new(NoCamera::default()))
}

#[test]
fn hello_world_scrolls_one_line_in_two_seconds() {
    let mut live = hello_world_session();
    let lines = live.lines(400, 300);
    assert_eq!(lines.content_rows(), ["Hello", "World"]);
    // ceil(300 * 0.7 / 36) = 6
    assert_eq!(lines.trailing(), 6);

    let band = HighlightBand::new(300.0, 36.0);
    let t0 = Instant::now();
    live.open(t0);
    // "Hello" (linha 1) já começa na faixa
    assert!(band.is_highlighted(band.screen_y(1, live.offset())));

    live.tick(t0 + Duration::from_secs(2));
    assert!((live.offset() - 36.0).abs() <= 0.61);

    // depois de uma linha de rolagem "Hello" está no centro da faixa
    assert!((band.screen_y(1, live.offset()) - band.band_y()).abs() <= 0.61);
    assert!(band.is_highlighted(band.screen_y(2, live.offset())));
    assert!(!band.is_highlighted(band.screen_y(3, live.offset())));
}

#[test]
fn pause_and_resume_keep_the_offset_continuous() {
    let mut live = hello_world_session();
    let t0 = Instant::now();
    live.open(t0);
    live.tick(t0 + Duration::from_millis(500));
    live.handle(Action::TogglePause);
    let paused_at = live.offset();

    live.tick(t0 + Duration::from_secs(10));
    live.handle(Action::TogglePause);
    assert_eq!(live.offset(), paused_at);

    // no máximo dois ticks de 0.6 px após retomar
    live.tick(t0 + Duration::from_secs(10) + Duration::from_millis(34));
    assert!(live.offset() - paused_at <= 1.21);
}

#[test]
fn closing_the_view_stops_the_clock() {
    let mut live = hello_world_session();
    let t0 = Instant::now();
    live.open(t0);
    live.handle(Action::Close);
    assert!(!live.is_open());
    assert_eq!(live.tick(t0 + Duration::from_secs(3)), 0);
    assert_eq!(live.offset(), 0.0);
}

#[test]
fn baked_frames_arrive_in_order() {
    let config = BakeConfig {
        width: 160,
        height: 64,
        fps: 30,
        batch_size: 30,
        workers: 6,
    };
    let job = BakeJob::for_script(
        Arc::new(Blocks::new()),
        "Hello\nWorld",
        TeleprompterSettings {
            scroll_speed: 1.0,
            ..Default::default()
        },
        config,
    );
    assert_eq!(job.lines.content_rows(), ["Hello", "World"]);
    // 5 linhas a 1 s/linha sobem para a duração mínima de 10 s
    assert_eq!(job.frame_count(), 300);

    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&written);
    let dir = tempfile::tempdir().unwrap();
    let video = bake_to_file(
        &job,
        VideoFile::new(dir.path().join("hello.mp4")),
        Box::new(move |_, _| Ok(Box::new(OrderSink(sink)) as Box<dyn FrameSink + Send>)),
        &AtomicBool::new(false),
        &mut |_| {},
    )
    .unwrap();

    assert_eq!(*written.lock().unwrap(), (0..300).collect::<Vec<_>>());
    assert!(video.path().ends_with("hello.mp4"));
}

#[test]
fn draft_lifecycle() {
    let mut library = ScriptLibrary::new();
    let draft = library.create_draft();
    assert!(library.cancel_edit(draft));
    assert!(library.is_empty());

    let id = library.create_draft();
    assert_eq!(library.save(id, "Primeira linha\nSegunda"), SaveOutcome::Updated);
    assert_eq!(library.get(id).map(Script::display_title).as_deref(), Some("Primeira linha"));

    assert_eq!(library.save(id, "   \n"), SaveOutcome::Deleted);
    assert!(library.get(id).is_none());
}
