/// Saída de vídeo: quadros RGBA entram pelo stdin do ffmpeg, sai H.264 em MP4

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::renderer::Frame;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("ffmpeg não encontrado no PATH")]
    EncoderMissing,
    #[error("falha ao iniciar o encoder: {0}")]
    EncoderSpawn(#[source] std::io::Error),
    #[error("falha ao escrever quadro {frame}: {source}")]
    EncoderWrite {
        frame: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("falha ao finalizar o encoder: {0}")]
    EncoderFlush(#[source] std::io::Error),
    #[error("encoder terminou com {0}")]
    EncoderExit(ExitStatus),
    #[error("quadro {frame} com tamanho {got:?}, esperado {expected:?}")]
    FrameSize {
        frame: usize,
        got: (u32, u32),
        expected: (u32, u32),
    },
    #[error("renderização cancelada")]
    Cancelled,
    #[error("falha num worker de quadros")]
    WorkerPanicked,
}

/// Destino dos quadros, em ordem de apresentação
pub trait FrameSink {
    fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), RenderError>;
    fn finish(self: Box<Self>) -> Result<(), RenderError>;
}

/// Encoder H.264/MP4 num processo ffmpeg
///
/// Se for descartado sem `finish` (cancelamento ou erro), o processo é morto
/// antes de poder gravar o arquivo de saída.
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    finished: bool,
}

impl FfmpegEncoder {
    pub fn spawn(output: &Path, width: u32, height: u32, fps: u32) -> Result<Self, RenderError> {
        let mut command = Command::new("ffmpeg");
        command
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgba")
            .arg("-s:v")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-movflags")
            .arg("+faststart")
            .arg(output)
            .stderr(Stdio::inherit());

        let encoder = Self::with_command(command, width, height)?;
        log::info!("encoder iniciado: {} ({width}x{height} @ {fps} fps)", output.display());
        Ok(encoder)
    }

    /// Inicia um encoder que lê quadros `width`x`height` RGBA do stdin
    pub fn with_command(mut command: Command, width: u32, height: u32) -> Result<Self, RenderError> {
        command.stdin(Stdio::piped()).stdout(Stdio::null());
        let mut child = command.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RenderError::EncoderMissing
            } else {
                RenderError::EncoderSpawn(e)
            }
        })?;
        let Some(stdin) = child.stdin.take() else {
            // sem stdin o processo não tem o que fazer
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::EncoderSpawn(std::io::Error::other(
                "stdin do encoder indisponível",
            )));
        };
        Ok(Self {
            child,
            stdin: Some(stdin),
            width,
            height,
            finished: false,
        })
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, index: usize, frame: &Frame) -> Result<(), RenderError> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(RenderError::FrameSize {
                frame: index,
                got: (frame.width, frame.height),
                expected: (self.width, self.height),
            });
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| RenderError::EncoderWrite {
            frame: index,
            source: std::io::Error::from(ErrorKind::BrokenPipe),
        })?;
        stdin
            .write_all(frame.as_bytes())
            .map_err(|source| RenderError::EncoderWrite { frame: index, source })
    }

    fn finish(mut self: Box<Self>) -> Result<(), RenderError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().map_err(RenderError::EncoderFlush)?;
        }
        let status = self.child.wait().map_err(RenderError::EncoderFlush)?;
        self.finished = true;
        if !status.success() {
            return Err(RenderError::EncoderExit(status));
        }
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // mata antes de fechar o stdin: com EOF o ffmpeg finalizaria o arquivo
        if let Err(e) = self.child.kill() {
            log::debug!("encoder já encerrado: {e}");
        }
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) => log::warn!("encoder interrompido ({status})"),
            Err(e) => log::warn!("falha ao aguardar o encoder: {e}"),
        }
    }
}

/// Arquivo de vídeo de uma sessão PiP; apagado ao sair de escopo
#[derive(Debug)]
pub struct VideoFile {
    path: PathBuf,
    keep: bool,
}

impl VideoFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: false,
        }
    }

    /// Caminho temporário único para uma sessão
    pub fn temporary() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let name = format!(
            "rprompter-{}-{}-{}.mp4",
            std::process::id(),
            chrono::Utc::now().timestamp_millis(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        Self::new(std::env::temp_dir().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mantém o arquivo em disco depois do drop
    pub fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for VideoFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("vídeo removido: {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("falha ao remover {}: {e}", self.path.display()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn video_file_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pip.mp4");
        std::fs::write(&path, b"x").unwrap();
        drop(VideoFile::new(&path));
        assert!(!path.exists());
    }

    #[test]
    fn kept_video_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.mp4");
        std::fs::write(&path, b"x").unwrap();
        let kept = VideoFile::new(&path).keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[test]
    fn temporary_paths_are_mp4_in_temp_dir() {
        let file = VideoFile::temporary();
        assert!(file.path().starts_with(std::env::temp_dir()));
        assert_eq!(file.path().extension().unwrap(), "mp4");
        assert_ne!(file.path(), VideoFile::temporary().path());
    }

    /// Encoder falso: lê o stdin até o EOF e só então grava o arquivo em `$0`
    #[cfg(unix)]
    pub(crate) fn late_writer(output: &Path) -> Command {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg("cat > /dev/null; sleep 0.3; printf x > \"$0\"")
            .arg(output);
        command
    }

    #[cfg(unix)]
    #[test]
    fn finished_encoder_waits_for_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("done.mp4");
        let mut encoder = FfmpegEncoder::with_command(late_writer(&out), 2, 2).unwrap();
        encoder.write_frame(0, &Frame::new(2, 2)).unwrap();
        Box::new(encoder).finish().unwrap();
        assert!(out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dropped_encoder_never_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("late.mp4");
        let mut encoder = FfmpegEncoder::with_command(late_writer(&out), 2, 2).unwrap();
        encoder.write_frame(0, &Frame::new(2, 2)).unwrap();
        drop(encoder);
        std::thread::sleep(Duration::from_millis(600));
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn wrong_frame_size_is_rejected() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("cat > /dev/null");
        let mut encoder = FfmpegEncoder::with_command(command, 2, 2).unwrap();
        let err = encoder.write_frame(4, &Frame::new(3, 2)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::FrameSize {
                frame: 4,
                got: (3, 2),
                expected: (2, 2)
            }
        ));
    }
}
