use image::RgbImage;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::application::ports::FrameSource;
use crate::domain::camera::FrameSize;
use crate::domain::errors::{DomainError, DomainResult};

/// Longitud máxima del detalle de error tomado de stderr.
const MAX_DETAIL_CHARS: usize = 300;

/// Decodifica un fichero o URL con `ffmpeg`, leyendo frames RGB24 crudos por stdout.
pub struct FfmpegReader {
    input: String,
    child: Child,
    stdout: ChildStdout,
    /// Hilo que vacía stderr; devuelve la última línea no vacía.
    stderr_tail: Option<JoinHandle<String>>,
    size: FrameSize,
    frames: u64,
    finished: bool,
}

impl FfmpegReader {
    pub fn spawn(binary: &str, input: &str, size: FrameSize) -> DomainResult<Self> {
        let mut child = Command::new(binary)
            .args(["-nostdin", "-loglevel", "error", "-i", input])
            .args(["-vf", &format!("scale={}:{}", size.width, size.height)])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DomainError::SourceUnavailable(format!("cannot start {binary}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomainError::SourceUnavailable("ffmpeg stdout not captured".into()))?;

        // stderr se drena siempre: con la tubería llena ffmpeg deja de escribir frames
        let stderr_tail = child.stderr.take().map(|pipe| {
            std::thread::spawn(move || drain_stderr(pipe))
        });

        debug!("🎬 ffmpeg decodificando {} a {}x{}", input, size.width, size.height);
        Ok(Self {
            input: input.to_string(),
            child,
            stdout,
            stderr_tail,
            size,
            frames: 0,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.size.width as usize * self.size.height as usize * 3
    }

    /// Espera a ffmpeg y decide si el final fue limpio.
    fn finish(&mut self) -> DomainResult<Option<RgbImage>> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| DomainError::SourceUnavailable(format!("ffmpeg: {e}")))?;
        let last_line = self
            .stderr_tail
            .take()
            .and_then(|tail| tail.join().ok())
            .unwrap_or_default();

        if self.frames == 0 && !status.success() {
            let detail = if last_line.is_empty() { "no frames decoded".to_string() } else { last_line };
            return Err(DomainError::SourceUnavailable(format!("{}: {}", self.input, detail)));
        }
        if !status.success() {
            warn!("ffmpeg terminó con {} tras {} frames de {}", status, self.frames, self.input);
        }
        Ok(None)
    }
}

fn drain_stderr(pipe: ChildStderr) -> String {
    let mut last = String::new();
    let mut reader = BufReader::new(pipe);
    let mut line = Vec::new();
    // Líneas sin UTF-8 válido no cortan el drenado
    while let Ok(n) = reader.read_until(b'\n', &mut line) {
        if n == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if !text.is_empty() {
            last = text.chars().take(MAX_DETAIL_CHARS).collect();
        }
        line.clear();
    }
    last
}

impl FrameSource for FfmpegReader {
    fn next_frame(&mut self) -> DomainResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {}
            // Un frame cortado al final cuenta como fin de fuente
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return self.finish(),
            Err(e) => return Err(DomainError::SourceUnavailable(format!("ffmpeg read: {e}"))),
        }
        self.frames += 1;
        RgbImage::from_raw(self.size.width, self.size.height, buf)
            .map(Some)
            .ok_or_else(|| DomainError::SourceUnavailable("short ffmpeg frame".into()))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
        // El hilo de stderr queda suelto y termina al cerrarse la tubería
    }
}
