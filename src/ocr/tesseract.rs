//! OCR through the `tesseract` executable.

use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::{GrayImage, ImageFormat};

use super::OcrEngine;
use crate::error::{Error, Result};
use crate::options::DEFAULT_OCR_TIMEOUT;

/// How often a running child is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Pipes a PNG into `tesseract stdin stdout -l <language>`.
///
/// A run that outlives the timeout is killed and reaped before
/// [`Error::Timeout`] is returned.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    timeout: Option<Duration>,
}

/// Kills and reaps the child unless it already exited.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        buf
    })
}

impl TesseractEngine {
    /// Engine using `tesseract` from `PATH` and English.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the recognition language (e.g. `eng`, `deu+eng`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Bound each run; `None` waits for as long as tesseract takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the executable can be started at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Wait for exit, killing the child once the deadline passes.
    fn wait(&self, child: &mut ChildGuard) -> Result<ExitStatus> {
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));
        loop {
            if let Some(status) = child.0.try_wait()? {
                return Ok(status);
            }
            if let Some((at, limit)) = deadline {
                if Instant::now() >= at {
                    log::warn!("tesseract still running after {:?}, killing it", limit);
                    let _ = child.0.kill();
                    let _ = child.0.wait();
                    return Err(Error::Timeout(limit));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        Ok(png.into_inner())
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            timeout: Some(DEFAULT_OCR_TIMEOUT),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let png = Self::encode_png(image)?;

        let child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Ocr(format!("cannot start {}: {}", self.binary.display(), e)))?;
        let mut child = ChildGuard(child);

        // Pipes are serviced off this thread so a stuck child cannot block us
        let stdin = child.0.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&png),
            None => Ok(()),
        });
        let stdout = drain::<ChildStdout>(child.0.stdout.take());
        let stderr = drain::<ChildStderr>(child.0.stderr.take());

        let status = self.wait(&mut child)?;
        let written = writer.join();
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            return Err(Error::Ocr(format!(
                "tesseract exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(Error::Ocr("stdin writer panicked".to_string())),
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
