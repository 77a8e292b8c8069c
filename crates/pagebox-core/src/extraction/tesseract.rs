use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::extraction::{OcrEngine, OcrError, RegionImage};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// OCR through the `tesseract` command-line tool.
pub struct TesseractOcr {
    program: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(language: &str) -> Self {
        TesseractOcr {
            program: "tesseract".into(),
            language: language.to_string(),
        }
    }

    /// Use a specific binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl OcrEngine for TesseractOcr {
    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn recognize(&self, image: &RegionImage, timeout: Duration) -> Result<String, OcrError> {
        let mut input = tempfile::Builder::new()
            .prefix("pagebox-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Failed(format!("could not create temp image: {e}")))?;
        input
            .write_all(&image.png)
            .and_then(|_| input.flush())
            .map_err(|e| OcrError::Failed(format!("could not write temp image: {e}")))?;

        let child = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.language, "--psm", "6"])
            .args(["--dpi", &image.dpi.round().to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OcrError::Unavailable
                } else {
                    OcrError::Failed(format!("{} failed to start: {e}", self.program))
                }
            })?;

        tracing::debug!(
            program = %self.program,
            language = %self.language,
            bytes = image.png.len(),
            "running OCR"
        );
        wait_with_deadline(child, timeout)
    }

    fn backend_name(&self) -> &str {
        "tesseract"
    }
}

/// Collect a child's stdout, killing it if it outlives `timeout`.
fn wait_with_deadline(mut child: Child, timeout: Duration) -> Result<String, OcrError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_reader = thread::spawn(move || drain(stdout));
    let err_reader = thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                // The readers finish once the pipes close.
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(OcrError::Failed(e.to_string())),
        }
    };

    let stdout = out_reader.join().unwrap_or_default();
    let stderr = err_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(OcrError::Failed(format!(
            "tesseract exited with {}: {}",
            status.code().unwrap_or(-1),
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_image() -> RegionImage {
        RegionImage {
            png: vec![0x89, b'P', b'N', b'G'],
            dpi: 300.0,
        }
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let ocr = TesseractOcr::new("eng").with_program("/nonexistent/tesseract-binary");
        assert!(!ocr.is_available());
        assert_eq!(
            ocr.recognize(&blank_image(), Duration::from_secs(1)),
            Err(OcrError::Unavailable)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_child_is_killed() {
        let child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let started = Instant::now();
        let result = wait_with_deadline(child, Duration::from_millis(100));
        assert_eq!(result, Err(OcrError::Timeout(Duration::from_millis(100))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_collected() {
        let child = Command::new("echo")
            .arg("INV-042")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let text = wait_with_deadline(child, Duration::from_secs(5)).unwrap();
        assert_eq!(text.trim(), "INV-042");
    }
}
