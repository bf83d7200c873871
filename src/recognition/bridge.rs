use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use image::RgbaImage;
use serde::Deserialize;
use tracing::debug;

use crate::config::RecognizerConfig;
use crate::core::error::RecognitionError;
use crate::formula::invoke::FormulaRecognizer;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Deserialize)]
struct BridgeOutput {
    predictions: Vec<String>,
}

/// Runs the recognition model through an external Python script.
///
/// The script receives `--image <png> --max-length <n>` and prints
/// `{"predictions": [...]}` on stdout, best candidate first.
#[derive(Debug, Clone)]
pub struct ScriptRecognizer {
    config: RecognizerConfig,
}

impl ScriptRecognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

impl FormulaRecognizer for ScriptRecognizer {
    fn recognize(
        &self,
        image: &RgbaImage,
        max_output_len: usize,
    ) -> Result<Vec<String>, RecognitionError> {
        let work_dir = tempfile::tempdir()
            .map_err(|e| RecognitionError::Unavailable(format!("temp dir: {e}")))?;
        let image_path = work_dir.path().join("formula.png");
        image
            .save(&image_path)
            .map_err(|e| RecognitionError::Unavailable(format!("failed to write region image: {e}")))?;

        let child = Command::new(&self.config.python)
            .arg(&self.config.script_path)
            .arg("--image")
            .arg(&image_path)
            .arg("--max-length")
            .arg(max_output_len.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecognitionError::Unavailable(format!("failed to invoke recognition bridge: {e}")))?;

        let (success, stdout, stderr) = wait_with_deadline(child, self.timeout())?;
        if !success {
            return Err(classify_failure(&stderr));
        }

        let output: BridgeOutput = serde_json::from_str(&stdout)
            .map_err(|e| RecognitionError::MalformedOutput(e.to_string()))?;
        debug!(candidates = output.predictions.len(), "recognition bridge finished");
        Ok(output.predictions)
    }

    fn max_output_len(&self) -> usize {
        self.config.model_max_length
    }
}

fn classify_failure(stderr: &str) -> RecognitionError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("out of memory") || lowered.contains("outofmemoryerror") {
        RecognitionError::ResourceExhausted(stderr.trim().to_string())
    } else {
        RecognitionError::Unavailable(format!("recognition bridge failed: {}", stderr.trim()))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!(error = %e, "recognition bridge pipe read failed");
            }
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Waits for `child` and its output pipes, giving up once `timeout` elapses.
///
/// The pipes can outlive the child when it leaves descendants holding them
/// open, so collecting output counts against the same deadline.
fn wait_with_deadline(
    mut child: Child,
    timeout: Duration,
) -> Result<(bool, String, String), RecognitionError> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognitionError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(RecognitionError::Unavailable(format!("wait failed: {e}"))),
        }
    };

    let collect = |rx: &Receiver<String>| {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(output) => Ok(output),
            Err(RecvTimeoutError::Timeout) => Err(RecognitionError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
        }
    };
    let stdout = collect(&stdout)?;
    let stderr = collect(&stderr)?;
    Ok((status.success(), stdout, stderr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;

    fn script_recognizer(dir: &tempfile::TempDir, body: &str, timeout_secs: u64) -> ScriptRecognizer {
        let script = dir.path().join("bridge.sh");
        fs::write(&script, body).unwrap();
        ScriptRecognizer::new(RecognizerConfig {
            script_path: script,
            python: "sh".to_string(),
            timeout_secs,
            model_max_length: 512,
        })
    }

    #[test]
    fn out_of_memory_is_resource_exhaustion() {
        let err = classify_failure("RuntimeError: CUDA out of memory. Tried to allocate 2 GiB");
        assert!(matches!(err, RecognitionError::ResourceExhausted(_)));
        let err = classify_failure("ModuleNotFoundError: No module named 'torch'");
        assert!(matches!(err, RecognitionError::Unavailable(_)));
    }

    #[test]
    fn missing_interpreter_is_unavailable() {
        let recognizer = ScriptRecognizer::new(RecognizerConfig {
            script_path: PathBuf::from("missing.py"),
            python: "definitely-not-a-python-binary".to_string(),
            ..RecognizerConfig::default()
        });
        let image = RgbaImage::new(4, 4);
        assert!(matches!(
            recognizer.recognize(&image, 10),
            Err(RecognitionError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn parses_script_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = script_recognizer(
            &dir,
            r#"echo '{"predictions": ["x^{2}", "x2"]}'"#,
            10,
        );
        let image = RgbaImage::new(4, 4);
        let predictions = recognizer.recognize(&image, 10).unwrap();
        assert_eq!(predictions, vec!["x^{2}".to_string(), "x2".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn slow_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = script_recognizer(&dir, "sleep 5", 1);
        let image = RgbaImage::new(4, 4);
        assert!(matches!(
            recognizer.recognize(&image, 10),
            Err(RecognitionError::Timeout(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn lingering_descendant_cannot_outlive_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = script_recognizer(
            &dir,
            "sleep 8 &\necho '{\"predictions\": [\"x\"]}'\n",
            1,
        );
        let image = RgbaImage::new(4, 4);
        let started = Instant::now();
        let result = recognizer.recognize(&image, 10);
        assert!(matches!(result, Err(RecognitionError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn invalid_utf8_output_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let recognizer = script_recognizer(&dir, r#"printf '{"predictions": ["x\377"]}'"#, 10);
        let image = RgbaImage::new(4, 4);
        let predictions = recognizer.recognize(&image, 10).unwrap();
        assert_eq!(predictions, vec!["x\u{FFFD}".to_string()]);
    }
}
