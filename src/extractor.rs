use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use facegate_signature::{ExtractError, Signature, SignatureExtractor};

// Exit codes the extraction command uses for probe-quality failures.
const EXIT_NO_FACE: i32 = 2;
const EXIT_MULTIPLE_FACES: i32 = 3;

/// Runs the extraction model as a child process: probe image on stdin,
/// encoded signature on stdout. Exit code 2 means no face, 3 means more
/// than one; anything else nonzero is a model failure.
pub struct CommandExtractor {
    command: String,
}

impl CommandExtractor {
    /// `command` is split on whitespace; the first token is the program.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl SignatureExtractor for CommandExtractor {
    fn extract(&self, image: &[u8]) -> Result<Signature, ExtractError> {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(ExtractError::Failed("empty extractor command".to_string()));
        };

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractError::Failed(format!("spawning {program}: {e}")))?;

        // Stdin is fed from its own thread while wait_with_output drains
        // stdout and stderr, so neither side can fill a pipe and wedge the
        // other. A fast-failing extractor may close stdin before the whole
        // image is through; keep that error aside and let the exit code
        // speak.
        let feeder = child.stdin.take().map(|mut stdin| {
            let image = image.to_vec();
            thread::spawn(move || stdin.write_all(&image).err())
        });

        let output = child
            .wait_with_output()
            .map_err(|e| ExtractError::Failed(format!("waiting for {program}: {e}")))?;
        let send_err = feeder.and_then(|feed| feed.join().unwrap_or(None));

        match output.status.code() {
            Some(0) => {
                if let Some(e) = send_err {
                    return Err(ExtractError::Failed(format!(
                        "sending probe to {program}: {e}"
                    )));
                }
                Signature::from_bytes(&output.stdout)
                    .map_err(|e| ExtractError::Failed(format!("{program} produced {e}")))
            }
            Some(EXIT_NO_FACE) => Err(ExtractError::NoFaceDetected),
            Some(EXIT_MULTIPLE_FACES) => Err(ExtractError::MultipleFacesDetected),
            Some(code) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractError::Failed(format!(
                    "{program} exited with status {code}: {}",
                    stderr.trim()
                )))
            }
            None => Err(ExtractError::Failed(format!(
                "{program} terminated by signal"
            ))),
        }
    }
}
