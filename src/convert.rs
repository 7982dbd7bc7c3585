//! Manpage to HTML conversion.
//!
//! Conversion is delegated to an external, long-lived converter process. Each
//! render worker owns exactly one [`Converter`] for its whole lifetime and
//! terminates it when it exits, on the error path as well.
//!
//! [`ProcessConverter`] talks to its child over stdin/stdout with a small
//! framed protocol:
//!
//! ```text
//! request:  u64 BE length | manpage source (uncompressed roff)
//! response: u8 status     | u64 BE length | payload
//!           status 0 = payload is the HTML fragment
//!           status 1 = document rejected, payload is the diagnostic
//! ```

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use thiserror::Error;
use tracing::debug;

use crate::config::ConverterCommand;

const STATUS_OK: u8 = 0;
const STATUS_REJECTED: u8 = 1;

/// Largest response accepted from the converter.
const MAX_RESPONSE_LEN: u64 = 256 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("failed to spawn converter '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("converter process I/O failed")]
    Io(#[from] io::Error),

    #[error("converter protocol violation: {0}")]
    Protocol(String),

    /// The converter processed the request but could not convert this
    /// document. Only this variant is recoverable.
    #[error("converter rejected the document: {0}")]
    Rejected(String),
}

/// A stateful manpage converter.
pub trait Converter {
    /// Convert an uncompressed manpage into an HTML fragment.
    fn convert(&mut self, source: &[u8]) -> Result<String, ConvertError>;

    /// Stop the converter. Called once, when the owning worker exits.
    fn terminate(&mut self) {}
}

/// Converter backed by one child process.
#[derive(Debug)]
pub struct ProcessConverter {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
}

impl ProcessConverter {
    pub fn spawn(command: &ConverterCommand) -> Result<Self, ConvertError> {
        let spawn_error = |source| ConvertError::Spawn {
            program: command.program.display().to_string(),
            source,
        };
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ConvertError::Protocol(
                "converter pipes unavailable".to_string(),
            ));
        };
        debug!("started converter {} (pid {})", command.program.display(), child.id());

        Ok(ProcessConverter {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
        })
    }

    fn read_response(&mut self) -> Result<(u8, Vec<u8>), ConvertError> {
        let mut status = [0u8; 1];
        self.stdout.read_exact(&mut status)?;
        let mut len = [0u8; 8];
        self.stdout.read_exact(&mut len)?;
        let len = u64::from_be_bytes(len);
        if len > MAX_RESPONSE_LEN {
            return Err(ConvertError::Protocol(format!(
                "response of {len} bytes exceeds limit"
            )));
        }
        let mut payload = vec![0u8; len as usize];
        self.stdout.read_exact(&mut payload)?;
        Ok((status[0], payload))
    }
}

impl Converter for ProcessConverter {
    fn convert(&mut self, source: &[u8]) -> Result<String, ConvertError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ConvertError::Protocol("converter already terminated".to_string()))?;
        stdin.write_all(&(source.len() as u64).to_be_bytes())?;
        stdin.write_all(source)?;
        stdin.flush()?;

        let (status, payload) = self.read_response()?;
        let text = String::from_utf8_lossy(&payload).into_owned();
        match status {
            STATUS_OK => Ok(text),
            STATUS_REJECTED => Err(ConvertError::Rejected(text)),
            other => Err(ConvertError::Protocol(format!("unknown status byte {other}"))),
        }
    }

    fn terminate(&mut self) {
        // Closing stdin lets a well-behaved converter exit on its own.
        self.stdin.take();
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

impl Drop for ProcessConverter {
    fn drop(&mut self) {
        self.terminate();
    }
}
