use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use crate::errors::SpoolError;

/// Hands a finished document to a printer.
#[async_trait]
pub trait Spooler: Send + Sync {
    /// Submit `path` and return the spooler's job id.
    async fn submit(&self, path: &Path, title: &str) -> Result<String, SpoolError>;
}

/// CUPS `lp` front end.
pub struct LpSpooler {
    program: PathBuf,
    queue: Option<String>,
}

impl LpSpooler {
    pub fn new(queue: Option<String>) -> Self {
        Self::with_program("lp", queue)
    }

    pub fn with_program(program: impl Into<PathBuf>, queue: Option<String>) -> Self {
        Self {
            program: program.into(),
            queue,
        }
    }

    fn args<'a>(&'a self, path: &'a Path, title: &'a str) -> Vec<&'a std::ffi::OsStr> {
        let mut args: Vec<&std::ffi::OsStr> = Vec::new();
        if let Some(queue) = &self.queue {
            args.push("-d".as_ref());
            args.push(queue.as_ref());
        }
        args.push("-t".as_ref());
        args.push(title.as_ref());
        args.push(path.as_os_str());
        args
    }
}

#[async_trait]
impl Spooler for LpSpooler {
    async fn submit(&self, path: &Path, title: &str) -> Result<String, SpoolError> {
        let program = self.program.display().to_string();
        let output = tokio::process::Command::new(&self.program)
            .args(self.args(path, title))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SpoolError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SpoolError::Rejected {
                program,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_job_id(&stdout).ok_or_else(|| SpoolError::NoJobId(stdout.trim().to_string()))
    }
}

/// Pull `QUEUE-N` out of "request id is QUEUE-N (1 file(s))".
pub fn parse_job_id(output: &str) -> Option<String> {
    let (_, rest) = output.split_once("request id is ")?;
    rest.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_parsed() {
        assert_eq!(
            parse_job_id("request id is Zebra-42 (1 file(s))\n"),
            Some("Zebra-42".to_string())
        );
        assert_eq!(parse_job_id("lp: Error - no default destination"), None);
        assert_eq!(parse_job_id("request id is "), None);
    }

    #[test]
    fn queue_is_optional() {
        let path = Path::new("/tmp/cards.pdf");
        let lp = LpSpooler::new(None);
        assert_eq!(lp.args(path, "cards"), ["-t", "cards", "/tmp/cards.pdf"]);

        let lp = LpSpooler::new(Some("Zebra".into()));
        assert_eq!(
            lp.args(path, "cards"),
            ["-d", "Zebra", "-t", "cards", "/tmp/cards.pdf"]
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let lp = LpSpooler::with_program("/definitely/not/lp", None);
        let err = lp.submit(Path::new("cards.pdf"), "cards").await.unwrap_err();
        assert!(matches!(err, SpoolError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn fake_lp(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-lp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepted_job_returns_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_lp(dir.path(), "echo \"request id is Zebra-7 (1 file(s))\"");

        let lp = LpSpooler::with_program(program, Some("Zebra".into()));
        let id = lp.submit(Path::new("cards.pdf"), "cards").await.unwrap();

        assert_eq!(id, "Zebra-7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejected_job_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_lp(dir.path(), "echo 'lp: The printer or class does not exist.' >&2\nexit 1");

        let lp = LpSpooler::with_program(program, None);
        let err = lp.submit(Path::new("cards.pdf"), "cards").await.unwrap_err();

        match err {
            SpoolError::Rejected { stderr, .. } => {
                assert_eq!(stderr, "lp: The printer or class does not exist.")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
