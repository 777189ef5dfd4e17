//! Running the external trainer as a supervised child process.
//!
//! The trainer's stdout and stderr are piped through a single writer task,
//! which echoes them to the launcher's own streams, appends complete lines
//! to `train.log` in the checkpoint directory and feeds the progress
//! tracker. Once the trainer is running, output problems only produce
//! warnings: its exit status is always what gets reported.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use nerlaunch_core::checkpoint::{CheckpointLayout, LaunchManifest};
use nerlaunch_core::{ProgressTracker, RunConfig, TrainerCommand};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::EXIT_SPAWN;

/// The trainer program could not be started at all.
#[derive(Debug, Error)]
#[error("failed to start trainer program {program:?}: {source}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// A piece of trainer output. Carriage returns end a progress segment,
/// which is echoed but never logged.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Line(String),
    Progress(String),
}

#[derive(Debug)]
struct OutputChunk {
    stream: Stream,
    segment: Segment,
}

// Trainer output is not guaranteed to be UTF-8
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Splits raw output bytes into `\n`-terminated lines and `\r`-terminated
/// progress segments. `\r\n` ends a line.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8], out: &mut Vec<Segment>) {
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        let mut i = 0;
        while i < self.pending.len() {
            match self.pending[i] {
                b'\n' => {
                    out.push(Segment::Line(lossy(&self.pending[start..i])));
                    start = i + 1;
                }
                b'\r' => match self.pending.get(i + 1) {
                    // Wait for the next byte to tell `\r\n` from `\r`
                    None => break,
                    Some(b'\n') => {
                        out.push(Segment::Line(lossy(&self.pending[start..i])));
                        i += 1;
                        start = i + 1;
                    }
                    Some(_) => {
                        out.push(Segment::Progress(lossy(&self.pending[start..i])));
                        start = i + 1;
                    }
                },
                _ => {}
            }
            i += 1;
        }

        self.pending.drain(..start);
    }

    /// Whatever is left once the stream hits EOF.
    fn finish(&mut self) -> Option<Segment> {
        let rest = std::mem::take(&mut self.pending);
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
        (!rest.is_empty()).then(|| Segment::Line(lossy(rest)))
    }
}

/// One destination for trainer output. The first write error closes it
/// with a warning; the other destinations keep going.
struct Sink {
    name: &'static str,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    open: bool,
}

impl Sink {
    fn new(name: &'static str, writer: Box<dyn AsyncWrite + Unpin + Send>, open: bool) -> Self {
        Self { name, writer, open }
    }

    async fn write(&mut self, text: &str, end: &[u8]) {
        if !self.open {
            return;
        }
        if let Err(e) = write_flushed(&mut self.writer, text.as_bytes(), end).await {
            warn!("stopped copying trainer output to {}: {e}", self.name);
            self.open = false;
        }
    }
}

async fn write_flushed<W>(writer: &mut W, text: &[u8], end: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(text).await?;
    writer.write_all(end).await?;
    writer.flush().await
}

/// How a launch ended.
#[derive(Debug)]
pub struct LaunchOutcome {
    pub status: ExitStatus,
    pub manifest: LaunchManifest,
}

impl LaunchOutcome {
    /// Exit code to hand back to our own caller.
    pub fn exit_code(&self) -> i32 {
        exit_code_of(&self.status)
    }
}

/// Convert a child's exit status to a process exit code, using the shell
/// convention `128 + signal` for signal deaths.
pub fn exit_code_of(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Trainer launcher
#[derive(Debug, Clone)]
pub struct Launcher {
    program: String,
    script: PathBuf,
    echo: bool,
}

impl Launcher {
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            echo: true,
        }
    }

    /// Whether trainer output is echoed to the launcher's stdout/stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Shell-style rendering of the full trainer command line.
    pub fn command_line(&self, config: &RunConfig) -> String {
        TrainerCommand::from_config(config)
            .render(&self.program, &self.script.display().to_string())
    }

    /// Validate, prepare the checkpoint directory and run the trainer to
    /// completion.
    pub async fn run(&self, config: RunConfig) -> Result<LaunchOutcome> {
        let report = config.validate()?;
        if let Some(probe) = &report.embedding {
            debug!(dimension = probe.dimension, compressed = probe.compressed, "embedding probe");
        }

        let layout = CheckpointLayout::for_config(&config);
        layout.ensure()?;

        let mut manifest =
            LaunchManifest::new(config, &self.program, &self.script.display().to_string());
        layout
            .write_manifest(&manifest)
            .context("Failed to write launch manifest")?;

        let log = tokio::fs::File::from_std(layout.open_log()?);
        let tracker = ProgressTracker::new()?;
        info!(command = %self.command_line(&manifest.config), "launching trainer");

        let mut command = Command::new(&self.program);
        command
            .arg(&self.script)
            .args(manifest.argv.to_os_args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Python block-buffers piped stdout
        if std::env::var_os("PYTHONUNBUFFERED").is_none() {
            command.env("PYTHONUNBUFFERED", "1");
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                manifest.finish(Some(EXIT_SPAWN));
                if let Err(e) = layout.write_manifest(&manifest) {
                    warn!("failed to update launch manifest: {e}");
                }
                return Err(SpawnError {
                    program: self.program.clone(),
                    source,
                }
                .into());
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(pump(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(pump(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);
        let writer = tokio::spawn(write_output(
            rx,
            Sink::new("stdout", Box::new(tokio::io::stdout()), self.echo),
            Sink::new("stderr", Box::new(tokio::io::stderr()), self.echo),
            Sink::new("train.log", Box::new(log), true),
            tracker,
        ));

        let status = wait_for(&mut child).await?;

        for reader in readers {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("failed to read trainer output: {e}"),
                Err(e) => warn!("output reader task failed: {e}"),
            }
        }
        // From here on the trainer's status decides the outcome
        manifest.finish(Some(exit_code_of(&status)));
        match writer.await {
            Ok(tracker) => {
                manifest.last_epoch = tracker.last_epoch();
                manifest.best_f1 = tracker.best_f1();
                manifest.test_f1 = tracker.test_f1();
            }
            Err(e) => warn!("output writer task failed: {e}"),
        }
        if let Err(e) = layout.write_manifest(&manifest) {
            warn!("failed to update launch manifest: {e}");
        }

        info!(
            code = exit_code_of(&status),
            last_epoch = ?manifest.last_epoch,
            best_f1 = ?manifest.best_f1,
            "trainer exited"
        );

        Ok(LaunchOutcome { status, manifest })
    }
}

/// Wait for the child, logging interrupts instead of acting on them: the
/// terminal delivers Ctrl-C to the trainer too, and its own exit status is
/// what gets reported.
async fn wait_for(child: &mut tokio::process::Child) -> Result<ExitStatus> {
    let mut listen = true;
    loop {
        tokio::select! {
            status = child.wait() => {
                return status.context("Failed to wait for trainer");
            }
            signal = tokio::signal::ctrl_c(), if listen => {
                match signal {
                    Ok(()) => warn!("interrupt received, waiting for the trainer to exit"),
                    Err(e) => {
                        debug!("cannot listen for interrupts: {e}");
                        listen = false;
                    }
                }
            }
        }
    }
}

/// Drain one of the child's pipes to EOF. The pipe keeps being drained
/// even if nobody listens any more, so the trainer never blocks or dies on
/// a full or broken pipe.
fn pump<R>(mut reader: R, stream: Stream, tx: mpsc::UnboundedSender<OutputChunk>) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut splitter = LineSplitter::default();
        let mut segments = Vec::new();
        let mut buf = vec![0u8; 8192];
        let mut forward = true;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            splitter.push(&buf[..n], &mut segments);
            for segment in segments.drain(..) {
                if forward && tx.send(OutputChunk { stream, segment }).is_err() {
                    forward = false;
                }
            }
        }

        if let Some(segment) = splitter.finish() {
            if forward {
                let _ = tx.send(OutputChunk { stream, segment });
            }
        }
        Ok(())
    })
}

async fn write_output(
    mut rx: mpsc::UnboundedReceiver<OutputChunk>,
    mut stdout: Sink,
    mut stderr: Sink,
    mut log: Sink,
    mut tracker: ProgressTracker,
) -> ProgressTracker {
    while let Some(chunk) = rx.recv().await {
        let console = match chunk.stream {
            Stream::Stdout => &mut stdout,
            Stream::Stderr => &mut stderr,
        };
        match chunk.segment {
            Segment::Line(line) => {
                tracker.observe(&line);
                console.write(&line, b"\n").await;
                log.write(&line, b"\n").await;
            }
            Segment::Progress(text) if !text.is_empty() => {
                console.write(&text, b"\r").await;
            }
            Segment::Progress(_) => {}
        }
    }
    tracker
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    /// A console whose reader has gone away.
    struct ClosedPipe;

    impl AsyncWrite for ClosedPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn split(chunks: &[&[u8]]) -> Vec<Segment> {
        let mut splitter = LineSplitter::default();
        let mut out = Vec::new();
        for chunk in chunks {
            splitter.push(chunk, &mut out);
        }
        out.extend(splitter.finish());
        out
    }

    fn line(text: &str) -> Segment {
        Segment::Line(text.to_string())
    }

    fn progress(text: &str) -> Segment {
        Segment::Progress(text.to_string())
    }

    #[test]
    fn test_splitter_lines_and_progress() {
        assert_eq!(
            split(&[b"loading\n 10%\r 55%\r100%\ndone"]),
            vec![line("loading"), progress(" 10%"), progress(" 55%"), line("100%"), line("done")]
        );
    }

    #[test]
    fn test_splitter_crlf_across_reads() {
        assert_eq!(
            split(&[b"epoch: 1\r", b"\nepoch: 2\r", b"\r\n"]),
            vec![line("epoch: 1"), progress("epoch: 2"), line("")]
        );
        assert_eq!(split(&[b"tail\r"]), vec![line("tail")]);
        assert_eq!(split(&[b"caf\xc3", b"\xa9\n"]), vec![line("caf\u{e9}")]);
    }

    #[tokio::test]
    async fn test_closed_console_keeps_logging() {
        let temp = tempfile::TempDir::new().unwrap();
        let log_path = temp.path().join("train.log");
        let log = tokio::fs::File::create(&log_path).await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        for (stream, segment) in [
            (Stream::Stdout, line("epoch: 1, dev F1 = 0.61")),
            (Stream::Stderr, line("cuda warning")),
            (Stream::Stdout, progress("batch 50%")),
            (Stream::Stdout, line("epoch: 2, dev F1 = 0.74")),
        ] {
            tx.send(OutputChunk { stream, segment }).unwrap();
        }
        drop(tx);

        let tracker = write_output(
            rx,
            Sink::new("stdout", Box::new(ClosedPipe), true),
            Sink::new("stderr", Box::new(ClosedPipe), true),
            Sink::new("train.log", Box::new(log), true),
            ProgressTracker::new().unwrap(),
        )
        .await;

        assert_eq!(tracker.last_epoch(), Some(2));
        assert_eq!(tracker.best_f1(), Some(0.74));
        assert_eq!(
            std::fs::read_to_string(&log_path).unwrap(),
            "epoch: 1, dev F1 = 0.61\ncuda warning\nepoch: 2, dev F1 = 0.74\n"
        );
    }

    #[test]
    fn test_command_line() {
        let mut config = RunConfig::default();
        config.schedule.epoch = Some(100);
        config.model.attention = true;
        let launcher = Launcher::new("python3", "train_wc.py");
        assert_eq!(
            launcher.command_line(&config),
            "python3 train_wc.py --attention --epoch 100"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_of() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code_of(&ExitStatus::from_raw(0)), 0);
        // wait(2) encoding: exit code in the high byte
        assert_eq!(exit_code_of(&ExitStatus::from_raw(3 << 8)), 3);
        // killed by SIGKILL
        assert_eq!(exit_code_of(&ExitStatus::from_raw(9)), 137);
    }
}
