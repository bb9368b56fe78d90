//! DiagnosticsSink - 事後調査用のタスクごとのファイル
//!
//! work dir のレイアウト:
//!
//! | ファイル | 内容 |
//! |---|---|
//! | `.command.sh` | 実行したリクエストの echo（認証情報はマスク） |
//! | `.command.log` | タイムスタンプ付きの全ログ |
//! | `.command.out` | info レベルの行 |
//! | `.command.err` | warning / error の行 |
//! | `.exitcode` | 最終的な終了ステータス |
//! | `nim_response.json` | 生のレスポンス本文 |
//! | `nim_error.txt` | 致命的エラーの詳細 |
//!
//! ログファイルは最初の1行で開くので、sink の生成自体は I/O をしない。
//! `close` 後の書き込みは黙って捨てる（`kill` 後に終わった worker は再オープンできない）。

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::domain::Result;
use crate::ports::Clock;

pub const COMMAND_FILE: &str = ".command.sh";
pub const LOG_FILE: &str = ".command.log";
pub const OUT_FILE: &str = ".command.out";
pub const ERR_FILE: &str = ".command.err";
pub const EXIT_FILE: &str = ".exitcode";
pub const RAW_RESPONSE_FILE: &str = "nim_response.json";
pub const ERROR_FILE: &str = "nim_error.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

struct LogFiles {
    log: File,
    out: File,
    err: File,
}

impl LogFiles {
    fn open(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let open = |name: &str| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        };
        Ok(Self {
            log: open(LOG_FILE)?,
            out: open(OUT_FILE)?,
            err: open(ERR_FILE)?,
        })
    }
}

pub struct DiagnosticsSink {
    work_dir: PathBuf,
    clock: Arc<dyn Clock>,
    files: Mutex<Option<LogFiles>>,
    closed: AtomicBool,
}

impl DiagnosticsSink {
    pub fn new(work_dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            work_dir: work_dir.into(),
            clock,
            files: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn files(&self) -> MutexGuard<'_, Option<LogFiles>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one line to the log files. Failures are reported through
    /// `tracing` only.
    pub fn log(&self, level: LogLevel, message: &str) {
        if self.is_closed() {
            return;
        }
        let mut guard = self.files();
        if guard.is_none() {
            match LogFiles::open(&self.work_dir) {
                Ok(files) => *guard = Some(files),
                Err(e) => {
                    warn!(dir = %self.work_dir.display(), error = %e, "cannot open task log files");
                    return;
                }
            }
        }
        let Some(files) = guard.as_mut() else {
            return;
        };

        let line = format!(
            "{} {:<5} {}\n",
            self.clock.now().to_rfc3339(),
            level.as_str(),
            message
        );
        let stream = match level {
            LogLevel::Info => &mut files.out,
            LogLevel::Warn | LogLevel::Error => &mut files.err,
        };
        let written = files
            .log
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(line.as_bytes()));
        if let Err(e) = written {
            warn!(dir = %self.work_dir.display(), error = %e, "cannot write task log");
        }
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    async fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.path(name);
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    pub async fn write_command(&self, script: &str) -> Result<PathBuf> {
        self.write(COMMAND_FILE, script).await
    }

    pub async fn write_raw_response(&self, body: &str) -> Result<PathBuf> {
        self.write(RAW_RESPONSE_FILE, body).await
    }

    pub async fn write_error(&self, detail: &str) -> Result<PathBuf> {
        self.write(ERROR_FILE, detail).await
    }

    /// `kill` が runtime なしで書けるよう同期 I/O。
    /// work dir が作られていなければ何もしない。
    pub fn write_exit_status(&self, exit_status: i32) {
        if !self.work_dir.is_dir() {
            return;
        }
        let path = self.path(EXIT_FILE);
        if let Err(e) = std::fs::write(&path, exit_status.to_string()) {
            warn!(path = %path.display(), error = %e, "cannot write exit status");
        }
    }

    /// ログファイルを flush して解放する。冪等。
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut files) = self.files().take() {
            let _ = files.log.flush();
            let _ = files.out.flush();
            let _ = files.err.flush();
        }
    }
}

impl std::fmt::Debug for DiagnosticsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsSink")
            .field("work_dir", &self.work_dir)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn sink(dir: &Path) -> DiagnosticsSink {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap());
        DiagnosticsSink::new(dir.join("task"), Arc::new(clock))
    }

    #[test]
    fn construction_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        assert!(!sink.work_dir().exists());
        sink.write_exit_status(130);
        assert!(!sink.work_dir().exists());
    }

    #[test]
    fn lines_are_split_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        sink.info("sending request");
        sink.error("HTTP 500");
        sink.close();

        let log = std::fs::read_to_string(sink.path(LOG_FILE)).unwrap();
        let out = std::fs::read_to_string(sink.path(OUT_FILE)).unwrap();
        let err = std::fs::read_to_string(sink.path(ERR_FILE)).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.starts_with("2024-05-01T08:30:00+00:00 INFO "));
        assert!(out.contains("sending request") && !out.contains("HTTP 500"));
        assert!(err.contains("HTTP 500"));
    }

    #[test]
    fn writes_after_close_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        sink.info("before");
        sink.close();
        sink.close();
        sink.info("after");

        let log = std::fs::read_to_string(sink.path(LOG_FILE)).unwrap();
        assert!(log.contains("before"));
        assert!(!log.contains("after"));
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn artifacts_create_the_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path());
        let path = sink.write_raw_response("{\"ok\":true}").await.unwrap();
        assert_eq!(path, sink.path(RAW_RESPONSE_FILE));
        sink.write_exit_status(0);
        assert_eq!(std::fs::read_to_string(sink.path(EXIT_FILE)).unwrap(), "0");
    }
}
