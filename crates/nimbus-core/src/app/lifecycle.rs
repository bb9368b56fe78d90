//! タスクのライフサイクル制御
//!
//! 外部スケジューラは [`PolledTask`] で各タスクを進める:
//!
//! ```ignore
//! task.submit()?;
//! while !task.poll_completed() {
//!     task.poll_running();
//!     tokio::time::sleep(interval).await;
//! }
//! ```
//!
//! 4つのメソッドはどれも await しない。実処理は `submit` が spawn する tokio タスクで行い、
//! 結果は一度だけ書ける [`Completion`] セル経由で返る。
//!
//! # キャンセル
//! `kill` は協調的: 終了ステータス 130 で終端にするが、送信中のリクエストは
//! transport が返るまで走らせる。その後 worker は完了済みに気づき、結果を捨てて
//! placeholder を残す。`abort_on_kill` のときはパイプラインを abort し、リクエストを破棄する。

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, debug, error, info, warn};

use super::diagnostics::RAW_RESPONSE_FILE;
use super::worker::{self, TaskContext};
use crate::domain::{
    Artifact, AtomicTaskState, Completion, EXIT_KILLED, NimError, Outcome, Result, TaskId, TaskState,
    TaskStatus,
};
use crate::observability::task_span;
use crate::services::ServiceContract;

/// スケジューラとタスクの間のポーリング契約
pub trait PolledTask {
    /// 処理を開始する。すぐに返る。
    fn submit(&self) -> Result<()>;

    /// `submit` 後の最初の呼び出しと、処理が進行中の間は true
    fn poll_running(&self) -> bool;

    /// タスクが終端になったら true（以後ずっと true）
    fn poll_completed(&self) -> bool;

    /// 終了ステータス 130 でタスクを強制的に終端にする。いつでも呼べる。
    ///
    /// 呼び出し元のスレッドで動く。submit 済みなら、そこで少しだけ
    /// ブロッキングのファイル I/O をする（ログ1行と `.exitcode`）。
    fn kill(&self);
}

/// ライフサイクルを追跡される1回のリモート推論呼び出し
pub struct NimTask {
    ctx: Arc<TaskContext>,
    runtime: Handle,
    abort_on_kill: bool,
    state: AtomicTaskState,
    completion: Arc<Completion>,
    outcome: Arc<OnceLock<Outcome>>,
    pipeline: OnceLock<AbortHandle>,
    status: OnceLock<TaskStatus>,
}

impl NimTask {
    pub(crate) fn new(ctx: TaskContext, runtime: Handle, abort_on_kill: bool) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runtime,
            abort_on_kill,
            state: AtomicTaskState::new(),
            completion: Arc::new(Completion::new()),
            outcome: Arc::new(OnceLock::new()),
            pipeline: OnceLock::new(),
            status: OnceLock::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.ctx.task_id
    }

    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    pub fn service(&self) -> &str {
        self.ctx.service.name()
    }

    pub fn state(&self) -> TaskState {
        self.state.load()
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }

    /// 生の終了ステータス（worker か `kill` が書いた時点で取れる）
    pub fn exit_status(&self) -> Option<i32> {
        self.completion.exit_status()
    }

    /// 終端ステータス（`poll_completed` が初めて true を返した後に取れる）
    pub fn status(&self) -> Option<TaskStatus> {
        self.status.get().copied()
    }

    /// worker が生んだ結果。実行中と、`submit` 前の kill の後は `None`。
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }

    pub fn work_dir(&self) -> &std::path::Path {
        self.ctx.sink.work_dir()
    }

    pub fn primary_output(&self) -> &std::path::Path {
        &self.ctx.primary_output
    }

    fn finalize(&self, exit_status: i32) -> TaskStatus {
        *self.status.get_or_init(|| {
            self.state.advance(TaskState::Completed);
            let status = TaskStatus::from_exit_status(exit_status);
            info!(task_id = %self.ctx.task_id, service = %self.ctx.service, ?status, "task completed");
            self.ctx.sink.close();
            status
        })
    }
}

impl PolledTask for NimTask {
    fn submit(&self) -> Result<()> {
        if !self.state.transition(TaskState::New, TaskState::Submitted) {
            if self.pipeline.get().is_none() && self.exit_status() == Some(EXIT_KILLED) {
                debug!(task_id = %self.ctx.task_id, "submit after kill ignored");
                return Ok(());
            }
            return Err(NimError::AlreadySubmitted(self.ctx.task_id.to_string()));
        }

        let span = task_span(&self.ctx.task_id, self.ctx.service.name());
        let ctx = Arc::clone(&self.ctx);
        let completion = Arc::clone(&self.completion);
        let pipeline = self.runtime.spawn(
            async move { worker::run(&ctx, &completion).await }.instrument(span.clone()),
        );
        let _ = self.pipeline.set(pipeline.abort_handle());

        self.runtime.spawn(
            supervise(
                pipeline,
                Arc::clone(&self.ctx),
                Arc::clone(&self.completion),
                Arc::clone(&self.outcome),
            )
            .instrument(span),
        );

        info!(task_id = %self.ctx.task_id, service = %self.ctx.service, "task submitted");
        Ok(())
    }

    fn poll_running(&self) -> bool {
        match self.state.load() {
            TaskState::New | TaskState::Completed => false,
            TaskState::Submitted => {
                self.state.transition(TaskState::Submitted, TaskState::Running)
            }
            TaskState::Running => !self.completion.is_completed(),
        }
    }

    fn poll_completed(&self) -> bool {
        match self.completion.exit_status() {
            Some(exit_status) => {
                self.finalize(exit_status);
                true
            }
            None => false,
        }
    }

    fn kill(&self) {
        if !self.completion.complete(EXIT_KILLED) {
            debug!(task_id = %self.ctx.task_id, "kill on a completed task ignored");
            return;
        }
        let previous = self.state.advance(TaskState::Completed);
        warn!(task_id = %self.ctx.task_id, from = ?previous, "task killed");

        if previous != TaskState::New {
            self.ctx.sink.error("task killed (exit status 130)");
            self.ctx.sink.write_exit_status(EXIT_KILLED);
        }
        if self.abort_on_kill
            && let Some(pipeline) = self.pipeline.get()
        {
            pipeline.abort();
        }
    }
}

/// パイプラインを待って結果を公開する。パイプライン内の panic はここで失敗に変換する。
async fn supervise(
    pipeline: JoinHandle<Outcome>,
    ctx: Arc<TaskContext>,
    completion: Arc<Completion>,
    slot: Arc<OnceLock<Outcome>>,
) {
    let outcome = match pipeline.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancelled() => {
            debug!(task_id = %ctx.task_id, "pipeline aborted");
            let raw_path = ctx.sink.path(RAW_RESPONSE_FILE);
            let raw = raw_path.exists().then_some(Artifact::RawResponse(raw_path));
            let _ = slot.set(worker::killed(&ctx, raw).await);
            return;
        }
        Err(e) => {
            let detail = format!("worker panicked: {e}");
            error!(task_id = %ctx.task_id, error = %detail, "task failed");
            ctx.sink.error(&detail);
            if let Err(write_err) = ctx.sink.write_error(&format!("{detail}\n")).await {
                warn!(task_id = %ctx.task_id, error = %write_err, "cannot write error detail");
            }
            Outcome::failure(detail)
        }
    };

    let exit_status = outcome.exit_status();
    let _ = slot.set(outcome);
    if completion.complete(exit_status) {
        ctx.sink
            .info(&format!("task finished with exit status {exit_status}"));
        ctx.sink.write_exit_status(exit_status);
    } else {
        debug!(task_id = %ctx.task_id, exit_status, "task already terminal; result discarded");
    }
}

impl fmt::Debug for NimTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NimTask")
            .field("id", &self.ctx.task_id)
            .field("name", &self.ctx.name)
            .field("service", &self.ctx.service.name())
            .field("state", &self.state.load())
            .field("exit_status", &self.completion.exit_status())
            .finish()
    }
}
