//! Worker パイプライン - ポーリングスレッドの外で1タスクが行う処理
//!
//! # フロー
//! 1. エンドポイントと認証情報を解決
//! 2. 入力をステージングしてペイロードを生成
//! 3. `.command.sh` を書く
//! 4. リクエスト送信
//! 5. 生レスポンスを保存（全経路）
//! 6. ステータス判定
//! 7. 主成果物を抽出
//!
//! 1 と 2 はネットワーク通信の前に失敗する。kill は 3 の直前と 5 の後で検知する。
//! どの終端経路でも、生レスポンス（またはメモ）と主成果物（または placeholder）が残る。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::diagnostics::DiagnosticsSink;
use super::registry::ServiceRegistry;
use super::request::{command_echo, prepare_inputs};
use super::response::{self, placeholder, write_artifact};
use super::status_policy::{StatusClass, classify};
use crate::domain::errors::{MAX_ERROR_BODY, truncate};
use crate::domain::{
    Artifact, Completion, EXIT_KILLED, NimError, Outcome, Result, TaskId, TaskParameters,
};
use crate::ports::{HttpRequest, HttpResponse, Transport};
use crate::services::{Service, ServiceContract};

/// 主成果物のデフォルト名
pub const DEFAULT_OUTPUT_FILE: &str = "output.pdb";

/// 1タスクの不変な入力（ハンドルと worker で共有）
pub struct TaskContext {
    pub task_id: TaskId,
    pub name: String,
    pub service: Service,
    pub params: TaskParameters,
    pub primary_output: PathBuf,
    pub timeout: Duration,
    pub lenient_unprocessable: bool,
    pub registry: Arc<ServiceRegistry>,
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<DiagnosticsSink>,
}

/// 出力ファイル名テンプレートの `${task_id}` `${task_name}` `${service}` を置換
pub fn render_output_name(template: &str, task_id: &TaskId, task_name: &str, service: &str) -> String {
    template
        .replace("${task_id}", &task_id.to_string())
        .replace("${task_name}", task_name)
        .replace("${service}", service)
}

/// パイプライン全体を実行する。失敗しない（エラーは失敗の Outcome になる）。
///
/// `completion` は読むだけ。送信前に kill されたタスクはリクエストを送らない。
/// 送信中に kill されたタスクは生レスポンスを残し、処理は飛ばして placeholder を書く。
pub async fn run(ctx: &TaskContext, completion: &Completion) -> Outcome {
    ctx.sink.info(&format!("task {} ({}) started", ctx.name, ctx.service));

    let response = match send(ctx, completion).await {
        Ok(Some(response)) => response,
        Ok(None) => {
            warn!(task_id = %ctx.task_id, "task killed before the request was sent");
            return killed(ctx, None).await;
        }
        Err(err) => return fail(ctx, err, None).await,
    };

    let status = response.status;
    let raw = match ctx.sink.write_raw_response(&response.body).await {
        Ok(path) => Some(Artifact::RawResponse(path)),
        Err(e) => {
            warn!(task_id = %ctx.task_id, error = %e, "cannot persist raw response");
            None
        }
    };

    if completion.is_completed() {
        warn!(task_id = %ctx.task_id, status, "task already terminal when the response arrived; skipping processing");
        return killed(ctx, raw).await.with_status(status);
    }

    let class = classify(status, ctx.lenient_unprocessable);
    if !class.completes_task() {
        let err = NimError::service(status, &response.body);
        return fail(ctx, err, raw).await.with_status(status);
    }
    if class == StatusClass::SoftSuccess {
        warn!(task_id = %ctx.task_id, status, "service rejected the input; completing under the lenient 422 policy");
        ctx.sink
            .warn(&format!("HTTP {status} accepted as completion (lenient policy)"));
    } else {
        info!(task_id = %ctx.task_id, status, "service call succeeded");
        ctx.sink.info(&format!("HTTP {status}"));
    }

    let processed = response::process(&ctx.service, &response.body, &ctx.primary_output).await;
    let mut outcome = match processed.degraded {
        Some(reason) => {
            ctx.sink.warn(&reason);
            Outcome::degraded(reason)
        }
        None => {
            ctx.sink
                .info(&format!("wrote {}", ctx.primary_output.display()));
            Outcome::success()
        }
    }
    .with_status(status);

    outcome.artifacts.extend(processed.artifacts);
    outcome.artifacts.extend(raw);
    outcome
}

/// 事前チェックとネットワーク呼び出し。何も送る前に kill されていたら `Ok(None)`。
async fn send(ctx: &TaskContext, completion: &Completion) -> Result<Option<HttpResponse>> {
    let descriptor = ctx.registry.resolve(ctx.service.name())?;
    if !descriptor.has_credential() {
        warn!(task_id = %ctx.task_id, service = %ctx.service, "no credential resolved; sending unauthenticated request");
        ctx.sink.warn("no credential resolved; request is unauthenticated");
    }

    let params = prepare_inputs(&ctx.params, ctx.sink.work_dir()).await?;
    let payload = ctx.service.build_request(&params)?;

    if completion.is_completed() {
        return Ok(None);
    }

    let script = command_echo(
        &ctx.task_id.to_string(),
        &descriptor,
        &payload,
        ctx.timeout.as_secs(),
    );
    ctx.sink.write_command(&script).await?;

    info!(task_id = %ctx.task_id, service = %ctx.service, endpoint = %descriptor.endpoint, "sending request");
    ctx.sink
        .info(&format!("POST {}", descriptor.endpoint));

    let request = HttpRequest {
        endpoint: descriptor.endpoint,
        credential: descriptor.credential,
        payload,
        timeout: ctx.timeout,
    };
    ctx.transport.send(&request).await.map(Some)
}

/// 致命的エラーを記録し、期待されるファイルがすべて存在するようにする
async fn fail(ctx: &TaskContext, err: NimError, raw: Option<Artifact>) -> Outcome {
    let detail = err.to_string();
    error!(task_id = %ctx.task_id, service = %ctx.service, kind = ?err.kind(), fatal = err.is_fatal(), error = %truncate(&detail, MAX_ERROR_BODY), "task failed");
    ctx.sink.error(&detail);

    let mut outcome = Outcome::failure(detail.clone());
    ensure_raw_response(ctx, &mut outcome, raw, &detail).await;

    match ctx.sink.write_error(&format!("{detail}\n")).await {
        Ok(path) => outcome.artifacts.push(Artifact::ErrorDetail(path)),
        Err(e) => warn!(task_id = %ctx.task_id, error = %e, "cannot write error detail"),
    }

    write_placeholder(ctx, &mut outcome, &detail).await;
    outcome
}

/// kill されたタスクのファイルを残す（生レスポンスかメモ、placeholder の主成果物）。
/// 終了ステータス自体は `kill` が書く。
pub(crate) async fn killed(ctx: &TaskContext, raw: Option<Artifact>) -> Outcome {
    let detail = format!("task killed (exit status {EXIT_KILLED})");
    let mut outcome = Outcome::failure(detail.clone());
    ensure_raw_response(ctx, &mut outcome, raw, &detail).await;
    write_placeholder(ctx, &mut outcome, &detail).await;
    outcome
}

async fn ensure_raw_response(ctx: &TaskContext, outcome: &mut Outcome, raw: Option<Artifact>, detail: &str) {
    match raw {
        Some(artifact) => outcome.artifacts.push(artifact),
        None => {
            let note = format!("no response received: {detail}\n");
            match ctx.sink.write_raw_response(&note).await {
                Ok(path) => outcome.artifacts.push(Artifact::RawResponse(path)),
                Err(e) => warn!(task_id = %ctx.task_id, error = %e, "cannot write raw response note"),
            }
        }
    }
}

async fn write_placeholder(ctx: &TaskContext, outcome: &mut Outcome, detail: &str) {
    let content = placeholder(ctx.service.name(), detail);
    match write_artifact(&ctx.primary_output, &content).await {
        Ok(()) => outcome
            .artifacts
            .insert(0, Artifact::Primary(ctx.primary_output.clone())),
        Err(e) => warn!(task_id = %ctx.task_id, error = %e, "cannot write placeholder output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn output_template_substitution() {
        let id = TaskId::from_ulid(Ulid::nil());
        let name = render_output_name("${task_name}_${service}_${task_id}.pdb", &id, "design_1", "rfdiffusion");
        assert_eq!(name, format!("design_1_rfdiffusion_{id}.pdb"));
        assert_eq!(render_output_name("plain.pdb", &id, "x", "y"), "plain.pdb");
    }
}
