//! nimbus-core
//!
//! リモートの NIM 推論呼び出しをポーリング型タスクとして実行する。
//! スケジューラがタスクを submit し、終端までポーリングし、
//! 構造ファイルと診断ファイルをタスクの work dir から拾う。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, パラメータ, ペイロード, 状態, 結果, エラー）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, Transport）
//! - **services**: サービスごとのリクエストビルダーと出力フィールド
//! - **app**: アプリケーションロジック（registry, worker, lifecycle, executor）
//! - **impls**: 実装（reqwest / mock transport）
//! - **observability**: tracing の設定

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod services;

pub use app::{ExecutorBuilder, NimConfig, NimTask, PolledTask, TaskExecutor};
pub use domain::{NimError, TaskParameters, TaskSpec, TaskStatus};
