//! App - タスク実行層
//!
//! # 主要コンポーネント
//! - **ExecutorBuilder / TaskExecutor**: ワイヤリングとタスク生成
//! - **ServiceRegistry**: エンドポイントと認証情報の解決
//! - **request**: 入力のステージングとペイロード生成
//! - **status_policy**: どの HTTP ステータスでタスクを完了とするか
//! - **response**: 主成果物の抽出
//! - **worker**: submit されたタスクが走らせるパイプライン
//! - **NimTask**: ポーリングされるライフサイクル
//! - **DiagnosticsSink**: タスクごとのファイル

pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod response;
pub mod status_policy;
pub mod worker;

pub use self::builder::{BuildError, ExecutorBuilder, TaskExecutor};
pub use self::config::{ConfigSnapshot, NimConfig, ServiceConfig};
pub use self::diagnostics::DiagnosticsSink;
pub use self::lifecycle::{NimTask, PolledTask};
pub use self::registry::ServiceRegistry;
