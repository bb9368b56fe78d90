//! Impls - transport の実装
//!
//! - **ReqwestTransport**: `reqwest` による HTTPS（本番用）
//! - **MockTransport**: 固定応答（テスト・オフライン実行用）

pub mod http_transport;
pub mod mock_transport;

pub use self::http_transport::ReqwestTransport;
pub use self::mock_transport::MockTransport;
