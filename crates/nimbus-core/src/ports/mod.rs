//! Ports - 外部との境界
//!
//! 各 trait が外部依存（ネットワーク, 壁時計, ID ソース）を隠すので、
//! ライフサイクルをテストから決定的に動かせる。

pub mod clock;
pub mod id_generator;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{HttpRequest, HttpResponse, Transport};
