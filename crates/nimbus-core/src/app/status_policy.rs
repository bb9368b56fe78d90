//! HTTP ステータスの判定
//!
//! - 200, 202: 成功（202 はサービスが非同期に受け付けた）
//! - 422: lenient なら軽い成功、そうでなければ失敗
//! - それ以外: 失敗

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    SoftSuccess,
    Failure,
}

impl StatusClass {
    pub fn completes_task(self) -> bool {
        !matches!(self, StatusClass::Failure)
    }
}

pub const UNPROCESSABLE_ENTITY: u16 = 422;

pub fn classify(status: u16, lenient_unprocessable: bool) -> StatusClass {
    match status {
        200 | 202 => StatusClass::Success,
        UNPROCESSABLE_ENTITY if lenient_unprocessable => StatusClass::SoftSuccess,
        _ => StatusClass::Failure,
    }
}
