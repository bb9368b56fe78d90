//! タスクのライフサイクル状態と完了記録
//!
//! # 状態遷移
//! - New -> Submitted -> Running -> Completed
//! - 任意の状態 -> Completed（kill）
//!
//! 状態は前にしか進まない。完了は別の [`Completion`] セルで管理し、
//! worker か `kill` のどちらかが一度だけ書き込む。

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// `kill` が使う慣例的な「中断」終了ステータス
pub const EXIT_KILLED: i32 = 130;
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TaskState {
    New = 0,
    Submitted = 1,
    Running = 2,
    Completed = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::New,
            1 => TaskState::Submitted,
            2 => TaskState::Running,
            _ => TaskState::Completed,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == TaskState::Completed
    }
}

/// 前にしか進まない `TaskState`
#[derive(Debug)]
pub struct AtomicTaskState(AtomicU8);

impl AtomicTaskState {
    pub fn new() -> Self {
        Self(AtomicU8::new(TaskState::New as u8))
    }

    pub fn load(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// すでに先に進んでいなければ `next` に進める。呼び出し前の状態を返す。
    pub fn advance(&self, next: TaskState) -> TaskState {
        TaskState::from_u8(self.0.fetch_max(next as u8, Ordering::AcqRel))
    }

    /// 現在の状態がちょうど `from` のときだけ `from -> to` に遷移
    pub fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicTaskState {
    fn default() -> Self {
        Self::new()
    }
}

/// 一度だけ書ける終了ステータス。`completed` はここから導くので、
/// 完了したタスクには必ず終了ステータスがある。
#[derive(Debug)]
pub struct Completion {
    exit_status: AtomicI32,
}

const NOT_COMPLETED: i32 = i32::MIN;

impl Completion {
    pub fn new() -> Self {
        Self {
            exit_status: AtomicI32::new(NOT_COMPLETED),
        }
    }

    /// 終了ステータスを記録する。最初の呼び出しだけが勝つ。
    /// この呼び出しでタスクが完了したかを返す。
    pub fn complete(&self, exit_status: i32) -> bool {
        debug_assert_ne!(exit_status, NOT_COMPLETED);
        self.exit_status
            .compare_exchange(
                NOT_COMPLETED,
                exit_status,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_completed(&self) -> bool {
        self.exit_status().is_some()
    }

    pub fn exit_status(&self) -> Option<i32> {
        match self.exit_status.load(Ordering::Acquire) {
            NOT_COMPLETED => None,
            code => Some(code),
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

/// スケジューラに報告する終端ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Succeeded,
    Failed { exit_status: i32 },
    Aborted,
}

impl TaskStatus {
    pub fn from_exit_status(exit_status: i32) -> Self {
        match exit_status {
            EXIT_SUCCESS => TaskStatus::Succeeded,
            EXIT_KILLED => TaskStatus::Aborted,
            code => TaskStatus::Failed { exit_status: code },
        }
    }

    pub fn exit_status(self) -> i32 {
        match self {
            TaskStatus::Succeeded => EXIT_SUCCESS,
            TaskStatus::Aborted => EXIT_KILLED,
            TaskStatus::Failed { exit_status } => exit_status,
        }
    }

    pub fn is_success(self) -> bool {
        self == TaskStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn state_never_regresses() {
        let state = AtomicTaskState::new();
        assert_eq!(state.advance(TaskState::Running), TaskState::New);
        assert_eq!(state.advance(TaskState::Submitted), TaskState::Running);
        assert_eq!(state.load(), TaskState::Running);
        state.advance(TaskState::Completed);
        state.advance(TaskState::New);
        assert_eq!(state.load(), TaskState::Completed);
    }

    #[test]
    fn transition_requires_exact_source_state() {
        let state = AtomicTaskState::new();
        assert!(!state.transition(TaskState::Submitted, TaskState::Running));
        assert!(state.transition(TaskState::New, TaskState::Submitted));
        assert!(state.transition(TaskState::Submitted, TaskState::Running));
        assert_eq!(state.load(), TaskState::Running);
    }

    #[test]
    fn completion_is_written_once() {
        let completion = Completion::new();
        assert!(!completion.is_completed());
        assert_eq!(completion.exit_status(), None);

        assert!(completion.complete(EXIT_KILLED));
        assert!(!completion.complete(EXIT_SUCCESS));
        assert!(completion.is_completed());
        assert_eq!(completion.exit_status(), Some(EXIT_KILLED));
    }

    #[rstest]
    #[case(0, TaskStatus::Succeeded)]
    #[case(1, TaskStatus::Failed { exit_status: 1 })]
    #[case(130, TaskStatus::Aborted)]
    #[case(42, TaskStatus::Failed { exit_status: 42 })]
    fn exit_status_maps_to_terminal_status(#[case] code: i32, #[case] expected: TaskStatus) {
        let status = TaskStatus::from_exit_status(code);
        assert_eq!(status, expected);
        assert_eq!(status.exit_status(), code);
    }
}
