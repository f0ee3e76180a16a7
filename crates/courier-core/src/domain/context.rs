//! ExecutionContext - 投稿先の論理的な実行コンテキスト

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a unit of work runs.
///
/// - `CpuBound`: pool sized to the core count, idle threads are reclaimed.
/// - `IoBound`: pool with parallelism 2.
/// - `DbSerial`: one worker, strict FIFO.
/// - `MainThread`: the thread that owns the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    CpuBound,
    IoBound,
    DbSerial,
    MainThread,
}

impl ExecutionContext {
    pub const ALL: [ExecutionContext; 4] = [
        ExecutionContext::CpuBound,
        ExecutionContext::IoBound,
        ExecutionContext::DbSerial,
        ExecutionContext::MainThread,
    ];

    /// Short name used for thread names and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionContext::CpuBound => "cpu",
            ExecutionContext::IoBound => "io",
            ExecutionContext::DbSerial => "db",
            ExecutionContext::MainThread => "main",
        }
    }

    /// Is this context backed by a worker pool?
    pub fn is_pool(self) -> bool {
        !matches!(self, ExecutionContext::MainThread)
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ExecutionContext::CpuBound => 0,
            ExecutionContext::IoBound => 1,
            ExecutionContext::DbSerial => 2,
            ExecutionContext::MainThread => 3,
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_main_thread_is_not_a_pool() {
        let pools: Vec<_> = ExecutionContext::ALL
            .iter()
            .filter(|c| c.is_pool())
            .collect();
        assert_eq!(pools.len(), 3);
        assert!(!ExecutionContext::MainThread.is_pool());
    }

    #[test]
    fn indexes_are_dense() {
        for (i, context) in ExecutionContext::ALL.iter().enumerate() {
            assert_eq!(context.index(), i);
        }
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ExecutionContext::DbSerial).unwrap();
        assert_eq!(json, "\"db_serial\"");
    }
}
