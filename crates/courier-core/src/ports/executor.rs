//! Executor port - ワーカープールの抽象化
//!
//! Dispatcher はプールの実装を知りません。`BlockingPool`（tokio の blocking pool）が
//! 本番用の実装です。

use std::time::Duration;

use crate::domain::ExecutionContext;

/// A boxed unit of work as an executor sees it.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executor runs jobs for one execution context.
///
/// # 契約
/// - `execute` は呼び出し元をブロックしない
/// - `parallelism() == 1` の実装は投稿順（FIFO）に一つずつ実行する
/// - 実行されずに捨てられた job は drop される（結果チャネルも閉じる）
pub trait Executor: Send + Sync {
    fn context(&self) -> ExecutionContext;

    /// Maximum number of jobs running at once.
    fn parallelism(&self) -> usize;

    fn execute(&self, job: Job);

    /// Stop accepting work and wait up to `timeout` for running jobs.
    ///
    /// Must not be called from inside an async runtime.
    fn shutdown(self: Box<Self>, timeout: Duration);
}
