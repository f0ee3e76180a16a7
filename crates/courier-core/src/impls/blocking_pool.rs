//! BlockingPool - tokio の blocking pool を使ったワーカープール
//!
//! # 実装詳細
//! - コンテキストごとに current-thread runtime を一つ作り、その blocking pool だけを使う
//! - `max_blocking_threads` が並列度、`thread_keep_alive` がアイドルスレッドの回収時間
//! - スレッドは必要になったときに作られ、keep-alive を過ぎると回収される
//! - blocking pool のキューは FIFO なので、並列度 1 なら投稿順・一つずつ実行される
//!
//! # Drop
//! runtime を普通に drop すると async context 内では panic するため、
//! `shutdown_background` で手放します。走行中の job は最後まで走り、未実行の job は捨てられます。

use std::io;
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;

use crate::domain::ExecutionContext;
use crate::ports::{Executor, Job};

/// Sizing for one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
    pub context: ExecutionContext,
    pub threads: usize,
    pub keep_alive: Duration,
    pub thread_name: String,
}

pub struct BlockingPool {
    context: ExecutionContext,
    parallelism: usize,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl BlockingPool {
    /// Build the pool. No thread is started until the first job arrives.
    ///
    /// `spec.threads` must be non-zero.
    pub fn new(spec: PoolSpec) -> io::Result<Self> {
        let runtime = Builder::new_current_thread()
            .max_blocking_threads(spec.threads)
            .thread_keep_alive(spec.keep_alive)
            .thread_name(spec.thread_name.clone())
            .build()?;

        debug!(
            context = %spec.context,
            threads = spec.threads,
            keep_alive = ?spec.keep_alive,
            thread_name = %spec.thread_name,
            "pool created"
        );

        Ok(Self {
            context: spec.context,
            parallelism: spec.threads,
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }
}

impl Executor for BlockingPool {
    fn context(&self) -> ExecutionContext {
        self.context
    }

    fn parallelism(&self) -> usize {
        self.parallelism
    }

    fn execute(&self, job: Job) {
        // JoinHandle は不要（結果は job 側のチャネルで返す）
        let _ = self.handle.spawn_blocking(job);
    }

    fn shutdown(mut self: Box<Self>, timeout: Duration) {
        if let Some(runtime) = self.runtime.take() {
            debug!(context = %self.context, "pool shutting down");
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl Drop for BlockingPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
