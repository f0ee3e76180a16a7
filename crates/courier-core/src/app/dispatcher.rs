//! TaskDispatcher - 4 つの実行コンテキストへの統一された投稿 API
//!
//! | context      | 投稿先                      | 保証                          |
//! |--------------|-----------------------------|-------------------------------|
//! | `CpuBound`   | コア数のプール               | 順序保証なし                  |
//! | `IoBound`    | 並列度 2 のプール            | 順序保証なし                  |
//! | `DbSerial`   | 1 スレッド                  | 投稿順（FIFO）・同時実行なし  |
//! | `MainThread` | main loop                   | 即時投稿は FIFO、遅延は時刻順 |
//!
//! 不在のタスク（`None`）は何もスケジュールせずに `InvalidArgument` を返します。
//! タスクの失敗はハンドルでのみ観測され、ログには出しません。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::builder::DispatcherBuilder;
use crate::app::handle::TaskHandle;
use crate::app::status::{DispatcherStats, StatsRecorder};
use crate::domain::{DispatchError, ExecutionContext, MainPost, PostingToken, Procedure, Task};
use crate::impls::MainHandle;
use crate::ports::{Executor, Job};

/// Dispatches tasks to the CPU, I/O, DB and main-thread contexts.
///
/// Build one with [`TaskDispatcher::builder`] and pass it around by reference;
/// there is no process-wide instance.
pub struct TaskDispatcher {
    cpu: Box<dyn Executor>,
    io: Box<dyn Executor>,
    db: Box<dyn Executor>,
    main: Option<MainHandle>,
    stats: Arc<StatsRecorder>,
}

impl TaskDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn new(
        cpu: Box<dyn Executor>,
        io: Box<dyn Executor>,
        db: Box<dyn Executor>,
        main: Option<MainHandle>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            cpu,
            io,
            db,
            main,
            stats,
        }
    }

    // ========================================
    // CPU-bound
    // ========================================

    pub fn submit_background<R>(
        &self,
        task: impl Into<Option<Task<R>>>,
    ) -> Result<TaskHandle<R>, DispatchError>
    where
        R: Send + 'static,
    {
        self.submit(ExecutionContext::CpuBound, task.into())
    }

    pub fn execute_background(
        &self,
        procedure: impl Into<Option<Procedure>>,
    ) -> Result<(), DispatchError> {
        self.execute(ExecutionContext::CpuBound, procedure.into())
    }

    // ========================================
    // I/O-bound
    // ========================================

    pub fn submit_io<R>(
        &self,
        task: impl Into<Option<Task<R>>>,
    ) -> Result<TaskHandle<R>, DispatchError>
    where
        R: Send + 'static,
    {
        self.submit(ExecutionContext::IoBound, task.into())
    }

    pub fn execute_io(&self, procedure: impl Into<Option<Procedure>>) -> Result<(), DispatchError> {
        self.execute(ExecutionContext::IoBound, procedure.into())
    }

    // ========================================
    // DB serial
    // ========================================

    /// Tasks submitted here run one at a time, in submission order.
    pub fn submit_db<R>(
        &self,
        task: impl Into<Option<Task<R>>>,
    ) -> Result<TaskHandle<R>, DispatchError>
    where
        R: Send + 'static,
    {
        self.submit(ExecutionContext::DbSerial, task.into())
    }

    pub fn execute_db(&self, procedure: impl Into<Option<Procedure>>) -> Result<(), DispatchError> {
        self.execute(ExecutionContext::DbSerial, procedure.into())
    }

    // ========================================
    // Main thread
    // ========================================

    /// Run inline when called on the main thread, otherwise post to the main loop.
    pub fn run_on_main(
        &self,
        procedure: impl Into<Option<Procedure>>,
    ) -> Result<MainPost, DispatchError> {
        let procedure = procedure
            .into()
            .ok_or(DispatchError::InvalidArgument("procedure"))?;
        let Some(main) = self.main_handle() else {
            return Ok(MainPost::Dropped);
        };
        let job = self.main_job(procedure);
        self.stats.submitted(ExecutionContext::MainThread);
        let post = main.run_or_post(job);
        self.settle_post(post);
        Ok(post)
    }

    /// Post to the main loop to run no earlier than `delay` from now.
    /// Never runs inline, even on the main thread with a zero delay.
    pub fn run_on_main_delayed(
        &self,
        procedure: impl Into<Option<Procedure>>,
        delay: Duration,
    ) -> Result<MainPost, DispatchError> {
        let procedure = procedure
            .into()
            .ok_or(DispatchError::InvalidArgument("procedure"))?;
        let Some(main) = self.main_handle() else {
            return Ok(MainPost::Dropped);
        };
        let job = self.main_job(procedure);
        self.stats.submitted(ExecutionContext::MainThread);
        let post = main.post_delayed(job, delay);
        self.settle_post(post);
        Ok(post)
    }

    /// Withdraw a main-thread posting that has not run yet.
    ///
    /// Returns `false` (and does nothing) if it already ran, was already
    /// cancelled, or was never posted.
    pub fn cancel_main(&self, token: PostingToken) -> bool {
        let Some(main) = &self.main else {
            return false;
        };
        let removed = main.cancel(token);
        if removed {
            self.stats.cancelled(ExecutionContext::MainThread);
        }
        removed
    }

    pub fn is_main_thread(&self) -> bool {
        self.main.as_ref().is_some_and(MainHandle::is_current_thread)
    }

    // ========================================
    // Introspection / lifecycle
    // ========================================

    pub fn stats(&self) -> DispatcherStats {
        self.stats.snapshot()
    }

    /// Parallelism of a pool context. `None` for the main thread.
    pub fn parallelism(&self, context: ExecutionContext) -> Option<usize> {
        self.executor(context).map(|executor| executor.parallelism())
    }

    /// Stop the pools, waiting up to `timeout` per pool for running tasks.
    /// Tasks still queued are abandoned.
    ///
    /// Must not be called from inside an async runtime; dropping the
    /// dispatcher there is fine.
    pub fn shutdown(self, timeout: Duration) {
        debug!(?timeout, "dispatcher shutting down");
        self.cpu.shutdown(timeout);
        self.io.shutdown(timeout);
        self.db.shutdown(timeout);
    }

    fn executor(&self, context: ExecutionContext) -> Option<&dyn Executor> {
        match context {
            ExecutionContext::CpuBound => Some(self.cpu.as_ref()),
            ExecutionContext::IoBound => Some(self.io.as_ref()),
            ExecutionContext::DbSerial => Some(self.db.as_ref()),
            ExecutionContext::MainThread => None,
        }
    }

    fn submit<R>(
        &self,
        context: ExecutionContext,
        task: Option<Task<R>>,
    ) -> Result<TaskHandle<R>, DispatchError>
    where
        R: Send + 'static,
    {
        let task = task.ok_or(DispatchError::InvalidArgument("task"))?;
        let executor = self
            .executor(context)
            .ok_or(DispatchError::InvalidArgument("context"))?;

        let task_id = task.id();
        let (completion, handle) = TaskHandle::channel(task_id, context);
        let stats = Arc::clone(&self.stats);

        stats.submitted(context);
        debug!(%context, %task_id, "task submitted");
        executor.execute(Box::new(move || {
            let result = task.run_in(context);
            stats.finished(context, result.is_ok());
            // 受け手がハンドルを捨てていても構わない
            let _ = completion.send(result);
        }));

        Ok(handle)
    }

    fn execute(
        &self,
        context: ExecutionContext,
        procedure: Option<Procedure>,
    ) -> Result<(), DispatchError> {
        let procedure = procedure.ok_or(DispatchError::InvalidArgument("procedure"))?;
        let executor = self
            .executor(context)
            .ok_or(DispatchError::InvalidArgument("context"))?;

        let task_id = procedure.id();
        let stats = Arc::clone(&self.stats);

        stats.submitted(context);
        debug!(%context, %task_id, "procedure submitted");
        executor.execute(Box::new(move || {
            let result = procedure.run_in(context);
            stats.finished(context, result.is_ok());
        }));

        Ok(())
    }

    fn main_handle(&self) -> Option<&MainHandle> {
        if self.main.is_none() {
            warn!("no main loop attached; dropping procedure");
        }
        self.main.as_ref()
    }

    fn main_job(&self, procedure: Procedure) -> Job {
        let stats = Arc::clone(&self.stats);
        debug!(context = %ExecutionContext::MainThread, task_id = %procedure.id(), "procedure submitted");
        Box::new(move || {
            let result = procedure.run_in(ExecutionContext::MainThread);
            stats.finished(ExecutionContext::MainThread, result.is_ok());
        })
    }

    /// The submission is counted before posting so an inline run never
    /// finishes ahead of it. A dropped posting takes the count back.
    fn settle_post(&self, post: MainPost) {
        if post.is_dropped() {
            self.stats.withdrawn(ExecutionContext::MainThread);
        }
    }
}
