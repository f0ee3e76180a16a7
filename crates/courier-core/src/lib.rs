//! courier-core
//!
//! Dispatches work to four execution contexts: a CPU-bound pool, an I/O-bound
//! pool, a serial DB context, and a main thread driven by a message loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ExecutionContext, Task, ids, MainPost, errors）
//! - **ports**: 抽象化レイヤー（Executor）
//! - **impls**: 実装（BlockingPool, MainLooper）
//! - **app**: TaskDispatcher, DispatcherBuilder, DispatcherConfig, TaskHandle
//!
//! ```ignore
//! let looper = MainLooper::prepare();
//! let dispatcher = TaskDispatcher::builder()
//!     .main_thread(looper.handle())
//!     .build()?;
//!
//! let handle = dispatcher.submit_db(Task::new(|| store.load("user:1")))?;
//! dispatcher.run_on_main(Task::new(|| println!("queued")))?;
//! looper.run_pending();
//! let user = handle.join()?;
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{
    BuildError, ContextCounts, DispatcherBuilder, DispatcherConfig, DispatcherStats,
    TaskDispatcher, TaskHandle,
};
pub use domain::{DispatchError, ExecutionContext, MainPost, PostingToken, Procedure, Task, TaskId};
pub use impls::{MainHandle, MainLooper};
