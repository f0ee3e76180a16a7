//! Impls - ports の実装と main loop
//!
//! # 含まれる実装
//! - **BlockingPool**: tokio の blocking pool を使った `Executor`
//! - **MainLooper / MainHandle**: main thread に束縛されたメッセージループ

pub mod blocking_pool;
pub mod main_looper;

pub use self::blocking_pool::{BlockingPool, PoolSpec};
pub use self::main_looper::{MainHandle, MainLooper};
