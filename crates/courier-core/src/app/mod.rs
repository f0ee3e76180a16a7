//! App - アプリケーション層
//!
//! ports と impls を組み合わせて TaskDispatcher を組み立てます。
//!
//! # 主要コンポーネント
//! - **DispatcherBuilder**: 設定の検証とプールの生成
//! - **TaskDispatcher**: 4 つの実行コンテキストへの投稿 API
//! - **TaskHandle**: callable 投稿の完了ハンドル
//! - **DispatcherStats**: コンテキストごとのカウンタ

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod handle;
pub mod status;

pub use self::builder::{BuildError, DispatcherBuilder};
pub use self::config::DispatcherConfig;
pub use self::dispatcher::TaskDispatcher;
pub use self::handle::TaskHandle;
pub use self::status::{ContextCounts, DispatcherStats};
