//! Ports - 抽象化レイヤー
//!
//! 実行コンテキストの背後にあるワーカープールを trait で隠蔽します。
//! テストや別ランタイムへの差し替えはこの seam で行います。

pub mod executor;

pub use self::executor::{Executor, Job};
