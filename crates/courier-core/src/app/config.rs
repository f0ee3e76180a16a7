//! DispatcherConfig - プールのサイズと寿命の設定
//!
//! JSON から読み込めます。欠けているフィールドはデフォルト値になります。
//! I/O の並列度は 2、DB は 1 に固定で、設定できません。
//! 未知のフィールド（`io_threads` など）は読み込み時にエラーになります。

use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ExecutionContext;
use crate::impls::PoolSpec;

pub const IO_THREADS: usize = 2;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub const DB_THREADS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// CPU pool parallelism. Defaults to the available core count.
    pub cpu_threads: usize,

    /// Idle worker threads are reclaimed after this many seconds.
    pub keep_alive_secs: u64,

    /// Thread name prefix; pools append `-cpu`, `-io`, `-db`.
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cpu_threads: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            thread_name: "courier".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Parallelism of a pool context. `None` for the main thread.
    pub fn threads_for(&self, context: ExecutionContext) -> Option<usize> {
        match context {
            ExecutionContext::CpuBound => Some(self.cpu_threads),
            ExecutionContext::IoBound => Some(IO_THREADS),
            ExecutionContext::DbSerial => Some(DB_THREADS),
            ExecutionContext::MainThread => None,
        }
    }

    pub(crate) fn pool_spec(&self, context: ExecutionContext) -> Option<PoolSpec> {
        let threads = self.threads_for(context)?;
        Some(PoolSpec {
            context,
            threads,
            keep_alive: self.keep_alive(),
            thread_name: format!("{}-{}", self.thread_name, context),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_context_sizing() {
        let config = DispatcherConfig::default();
        assert!(config.cpu_threads >= 1);
        assert_eq!(config.threads_for(ExecutionContext::IoBound), Some(2));
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.threads_for(ExecutionContext::DbSerial), Some(1));
        assert_eq!(config.threads_for(ExecutionContext::MainThread), None);
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let config = DispatcherConfig::from_json_str(r#"{ "cpu_threads": 4 }"#).unwrap();
        assert_eq!(config.cpu_threads, 4);
        assert_eq!(config.keep_alive_secs, DEFAULT_KEEP_ALIVE_SECS);
        assert_eq!(config.thread_name, "courier");
    }

    #[test]
    fn mistyped_field_is_rejected() {
        assert!(DispatcherConfig::from_json_str(r#"{ "cpu_threads": "two" }"#).is_err());
    }

    #[test]
    fn io_parallelism_is_not_configurable() {
        assert!(DispatcherConfig::from_json_str(r#"{ "io_threads": 5 }"#).is_err());
        let config = DispatcherConfig {
            cpu_threads: 7,
            ..DispatcherConfig::default()
        };
        assert_eq!(config.threads_for(ExecutionContext::IoBound), Some(IO_THREADS));
    }

    #[test]
    fn pool_spec_names_threads_by_context() {
        let config = DispatcherConfig {
            thread_name: "app".to_string(),
            ..DispatcherConfig::default()
        };
        let spec = config.pool_spec(ExecutionContext::IoBound).unwrap();
        assert_eq!(spec.thread_name, "app-io");
        assert_eq!(spec.threads, 2);
        assert!(config.pool_spec(ExecutionContext::MainThread).is_none());
    }
}
