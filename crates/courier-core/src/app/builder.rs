//! DispatcherBuilder - TaskDispatcher の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定を検証し、0 スレッドなどの不正値は BuildError を返す
//! - プールの生成に失敗した場合も build() 時にエラーになる

use std::sync::Arc;

use tracing::info;

use crate::app::config::DispatcherConfig;
use crate::app::dispatcher::TaskDispatcher;
use crate::app::status::StatsRecorder;
use crate::domain::{DispatchError, ExecutionContext};
use crate::impls::{BlockingPool, MainHandle};
use crate::ports::Executor;

/// BuildError はディスパッチャ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid config: {0} must be greater than zero")]
    ZeroSetting(&'static str),

    #[error(transparent)]
    Pool(#[from] DispatchError),
}

/// # 使用例
/// ```ignore
/// let looper = MainLooper::prepare();
/// let dispatcher = DispatcherBuilder::new()
///     .config(DispatcherConfig::default())
///     .main_thread(looper.handle())
///     .build()?;
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    main: Option<MainHandle>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the main loop. Without one, main-thread submissions are dropped.
    pub fn main_thread(mut self, handle: MainHandle) -> Self {
        self.main = Some(handle);
        self
    }

    pub fn build(self) -> Result<TaskDispatcher, BuildError> {
        let config = self.config;
        if config.cpu_threads == 0 {
            return Err(BuildError::ZeroSetting("cpu_threads"));
        }
        if config.keep_alive_secs == 0 {
            return Err(BuildError::ZeroSetting("keep_alive_secs"));
        }

        let cpu = start_pool(&config, ExecutionContext::CpuBound)?;
        let io = start_pool(&config, ExecutionContext::IoBound)?;
        let db = start_pool(&config, ExecutionContext::DbSerial)?;

        info!(
            cpu_threads = cpu.parallelism(),
            io_threads = io.parallelism(),
            db_threads = db.parallelism(),
            keep_alive_secs = config.keep_alive_secs,
            main_loop = self.main.is_some(),
            "dispatcher ready"
        );

        Ok(TaskDispatcher::new(
            cpu,
            io,
            db,
            self.main,
            Arc::new(StatsRecorder::default()),
        ))
    }
}

fn start_pool(
    config: &DispatcherConfig,
    context: ExecutionContext,
) -> Result<Box<dyn Executor>, DispatchError> {
    let spec = config
        .pool_spec(context)
        .ok_or(DispatchError::InvalidArgument("context"))?;
    let pool = BlockingPool::new(spec).map_err(|source| DispatchError::PoolStart { context, source })?;
    Ok(Box::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_build_with_defaults() {
        let dispatcher = DispatcherBuilder::new().build();
        assert!(dispatcher.is_ok());
    }

    #[rstest]
    #[case::cpu(DispatcherConfig { cpu_threads: 0, ..DispatcherConfig::default() }, "cpu_threads")]
    #[case::keep_alive(DispatcherConfig { keep_alive_secs: 0, ..DispatcherConfig::default() }, "keep_alive_secs")]
    fn test_build_rejects_zero_settings(#[case] config: DispatcherConfig, #[case] field: &str) {
        let result = DispatcherBuilder::new().config(config).build();
        assert!(matches!(result, Err(BuildError::ZeroSetting(name)) if name == field));
    }

    #[test]
    fn test_build_uses_configured_sizes() {
        let config = DispatcherConfig {
            cpu_threads: 3,
            ..DispatcherConfig::default()
        };
        let dispatcher = DispatcherBuilder::new().config(config).build().unwrap();
        assert_eq!(dispatcher.parallelism(ExecutionContext::CpuBound), Some(3));
        assert_eq!(dispatcher.parallelism(ExecutionContext::IoBound), Some(2));
        assert_eq!(dispatcher.parallelism(ExecutionContext::DbSerial), Some(1));
        assert_eq!(dispatcher.parallelism(ExecutionContext::MainThread), None);
    }
}
