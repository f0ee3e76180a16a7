//! Errors - ディスパッチ時のエラー型
//!
//! 同期的に返るもの（`InvalidArgument`）と、ハンドル経由で観測されるもの
//! （`TaskFailed`, `OwnerDropped`, `Abandoned`）があります。
//! どちらも自動ではログ出力されません。

use std::any::Any;
use std::io;

use thiserror::Error;

use super::ExecutionContext;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// An absent task or procedure was submitted. Nothing was scheduled.
    #[error("invalid argument: {0} must not be absent")]
    InvalidArgument(&'static str),

    /// The task panicked while running.
    #[error("task failed on {context} context: {message}")]
    TaskFailed {
        context: ExecutionContext,
        message: String,
    },

    /// The owner of an owner-bound task was dropped before the task ran.
    #[error("task owner was dropped before the task ran")]
    OwnerDropped,

    /// The task was discarded before it completed (e.g. the pool shut down).
    #[error("task was abandoned by the {context} context before completing")]
    Abandoned { context: ExecutionContext },

    #[error("failed to start the {context} pool: {source}")]
    PoolStart {
        context: ExecutionContext,
        #[source]
        source: io::Error,
    },
}

impl DispatchError {
    pub(crate) fn from_panic(context: ExecutionContext, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        DispatchError::TaskFailed { context, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let err = DispatchError::from_panic(ExecutionContext::IoBound, Box::new("boom"));
        assert_eq!(err.to_string(), "task failed on io context: boom");

        let err = DispatchError::from_panic(ExecutionContext::DbSerial, Box::new(String::from("disk")));
        assert!(matches!(err, DispatchError::TaskFailed { message, .. } if message == "disk"));

        let err = DispatchError::from_panic(ExecutionContext::CpuBound, Box::new(42_u8));
        assert!(err.to_string().contains("task panicked"));
    }
}
