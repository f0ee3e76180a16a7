//! TaskHandle - callable 投稿の完了ハンドル
//!
//! 結果（または失敗）はちょうど一度だけ観測できます。
//! `join` / `try_join` は self を消費し、`.await` も Future を消費します。

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::domain::{DispatchError, ExecutionContext, TaskId};

pub(crate) type Completion<R> = oneshot::Sender<Result<R, DispatchError>>;

#[derive(Debug)]
pub struct TaskHandle<R> {
    task_id: TaskId,
    context: ExecutionContext,
    rx: oneshot::Receiver<Result<R, DispatchError>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn channel(task_id: TaskId, context: ExecutionContext) -> (Completion<R>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                task_id,
                context,
                rx,
            },
        )
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Block the calling thread until the task finishes.
    ///
    /// # Panics
    /// When called from inside an async runtime. Use `.await` there.
    pub fn join(self) -> Result<R, DispatchError> {
        let context = self.context;
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(DispatchError::Abandoned { context }))
    }

    /// Take the result if the task has finished, otherwise hand the handle back.
    pub fn try_join(mut self) -> Result<Result<R, DispatchError>, Self> {
        match self.rx.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Closed) => Ok(Err(DispatchError::Abandoned {
                context: self.context,
            })),
        }
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let context = self.context;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(DispatchError::Abandoned { context })))
    }
}
