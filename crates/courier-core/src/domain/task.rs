//! Task - 投稿される作業単位
//!
//! # 二種類
//! - `Task<R>`: 結果 `R` を返す callable。`TaskHandle<R>` で結果を受け取る
//! - `Procedure` (= `Task<()>`): fire-and-forget
//!
//! # Owner-bound task
//! `Task::bound_to` は owner を `Weak` でしか保持しません。
//! 実行時に owner が既に drop されていれば本体はスキップされ、`OwnerDropped` になります。

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::{DispatchError, ExecutionContext, TaskId};

type Body<R> = Box<dyn FnOnce() -> Result<R, DispatchError> + Send + 'static>;

/// A unit of work producing `R`. Ownership moves to the executing context
/// on submission.
pub struct Task<R> {
    id: TaskId,
    body: Body<R>,
}

/// A task with no result, submitted fire-and-forget.
pub type Procedure = Task<()>;

impl<R: Send + 'static> Task<R> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self {
            id: TaskId::generate(),
            body: Box::new(move || Ok(f())),
        }
    }

    /// Task that only holds a weak reference to `owner`.
    ///
    /// ```ignore
    /// let repo = Arc::new(Repository::open()?);
    /// dispatcher.execute_db(Task::bound_to(&repo, |repo| repo.flush()))?;
    /// ```
    pub fn bound_to<O, F>(owner: &Arc<O>, f: F) -> Self
    where
        O: Send + Sync + 'static,
        F: FnOnce(&O) -> R + Send + 'static,
    {
        let owner = Arc::downgrade(owner);
        Self {
            id: TaskId::generate(),
            body: Box::new(move || {
                let owner = owner.upgrade().ok_or(DispatchError::OwnerDropped)?;
                Ok(f(&owner))
            }),
        }
    }
}

impl<R> Task<R> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Run the body on the current thread, turning a panic into `TaskFailed`.
    pub(crate) fn run_in(self, context: ExecutionContext) -> Result<R, DispatchError> {
        let body = self.body;
        match catch_unwind(AssertUnwindSafe(body)) {
            Ok(result) => result,
            Err(payload) => Err(DispatchError::from_panic(context, payload)),
        }
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_body_and_returns_value() {
        let task = Task::new(|| 6 * 7);
        assert_eq!(task.run_in(ExecutionContext::CpuBound).unwrap(), 42);
    }

    #[test]
    fn panic_is_captured_as_failure() {
        let task: Task<u32> = Task::new(|| panic!("exploded"));
        let err = task.run_in(ExecutionContext::IoBound).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::TaskFailed { context: ExecutionContext::IoBound, ref message } if message == "exploded"
        ));
    }

    #[test]
    fn bound_task_runs_while_owner_is_alive() {
        let owner = Arc::new(String::from("repo"));
        let task = Task::bound_to(&owner, |name| name.len());
        assert_eq!(task.run_in(ExecutionContext::DbSerial).unwrap(), 4);
    }

    #[test]
    fn bound_task_does_not_keep_owner_alive() {
        let owner = Arc::new(vec![1, 2, 3]);
        let task = Task::bound_to(&owner, |v| v.iter().sum::<i32>());
        assert_eq!(Arc::strong_count(&owner), 1);

        drop(owner);
        let err = task.run_in(ExecutionContext::CpuBound).unwrap_err();
        assert!(matches!(err, DispatchError::OwnerDropped));
    }

    #[test]
    fn each_task_gets_its_own_id() {
        let a = Task::new(|| ());
        let b = Task::new(|| ());
        assert_ne!(a.id(), b.id());
    }
}
