//! Domain model (contexts, tasks, ids, errors).

pub mod context;
pub mod errors;
pub mod ids;
pub mod posting;
pub mod task;

pub use self::context::ExecutionContext;
pub use self::errors::DispatchError;
pub use self::ids::{Id, IdMarker, PostingToken, TaskId};
pub use self::posting::MainPost;
pub use self::task::{Procedure, Task};
