//! MainPost - main thread への投稿結果

use super::PostingToken;

/// What happened to a main-thread submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainPost {
    /// Already on the main thread; the procedure ran before the call returned.
    Ran,
    /// Queued on the main loop. The token can be used to cancel it.
    Posted(PostingToken),
    /// The main loop is not running, so the procedure was discarded.
    Dropped,
}

impl MainPost {
    pub fn token(self) -> Option<PostingToken> {
        match self {
            MainPost::Posted(token) => Some(token),
            MainPost::Ran | MainPost::Dropped => None,
        }
    }

    pub fn is_dropped(self) -> bool {
        matches!(self, MainPost::Dropped)
    }
}
