//! MainLooper - 特定スレッドに束縛されたメッセージループ
//!
//! # 設計
//! - `MainLooper::prepare()` を呼んだスレッドが main thread になる
//! - `MainLooper` は `!Send`。ループを回せるのはそのスレッドだけ
//! - `MainHandle` は `Clone + Send + Sync`。どのスレッドからでも投稿・キャンセルできる
//!
//! # 順序
//! 投稿は (fire_at, seq) の順に実行されます。即時投稿は fire_at = 投稿時刻なので FIFO、
//! 遅延投稿は fire_at 順になります。`Instant` で表せないほど遠い遅延は fire_at = `None`
//! （期限なし）として最後尾に並び、キャンセルか quit されるまで残ります。
//!
//! # キャンセル
//! ヒープからは消さず、`pending` マップから job を抜くだけです。
//! ヒープの先頭に来た時点で `pending` に無いエントリは捨てられます。
//!
//! # 終了
//! `quit()` 後、または `MainLooper` が drop された後は、未実行の投稿は捨てられ、
//! 新しい投稿は `MainPost::Dropped` になります（エラーにはしない）。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::domain::{MainPost, PostingToken};
use crate::ports::Job;

/// Scheduled posting for the priority queue.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scheduled {
    /// `None` is never due.
    fire_at: Option<Instant>,
    seq: u64,
    token: PostingToken,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        fire_order(other.fire_at, self.fire_at).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Earlier instants first; `None` after every instant.
fn fire_order(a: Option<Instant>, b: Option<Instant>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

struct LooperState {
    queue: BinaryHeap<Scheduled>,
    /// Jobs that have not run and were not cancelled.
    pending: HashMap<PostingToken, Job>,
    next_seq: u64,
    alive: bool,
}

impl LooperState {
    fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            pending: HashMap::new(),
            next_seq: 0,
            alive: true,
        }
    }

    /// Drop heap entries whose posting was cancelled.
    fn prune(&mut self) {
        while let Some(top) = self.queue.peek() {
            if self.pending.contains_key(&top.token) {
                break;
            }
            self.queue.pop();
        }
    }

    fn next_fire_at(&mut self) -> Option<Instant> {
        self.prune();
        self.queue.peek().and_then(|entry| entry.fire_at)
    }

    /// Take the earliest posting if it is due at `cutoff`.
    fn pop_due(&mut self, cutoff: Instant) -> Option<(PostingToken, Job)> {
        self.prune();
        let due = self
            .queue
            .peek()
            .is_some_and(|entry| entry.fire_at.is_some_and(|at| at <= cutoff));
        if !due {
            return None;
        }
        let entry = self.queue.pop()?;
        let job = self.pending.remove(&entry.token)?;
        Some((entry.token, job))
    }

    fn clear(&mut self) {
        self.alive = false;
        self.queue.clear();
        self.pending.clear();
    }
}

struct Shared {
    owner: ThreadId,
    state: Mutex<LooperState>,
    wakeup: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LooperState> {
        // job はロック外で実行するので poison は実質起きない
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The loop itself. Lives on the thread that called `prepare`.
pub struct MainLooper {
    shared: Arc<Shared>,
    _not_send: PhantomData<*const ()>,
}

impl MainLooper {
    /// Bind a new loop to the calling thread.
    pub fn prepare() -> Self {
        let owner = thread::current().id();
        debug!(thread = ?owner, "main loop prepared");
        Self {
            shared: Arc::new(Shared {
                owner,
                state: Mutex::new(LooperState::new()),
                wakeup: Condvar::new(),
            }),
            _not_send: PhantomData,
        }
    }

    pub fn handle(&self) -> MainHandle {
        MainHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run postings until `quit` is called.
    pub fn run(&self) {
        while let Some(job) = self.next_job(None) {
            job();
        }
        debug!("main loop finished");
    }

    /// Run every posting that is due right now, without waiting.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let cutoff = Instant::now();
        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.shared.lock();
                if !state.alive {
                    break;
                }
                state.pop_due(cutoff)
            };
            let Some((token, job)) = next else {
                break;
            };
            trace!(%token, "running posting");
            job();
            ran += 1;
        }
        ran
    }

    /// Drive the loop for `duration`, running postings as they come due.
    /// A duration too large for `Instant` behaves like `run`.
    /// Returns how many ran.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now().checked_add(duration);
        let mut ran = 0;
        while let Some(job) = self.next_job(deadline) {
            job();
            ran += 1;
        }
        ran
    }

    /// Block until a posting is due, the deadline passes, or the loop quits.
    fn next_job(&self, deadline: Option<Instant>) -> Option<Job> {
        let mut state = self.shared.lock();
        loop {
            if !state.alive {
                return None;
            }
            let now = Instant::now();
            if let Some((token, job)) = state.pop_due(now) {
                trace!(%token, "running posting");
                return Some(job);
            }
            if deadline.is_some_and(|d| now >= d) {
                return None;
            }

            let wake_at = match (state.next_fire_at(), deadline) {
                (Some(fire_at), Some(d)) => Some(fire_at.min(d)),
                (fire_at, d) => fire_at.or(d),
            };
            state = match wake_at {
                Some(at) => {
                    let timeout = at.saturating_duration_since(now);
                    self.shared
                        .wakeup
                        .wait_timeout(state, timeout)
                        .map(|(guard, _)| guard)
                        .unwrap_or_else(|e| e.into_inner().0)
                }
                None => self
                    .shared
                    .wakeup
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

impl Drop for MainLooper {
    fn drop(&mut self) {
        self.shared.lock().clear();
        self.shared.wakeup.notify_all();
    }
}

/// Cloneable handle for posting to a `MainLooper` from any thread.
#[derive(Clone)]
pub struct MainHandle {
    shared: Arc<Shared>,
}

impl MainHandle {
    /// Is the calling thread the loop's thread?
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    pub fn is_alive(&self) -> bool {
        self.shared.lock().alive
    }

    /// Run inline if called on the loop's thread, otherwise post.
    pub fn run_or_post<F>(&self, f: F) -> MainPost
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_alive() {
            warn!("main loop is not running; dropping procedure");
            return MainPost::Dropped;
        }
        if self.is_current_thread() {
            f();
            return MainPost::Ran;
        }
        self.schedule(Box::new(f), Duration::ZERO)
    }

    /// Queue `f` behind everything already posted.
    pub fn post<F>(&self, f: F) -> MainPost
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(Box::new(f), Duration::ZERO)
    }

    /// Queue `f` to run no earlier than `delay` from now. Never runs inline.
    pub fn post_delayed<F>(&self, f: F, delay: Duration) -> MainPost
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule(Box::new(f), delay)
    }

    /// Withdraw a posting that has not run yet. Returns whether it was removed.
    pub fn cancel(&self, token: PostingToken) -> bool {
        let removed = self.shared.lock().pending.remove(&token).is_some();
        debug!(%token, removed, "posting cancel requested");
        removed
    }

    /// Number of postings waiting to run.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Stop the loop. Pending postings are discarded.
    pub fn quit(&self) {
        let mut state = self.shared.lock();
        if state.alive {
            debug!(discarded = state.pending.len(), "main loop quit requested");
        }
        state.clear();
        drop(state);
        self.shared.wakeup.notify_all();
    }

    fn schedule(&self, job: Job, delay: Duration) -> MainPost {
        let mut state = self.shared.lock();
        if !state.alive {
            drop(state);
            warn!("main loop is not running; dropping posting");
            return MainPost::Dropped;
        }

        let token = PostingToken::generate();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Scheduled {
            fire_at: Instant::now().checked_add(delay),
            seq,
            token,
        });
        state.pending.insert(token, job);
        drop(state);

        self.shared.wakeup.notify_all();
        debug!(%token, ?delay, "posted to main loop");
        MainPost::Posted(token)
    }
}
