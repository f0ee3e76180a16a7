use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{env, fs, process, thread};

use courier_core::{DispatcherConfig, MainLooper, Task, TaskDispatcher};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// DB コンテキストからのみ書き込まれる台帳
#[derive(Default)]
struct Ledger {
    rows: Mutex<Vec<String>>,
}

impl Ledger {
    fn insert(&self, name: &str) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let n = rows.len() + 1;
        rows.push(format!("{n}:{name}"));
    }

    fn rows(&self) -> Vec<String> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn load_config() -> Result<DispatcherConfig, Box<dyn Error>> {
    let Some(path) = env::args().nth(1) else {
        return Ok(DispatcherConfig::default());
    };
    let json = fs::read_to_string(&path).map_err(|e| format!("read {path}: {e}"))?;
    let config = DispatcherConfig::from_json_str(&json).map_err(|e| format!("parse {path}: {e}"))?;
    Ok(config)
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = load_config()?;

    // (A) このスレッドを main thread にする
    let looper = MainLooper::prepare();
    let dispatcher = Arc::new(
        TaskDispatcher::builder()
            .config(config)
            .main_thread(looper.handle())
            .build()?,
    );
    let ledger = Arc::new(Ledger::default());

    // (B) DB: 投稿順に一つずつ書き込まれる
    for name in ["alice", "bob", "carol"] {
        dispatcher.execute_db(Task::bound_to(&ledger, move |ledger| ledger.insert(name)))?;
    }
    let rows = dispatcher.submit_db(Task::bound_to(&ledger, |ledger| ledger.rows()))?;

    // (C) CPU と I/O
    let checksum = dispatcher.submit_background(Task::new(|| (1..=1_000_000_u64).sum::<u64>()))?;
    let read = dispatcher.submit_io(Task::new(|| {
        thread::sleep(Duration::from_millis(20));
        "courier.json".len()
    }))?;

    // (D) 結果は worker で待ち、main thread に戻して報告する
    let reporter = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || {
            let checksum = checksum.join();
            let read = read.join();
            let rows = rows.join();
            dispatcher.run_on_main(Task::new(move || {
                info!(?checksum, ?read, ?rows, "results delivered on main thread");
            }))
        })
    };

    // (E) キャンセルされる投稿と、ループを止める遅延投稿
    let skipped = dispatcher.run_on_main_delayed(
        Task::new(|| info!("this posting was cancelled and never runs")),
        Duration::from_millis(100),
    )?;
    if let Some(token) = skipped.token() {
        dispatcher.cancel_main(token);
    }
    let quitter = looper.handle();
    dispatcher.run_on_main_delayed(Task::new(move || quitter.quit()), Duration::from_millis(250))?;

    looper.run();

    match reporter.join() {
        Ok(post) => info!(?post, "reporter finished"),
        Err(_) => error!("reporter thread panicked"),
    }
    info!(stats = %serde_json::to_string(&dispatcher.stats())?, "dispatcher stats");

    if let Ok(dispatcher) = Arc::try_unwrap(dispatcher) {
        dispatcher.shutdown(Duration::from_secs(1));
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courier_core=debug,courier_cli=info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{e}");
        process::exit(1);
    }
}
