//! 优雅关闭示例：Ctrl-C 时停止分发器，已入队的日志全部写出后再退出。
//!
//! 运行：`cargo run --example safe_shutdown`

use logfan::{Dispatcher, Level, Value, info, logf, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn main() -> Result<(), logfan::Error> {
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .buffer_len(100)
            .with_console_output(Level::Info)
            .with_file_output("logs/safe_shutdown.log", Level::Debug)
            .tag("service", "safe-shutdown-demo")
            .build()?,
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| logfan::Error::Config(format!("failed to install signal handler: {e}")))?;
    }

    info!(dispatcher, "service started, press Ctrl-C to stop");

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let dispatcher = dispatcher.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut tick = 0u64;
                while running.load(Ordering::SeqCst) {
                    logf!(dispatcher, Level::Debug, "worker {id} tick {tick}");
                    if tick % 50 == 49 {
                        warn!(dispatcher, "worker", id, "slow tick", tick);
                    }
                    tick += 1;
                    thread::sleep(Duration::from_millis(20));
                }
                tick
            })
        })
        .collect();

    let mut ticks = 0;
    for worker in workers {
        ticks += worker.join().unwrap_or(0);
    }

    dispatcher.log(
        Level::Info,
        &[
            Value::from("shutting down after"),
            Value::from(ticks),
            Value::from("ticks"),
        ],
    );
    dispatcher.stop()?;

    let metrics = dispatcher.metrics();
    println!(
        "submitted={} processed={} dropped={} escalated={} sink_failures={}",
        metrics.total, metrics.processed, metrics.dropped, metrics.escalated, metrics.sink_failures
    );
    Ok(())
}
