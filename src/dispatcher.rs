/*!
异步多目标日志分发器。

调用方以非阻塞方式提交日志条目，单个后台工作线程把每条日志扇出到
已注册的输出目标，并在所有目标都失败或都不接收时写入兜底输出。

## 特性

- 非阻塞提交：条目写入有界无锁队列（容量 = 缓冲长度 × 10），从不等待 I/O
- 背压：队列占用超过 80% 时直接丢弃 DEBUG/INFO/WARN，为高优先级日志保留余量
- 溢出：队列已满时 ERROR/FATAL 在分离线程上旁路处理，其余级别丢弃
- 单消费者：正常运行与排空阶段都严格按入队顺序处理
- 优雅关闭：`stop()` 后不再接收新条目，已入队条目全部处理完才结束
- 自我观测：提交、丢弃、失败与处理耗时都记录在 [`Metrics`] 中

## 使用示例

```rust
use logfan::{Dispatcher, Level, MemorySink, Sink, Value};
use std::sync::Arc;

let sink = Arc::new(MemorySink::with_min_level(Level::Info));
let dispatcher = Dispatcher::new(10, vec![sink.clone() as Arc<dyn Sink>]).unwrap();

dispatcher.log(Level::Info, &[Value::from("Hello"), Value::from(42)]);
dispatcher.stop().unwrap();

assert!(sink.contains("Hello | 42"));
```
*/

use crossbeam_queue::ArrayQueue;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use crate::error::Error;
use crate::escalate::Escalator;
use crate::fallback::FallbackSink;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::record::{LogEntry, LogMessage, Tags};
use crate::render::{LogContext, Value, compose, render_context, stringify};
use crate::sink::Sink;
use crate::{Level, Result};

/// 队列占用比例超过该阈值时丢弃低优先级条目
pub const SOFT_LIMIT_RATIO: f64 = 0.8;

/// 队列容量相对缓冲长度的倍数
pub const CAPACITY_MULTIPLIER: usize = 10;

/// 构建分发器所需的全部参数
pub(crate) struct DispatcherParts {
    pub(crate) buffer_len: usize,
    pub(crate) sinks: Vec<Arc<dyn Sink>>,
    pub(crate) fallback: Arc<dyn FallbackSink>,
    pub(crate) tags: Tags,
    pub(crate) idle_interval: Duration,
    pub(crate) capture_backtraces: bool,
}

/// 生产者与工作线程共享的状态
struct Core {
    queue: ArrayQueue<LogEntry>,
    stopped: AtomicBool,
    /// 正在执行 `submit` 的调用方数量；排空前必须归零
    submitting: AtomicUsize,
    enqueued: AtomicU64,
    completed: AtomicU64,
    worker_alive: AtomicBool,
    worker: OnceLock<Thread>,
    sinks: Vec<Arc<dyn Sink>>,
    fallback: Arc<dyn FallbackSink>,
    tags: Arc<Tags>,
    metrics: Metrics,
    escalator: Escalator,
    idle_interval: Duration,
}

impl Core {
    fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// 通过兜底输出写一条提示
    fn notice(&self, level: Level, text: &str) {
        self.fallback.write(level, &format!("[FALLBACK] {text}"));
    }

    fn reject_stopped(&self, level: Level) {
        self.notice(
            Level::Error,
            &format!("error logging message: {} ({level})", Error::Stopped),
        );
    }

    /// 调用方是否运行在工作线程或旁路线程上（即在输出目标内部）
    fn is_reentrant(&self) -> bool {
        let on_worker = self
            .worker
            .get()
            .is_some_and(|worker| worker.id() == thread::current().id());
        on_worker || self.escalator.is_current_thread()
    }

    fn wake_worker(&self) {
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    /// 提交路径：从不阻塞、从不向调用方报错
    fn submit(self: &Arc<Self>, level: Level, message: String) {
        self.submitting.fetch_add(1, Ordering::SeqCst);
        let _submitting = CounterGuard(&self.submitting);

        if self.stopped.load(Ordering::SeqCst) {
            self.reject_stopped(level);
            return;
        }

        let depth = self.queue.len();
        self.metrics.record_submitted(level, depth);

        if level.is_low_priority() && depth as f64 / self.capacity() as f64 > SOFT_LIMIT_RATIO {
            self.metrics.record_dropped();
            return;
        }

        match self.queue.push(LogEntry::new(level, message)) {
            Ok(()) => {
                self.enqueued.fetch_add(1, Ordering::SeqCst);
                self.metrics.record_processed();
                self.wake_worker();
            }
            Err(entry) => self.overflow(entry),
        }
    }

    /// 队列已满：高优先级旁路处理，其余级别丢弃，两种情况都写提示
    fn overflow(self: &Arc<Self>, entry: LogEntry) {
        let level = entry.level();
        self.notice(
            level,
            &format!("queue overflow detected: {}", entry.message()),
        );
        if level.is_high_priority() {
            self.escalate(entry);
        } else {
            self.notice(
                level,
                &format!(
                    "[OVERFLOW] queue full, dropping low priority message: {}",
                    entry.message()
                ),
            );
            self.metrics.record_dropped();
        }
    }

    /// 在分离线程上处理单条高优先级条目
    fn escalate(self: &Arc<Self>, entry: LogEntry) {
        self.metrics.record_escalated();
        log::debug!("queue full, escalating {} entry to a detached thread", entry.level());

        let level = entry.level();
        let spare = entry.clone();
        let core = Arc::clone(self);
        if let Err(err) = self.escalator.spawn(move || core.process_entry(&entry)) {
            self.notice(
                Level::Error,
                &format!("failed to spawn overflow delivery: {err}"),
            );
            self.notice(level, spare.message());
        }
    }

    /// 处理单条日志：按注册顺序扇出，全部失败或无人接收时写入兜底输出
    fn process_entry(&self, entry: &LogEntry) {
        let start = Instant::now();
        let level = entry.level();
        let mut delivered = false;

        for sink in &self.sinks {
            if !sink.accepts(level) {
                continue;
            }

            let message = LogMessage::from_entry(entry, &self.tags);
            match sink.deliver(level, &message) {
                Ok(()) => delivered = true,
                Err(err) => {
                    self.notice(
                        level,
                        &format!("error logging message to {}: {err}", sink.name()),
                    );
                    self.metrics.record_sink_failure();
                }
            }
        }

        if !delivered {
            self.notice(level, entry.message());
        }

        self.metrics.record_processing_time(start.elapsed());
    }

    fn flush_sinks(&self) {
        for sink in &self.sinks {
            let _ = sink.flush();
        }
    }

    /// 工作线程主循环
    fn run(self: Arc<Self>) {
        let _ = self.worker.set(thread::current());
        let _alive = AliveGuard(&self.worker_alive);
        log::debug!("dispatch worker started, capacity {}", self.capacity());

        loop {
            match self.queue.pop() {
                Some(entry) => {
                    self.process_entry(&entry);
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    if self.queue.is_empty() {
                        self.flush_sinks();
                    }
                }
                None => {
                    if self.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::park_timeout(self.idle_interval);
                }
            }
        }

        // 停止标志已经可见：等待仍在提交中的调用方，然后按顺序排空
        while self.submitting.load(Ordering::SeqCst) > 0 {
            thread::yield_now();
        }

        let mut drained = 0usize;
        while let Some(entry) = self.queue.pop() {
            self.process_entry(&entry);
            self.completed.fetch_add(1, Ordering::SeqCst);
            drained += 1;
        }
        self.escalator.wait_idle();
        log::debug!("dispatch worker drained {drained} entries, shutting down sinks");

        for sink in &self.sinks {
            let _ = sink.shutdown();
        }
    }
}

struct CounterGuard<'a>(&'a AtomicUsize);

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct AliveGuard<'a>(&'a AtomicBool);

impl Drop for AliveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 日志分发器
///
/// 可以在任意多个线程间共享（通常放在 `Arc` 中）。每个进程使用一个实例的约定由集成方决定。
pub struct Dispatcher {
    core: Arc<Core>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capture_backtraces: bool,
}

impl Dispatcher {
    /// 创建分发器，使用标准错误作为兜底输出
    pub fn new(buffer_len: usize, sinks: Vec<Arc<dyn Sink>>) -> Result<Self> {
        crate::builder::DispatcherBuilder::new()
            .buffer_len(buffer_len)
            .sinks(sinks)
            .build()
    }

    /// 创建新的分发器构建器
    pub fn builder() -> crate::builder::DispatcherBuilder {
        crate::builder::DispatcherBuilder::new()
    }

    pub(crate) fn from_parts(parts: DispatcherParts) -> Result<Self> {
        if parts.buffer_len == 0 {
            return Err(Error::Config("buffer_len must be positive".to_string()));
        }
        let capacity = parts
            .buffer_len
            .checked_mul(CAPACITY_MULTIPLIER)
            .ok_or_else(|| Error::Config("buffer_len is too large".to_string()))?;

        let core = Arc::new(Core {
            queue: ArrayQueue::new(capacity),
            stopped: AtomicBool::new(false),
            submitting: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            worker_alive: AtomicBool::new(true),
            worker: OnceLock::new(),
            sinks: parts.sinks,
            fallback: parts.fallback,
            tags: Arc::new(parts.tags),
            metrics: Metrics::new(),
            escalator: Escalator::new(),
            idle_interval: parts.idle_interval,
        });

        let worker_core = Arc::clone(&core);
        let handle = thread::Builder::new()
            .name("logfan-worker".to_string())
            .spawn(move || worker_core.run())?;

        Ok(Self {
            core,
            worker: Mutex::new(Some(handle)),
            capture_backtraces: parts.capture_backtraces,
        })
    }

    /// 停止后的调用在此被拒绝
    fn admit(&self, level: Level) -> bool {
        if self.core.stopped.load(Ordering::SeqCst) {
            self.core.reject_stopped(level);
            return false;
        }
        true
    }

    fn dispatch(&self, level: Level, body: &str) {
        let message = compose(level, body, self.capture_backtraces);
        self.core.submit(level, message);
    }

    /// 记录日志：参数渲染后以 ` | ` 连接；空参数列表不做任何事
    pub fn log(&self, level: Level, values: &[Value]) {
        if values.is_empty() || !self.admit(level) {
            return;
        }
        self.dispatch(level, &stringify(values));
    }

    /// 记录格式化日志，通常通过 [`logf!`](crate::logf) 调用
    pub fn log_formatted(&self, level: Level, args: fmt::Arguments<'_>) {
        let body = match args.as_str() {
            Some(s) => s.to_string(),
            None => args.to_string(),
        };
        if body.is_empty() || !self.admit(level) {
            return;
        }
        self.dispatch(level, &body);
    }

    /// 结构化日志，目前与 [`log`](Self::log) 相同
    pub fn log_structured(&self, level: Level, values: &[Value]) {
        self.log(level, values);
    }

    /// 从上下文中提取指定键，渲染为 `key=value` 后记录
    pub fn log_with_context(
        &self,
        level: Level,
        context: Option<&dyn LogContext>,
        keys: &[&str],
    ) {
        if !self.admit(level) {
            return;
        }
        self.dispatch(level, &render_context(context, keys));
    }

    /// 以数值级别记录日志；超出范围的级别被拒绝并写入兜底输出
    pub fn log_raw(&self, raw: i64, values: &[Value]) {
        if values.is_empty() {
            return;
        }
        match Level::try_from(raw) {
            Ok(level) => self.log(level, values),
            Err(err) => {
                if self.core.stopped.load(Ordering::SeqCst) {
                    self.core.reject_stopped(Level::Unknown);
                } else {
                    self.core
                        .notice(Level::Error, &format!("error logging message: {err}"));
                }
            }
        }
    }

    /// 直接提交已渲染的条目，跳过时间戳与调用栈组装
    pub fn submit(&self, entry: LogEntry) {
        let level = entry.level();
        self.core.submit(level, entry.into_message());
    }

    /// 等待已入队的条目及旁路任务全部处理完成，然后刷新输出目标
    ///
    /// 在输出目标内部调用时立即返回，因为当前条目本身尚未完成。
    pub fn flush(&self) -> Result<()> {
        if self.core.is_reentrant() {
            return Ok(());
        }
        loop {
            let enqueued = self.core.enqueued.load(Ordering::SeqCst);
            let completed = self.core.completed.load(Ordering::SeqCst);
            if completed >= enqueued {
                break;
            }
            if !self.core.worker_alive.load(Ordering::SeqCst) {
                return Err(Error::WorkerPanicked);
            }
            thread::yield_now();
        }
        self.core.escalator.wait_idle();
        self.core.flush_sinks();
        Ok(())
    }

    /// 停止分发器：不再接收新条目，排空队列后结束工作线程
    ///
    /// 可重复调用，也可以从多个线程同时调用；每个调用方都在排空完成后才返回。
    /// 在输出目标内部调用时只设置停止标志，排空由工作线程自行完成。
    pub fn stop(&self) -> Result<()> {
        if !self.core.stopped.swap(true, Ordering::SeqCst) {
            log::debug!("dispatcher stop requested, {} entries queued", self.core.queue.len());
        }
        self.core.wake_worker();

        if self.core.is_reentrant() {
            return Ok(());
        }

        // 持锁等待：并发的调用方在 join 完成前阻塞在这里
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = worker.take() {
            handle.join().map_err(|_| Error::WorkerPanicked)?;
        }
        drop(worker);

        self.core.escalator.wait_idle();
        Ok(())
    }

    /// 是否已请求停止
    pub fn is_stopped(&self) -> bool {
        self.core.stopped.load(Ordering::SeqCst)
    }

    /// 当前队列深度
    pub fn queue_len(&self) -> usize {
        self.core.queue.len()
    }

    /// 队列容量
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// 注册的输出目标数量
    pub fn sink_count(&self) -> usize {
        self.core.sinks.len()
    }

    /// 共享标签表
    pub fn tags(&self) -> &Tags {
        &self.core.tags
    }

    /// 指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("capacity", &self.capacity())
            .field("queue_len", &self.queue_len())
            .field("sinks", &self.sink_count())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::MemoryFallback;
    use crate::sink::MemorySink;

    fn dispatcher_with(
        buffer_len: usize,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> (Dispatcher, Arc<MemoryFallback>) {
        let fallback = Arc::new(MemoryFallback::new());
        let dispatcher = Dispatcher::builder()
            .buffer_len(buffer_len)
            .sinks(sinks)
            .fallback(fallback.clone())
            .build()
            .unwrap();
        (dispatcher, fallback)
    }

    #[test]
    fn test_capacity_is_ten_times_buffer_len() {
        let (dispatcher, _) = dispatcher_with(3, Vec::new());
        assert_eq!(dispatcher.capacity(), 30);
        assert!(dispatcher.tags().contains_key("hostname"));
        assert!(dispatcher.stop().is_ok());
    }

    #[test]
    fn test_zero_buffer_len_is_rejected() {
        let result = Dispatcher::builder().buffer_len(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_log_delivers_to_sink() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, fallback) = dispatcher_with(10, vec![sink.clone() as Arc<dyn Sink>]);

        dispatcher.log(Level::Info, &[Value::from("hello"), Value::from(7)]);
        assert!(dispatcher.flush().is_ok());

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, "INFO");
        assert!(messages[0].message.contains("[INFO] : hello | 7"));
        assert!(fallback.is_empty());
        assert!(dispatcher.stop().is_ok());
    }

    #[test]
    fn test_empty_arguments_are_ignored() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, fallback) = dispatcher_with(10, vec![sink.clone() as Arc<dyn Sink>]);

        dispatcher.log(Level::Info, &[]);
        dispatcher.log_formatted(Level::Info, format_args!(""));
        dispatcher.log_raw(9, &[]);
        assert!(dispatcher.stop().is_ok());

        assert!(sink.is_empty());
        assert!(fallback.is_empty());
        assert_eq!(dispatcher.metrics().total, 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (dispatcher, _) = dispatcher_with(1, Vec::new());
        assert!(dispatcher.stop().is_ok());
        assert!(dispatcher.stop().is_ok());
        assert!(dispatcher.is_stopped());
    }

    #[test]
    fn test_overflow_drops_low_priority_with_notice() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, fallback) = dispatcher_with(1, vec![sink.clone() as Arc<dyn Sink>]);

        let before = dispatcher.metrics();
        dispatcher
            .core
            .overflow(LogEntry::new(Level::Warn, "spilled".to_string()));
        let after = dispatcher.metrics();

        assert_eq!(after.dropped, before.dropped + 1);
        assert_eq!(after.processed, before.processed);
        assert_eq!(after.escalated, 0);
        assert!(fallback.contains("queue overflow detected: spilled"));
        assert!(fallback.contains("[OVERFLOW] queue full, dropping low priority message: spilled"));

        assert!(dispatcher.stop().is_ok());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_overflow_escalates_high_priority() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, fallback) = dispatcher_with(1, vec![sink.clone() as Arc<dyn Sink>]);

        dispatcher
            .core
            .overflow(LogEntry::new(Level::Fatal, "urgent".to_string()));
        assert!(dispatcher.stop().is_ok());

        let snap = dispatcher.metrics();
        assert_eq!(snap.escalated, 1);
        assert_eq!(snap.dropped, 0);
        assert!(sink.contains("urgent"));
        assert!(fallback.contains("queue overflow detected: urgent"));
        assert!(!fallback.contains("[OVERFLOW]"));
    }

    #[test]
    fn test_submit_prebuilt_entry() {
        let sink = Arc::new(MemorySink::new());
        let (dispatcher, _) = dispatcher_with(1, vec![sink.clone() as Arc<dyn Sink>]);

        dispatcher.submit(LogEntry::new(Level::Warn, "raw entry".to_string()));
        assert!(dispatcher.stop().is_ok());

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message, "raw entry");
    }
}
