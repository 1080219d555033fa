/*!
分发器运行时指标。

所有字段由同一把互斥锁保护；更新对调用方来说是"即发即忘"的，
不会返回值也不会失败。读取通过 [`Metrics::snapshot`] 完成。
*/

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

use crate::Level;

#[derive(Debug)]
struct Counters {
    alive_since: DateTime<Utc>,
    current_usage: usize,
    peak_usage: usize,
    total: u64,
    processed: u64,
    dropped: u64,
    escalated: u64,
    sink_failures: u64,
    last_sink_failure: Option<DateTime<Utc>>,
    processing_time_us_avg: u64,
    processing_time_us_max: u64,
    level_counts: [u64; 6],
}

/// 指标记录器
#[derive(Debug)]
pub struct Metrics {
    inner: Mutex<Counters>,
}

impl Metrics {
    /// 移动平均中历史值的权重（新值权重为 1）
    pub const HISTORY_WEIGHT: u64 = 99;

    /// 创建新的指标记录器
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters {
                alive_since: Utc::now(),
                current_usage: 0,
                peak_usage: 0,
                total: 0,
                processed: 0,
                dropped: 0,
                escalated: 0,
                sink_failures: 0,
                last_sink_failure: None,
                processing_time_us_avg: 0,
                processing_time_us_max: 0,
                level_counts: [0; 6],
            }),
        }
    }

    fn with<F: FnOnce(&mut Counters)>(&self, f: F) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    /// 记录一次提交：总数、级别计数与当前队列深度（必要时更新峰值）
    pub fn record_submitted(&self, level: Level, depth: usize) {
        self.with(|c| {
            c.total += 1;
            c.level_counts[level.index()] += 1;
            c.current_usage = depth;
            c.peak_usage = c.peak_usage.max(depth);
        });
    }

    /// 条目成功进入队列
    pub fn record_processed(&self) {
        self.with(|c| c.processed += 1);
    }

    /// 条目被丢弃
    pub fn record_dropped(&self) {
        self.with(|c| c.dropped += 1);
    }

    /// 队列已满时高优先级条目被旁路处理
    pub fn record_escalated(&self) {
        self.with(|c| c.escalated += 1);
    }

    /// 某个输出目标投递失败
    pub fn record_sink_failure(&self) {
        self.with(|c| {
            c.sink_failures += 1;
            c.last_sink_failure = Some(Utc::now());
        });
    }

    /// 记录单条处理耗时：指数移动平均（99:1）与最大值
    pub fn record_processing_time(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.with(|c| {
            c.processing_time_us_max = c.processing_time_us_max.max(us);
            c.processing_time_us_avg = c
                .processing_time_us_avg
                .saturating_mul(Self::HISTORY_WEIGHT)
                .saturating_add(us)
                / (Self::HISTORY_WEIGHT + 1);
        });
    }

    /// 获取所有指标的只读快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        MetricsSnapshot {
            alive_since: c.alive_since,
            current_usage: c.current_usage,
            peak_usage: c.peak_usage,
            total: c.total,
            processed: c.processed,
            dropped: c.dropped,
            escalated: c.escalated,
            sink_failures: c.sink_failures,
            last_sink_failure: c.last_sink_failure,
            processing_time_us_avg: c.processing_time_us_avg,
            processing_time_us_max: c.processing_time_us_max,
            debug_count: c.level_counts[Level::Debug.index()],
            info_count: c.level_counts[Level::Info.index()],
            warn_count: c.level_counts[Level::Warn.index()],
            error_count: c.level_counts[Level::Error.index()],
            fatal_count: c.level_counts[Level::Fatal.index()],
            unknown_count: c.level_counts[Level::Unknown.index()],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// 指标快照（用于定期导出）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// 分发器创建时间
    pub alive_since: DateTime<Utc>,
    /// 最近一次提交时观察到的队列深度
    pub current_usage: usize,
    /// 观察到的最大队列深度
    pub peak_usage: usize,
    /// 提交总数
    pub total: u64,
    /// 成功进入队列的条目数
    pub processed: u64,
    /// 因背压或溢出被丢弃的条目数
    pub dropped: u64,
    /// 队列已满时旁路处理的 ERROR/FATAL 条目数
    pub escalated: u64,
    /// 输出目标失败次数
    pub sink_failures: u64,
    /// 最近一次输出目标失败时间
    pub last_sink_failure: Option<DateTime<Utc>>,
    /// 单条处理耗时的移动平均（微秒）
    pub processing_time_us_avg: u64,
    /// 单条处理耗时的最大值（微秒）
    pub processing_time_us_max: u64,
    /// DEBUG 提交数
    pub debug_count: u64,
    /// INFO 提交数
    pub info_count: u64,
    /// WARN 提交数
    pub warn_count: u64,
    /// ERROR 提交数
    pub error_count: u64,
    /// FATAL 提交数
    pub fatal_count: u64,
    /// UNKNOWN 提交数
    pub unknown_count: u64,
}

impl MetricsSnapshot {
    /// 指定级别的提交数
    pub fn level_count(&self, level: Level) -> u64 {
        match level {
            Level::Debug => self.debug_count,
            Level::Info => self.info_count,
            Level::Warn => self.warn_count,
            Level::Error => self.error_count,
            Level::Fatal => self.fatal_count,
            Level::Unknown => self.unknown_count,
        }
    }

    /// 已结算的提交数：入队、丢弃与旁路处理之和
    pub fn accounted(&self) -> u64 {
        self.processed + self.dropped + self.escalated
    }
}
