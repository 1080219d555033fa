//! 队列溢出时的旁路投递。
//!
//! 队列已满时，ERROR/FATAL 条目不能丢弃，也不能在调用方线程上同步处理。
//! 这里是唯一允许绕开单消费者顺序的出口：每个条目在独立的分离线程上处理，
//! 因此可能与队列中已有的条目乱序。

use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;

use crate::Result;

thread_local! {
    /// 当前线程所属派发器的标识；不是旁路线程时为 0
    static OWNER: Cell<usize> = const { Cell::new(0) };
}

/// 分离线程派发器
#[derive(Debug, Default)]
pub(crate) struct Escalator {
    in_flight: Arc<AtomicUsize>,
    spawned: AtomicU64,
}

impl Escalator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 在新的分离线程上执行任务；线程创建失败时返回错误且任务不会执行
    pub(crate) fn spawn<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let seq = self.spawned.fetch_add(1, Ordering::Relaxed);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        let owner = self.id();
        let guard = InFlightGuard(Arc::clone(&in_flight));
        let spawned = thread::Builder::new()
            .name(format!("logfan-escalate-{seq}"))
            .spawn(move || {
                let _guard = guard;
                OWNER.with(|cell| cell.set(owner));
                task();
            });

        match spawned {
            Ok(_) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.in_flight) as usize
    }

    /// 调用方是否运行在本派发器的旁路线程上
    pub(crate) fn is_current_thread(&self) -> bool {
        OWNER.with(|cell| cell.get() == self.id())
    }

    /// 尚未完成的旁路任务数
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 等待所有旁路任务完成
    pub(crate) fn wait_idle(&self) {
        while self.in_flight() > 0 {
            thread::yield_now();
        }
    }
}

/// 任务结束（包括 panic 展开）时递减计数
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_spawned_task_runs_detached() {
        let escalator = Escalator::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        escalator
            .spawn(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        escalator.wait_idle();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(escalator.in_flight(), 0);
    }

    #[test]
    fn test_detects_own_escalation_thread() {
        let escalator = Arc::new(Escalator::new());
        let other = Escalator::new();
        assert!(!escalator.is_current_thread());

        let seen = Arc::new(AtomicBool::new(false));
        let (inner, flag) = (escalator.clone(), seen.clone());
        escalator
            .spawn(move || flag.store(inner.is_current_thread(), Ordering::SeqCst))
            .unwrap();
        escalator.wait_idle();
        assert!(seen.load(Ordering::SeqCst));

        let seen_other = Arc::new(AtomicBool::new(true));
        let (inner, flag) = (escalator.clone(), seen_other.clone());
        other
            .spawn(move || flag.store(inner.is_current_thread(), Ordering::SeqCst))
            .unwrap();
        other.wait_idle();
        assert!(!seen_other.load(Ordering::SeqCst));
    }

    #[test]
    fn test_in_flight_counts_running_tasks() {
        let escalator = Escalator::new();
        let release = Arc::new(AtomicBool::new(false));

        let gate = release.clone();
        escalator
            .spawn(move || {
                while !gate.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
            })
            .unwrap();

        assert_eq!(escalator.in_flight(), 1);
        release.store(true, Ordering::SeqCst);
        escalator.wait_idle();
        assert_eq!(escalator.in_flight(), 0);
    }
}
