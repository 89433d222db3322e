//! 按 key 合并并发解析
//!
//! 同一分享链接同时未命中缓存时，只让一个请求去抓取页面，
//! 其余请求等待后重新查缓存

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 按 key 分配的异步锁表
#[derive(Debug, Default, Clone)]
pub struct SingleFlight {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某个 key 的执行权，返回的守卫 drop 时释放
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;

        FlightGuard {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// 当前登记的 key 数量
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

/// 执行权守卫（RAII）
///
/// drop 时若没有其他等待者，顺带从表中移除该 key
pub struct FlightGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        // 先释放锁，此时只剩表内一份引用说明没有等待者
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_removes_idle_key() {
        let flight = SingleFlight::new();
        {
            let _guard = flight.acquire("k").await;
            assert_eq!(flight.in_flight(), 1);
        }
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let flight = SingleFlight::new();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let flight = flight.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = flight.acquire("same").await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let flight = SingleFlight::new();
        let _a = flight.acquire("a").await;
        // 若互相阻塞，这里会超时
        let b = tokio::time::timeout(Duration::from_millis(100), flight.acquire("b")).await;
        assert!(b.is_ok());
    }
}
