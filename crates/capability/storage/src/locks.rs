//! 周期级写锁
//!
//! 为"检查后写入"式的变更序列提供按键互斥：
//! - 周期内的变更（状态、任务、完成校验）以周期 ID 为键
//! - 周期创建以服务 ID 为键（此时周期尚不存在）
//!
//! 读取路径不经过本表；提醒扫描与账单对账为旁路任务，
//! 不持有周期锁。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::StorageError;

/// 按键互斥锁表。
///
/// 守卫存活期间，同键的后续获取将等待；不同键互不影响。
pub struct CycleLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CycleLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 获取指定键的写锁守卫。
    pub async fn acquire(&self, key: &str) -> Result<OwnedMutexGuard<()>, StorageError> {
        let entry = {
            let mut map = self
                .locks
                .lock()
                .map_err(|_| StorageError::new("lock failed"))?;
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        Ok(entry.lock_owned().await)
    }
}

impl Default for CycleLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_serializes_different_keys_do_not() {
        let locks = CycleLocks::new();

        let guard = locks.acquire("cycle-1").await.expect("acquire");
        // 不同键可以并行获取
        let other = locks.acquire("cycle-2").await.expect("acquire other");
        drop(other);

        // 同键在守卫存活期间不可获取
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("cycle-1"),
        )
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = locks.acquire("cycle-1").await;
        assert!(reacquired.is_ok());
    }
}
