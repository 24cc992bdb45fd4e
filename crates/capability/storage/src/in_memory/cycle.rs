//! 抄表周期内存存储实现
//!
//! 仅用于测试和演示。
//!
//! 功能：
//! - 周期 CRUD 操作
//! - 按名称+服务、状态、服务、窗口相交检索

use crate::error::StorageError;
use crate::models::{ReadingCycleRecord, ReadingCycleUpdate};
use crate::traits::ReadingCycleStore;
use domain::{CycleStatus, DateWindow};
use std::collections::HashMap;
use std::sync::RwLock;

/// 抄表周期内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryReadingCycleStore {
    cycles: RwLock<HashMap<String, ReadingCycleRecord>>,
}

impl InMemoryReadingCycleStore {
    pub fn new() -> Self {
        Self {
            cycles: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReadingCycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReadingCycleStore for InMemoryReadingCycleStore {
    /// 创建新周期
    async fn create_cycle(
        &self,
        record: ReadingCycleRecord,
    ) -> Result<ReadingCycleRecord, StorageError> {
        let mut map = self
            .cycles
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.cycle_id) {
            return Err(StorageError::new("cycle exists"));
        }
        map.insert(record.cycle_id.clone(), record.clone());
        Ok(record)
    }

    /// 查找指定周期
    async fn find_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Option<ReadingCycleRecord>, StorageError> {
        let cycle = self
            .cycles
            .read()
            .ok()
            .and_then(|map| map.get(cycle_id).cloned());
        Ok(cycle)
    }

    /// 按派生名称与服务查找周期
    async fn find_cycle_by_name_and_service(
        &self,
        name: &str,
        service_id: &str,
    ) -> Result<Option<ReadingCycleRecord>, StorageError> {
        let map = self
            .cycles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let cycle = map
            .values()
            .find(|cycle| cycle.name == name && cycle.service_id == service_id)
            .cloned();
        Ok(cycle)
    }

    /// 列出全部周期
    async fn list_cycles(&self) -> Result<Vec<ReadingCycleRecord>, StorageError> {
        let map = self
            .cycles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut cycles: Vec<ReadingCycleRecord> = map.values().cloned().collect();
        cycles.sort_by(|a, b| a.period_from.cmp(&b.period_from));
        Ok(cycles)
    }

    /// 列出指定服务的周期
    async fn list_cycles_by_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError> {
        let map = self
            .cycles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut cycles: Vec<ReadingCycleRecord> = map
            .values()
            .filter(|cycle| cycle.service_id == service_id)
            .cloned()
            .collect();
        cycles.sort_by(|a, b| a.period_from.cmp(&b.period_from));
        Ok(cycles)
    }

    /// 列出指定状态的周期
    async fn list_cycles_by_status(
        &self,
        status: CycleStatus,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError> {
        let map = self
            .cycles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut cycles: Vec<ReadingCycleRecord> = map
            .values()
            .filter(|cycle| cycle.status == status)
            .cloned()
            .collect();
        cycles.sort_by(|a, b| a.period_from.cmp(&b.period_from));
        Ok(cycles)
    }

    /// 列出与窗口相交的指定服务周期
    async fn list_cycles_overlapping(
        &self,
        service_id: &str,
        window: DateWindow,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError> {
        let map = self
            .cycles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut cycles: Vec<ReadingCycleRecord> = map
            .values()
            .filter(|cycle| cycle.service_id == service_id && cycle.window().intersects(&window))
            .cloned()
            .collect();
        cycles.sort_by(|a, b| a.period_from.cmp(&b.period_from));
        Ok(cycles)
    }

    /// 更新周期
    async fn update_cycle(
        &self,
        cycle_id: &str,
        update: ReadingCycleUpdate,
    ) -> Result<Option<ReadingCycleRecord>, StorageError> {
        let mut map = self
            .cycles
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let cycle = match map.get_mut(cycle_id) {
            Some(cycle) => cycle,
            None => return Ok(None),
        };
        if let Some(status) = update.status {
            cycle.status = status;
        }
        if let Some(description) = update.description {
            cycle.description = Some(description);
        }
        if let Some(ts) = update.updated_at_ms {
            cycle.updated_at_ms = ts;
        }
        Ok(Some(cycle.clone()))
    }

    /// 删除周期
    async fn delete_cycle(&self, cycle_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .cycles
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(cycle_id).is_some())
    }
}
