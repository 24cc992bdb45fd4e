//! 表计内存存储实现
//!
//! 仅用于测试和演示。
//!
//! 功能：
//! - 表计 CRUD 操作
//! - 按编号、单元、服务检索

use crate::error::StorageError;
use crate::models::{MeterRecord, MeterUpdate};
use crate::traits::MeterStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 表计内存存储
pub struct InMemoryMeterStore {
    meters: RwLock<HashMap<String, MeterRecord>>,
}

impl InMemoryMeterStore {
    pub fn new() -> Self {
        Self {
            meters: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMeterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_code(mut records: Vec<MeterRecord>) -> Vec<MeterRecord> {
    records.sort_by(|a, b| a.meter_code.cmp(&b.meter_code));
    records
}

#[async_trait::async_trait]
impl MeterStore for InMemoryMeterStore {
    /// 创建新表计
    async fn create_meter(&self, record: MeterRecord) -> Result<MeterRecord, StorageError> {
        let mut map = self
            .meters
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.meter_id) {
            return Err(StorageError::new("meter exists"));
        }
        map.insert(record.meter_id.clone(), record.clone());
        Ok(record)
    }

    /// 查找指定表计
    async fn find_meter(&self, meter_id: &str) -> Result<Option<MeterRecord>, StorageError> {
        let meter = self
            .meters
            .read()
            .ok()
            .and_then(|map| map.get(meter_id).cloned());
        Ok(meter)
    }

    /// 按表计编号查找
    async fn find_meter_by_code(
        &self,
        meter_code: &str,
    ) -> Result<Option<MeterRecord>, StorageError> {
        let map = self
            .meters
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let meter = map
            .values()
            .find(|meter| meter.meter_code == meter_code)
            .cloned();
        Ok(meter)
    }

    /// 列出全部表计
    async fn list_meters(&self) -> Result<Vec<MeterRecord>, StorageError> {
        let map = self
            .meters
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(sorted_by_code(map.values().cloned().collect()))
    }

    /// 列出指定单元的表计
    async fn list_meters_by_unit(&self, unit_id: &str) -> Result<Vec<MeterRecord>, StorageError> {
        let map = self
            .meters
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|meter| meter.unit_id == unit_id)
            .cloned()
            .collect();
        Ok(sorted_by_code(selected))
    }

    /// 列出指定服务的表计
    async fn list_meters_by_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<MeterRecord>, StorageError> {
        let map = self
            .meters
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|meter| meter.service_id == service_id)
            .cloned()
            .collect();
        Ok(sorted_by_code(selected))
    }

    /// 更新表计
    async fn update_meter(
        &self,
        meter_id: &str,
        update: MeterUpdate,
    ) -> Result<Option<MeterRecord>, StorageError> {
        let mut map = self
            .meters
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let meter = match map.get_mut(meter_id) {
            Some(meter) => meter,
            None => return Ok(None),
        };
        if let Some(meter_code) = update.meter_code {
            meter.meter_code = meter_code;
        }
        if let Some(active) = update.active {
            meter.active = active;
        }
        if let Some(removed_at) = update.removed_at {
            meter.removed_at = removed_at;
        }
        if let Some(ts) = update.updated_at_ms {
            meter.updated_at_ms = ts;
        }
        Ok(Some(meter.clone()))
    }

    /// 删除表计
    async fn delete_meter(&self, meter_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .meters
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(meter_id).is_some())
    }
}
