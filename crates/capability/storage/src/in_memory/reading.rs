//! 表计读数内存存储实现
//!
//! 仅用于测试和演示。读数量通常远大于其他记录，
//! 参照时序数据用 Vec 顺序存放，检索时线性过滤。

use crate::error::StorageError;
use crate::models::{MeterReadingRecord, MeterReadingUpdate};
use crate::traits::MeterReadingStore;
use std::sync::RwLock;

/// 表计读数内存存储
pub struct InMemoryMeterReadingStore {
    readings: RwLock<Vec<MeterReadingRecord>>,
}

impl InMemoryMeterReadingStore {
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(Vec::new()),
        }
    }

    /// 当前累计的读数条数（用于测试）
    pub fn len(&self) -> usize {
        self.readings.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryMeterReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MeterReadingStore for InMemoryMeterReadingStore {
    /// 写入新读数
    async fn create_reading(
        &self,
        record: MeterReadingRecord,
    ) -> Result<MeterReadingRecord, StorageError> {
        let mut readings = self
            .readings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if readings
            .iter()
            .any(|existing| existing.reading_id == record.reading_id)
        {
            return Err(StorageError::new("reading exists"));
        }
        readings.push(record.clone());
        Ok(record)
    }

    /// 查找指定读数
    async fn find_reading(
        &self,
        reading_id: &str,
    ) -> Result<Option<MeterReadingRecord>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(readings
            .iter()
            .find(|record| record.reading_id == reading_id)
            .cloned())
    }

    /// 按（表计，任务）自然键查找读数
    async fn find_reading_by_meter_and_assignment(
        &self,
        meter_id: &str,
        assignment_id: &str,
    ) -> Result<Option<MeterReadingRecord>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(readings
            .iter()
            .find(|record| {
                record.meter_id == meter_id
                    && record.assignment_id.as_deref() == Some(assignment_id)
            })
            .cloned())
    }

    /// 列出指定表计的读数
    async fn list_readings_by_meter(
        &self,
        meter_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(readings
            .iter()
            .filter(|record| record.meter_id == meter_id)
            .cloned()
            .collect())
    }

    /// 列出指定任务的读数
    async fn list_readings_by_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(readings
            .iter()
            .filter(|record| record.assignment_id.as_deref() == Some(assignment_id))
            .cloned()
            .collect())
    }

    /// 列出指定周期的读数
    async fn list_readings_by_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError> {
        let readings = self
            .readings
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(readings
            .iter()
            .filter(|record| record.cycle_id.as_deref() == Some(cycle_id))
            .cloned()
            .collect())
    }

    /// 更新读数
    async fn update_reading(
        &self,
        reading_id: &str,
        update: MeterReadingUpdate,
    ) -> Result<Option<MeterReadingRecord>, StorageError> {
        let mut readings = self
            .readings
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let record = match readings
            .iter_mut()
            .find(|record| record.reading_id == reading_id)
        {
            Some(record) => record,
            None => return Ok(None),
        };
        if let Some(reading_date) = update.reading_date {
            record.reading_date = reading_date;
        }
        if let Some(prev_index) = update.prev_index {
            record.prev_index = prev_index;
        }
        if let Some(curr_index) = update.curr_index {
            record.curr_index = curr_index;
        }
        if let Some(note) = update.note {
            record.note = Some(note);
        }
        if let Some(photo_file_id) = update.photo_file_id {
            record.photo_file_id = Some(photo_file_id);
        }
        if let Some(reader_id) = update.reader_id {
            record.reader_id = reader_id;
        }
        if let Some(cycle_id) = update.cycle_id {
            record.cycle_id = Some(cycle_id);
        }
        if let Some(read_at_ms) = update.read_at_ms {
            record.read_at_ms = read_at_ms;
        }
        if let Some(ts) = update.updated_at_ms {
            record.updated_at_ms = ts;
        }
        Ok(Some(record.clone()))
    }
}
