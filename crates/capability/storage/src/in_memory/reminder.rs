//! 抄表提醒内存存储实现
//!
//! 仅用于测试和演示。
//!
//! 功能：
//! - 提醒写入与幂等确认
//! - 按任务、用户检索（创建时刻降序）

use crate::error::StorageError;
use crate::models::ReminderRecord;
use crate::traits::ReminderStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 抄表提醒内存存储
pub struct InMemoryReminderStore {
    reminders: RwLock<HashMap<String, ReminderRecord>>,
}

impl InMemoryReminderStore {
    pub fn new() -> Self {
        Self {
            reminders: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReminderStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut records: Vec<ReminderRecord>) -> Vec<ReminderRecord> {
    records.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
    records
}

#[async_trait::async_trait]
impl ReminderStore for InMemoryReminderStore {
    /// 写入新提醒
    async fn create_reminder(
        &self,
        record: ReminderRecord,
    ) -> Result<ReminderRecord, StorageError> {
        let mut map = self
            .reminders
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.reminder_id) {
            return Err(StorageError::new("reminder exists"));
        }
        map.insert(record.reminder_id.clone(), record.clone());
        Ok(record)
    }

    /// 查找归属指定用户的提醒
    async fn find_reminder_for_user(
        &self,
        reminder_id: &str,
        user_id: &str,
    ) -> Result<Option<ReminderRecord>, StorageError> {
        let map = self
            .reminders
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let reminder = map
            .get(reminder_id)
            .filter(|record| record.user_id == user_id)
            .cloned();
        Ok(reminder)
    }

    /// 列出指定任务的提醒
    async fn list_reminders_by_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<ReminderRecord>, StorageError> {
        let map = self
            .reminders
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|record| record.assignment_id == assignment_id)
            .cloned()
            .collect();
        Ok(newest_first(selected))
    }

    /// 列出指定用户的提醒
    async fn list_reminders_by_user(
        &self,
        user_id: &str,
        include_acknowledged: bool,
    ) -> Result<Vec<ReminderRecord>, StorageError> {
        let map = self
            .reminders
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|record| record.user_id == user_id)
            .filter(|record| include_acknowledged || record.acknowledged_at_ms.is_none())
            .cloned()
            .collect();
        Ok(newest_first(selected))
    }

    /// 确认提醒（幂等）
    async fn acknowledge_reminder(
        &self,
        reminder_id: &str,
        user_id: &str,
        acknowledged_at_ms: i64,
    ) -> Result<Option<ReminderRecord>, StorageError> {
        let mut map = self
            .reminders
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let reminder = match map.get_mut(reminder_id) {
            Some(record) if record.user_id == user_id => record,
            _ => return Ok(None),
        };
        if reminder.acknowledged_at_ms.is_none() {
            reminder.acknowledged_at_ms = Some(acknowledged_at_ms);
        }
        Ok(Some(reminder.clone()))
    }
}
