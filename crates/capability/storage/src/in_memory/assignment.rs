//! 抄表任务内存存储实现
//!
//! 仅用于测试和演示。
//!
//! 功能：
//! - 任务 CRUD 操作
//! - 按周期、抄表员检索

use crate::error::StorageError;
use crate::models::{AssignmentRecord, AssignmentUpdate};
use crate::traits::AssignmentStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 抄表任务内存存储
pub struct InMemoryAssignmentStore {
    assignments: RwLock<HashMap<String, AssignmentRecord>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self {
            assignments: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_creation(mut records: Vec<AssignmentRecord>) -> Vec<AssignmentRecord> {
    records.sort_by_key(|record| record.created_at_ms);
    records
}

#[async_trait::async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    /// 创建新任务
    async fn create_assignment(
        &self,
        record: AssignmentRecord,
    ) -> Result<AssignmentRecord, StorageError> {
        let mut map = self
            .assignments
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.assignment_id) {
            return Err(StorageError::new("assignment exists"));
        }
        map.insert(record.assignment_id.clone(), record.clone());
        Ok(record)
    }

    /// 查找指定任务
    async fn find_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<AssignmentRecord>, StorageError> {
        let assignment = self
            .assignments
            .read()
            .ok()
            .and_then(|map| map.get(assignment_id).cloned());
        Ok(assignment)
    }

    /// 列出全部任务
    async fn list_assignments(&self) -> Result<Vec<AssignmentRecord>, StorageError> {
        let map = self
            .assignments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(sorted_by_creation(map.values().cloned().collect()))
    }

    /// 列出指定周期的任务
    async fn list_assignments_by_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError> {
        let map = self
            .assignments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|record| record.cycle_id == cycle_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(selected))
    }

    /// 列出指定抄表员的任务
    async fn list_assignments_by_assignee(
        &self,
        user_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError> {
        let map = self
            .assignments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|record| record.assigned_to == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(selected))
    }

    /// 列出指定抄表员在指定周期的任务
    async fn list_assignments_by_assignee_and_cycle(
        &self,
        user_id: &str,
        cycle_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError> {
        let map = self
            .assignments
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let selected = map
            .values()
            .filter(|record| record.assigned_to == user_id && record.cycle_id == cycle_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(selected))
    }

    /// 更新任务
    async fn update_assignment(
        &self,
        assignment_id: &str,
        update: AssignmentUpdate,
    ) -> Result<Option<AssignmentRecord>, StorageError> {
        let mut map = self
            .assignments
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let assignment = match map.get_mut(assignment_id) {
            Some(assignment) => assignment,
            None => return Ok(None),
        };
        if let Some(status) = update.status {
            assignment.status = status;
        }
        if let Some(completed_at_ms) = update.completed_at_ms {
            assignment.completed_at_ms = Some(completed_at_ms);
        }
        if let Some(reminder_last_sent) = update.reminder_last_sent {
            assignment.reminder_last_sent = Some(reminder_last_sent);
        }
        if let Some(note) = update.note {
            assignment.note = Some(note);
        }
        if let Some(ts) = update.updated_at_ms {
            assignment.updated_at_ms = ts;
        }
        Ok(Some(assignment.clone()))
    }

    /// 删除任务
    async fn delete_assignment(&self, assignment_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .assignments
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(assignment_id).is_some())
    }
}
