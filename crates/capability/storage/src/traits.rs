//! 存储接口 Trait 定义
//!
//! 定义所有资源存储的异步接口：
//! - ReadingCycleStore：抄表周期存储
//! - AssignmentStore：抄表任务存储
//! - MeterStore：表计存储
//! - MeterReadingStore：表计读数存储
//! - ReminderStore：抄表提醒存储
//!
//! 设计原则：
//! - 所有接口返回 StorageError；业务规则留在服务层
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    AssignmentRecord, AssignmentUpdate, MeterReadingRecord, MeterReadingUpdate, MeterRecord,
    MeterUpdate, ReadingCycleRecord, ReadingCycleUpdate, ReminderRecord,
};
use async_trait::async_trait;
use domain::{CycleStatus, DateWindow};

/// 抄表周期存储接口
///
/// 提供周期 CRUD 操作与按服务/状态/时段的检索。
#[async_trait]
pub trait ReadingCycleStore: Send + Sync {
    /// 创建新周期（周期 ID 已存在时报错）
    async fn create_cycle(
        &self,
        record: ReadingCycleRecord,
    ) -> Result<ReadingCycleRecord, StorageError>;

    /// 查找指定周期
    async fn find_cycle(&self, cycle_id: &str)
    -> Result<Option<ReadingCycleRecord>, StorageError>;

    /// 按派生名称与服务查找周期
    async fn find_cycle_by_name_and_service(
        &self,
        name: &str,
        service_id: &str,
    ) -> Result<Option<ReadingCycleRecord>, StorageError>;

    /// 列出全部周期
    async fn list_cycles(&self) -> Result<Vec<ReadingCycleRecord>, StorageError>;

    /// 列出指定服务的周期
    async fn list_cycles_by_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError>;

    /// 列出指定状态的周期
    async fn list_cycles_by_status(
        &self,
        status: CycleStatus,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError>;

    /// 列出与窗口相交的指定服务周期
    async fn list_cycles_overlapping(
        &self,
        service_id: &str,
        window: DateWindow,
    ) -> Result<Vec<ReadingCycleRecord>, StorageError>;

    /// 更新周期（状态、描述）
    async fn update_cycle(
        &self,
        cycle_id: &str,
        update: ReadingCycleUpdate,
    ) -> Result<Option<ReadingCycleRecord>, StorageError>;

    /// 删除周期
    async fn delete_cycle(&self, cycle_id: &str) -> Result<bool, StorageError>;
}

/// 抄表任务存储接口
///
/// 提供任务 CRUD 操作与按周期/抄表员的检索。
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// 创建新任务（任务 ID 已存在时报错）
    async fn create_assignment(
        &self,
        record: AssignmentRecord,
    ) -> Result<AssignmentRecord, StorageError>;

    /// 查找指定任务
    async fn find_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<AssignmentRecord>, StorageError>;

    /// 列出全部任务
    async fn list_assignments(&self) -> Result<Vec<AssignmentRecord>, StorageError>;

    /// 列出指定周期的任务
    async fn list_assignments_by_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError>;

    /// 列出指定抄表员的任务
    async fn list_assignments_by_assignee(
        &self,
        user_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError>;

    /// 列出指定抄表员在指定周期的任务
    async fn list_assignments_by_assignee_and_cycle(
        &self,
        user_id: &str,
        cycle_id: &str,
    ) -> Result<Vec<AssignmentRecord>, StorageError>;

    /// 更新任务（状态、完成时刻、提醒日期、备注）
    async fn update_assignment(
        &self,
        assignment_id: &str,
        update: AssignmentUpdate,
    ) -> Result<Option<AssignmentRecord>, StorageError>;

    /// 删除任务
    async fn delete_assignment(&self, assignment_id: &str) -> Result<bool, StorageError>;
}

/// 表计存储接口
///
/// 提供表计 CRUD 操作与编号/单元/服务检索。
#[async_trait]
pub trait MeterStore: Send + Sync {
    /// 创建新表计（表计 ID 已存在时报错）
    async fn create_meter(&self, record: MeterRecord) -> Result<MeterRecord, StorageError>;

    /// 查找指定表计
    async fn find_meter(&self, meter_id: &str) -> Result<Option<MeterRecord>, StorageError>;

    /// 按表计编号查找
    async fn find_meter_by_code(
        &self,
        meter_code: &str,
    ) -> Result<Option<MeterRecord>, StorageError>;

    /// 列出全部表计
    async fn list_meters(&self) -> Result<Vec<MeterRecord>, StorageError>;

    /// 列出指定单元的表计
    async fn list_meters_by_unit(&self, unit_id: &str) -> Result<Vec<MeterRecord>, StorageError>;

    /// 列出指定服务的表计
    async fn list_meters_by_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<MeterRecord>, StorageError>;

    /// 更新表计
    async fn update_meter(
        &self,
        meter_id: &str,
        update: MeterUpdate,
    ) -> Result<Option<MeterRecord>, StorageError>;

    /// 删除表计
    async fn delete_meter(&self, meter_id: &str) -> Result<bool, StorageError>;
}

/// 表计读数存储接口
///
/// 提供读数写入、按自然键查找与按表计/任务/周期检索。
#[async_trait]
pub trait MeterReadingStore: Send + Sync {
    /// 写入新读数（读数 ID 已存在时报错）
    async fn create_reading(
        &self,
        record: MeterReadingRecord,
    ) -> Result<MeterReadingRecord, StorageError>;

    /// 查找指定读数
    async fn find_reading(
        &self,
        reading_id: &str,
    ) -> Result<Option<MeterReadingRecord>, StorageError>;

    /// 按（表计，任务）自然键查找读数
    async fn find_reading_by_meter_and_assignment(
        &self,
        meter_id: &str,
        assignment_id: &str,
    ) -> Result<Option<MeterReadingRecord>, StorageError>;

    /// 列出指定表计的读数
    async fn list_readings_by_meter(
        &self,
        meter_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError>;

    /// 列出指定任务的读数
    async fn list_readings_by_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError>;

    /// 列出指定周期的读数
    async fn list_readings_by_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, StorageError>;

    /// 更新读数
    async fn update_reading(
        &self,
        reading_id: &str,
        update: MeterReadingUpdate,
    ) -> Result<Option<MeterReadingRecord>, StorageError>;
}

/// 抄表提醒存储接口
///
/// 提供提醒写入、确认与按任务/用户检索。
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// 写入新提醒（提醒 ID 已存在时报错）
    async fn create_reminder(&self, record: ReminderRecord)
    -> Result<ReminderRecord, StorageError>;

    /// 查找归属指定用户的提醒
    async fn find_reminder_for_user(
        &self,
        reminder_id: &str,
        user_id: &str,
    ) -> Result<Option<ReminderRecord>, StorageError>;

    /// 列出指定任务的提醒（按创建时刻降序）
    async fn list_reminders_by_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<ReminderRecord>, StorageError>;

    /// 列出指定用户的提醒（按创建时刻降序，可过滤已确认）
    async fn list_reminders_by_user(
        &self,
        user_id: &str,
        include_acknowledged: bool,
    ) -> Result<Vec<ReminderRecord>, StorageError>;

    /// 确认提醒（幂等：已确认的保留首个时间戳）
    async fn acknowledge_reminder(
        &self,
        reminder_id: &str,
        user_id: &str,
        acknowledged_at_ms: i64,
    ) -> Result<Option<ReminderRecord>, StorageError>;
}
