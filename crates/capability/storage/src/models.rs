//! 数据模型
//!
//! 定义所有存储相关的数据模型和更新结构：
//! - 抄表周期：ReadingCycleRecord, ReadingCycleUpdate
//! - 抄表任务：AssignmentRecord, AssignmentUpdate
//! - 表计台账：MeterRecord, MeterUpdate
//! - 表计读数：MeterReadingRecord, MeterReadingUpdate
//! - 抄表提醒：ReminderRecord
//!
//! 约定：日历字段用 `NaiveDate`，审计时刻用 Unix 毫秒（`*_ms`）。

use chrono::NaiveDate;
use domain::{AssignmentStatus, CycleStatus, DateWindow, FloorScope, UnitScope};

/// 抄表周期记录。
///
/// `name` 由周期月份派生（`YYYY-MM`），与 `service_id` 联合唯一。
#[derive(Debug, Clone)]
pub struct ReadingCycleRecord {
    pub cycle_id: String,
    pub service_id: String,
    pub name: String,
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub status: CycleStatus,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ReadingCycleRecord {
    /// 周期的抄表窗口。
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.period_from, self.period_to)
    }
}

/// 抄表周期更新输入。
#[derive(Debug, Clone, Default)]
pub struct ReadingCycleUpdate {
    pub status: Option<CycleStatus>,
    pub description: Option<String>,
    pub updated_at_ms: Option<i64>,
}

/// 抄表任务记录。
///
/// 范围字段保留存储友好的可选形式：
/// - `floor: None` 表示整栋楼
/// - `unit_ids: None` 或空列表表示范围片内全部单元
#[derive(Debug, Clone)]
pub struct AssignmentRecord {
    pub assignment_id: String,
    pub cycle_id: String,
    pub service_id: String,
    pub building_id: Option<String>,
    pub floor: Option<i32>,
    pub unit_ids: Option<Vec<String>>,
    pub assigned_to: String,
    pub assigned_by: String,
    pub assigned_at_ms: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: AssignmentStatus,
    pub completed_at_ms: Option<i64>,
    pub reminder_last_sent: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl AssignmentRecord {
    /// 任务的抄表窗口。
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start_date, self.end_date)
    }

    /// 楼层范围（领域形式）。
    pub fn floor_scope(&self) -> FloorScope {
        FloorScope::from_optional(self.floor)
    }

    /// 单元范围（领域形式，空列表归一化为全部单元）。
    pub fn unit_scope(&self) -> UnitScope {
        UnitScope::from_optional(self.unit_ids.clone())
    }
}

/// 抄表任务更新输入。
#[derive(Debug, Clone, Default)]
pub struct AssignmentUpdate {
    pub status: Option<AssignmentStatus>,
    pub completed_at_ms: Option<i64>,
    pub reminder_last_sent: Option<NaiveDate>,
    pub note: Option<String>,
    pub updated_at_ms: Option<i64>,
}

/// 表计记录。
///
/// `meter_code` 全局唯一；同一（单元，服务）最多一只在用表计。
#[derive(Debug, Clone)]
pub struct MeterRecord {
    pub meter_id: String,
    pub unit_id: String,
    pub service_id: String,
    pub meter_code: String,
    pub active: bool,
    pub installed_at: NaiveDate,
    pub removed_at: Option<NaiveDate>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// 表计更新输入。
///
/// `removed_at` 为双层 Option：外层 `None` 表示不变更，
/// 内层 `None` 表示清除拆除日期。
#[derive(Debug, Clone, Default)]
pub struct MeterUpdate {
    pub meter_code: Option<String>,
    pub active: Option<bool>,
    pub removed_at: Option<Option<NaiveDate>>,
    pub updated_at_ms: Option<i64>,
}

/// 表计读数记录。
///
/// 用量（`curr_index - prev_index`）永不落库，仅在出口处计算。
/// `unit_id` 与 `cycle_id` 为冗余字段，便于按周期/单元检索。
#[derive(Debug, Clone)]
pub struct MeterReadingRecord {
    pub reading_id: String,
    pub meter_id: String,
    pub unit_id: String,
    pub assignment_id: Option<String>,
    pub cycle_id: Option<String>,
    pub reading_date: NaiveDate,
    pub prev_index: f64,
    pub curr_index: f64,
    pub note: Option<String>,
    pub reader_id: String,
    pub photo_file_id: Option<String>,
    pub read_at_ms: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// 表计读数更新输入。
#[derive(Debug, Clone, Default)]
pub struct MeterReadingUpdate {
    pub reading_date: Option<NaiveDate>,
    pub prev_index: Option<f64>,
    pub curr_index: Option<f64>,
    pub note: Option<String>,
    pub photo_file_id: Option<String>,
    pub reader_id: Option<String>,
    pub cycle_id: Option<String>,
    pub read_at_ms: Option<i64>,
    pub updated_at_ms: Option<i64>,
}

/// 抄表提醒记录。
///
/// 同一任务最多一条未确认提醒；`kind` 标识提醒类别。
#[derive(Debug, Clone)]
pub struct ReminderRecord {
    pub reminder_id: String,
    pub assignment_id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub due_date: NaiveDate,
    pub kind: String,
    pub acknowledged_at_ms: Option<i64>,
    pub created_at_ms: i64,
}
