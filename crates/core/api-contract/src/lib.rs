//! 稳定的 DTO 与 API 响应契约。

use chrono::NaiveDate;
use domain::{AssignmentStatus, CoordinationError, CycleStatus};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn failure(error: &CoordinationError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError::from(error)),
        }
    }
}

/// 将协调错误映射为稳定错误码。
pub fn error_code(error: &CoordinationError) -> &'static str {
    match error {
        CoordinationError::NotFound { .. } => "RESOURCE.NOT_FOUND",
        CoordinationError::InvalidState(_) => "STATE.INVALID",
        CoordinationError::ScopeConflict(_) => "SCOPE.CONFLICT",
        CoordinationError::Validation(_) => "INVALID.REQUEST",
        CoordinationError::CollaboratorUnavailable { .. } => "COLLABORATOR.UNAVAILABLE",
        CoordinationError::Storage(_) => "INTERNAL.ERROR",
    }
}

impl From<&CoordinationError> for ApiError {
    fn from(error: &CoordinationError) -> Self {
        ApiError {
            code: error_code(error).to_string(),
            message: error.to_string(),
        }
    }
}

/// 抄表周期创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCycleRequest {
    pub service_id: String,
    pub period_from: NaiveDate,
    /// 允许 1-15 或 1-月末；月末窗口在创建时归一化为 1-15
    pub period_to: NaiveDate,
    pub description: Option<String>,
}

/// 抄表周期更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCycleRequest {
    pub description: Option<String>,
    pub status: Option<CycleStatus>,
}

/// 抄表周期返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingCycleDto {
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

/// 抄表任务创建请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub cycle_id: String,
    pub service_id: String,
    pub building_id: Option<String>,
    pub floor: Option<i32>,
    pub unit_ids: Option<Vec<String>>,
    pub assigned_to: String,
    /// 缺省为周期窗口起点
    pub start_date: Option<NaiveDate>,
    /// 缺省为周期窗口终点
    pub end_date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// 抄表任务返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
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
}

/// 抄表任务进度返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentProgressDto {
    pub assignment_id: String,
    pub total_meters: usize,
    pub completed_meters: usize,
    pub remaining_meters: usize,
    /// 完成率（两位小数）
    pub percent: f64,
    pub completed: bool,
}

/// 表计登记请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeterRequest {
    pub unit_id: String,
    pub service_id: String,
    pub meter_code: String,
    /// 缺省为今日
    pub installed_at: Option<NaiveDate>,
}

/// 表计更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeterRequest {
    pub meter_code: Option<String>,
    pub active: Option<bool>,
    pub removed_at: Option<NaiveDate>,
}

/// 表计返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterDto {
    pub meter_id: String,
    pub unit_id: String,
    pub service_id: String,
    pub meter_code: String,
    pub active: bool,
    pub installed_at: NaiveDate,
    pub removed_at: Option<NaiveDate>,
}

/// 读数录入请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReadingRequest {
    pub meter_id: String,
    pub assignment_id: Option<String>,
    pub cycle_id: Option<String>,
    pub reading_date: NaiveDate,
    /// 缺省由最近一次读数推导；无历史读数为 0
    pub prev_index: Option<f64>,
    pub curr_index: f64,
    pub note: Option<String>,
    pub photo_file_id: Option<String>,
    /// 缺省为当前操作者
    pub reader_id: Option<String>,
}

/// 读数修正请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReadingRequest {
    pub reading_date: Option<NaiveDate>,
    pub prev_index: Option<f64>,
    pub curr_index: Option<f64>,
    pub note: Option<String>,
    pub photo_file_id: Option<String>,
}

/// 表计读数返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReadingDto {
    pub reading_id: String,
    pub meter_id: String,
    pub unit_id: String,
    pub assignment_id: Option<String>,
    pub cycle_id: Option<String>,
    pub reading_date: NaiveDate,
    pub prev_index: f64,
    pub curr_index: f64,
    /// 用量 = curr_index - prev_index，出口现算、永不落库
    pub usage: f64,
    pub note: Option<String>,
    pub reader_id: String,
    pub photo_file_id: Option<String>,
    pub read_at_ms: i64,
}

/// 抄表提醒返回结构。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDto {
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

/// 未分配单元楼层分组。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedFloorDto {
    pub building_id: Option<String>,
    pub building_code: Option<String>,
    pub building_name: Option<String>,
    pub floor: Option<i32>,
    pub unit_codes: Vec<String>,
    pub count: usize,
}

/// 单元简要描述（缺表清单用）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBriefDto {
    pub unit_id: String,
    pub code: String,
    pub building_code: Option<String>,
    pub floor: Option<i32>,
}

/// 周期未分配单元报告。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignedUnitsDto {
    pub cycle_id: String,
    pub service_id: String,
    /// 仅统计装有在用表计的未分配单元
    pub total_unassigned: usize,
    pub floors: Vec<UnassignedFloorDto>,
    pub message: String,
    /// 无该服务表计的单元（仅展示，不阻塞完成闸门）
    pub units_without_meter: Vec<UnitBriefDto>,
}
