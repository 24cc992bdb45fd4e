use std::fmt;

use thiserror::Error;

use crate::calendar::DateWindow;

/// 任务范围冲突的结构化描述，用于拼装可读的冲突消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapDetail {
    pub existing_assignment_id: String,
    pub existing_window: DateWindow,
    pub existing_scope: String,
    pub requested_window: DateWindow,
    pub requested_scope: String,
}

/// 范围冲突种类。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeConflict {
    /// 与既有任务的时间窗口和单元范围同时相交。
    Overlap(OverlapDetail),
    /// 完成校验：范围内仍有表计缺少读数。
    MissingReadings { meter_codes: Vec<String> },
    /// 完成校验：存在范围外表计的读数。
    ExtraneousReadings { meter_codes: Vec<String> },
}

impl fmt::Display for ScopeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeConflict::Overlap(detail) => write!(
                f,
                "assignment overlap detected. existing: {} ({}, {}) | requested: ({}, {})",
                detail.existing_assignment_id,
                detail.existing_window,
                detail.existing_scope,
                detail.requested_window,
                detail.requested_scope,
            ),
            ScopeConflict::MissingReadings { meter_codes } => write!(
                f,
                "missing readings for {} meter(s): {}",
                meter_codes.len(),
                meter_codes.join(", "),
            ),
            ScopeConflict::ExtraneousReadings { meter_codes } => write!(
                f,
                "found readings for {} meter(s) not in scope: {}",
                meter_codes.len(),
                meter_codes.join(", "),
            ),
        }
    }
}

/// 协调操作的统一错误分类。
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// 目标资源不存在。
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// 当前状态不允许该操作。
    #[error("{0}")]
    InvalidState(String),

    /// 任务范围冲突。
    #[error("{0}")]
    ScopeConflict(ScopeConflict),

    /// 输入不合法。
    #[error("{0}")]
    Validation(String),

    /// 必需的协作方不可用。
    #[error("{collaborator} unavailable: {detail}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        detail: String,
    },

    /// 存储层故障。
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoordinationError {
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        CoordinationError::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        CoordinationError::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoordinationError::Validation(message.into())
    }

    pub fn collaborator(collaborator: &'static str, detail: impl Into<String>) -> Self {
        CoordinationError::CollaboratorUnavailable {
            collaborator,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn overlap_message_names_both_sides() {
        let conflict = ScopeConflict::Overlap(OverlapDetail {
            existing_assignment_id: "a-1".to_string(),
            existing_window: DateWindow::new(day(2024, 6, 1), day(2024, 6, 10)),
            existing_scope: "floor 3, all units".to_string(),
            requested_window: DateWindow::new(day(2024, 6, 5), day(2024, 6, 12)),
            requested_scope: "floor 3, all units".to_string(),
        });
        let message = conflict.to_string();
        assert!(message.contains("a-1"));
        assert!(message.contains("2024-06-01..2024-06-10"));
        assert!(message.contains("2024-06-05..2024-06-12"));
    }

    #[test]
    fn missing_readings_lists_meter_codes() {
        let error = CoordinationError::ScopeConflict(ScopeConflict::MissingReadings {
            meter_codes: vec!["EL-002".to_string()],
        });
        assert!(error.to_string().contains("EL-002"));
    }
}
