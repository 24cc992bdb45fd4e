use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 抄表周期状态机。
///
/// 状态只向前推进：
/// - Open → InProgress | Closed
/// - InProgress → Completed | Closed
/// - Completed → Closed
/// - Closed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    Open,
    InProgress,
    Completed,
    Closed,
}

impl CycleStatus {
    /// 状态转移是否被允许。
    pub fn can_transition_to(self, next: CycleStatus) -> bool {
        matches!(
            (self, next),
            (CycleStatus::Open, CycleStatus::InProgress)
                | (CycleStatus::Open, CycleStatus::Closed)
                | (CycleStatus::InProgress, CycleStatus::Completed)
                | (CycleStatus::InProgress, CycleStatus::Closed)
                | (CycleStatus::Completed, CycleStatus::Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CycleStatus::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Open => "OPEN",
            CycleStatus::InProgress => "IN_PROGRESS",
            CycleStatus::Completed => "COMPLETED",
            CycleStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<CycleStatus> {
        match value {
            "OPEN" => Some(CycleStatus::Open),
            "IN_PROGRESS" => Some(CycleStatus::InProgress),
            "COMPLETED" => Some(CycleStatus::Completed),
            "CLOSED" => Some(CycleStatus::Closed),
            _ => None,
        }
    }
}

/// 抄表任务状态。
///
/// 创建时按今日与任务窗口推导一次，其后仅通过完成/取消显式变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Overdue,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    /// 依据今日与任务窗口推导初始状态。
    pub fn initial_for_window(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> Self {
        if end < today {
            AssignmentStatus::Overdue
        } else if start <= today {
            AssignmentStatus::InProgress
        } else {
            AssignmentStatus::Pending
        }
    }

    /// 终态（完成或取消）不再参与排班与提醒。
    pub fn is_terminal(self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
    }

    /// 仍需跟进的状态（待办、进行中、逾期）。
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "PENDING",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Overdue => "OVERDUE",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<AssignmentStatus> {
        match value {
            "PENDING" => Some(AssignmentStatus::Pending),
            "IN_PROGRESS" => Some(AssignmentStatus::InProgress),
            "OVERDUE" => Some(AssignmentStatus::Overdue),
            "COMPLETED" => Some(AssignmentStatus::Completed),
            "CANCELLED" => Some(AssignmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn cycle_transitions_follow_the_table() {
        assert!(CycleStatus::Open.can_transition_to(CycleStatus::InProgress));
        assert!(CycleStatus::Open.can_transition_to(CycleStatus::Closed));
        assert!(CycleStatus::InProgress.can_transition_to(CycleStatus::Completed));
        assert!(CycleStatus::InProgress.can_transition_to(CycleStatus::Closed));
        assert!(CycleStatus::Completed.can_transition_to(CycleStatus::Closed));

        assert!(!CycleStatus::Open.can_transition_to(CycleStatus::Completed));
        assert!(!CycleStatus::Completed.can_transition_to(CycleStatus::InProgress));
        assert!(!CycleStatus::Closed.can_transition_to(CycleStatus::Open));
        assert!(!CycleStatus::Closed.can_transition_to(CycleStatus::Closed));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            CycleStatus::Open,
            CycleStatus::InProgress,
            CycleStatus::Completed,
            CycleStatus::Closed,
        ] {
            assert_eq!(CycleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CycleStatus::parse("ARCHIVED"), None);
    }

    #[test]
    fn initial_status_from_window() {
        let today = day(2024, 6, 7);
        assert_eq!(
            AssignmentStatus::initial_for_window(today, day(2024, 6, 1), day(2024, 6, 5)),
            AssignmentStatus::Overdue,
        );
        assert_eq!(
            AssignmentStatus::initial_for_window(today, day(2024, 6, 1), day(2024, 6, 10)),
            AssignmentStatus::InProgress,
        );
        assert_eq!(
            AssignmentStatus::initial_for_window(today, day(2024, 6, 10), day(2024, 6, 15)),
            AssignmentStatus::Pending,
        );
    }

    #[test]
    fn window_boundaries_count_as_in_progress() {
        let start = day(2024, 6, 1);
        let end = day(2024, 6, 15);
        assert_eq!(
            AssignmentStatus::initial_for_window(start, start, end),
            AssignmentStatus::InProgress,
        );
        assert_eq!(
            AssignmentStatus::initial_for_window(end, start, end),
            AssignmentStatus::InProgress,
        );
    }
}
