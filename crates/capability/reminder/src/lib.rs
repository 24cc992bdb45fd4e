//! # MRC Reminder 模块
//!
//! 提醒调度能力：到期扫描、确认与资格报告。
//!
//! ## 规则
//!
//! - 扫描对象：状态为待办/进行中/逾期、截止日落在
//!   `[today, today + lead_days]`、今日尚未发过提醒的任务
//! - 同一任务至多一条未确认提醒：最近一条未确认则跳过（防骚扰）
//! - 单条失败只记日志，不中断整轮扫描；扫描本身按日幂等
//! - 扫描为旁路任务，不持周期锁；与确认并发产生的重复提醒
//!   是良性的，不构成正确性问题

use std::sync::Arc;

use api_contract::ReminderDto;
use chrono::{Days, NaiveDate};
use domain::{ActorContext, AssignmentStatus, Clock, CoordinationError};
use mrc_storage::{
    AssignmentRecord, AssignmentStore, AssignmentUpdate, ReadingCycleStore, ReminderRecord,
    ReminderStore,
};
use mrc_telemetry::{record_reminder_sent, record_reminder_skipped};
use tracing::{info, warn};

/// 提醒类别标签。
pub const READING_REMINDER_KIND: &str = "METER_READING_ASSIGNMENT_REMINDER";

/// 一轮到期扫描的摘要。
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepSummary {
    /// 满足扫描谓词的任务数
    pub matched: usize,
    /// 实际创建的提醒数
    pub created: usize,
    /// 因未确认提醒在途而跳过的任务数
    pub skipped: usize,
}

/// 单个任务的提醒资格（调试报告用）。
#[derive(Debug, Clone)]
pub struct ReminderEligibility {
    pub assignment_id: String,
    pub assigned_to: String,
    pub status: AssignmentStatus,
    pub end_date: NaiveDate,
    pub status_matches: bool,
    pub end_date_in_range: bool,
    pub not_sent_today: bool,
    pub has_open_reminder: bool,
    pub should_remind: bool,
    /// 距截止日的天数（已过期为负）
    pub days_until_due: i64,
}

/// 提醒资格报告。
#[derive(Debug, Clone)]
pub struct EligibilityReport {
    pub today: NaiveDate,
    pub lead_days: u32,
    pub items: Vec<ReminderEligibility>,
}

/// 提醒调度服务。
pub struct ReminderService {
    reminders: Arc<dyn ReminderStore>,
    assignments: Arc<dyn AssignmentStore>,
    cycles: Arc<dyn ReadingCycleStore>,
    clock: Arc<dyn Clock>,
    lead_days: u32,
}

impl ReminderService {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        assignments: Arc<dyn AssignmentStore>,
        cycles: Arc<dyn ReadingCycleStore>,
        clock: Arc<dyn Clock>,
        lead_days: u32,
    ) -> Self {
        Self {
            reminders,
            assignments,
            cycles,
            clock,
            lead_days,
        }
    }

    /// 到期扫描：为临近截止的任务创建提醒。
    pub async fn process_due(&self, today: NaiveDate) -> Result<SweepSummary, CoordinationError> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.lead_days)))
            .unwrap_or(today);
        let assignments = self.assignments.list_assignments().await?;
        let mut summary = SweepSummary::default();

        for assignment in assignments
            .iter()
            .filter(|assignment| due_for_reminder(assignment, today, horizon))
        {
            summary.matched += 1;
            match self.remind_one(assignment, today).await {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.skipped += 1,
                Err(err) => {
                    // 单条失败不中断整轮扫描
                    warn!(
                        target: "mrc.reminder",
                        assignment_id = %assignment.assignment_id,
                        error = %err,
                        "reminder_creation_failed"
                    );
                }
            }
        }
        info!(
            target: "mrc.reminder",
            today = %today,
            lead_days = self.lead_days,
            matched = summary.matched,
            created = summary.created,
            skipped = summary.skipped,
            "reminder_sweep_done"
        );
        Ok(summary)
    }

    /// 用户名下提醒（按创建时刻降序）。
    pub async fn list_for_user(
        &self,
        ctx: &ActorContext,
        include_acknowledged: bool,
    ) -> Result<Vec<ReminderRecord>, CoordinationError> {
        Ok(self
            .reminders
            .list_reminders_by_user(&ctx.user_id, include_acknowledged)
            .await?)
    }

    /// 确认提醒（只能确认自己的；重复确认保留首个时间戳）。
    pub async fn acknowledge(
        &self,
        ctx: &ActorContext,
        reminder_id: &str,
    ) -> Result<ReminderRecord, CoordinationError> {
        let acknowledged = self
            .reminders
            .acknowledge_reminder(reminder_id, &ctx.user_id, self.clock.now_ms())
            .await?
            .ok_or_else(|| CoordinationError::not_found("reminder", reminder_id))?;
        info!(
            target: "mrc.reminder",
            reminder_id = %reminder_id,
            user_id = %ctx.user_id,
            "reminder_acknowledged"
        );
        Ok(acknowledged)
    }

    /// 资格报告：逐任务展示扫描谓词的各个分量（调试出口）。
    pub async fn eligibility_report(
        &self,
        today: NaiveDate,
    ) -> Result<EligibilityReport, CoordinationError> {
        let horizon = today
            .checked_add_days(Days::new(u64::from(self.lead_days)))
            .unwrap_or(today);
        let assignments = self.assignments.list_assignments().await?;
        let mut items = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let status_matches = assignment.status.is_active();
            let end_date_in_range =
                assignment.end_date >= today && assignment.end_date <= horizon;
            let not_sent_today = assignment
                .reminder_last_sent
                .map(|sent| sent < today)
                .unwrap_or(true);
            let has_open_reminder = self.has_open_reminder(&assignment.assignment_id).await?;
            items.push(ReminderEligibility {
                assignment_id: assignment.assignment_id.clone(),
                assigned_to: assignment.assigned_to.clone(),
                status: assignment.status,
                end_date: assignment.end_date,
                status_matches,
                end_date_in_range,
                not_sent_today,
                has_open_reminder,
                should_remind: status_matches
                    && end_date_in_range
                    && not_sent_today
                    && !has_open_reminder,
                days_until_due: (assignment.end_date - today).num_days(),
            });
        }
        Ok(EligibilityReport {
            today,
            lead_days: self.lead_days,
            items,
        })
    }

    /// 为单个任务创建提醒；未确认提醒在途时跳过并返回 false。
    async fn remind_one(
        &self,
        assignment: &AssignmentRecord,
        today: NaiveDate,
    ) -> Result<bool, CoordinationError> {
        if self.has_open_reminder(&assignment.assignment_id).await? {
            record_reminder_skipped();
            info!(
                target: "mrc.reminder",
                assignment_id = %assignment.assignment_id,
                "reminder_skipped_open_reminder"
            );
            return Ok(false);
        }

        let cycle_name = self
            .cycles
            .find_cycle(&assignment.cycle_id)
            .await?
            .map(|cycle| cycle.name)
            .unwrap_or_else(|| assignment.cycle_id.clone());
        let record = ReminderRecord {
            reminder_id: uuid::Uuid::new_v4().to_string(),
            assignment_id: assignment.assignment_id.clone(),
            user_id: assignment.assigned_to.clone(),
            title: format!("Meter reading due: {cycle_name}"),
            message: format!(
                "Reading assignment for cycle {} is due on {}. Please finish recording all meters in scope.",
                cycle_name, assignment.end_date
            ),
            due_date: assignment.end_date,
            kind: READING_REMINDER_KIND.to_string(),
            acknowledged_at_ms: None,
            created_at_ms: self.clock.now_ms(),
        };
        self.reminders.create_reminder(record).await?;
        self.assignments
            .update_assignment(
                &assignment.assignment_id,
                AssignmentUpdate {
                    reminder_last_sent: Some(today),
                    updated_at_ms: Some(self.clock.now_ms()),
                    ..AssignmentUpdate::default()
                },
            )
            .await?;
        record_reminder_sent();
        info!(
            target: "mrc.reminder",
            assignment_id = %assignment.assignment_id,
            user_id = %assignment.assigned_to,
            due_date = %assignment.end_date,
            "reminder_created"
        );
        Ok(true)
    }

    async fn has_open_reminder(&self, assignment_id: &str) -> Result<bool, CoordinationError> {
        let latest = self
            .reminders
            .list_reminders_by_assignment(assignment_id)
            .await?
            .into_iter()
            .next();
        Ok(latest
            .map(|reminder| reminder.acknowledged_at_ms.is_none())
            .unwrap_or(false))
    }
}

/// 扫描谓词：活跃状态、截止日在窗口内、今日未发过。
fn due_for_reminder(assignment: &AssignmentRecord, today: NaiveDate, horizon: NaiveDate) -> bool {
    assignment.status.is_active()
        && assignment.end_date >= today
        && assignment.end_date <= horizon
        && assignment
            .reminder_last_sent
            .map(|sent| sent < today)
            .unwrap_or(true)
}

/// 提醒记录转出口 DTO。
pub fn reminder_dto(record: &ReminderRecord) -> ReminderDto {
    ReminderDto {
        reminder_id: record.reminder_id.clone(),
        assignment_id: record.assignment_id.clone(),
        user_id: record.user_id.clone(),
        title: record.title.clone(),
        message: record.message.clone(),
        due_date: record.due_date,
        kind: record.kind.clone(),
        acknowledged_at_ms: record.acknowledged_at_ms,
        created_at_ms: record.created_at_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn assignment(end: NaiveDate, status: AssignmentStatus) -> AssignmentRecord {
        AssignmentRecord {
            assignment_id: "a-1".to_string(),
            cycle_id: "cycle-1".to_string(),
            service_id: "svc-electric".to_string(),
            building_id: Some("bldg-a".to_string()),
            floor: None,
            unit_ids: None,
            assigned_to: "staff-1".to_string(),
            assigned_by: "manager-1".to_string(),
            assigned_at_ms: 1,
            start_date: day(2024, 6, 1),
            end_date: end,
            status,
            completed_at_ms: None,
            reminder_last_sent: None,
            note: None,
            created_at_ms: 1,
            updated_at_ms: 1,
        }
    }

    #[test]
    fn predicate_checks_window_and_status() {
        let today = day(2024, 6, 7);
        let horizon = day(2024, 6, 10);

        assert!(due_for_reminder(
            &assignment(day(2024, 6, 10), AssignmentStatus::InProgress),
            today,
            horizon,
        ));
        assert!(due_for_reminder(
            &assignment(day(2024, 6, 7), AssignmentStatus::Pending),
            today,
            horizon,
        ));
        // 截止日已过窗口
        assert!(!due_for_reminder(
            &assignment(day(2024, 6, 11), AssignmentStatus::InProgress),
            today,
            horizon,
        ));
        // 终态任务不提醒
        assert!(!due_for_reminder(
            &assignment(day(2024, 6, 9), AssignmentStatus::Completed),
            today,
            horizon,
        ));
    }

    #[test]
    fn predicate_skips_assignments_reminded_today() {
        let today = day(2024, 6, 7);
        let horizon = day(2024, 6, 10);
        let mut reminded = assignment(day(2024, 6, 9), AssignmentStatus::InProgress);
        reminded.reminder_last_sent = Some(today);
        assert!(!due_for_reminder(&reminded, today, horizon));

        reminded.reminder_last_sent = Some(day(2024, 6, 6));
        assert!(due_for_reminder(&reminded, today, horizon));
    }
}
