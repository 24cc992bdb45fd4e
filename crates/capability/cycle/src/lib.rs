//! # MRC Cycle 模块
//!
//! 抄表周期能力：周期生命周期管理与完成闸门。
//!
//! ## 规则
//!
//! - 周期窗口只接受"1 日至 15 日"或"1 日至月末"；月末窗口创建时
//!   归一化为 1-15（月末写法是标准抄表窗口的简写）
//! - 周期名称由月份派生（`YYYY-MM`），与服务联合唯一；同服务窗口不得相交
//! - 状态只向前推进；迁移到 COMPLETED 前必须通过完成闸门：
//!   无未分配单元，且周期内任务全部显式完成
//! - 创建后向账单协作方后台镜像账期；镜像失败不回滚周期创建
//!
//! 所有"检查后写入"序列持有周期级写锁（创建以服务 ID 为键）。

mod report;

use std::sync::Arc;

use api_contract::{CreateCycleRequest, ReadingCycleDto, UpdateCycleRequest};
use chrono::{Datelike, NaiveDate};
use domain::{
    ActorContext, Clock, CoordinationError, CycleStatus, DateWindow,
    calendar::{end_of_month, first_day_of_month, month_label, same_month, standard_reading_window},
};
use mrc_billing::BillingMirror;
use mrc_directory::{ServiceCatalog, UnitDirectory};
use mrc_scope::ScopeResolver;
use mrc_storage::{
    AssignmentStore, CycleLocks, MeterStore, ReadingCycleRecord, ReadingCycleStore,
    ReadingCycleUpdate,
};
use mrc_telemetry::{record_cycle_completed, record_cycle_created};
use tracing::info;

pub use report::UnassignedUnitsReport;

/// 抄表周期服务。
pub struct CycleService {
    cycles: Arc<dyn ReadingCycleStore>,
    assignments: Arc<dyn AssignmentStore>,
    directory: Arc<dyn UnitDirectory>,
    catalog: Arc<dyn ServiceCatalog>,
    meters: Arc<dyn MeterStore>,
    scope: ScopeResolver,
    locks: Arc<CycleLocks>,
    clock: Arc<dyn Clock>,
    mirror: Option<Arc<BillingMirror>>,
}

impl CycleService {
    pub fn new(
        cycles: Arc<dyn ReadingCycleStore>,
        assignments: Arc<dyn AssignmentStore>,
        meters: Arc<dyn MeterStore>,
        directory: Arc<dyn UnitDirectory>,
        catalog: Arc<dyn ServiceCatalog>,
        locks: Arc<CycleLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scope = ScopeResolver::new(meters.clone(), directory.clone());
        Self {
            cycles,
            assignments,
            directory,
            catalog,
            meters,
            scope,
            locks,
            clock,
            mirror: None,
        }
    }

    /// 挂接账单镜像（周期创建后后台推送账期）。
    pub fn with_mirror(mut self, mirror: Arc<BillingMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// 创建抄表周期。
    pub async fn create_cycle(
        &self,
        ctx: &ActorContext,
        req: CreateCycleRequest,
    ) -> Result<ReadingCycleRecord, CoordinationError> {
        // 周期尚不存在，以服务 ID 为锁键
        let _guard = self.locks.acquire(&req.service_id).await?;

        let service = self
            .catalog
            .find_service(&req.service_id)
            .await
            .map_err(|err| CoordinationError::collaborator("catalog", err.to_string()))?
            .ok_or_else(|| CoordinationError::not_found("service", req.service_id.clone()))?;
        if !service.metered {
            return Err(CoordinationError::validation(format!(
                "service {} is not meter-based",
                service.code
            )));
        }

        let window = validate_cycle_window(req.period_from, req.period_to)?;
        let name = month_label(window.start);
        if self
            .cycles
            .find_cycle_by_name_and_service(&name, &req.service_id)
            .await?
            .is_some()
        {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} already exists for service {}",
                name, service.code
            )));
        }
        let overlapping = self
            .cycles
            .list_cycles_overlapping(&req.service_id, window)
            .await?;
        if let Some(existing) = overlapping.first() {
            return Err(CoordinationError::invalid_state(format!(
                "cycle window {} overlaps existing cycle {} ({})",
                window,
                existing.name,
                existing.window()
            )));
        }

        let now_ms = self.clock.now_ms();
        let record = ReadingCycleRecord {
            cycle_id: uuid::Uuid::new_v4().to_string(),
            service_id: req.service_id,
            name,
            period_from: window.start,
            period_to: window.end,
            status: CycleStatus::Open,
            description: req.description,
            created_by: ctx.user_id.clone(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        let created = self.cycles.create_cycle(record).await?;
        record_cycle_created();
        info!(
            target: "mrc.cycle",
            cycle_id = %created.cycle_id,
            cycle_name = %created.name,
            service_id = %created.service_id,
            period = %created.window(),
            actor = %ctx.user_id,
            "cycle_created"
        );

        // 账期镜像为尽力而为的后台推送,失败绝不影响周期创建
        if let Some(mirror) = &self.mirror {
            mirror.push_cycle_detached(created.clone());
        }
        Ok(created)
    }

    /// 更新周期（描述与可选的状态推进，原子执行）。
    pub async fn update_cycle(
        &self,
        ctx: &ActorContext,
        cycle_id: &str,
        req: UpdateCycleRequest,
    ) -> Result<ReadingCycleRecord, CoordinationError> {
        let _guard = self.locks.acquire(cycle_id).await?;
        let current = self.find_required(cycle_id).await?;

        if let Some(next) = req.status {
            self.check_transition(&current, next).await?;
        }
        let update = ReadingCycleUpdate {
            status: req.status,
            description: req.description,
            updated_at_ms: Some(self.clock.now_ms()),
        };
        let updated = self
            .cycles
            .update_cycle(cycle_id, update)
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", cycle_id))?;
        if req.status == Some(CycleStatus::Completed) {
            record_cycle_completed();
        }
        info!(
            target: "mrc.cycle",
            cycle_id = %updated.cycle_id,
            status = %updated.status.as_str(),
            actor = %ctx.user_id,
            "cycle_updated"
        );
        Ok(updated)
    }

    /// 推进周期状态。
    ///
    /// 迁移到 COMPLETED 时，闸门校验与状态写入在同一把周期锁内完成。
    pub async fn change_status(
        &self,
        ctx: &ActorContext,
        cycle_id: &str,
        next: CycleStatus,
    ) -> Result<ReadingCycleRecord, CoordinationError> {
        let _guard = self.locks.acquire(cycle_id).await?;
        let current = self.find_required(cycle_id).await?;
        self.check_transition(&current, next).await?;

        let updated = self
            .cycles
            .update_cycle(
                cycle_id,
                ReadingCycleUpdate {
                    status: Some(next),
                    description: None,
                    updated_at_ms: Some(self.clock.now_ms()),
                },
            )
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", cycle_id))?;
        if next == CycleStatus::Completed {
            record_cycle_completed();
        }
        info!(
            target: "mrc.cycle",
            cycle_id = %updated.cycle_id,
            from = %current.status.as_str(),
            to = %next.as_str(),
            actor = %ctx.user_id,
            "cycle_status_changed"
        );
        Ok(updated)
    }

    /// 删除周期（仅 OPEN 状态允许，硬删除）。
    pub async fn delete_cycle(
        &self,
        ctx: &ActorContext,
        cycle_id: &str,
    ) -> Result<(), CoordinationError> {
        let _guard = self.locks.acquire(cycle_id).await?;
        let current = self.find_required(cycle_id).await?;
        if current.status != CycleStatus::Open {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} is {}; only OPEN cycles can be deleted",
                current.name,
                current.status.as_str()
            )));
        }
        self.cycles.delete_cycle(cycle_id).await?;
        info!(
            target: "mrc.cycle",
            cycle_id = %cycle_id,
            cycle_name = %current.name,
            actor = %ctx.user_id,
            "cycle_deleted"
        );
        Ok(())
    }

    /// 查找或创建指定月份的周期（排程器用）。
    pub async fn ensure_monthly_cycle(
        &self,
        ctx: &ActorContext,
        year: i32,
        month: u32,
        service_id: &str,
    ) -> Result<ReadingCycleRecord, CoordinationError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoordinationError::validation(format!("invalid month {year}-{month}")))?;
        let name = month_label(first);
        if let Some(existing) = self
            .cycles
            .find_cycle_by_name_and_service(&name, service_id)
            .await?
        {
            return Ok(existing);
        }
        let window = standard_reading_window(first);
        self.create_cycle(
            ctx,
            CreateCycleRequest {
                service_id: service_id.to_string(),
                period_from: window.start,
                period_to: window.end,
                description: Some(format!("scheduled reading cycle {name}")),
            },
        )
        .await
    }

    pub async fn get_cycle(&self, cycle_id: &str) -> Result<ReadingCycleRecord, CoordinationError> {
        self.find_required(cycle_id).await
    }

    pub async fn list_cycles(&self) -> Result<Vec<ReadingCycleRecord>, CoordinationError> {
        Ok(self.cycles.list_cycles().await?)
    }

    pub async fn list_cycles_by_status(
        &self,
        status: CycleStatus,
    ) -> Result<Vec<ReadingCycleRecord>, CoordinationError> {
        Ok(self.cycles.list_cycles_by_status(status).await?)
    }

    pub async fn list_cycles_by_service(
        &self,
        service_id: &str,
        status: Option<CycleStatus>,
    ) -> Result<Vec<ReadingCycleRecord>, CoordinationError> {
        let mut cycles = self.cycles.list_cycles_by_service(service_id).await?;
        if let Some(status) = status {
            cycles.retain(|cycle| cycle.status == status);
        }
        Ok(cycles)
    }

    pub async fn list_cycles_overlapping(
        &self,
        service_id: &str,
        window: DateWindow,
    ) -> Result<Vec<ReadingCycleRecord>, CoordinationError> {
        Ok(self.cycles.list_cycles_overlapping(service_id, window).await?)
    }

    /// 完成闸门之一：周期内不得存在未分配单元（仅统计有付款人的单元）。
    pub async fn validate_all_assigned(&self, cycle_id: &str) -> Result<(), CoordinationError> {
        let report = self.unassigned_units(cycle_id, true).await?;
        if report.total_unassigned > 0 {
            return Err(CoordinationError::invalid_state(report.message));
        }
        Ok(())
    }

    /// 完成闸门之二：周期内全部任务必须已显式完成。
    ///
    /// 已取消但未完成的任务同样阻塞闸门；出路是删除该任务。
    pub async fn validate_all_assignments_completed(
        &self,
        cycle_id: &str,
    ) -> Result<(), CoordinationError> {
        let cycle = self.find_required(cycle_id).await?;
        let assignments = self.assignments.list_assignments_by_cycle(cycle_id).await?;
        let incomplete = assignments
            .iter()
            .filter(|assignment| {
                assignment.service_id == cycle.service_id
                    && assignment.completed_at_ms.is_none()
            })
            .count();
        if incomplete > 0 {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} has {} assignment(s) not yet completed",
                cycle.name, incomplete
            )));
        }
        Ok(())
    }

    async fn find_required(&self, cycle_id: &str) -> Result<ReadingCycleRecord, CoordinationError> {
        self.cycles
            .find_cycle(cycle_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", cycle_id))
    }

    /// 校验状态迁移；迁移到 COMPLETED 先过完成闸门。
    async fn check_transition(
        &self,
        current: &ReadingCycleRecord,
        next: CycleStatus,
    ) -> Result<(), CoordinationError> {
        if !current.status.can_transition_to(next) {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} cannot move from {} to {}",
                current.name,
                current.status.as_str(),
                next.as_str()
            )));
        }
        if next == CycleStatus::Completed {
            self.validate_all_assigned(&current.cycle_id).await?;
            self.validate_all_assignments_completed(&current.cycle_id)
                .await?;
        }
        Ok(())
    }
}

/// 校验周期窗口：当月 1 日起，至 15 日或月末止；月末归一化为 15 日。
fn validate_cycle_window(
    period_from: NaiveDate,
    period_to: NaiveDate,
) -> Result<DateWindow, CoordinationError> {
    if period_from.day() != 1 {
        return Err(CoordinationError::validation(format!(
            "cycle must start on day 1 of the month, got {period_from}"
        )));
    }
    if !same_month(period_from, period_to) {
        return Err(CoordinationError::validation(format!(
            "cycle window must stay within one month: {period_from}..{period_to}"
        )));
    }
    let eom = end_of_month(period_from);
    if period_to.day() != 15 && period_to != eom {
        return Err(CoordinationError::validation(format!(
            "cycle must end on day 15 or the end of month, got {period_to}"
        )));
    }
    Ok(standard_reading_window(first_day_of_month(period_from)))
}

/// 周期记录转出口 DTO。
pub fn cycle_dto(record: &ReadingCycleRecord) -> ReadingCycleDto {
    ReadingCycleDto {
        cycle_id: record.cycle_id.clone(),
        service_id: record.service_id.clone(),
        name: record.name.clone(),
        period_from: record.period_from,
        period_to: record.period_to,
        status: record.status,
        description: record.description.clone(),
        created_by: record.created_by.clone(),
        created_at_ms: record.created_at_ms,
        updated_at_ms: record.updated_at_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn mid_month_window_is_accepted_as_is() {
        let window = validate_cycle_window(day(2024, 6, 1), day(2024, 6, 15)).expect("valid");
        assert_eq!(window.start, day(2024, 6, 1));
        assert_eq!(window.end, day(2024, 6, 15));
    }

    #[test]
    fn end_of_month_window_normalises_to_day_15() {
        let window = validate_cycle_window(day(2024, 6, 1), day(2024, 6, 30)).expect("valid");
        assert_eq!(window.end, day(2024, 6, 15));

        let leap = validate_cycle_window(day(2024, 2, 1), day(2024, 2, 29)).expect("valid");
        assert_eq!(leap.end, day(2024, 2, 15));
    }

    #[test]
    fn malformed_windows_are_rejected() {
        assert!(validate_cycle_window(day(2024, 6, 2), day(2024, 6, 15)).is_err());
        assert!(validate_cycle_window(day(2024, 6, 1), day(2024, 6, 14)).is_err());
        assert!(validate_cycle_window(day(2024, 6, 1), day(2024, 6, 20)).is_err());
        assert!(validate_cycle_window(day(2024, 6, 1), day(2024, 7, 15)).is_err());
        // 平年二月没有 29 日窗口
        assert!(validate_cycle_window(day(2023, 2, 1), day(2023, 2, 28)).is_ok());
    }
}
