//! # MRC Assignment 模块
//!
//! 抄表任务能力：排班、冲突检测、完成校验与进度查询。
//!
//! ## 规则
//!
//! - 任务窗口缺省为周期窗口，且必须完全落在周期窗口内
//! - 只能为当月或下月的周期排班
//! - 同周期同楼栋同服务的未终结任务之间，时间窗口与单元范围
//!   不得同时相交（终结＝已完成或已取消）
//! - 范围内必须至少有一只在用表计，否则无事可抄
//! - 完成校验为精确覆盖：范围内表计一只不少（缺读数拒绝）、
//!   范围外一只不多（多读数说明上游排班有误，同样拒绝）
//! - 只有被指派的抄表员本人可完成任务
//!
//! 进度永远从读数子集全量重算，不维护增量计数器。

use std::collections::BTreeSet;
use std::sync::Arc;

use api_contract::{AssignmentDto, AssignmentProgressDto, CreateAssignmentRequest};
use domain::{
    ActorContext, AssignmentStatus, Clock, CoordinationError, DateWindow, OverlapDetail,
    ScopeConflict, calendar::{month_label, next_month_first_day},
    scopes_intersect,
};
use mrc_directory::{ServiceCatalog, UnitDirectory};
use mrc_scope::{ScopeResolver, scope_label};
use mrc_storage::{
    AssignmentRecord, AssignmentStore, AssignmentUpdate, CycleLocks, MeterReadingStore,
    MeterStore, ReadingCycleRecord, ReadingCycleStore,
};
use mrc_telemetry::{record_assignment_completed, record_assignment_created, record_scope_conflict};
use tracing::info;

/// 抄表任务服务。
pub struct AssignmentService {
    assignments: Arc<dyn AssignmentStore>,
    cycles: Arc<dyn ReadingCycleStore>,
    readings: Arc<dyn MeterReadingStore>,
    meters: Arc<dyn MeterStore>,
    directory: Arc<dyn UnitDirectory>,
    catalog: Arc<dyn ServiceCatalog>,
    scope: ScopeResolver,
    locks: Arc<CycleLocks>,
    clock: Arc<dyn Clock>,
}

impl AssignmentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        cycles: Arc<dyn ReadingCycleStore>,
        readings: Arc<dyn MeterReadingStore>,
        meters: Arc<dyn MeterStore>,
        directory: Arc<dyn UnitDirectory>,
        catalog: Arc<dyn ServiceCatalog>,
        locks: Arc<CycleLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scope = ScopeResolver::new(meters.clone(), directory.clone());
        Self {
            assignments,
            cycles,
            readings,
            meters,
            directory,
            catalog,
            scope,
            locks,
            clock,
        }
    }

    /// 创建抄表任务。
    pub async fn create_assignment(
        &self,
        ctx: &ActorContext,
        req: CreateAssignmentRequest,
    ) -> Result<AssignmentRecord, CoordinationError> {
        let _guard = self.locks.acquire(&req.cycle_id).await?;

        let cycle = self
            .cycles
            .find_cycle(&req.cycle_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", req.cycle_id.clone()))?;
        if matches!(
            cycle.status,
            domain::CycleStatus::Completed | domain::CycleStatus::Closed
        ) {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} is {}; no new assignments accepted",
                cycle.name,
                cycle.status.as_str()
            )));
        }
        if req.service_id != cycle.service_id {
            return Err(CoordinationError::validation(format!(
                "service {} does not match cycle service {}",
                req.service_id, cycle.service_id
            )));
        }
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
        if let Some(building_id) = req.building_id.as_deref() {
            let building = self
                .directory
                .find_building(building_id)
                .await
                .map_err(|err| CoordinationError::collaborator("directory", err.to_string()))?;
            if building.is_none() {
                return Err(CoordinationError::not_found("building", building_id));
            }
        }

        let window = DateWindow::new(
            req.start_date.unwrap_or(cycle.period_from),
            req.end_date.unwrap_or(cycle.period_to),
        );
        if window.start > window.end {
            return Err(CoordinationError::validation(format!(
                "assignment window is inverted: {window}"
            )));
        }
        if !cycle.window().encloses(&window) {
            return Err(CoordinationError::validation(format!(
                "assignment window {} must lie within cycle window {}",
                window,
                cycle.window()
            )));
        }
        self.check_cycle_month(&cycle)?;

        let today = self.clock.today();
        let now_ms = self.clock.now_ms();
        let candidate = AssignmentRecord {
            assignment_id: uuid::Uuid::new_v4().to_string(),
            cycle_id: cycle.cycle_id.clone(),
            service_id: req.service_id,
            building_id: req.building_id,
            floor: req.floor,
            unit_ids: req.unit_ids,
            assigned_to: req.assigned_to,
            assigned_by: ctx.user_id.clone(),
            assigned_at_ms: now_ms,
            start_date: window.start,
            end_date: window.end,
            status: AssignmentStatus::initial_for_window(today, window.start, window.end),
            completed_at_ms: None,
            reminder_last_sent: None,
            note: req.note,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };

        // 未限定楼栋的任务极少使用,不参与楼栋内冲突检测
        if candidate.building_id.is_some() {
            self.check_collision(&candidate).await?;
        }

        let required = self.scope.required_meters(&candidate).await?;
        if required.is_empty() {
            return Err(CoordinationError::validation(
                "no active meters in assignment scope",
            ));
        }

        let created = self.assignments.create_assignment(candidate).await?;
        record_assignment_created();
        info!(
            target: "mrc.assignment",
            assignment_id = %created.assignment_id,
            cycle_id = %created.cycle_id,
            building_id = ?created.building_id,
            scope = %scope_label(&created),
            window = %created.window(),
            assigned_to = %created.assigned_to,
            status = %created.status.as_str(),
            meters_in_scope = required.len(),
            actor = %ctx.user_id,
            "assignment_created"
        );
        Ok(created)
    }

    /// 完成任务：精确覆盖校验通过后落终态。
    pub async fn complete_assignment(
        &self,
        ctx: &ActorContext,
        assignment_id: &str,
    ) -> Result<AssignmentRecord, CoordinationError> {
        let found = self.find_required(assignment_id).await?;
        let _guard = self.locks.acquire(&found.cycle_id).await?;
        // 锁内重读,避免与并发完成/取消交错
        let assignment = self.find_required(assignment_id).await?;

        if assignment.assigned_to != ctx.user_id {
            return Err(CoordinationError::invalid_state(
                "only the assigned staff member can complete this assignment",
            ));
        }
        match assignment.status {
            AssignmentStatus::Completed => {
                return Err(CoordinationError::invalid_state(
                    "assignment is already completed",
                ));
            }
            AssignmentStatus::Cancelled => {
                return Err(CoordinationError::invalid_state(
                    "assignment is cancelled and cannot be completed",
                ));
            }
            _ => {}
        }

        self.check_exact_coverage(&assignment).await?;

        let now_ms = self.clock.now_ms();
        let updated = self
            .assignments
            .update_assignment(
                assignment_id,
                AssignmentUpdate {
                    status: Some(AssignmentStatus::Completed),
                    completed_at_ms: Some(now_ms),
                    updated_at_ms: Some(now_ms),
                    ..AssignmentUpdate::default()
                },
            )
            .await?
            .ok_or_else(|| CoordinationError::not_found("assignment", assignment_id))?;
        record_assignment_completed();
        info!(
            target: "mrc.assignment",
            assignment_id = %assignment_id,
            cycle_id = %updated.cycle_id,
            actor = %ctx.user_id,
            "assignment_completed"
        );
        Ok(updated)
    }

    /// 取消任务（终态；已完成的任务不可取消）。
    pub async fn cancel_assignment(
        &self,
        ctx: &ActorContext,
        assignment_id: &str,
    ) -> Result<AssignmentRecord, CoordinationError> {
        let found = self.find_required(assignment_id).await?;
        let _guard = self.locks.acquire(&found.cycle_id).await?;
        let assignment = self.find_required(assignment_id).await?;

        match assignment.status {
            AssignmentStatus::Completed => {
                return Err(CoordinationError::invalid_state(
                    "completed assignments cannot be cancelled",
                ));
            }
            AssignmentStatus::Cancelled => {
                return Err(CoordinationError::invalid_state(
                    "assignment is already cancelled",
                ));
            }
            _ => {}
        }
        let updated = self
            .assignments
            .update_assignment(
                assignment_id,
                AssignmentUpdate {
                    status: Some(AssignmentStatus::Cancelled),
                    updated_at_ms: Some(self.clock.now_ms()),
                    ..AssignmentUpdate::default()
                },
            )
            .await?
            .ok_or_else(|| CoordinationError::not_found("assignment", assignment_id))?;
        info!(
            target: "mrc.assignment",
            assignment_id = %assignment_id,
            actor = %ctx.user_id,
            "assignment_cancelled"
        );
        Ok(updated)
    }

    /// 删除任务（已完成的任务不可删除）。
    pub async fn delete_assignment(
        &self,
        ctx: &ActorContext,
        assignment_id: &str,
    ) -> Result<(), CoordinationError> {
        let found = self.find_required(assignment_id).await?;
        let _guard = self.locks.acquire(&found.cycle_id).await?;
        let assignment = self.find_required(assignment_id).await?;

        if assignment.status == AssignmentStatus::Completed {
            return Err(CoordinationError::invalid_state(
                "completed assignments cannot be deleted",
            ));
        }
        self.assignments.delete_assignment(assignment_id).await?;
        info!(
            target: "mrc.assignment",
            assignment_id = %assignment_id,
            actor = %ctx.user_id,
            "assignment_deleted"
        );
        Ok(())
    }

    /// 任务进度：从读数子集全量重算。
    pub async fn progress(
        &self,
        assignment_id: &str,
    ) -> Result<AssignmentProgressDto, CoordinationError> {
        let assignment = self.find_required(assignment_id).await?;
        let required = self.scope.required_meters(&assignment).await?;
        let total = required.len();
        // done 直接取去重后的已读表计数,记录器已保证读数落在任务范围内
        let read: BTreeSet<String> = self
            .readings
            .list_readings_by_assignment(assignment_id)
            .await?
            .into_iter()
            .map(|reading| reading.meter_id)
            .collect();
        let done = read.len();
        let percent = if total == 0 {
            0.0
        } else {
            (done as f64 * 10_000.0 / total as f64).round() / 100.0
        };
        Ok(AssignmentProgressDto {
            assignment_id: assignment.assignment_id,
            total_meters: total,
            completed_meters: done,
            remaining_meters: total.saturating_sub(done),
            percent,
            completed: assignment.completed_at_ms.is_some() || (total > 0 && done >= total),
        })
    }

    pub async fn get_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<AssignmentRecord, CoordinationError> {
        self.find_required(assignment_id).await
    }

    pub async fn list_by_cycle(
        &self,
        cycle_id: &str,
    ) -> Result<Vec<AssignmentRecord>, CoordinationError> {
        Ok(self.assignments.list_assignments_by_cycle(cycle_id).await?)
    }

    pub async fn list_by_staff(
        &self,
        user_id: &str,
    ) -> Result<Vec<AssignmentRecord>, CoordinationError> {
        Ok(self.assignments.list_assignments_by_assignee(user_id).await?)
    }

    /// 抄表员名下仍需跟进的任务（待办、进行中、逾期）。
    pub async fn list_active_by_staff(
        &self,
        user_id: &str,
    ) -> Result<Vec<AssignmentRecord>, CoordinationError> {
        let mut assignments = self.assignments.list_assignments_by_assignee(user_id).await?;
        assignments.retain(|assignment| assignment.status.is_active());
        Ok(assignments)
    }

    async fn find_required(
        &self,
        assignment_id: &str,
    ) -> Result<AssignmentRecord, CoordinationError> {
        self.assignments
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("assignment", assignment_id))
    }

    /// 只能为当月或下月的周期排班。
    fn check_cycle_month(&self, cycle: &ReadingCycleRecord) -> Result<(), CoordinationError> {
        let today = self.clock.today();
        let current = month_label(today);
        let next = month_label(next_month_first_day(today));
        let target = month_label(cycle.period_from);
        if target != current && target != next {
            return Err(CoordinationError::invalid_state(format!(
                "cycle {} is not in the current or next month (today {})",
                cycle.name, today
            )));
        }
        Ok(())
    }

    /// 楼栋内冲突检测：时间窗口相交且范围相交即冲突。
    async fn check_collision(
        &self,
        candidate: &AssignmentRecord,
    ) -> Result<(), CoordinationError> {
        let existing = self
            .assignments
            .list_assignments_by_cycle(&candidate.cycle_id)
            .await?;
        for other in existing.iter().filter(|other| {
            other.status.is_active()
                && other.service_id == candidate.service_id
                && other.building_id == candidate.building_id
        }) {
            if !candidate.window().intersects(&other.window()) {
                continue;
            }
            if scopes_intersect(
                candidate.floor_scope(),
                &candidate.unit_scope(),
                other.floor_scope(),
                &other.unit_scope(),
            ) {
                record_scope_conflict();
                return Err(CoordinationError::ScopeConflict(ScopeConflict::Overlap(
                    OverlapDetail {
                        existing_assignment_id: other.assignment_id.clone(),
                        existing_window: other.window(),
                        existing_scope: scope_label(other),
                        requested_window: candidate.window(),
                        requested_scope: scope_label(candidate),
                    },
                )));
            }
        }
        Ok(())
    }

    /// 精确覆盖校验：缺一不可，多一不行。
    async fn check_exact_coverage(
        &self,
        assignment: &AssignmentRecord,
    ) -> Result<(), CoordinationError> {
        let required = self.scope.required_meters(assignment).await?;
        if required.is_empty() {
            return Err(CoordinationError::validation(
                "assignment scope contains no active meters",
            ));
        }
        let required_ids: BTreeSet<&str> = required
            .iter()
            .map(|meter| meter.meter_id.as_str())
            .collect();
        let read_ids: BTreeSet<String> = self
            .readings
            .list_readings_by_assignment(&assignment.assignment_id)
            .await?
            .into_iter()
            .map(|reading| reading.meter_id)
            .collect();

        let missing: Vec<String> = required
            .iter()
            .filter(|meter| !read_ids.contains(&meter.meter_id))
            .map(|meter| meter.meter_code.clone())
            .collect();
        if !missing.is_empty() {
            record_scope_conflict();
            return Err(CoordinationError::ScopeConflict(
                ScopeConflict::MissingReadings {
                    meter_codes: missing,
                },
            ));
        }

        let mut extraneous = Vec::new();
        for meter_id in read_ids {
            if !required_ids.contains(meter_id.as_str()) {
                let code = self
                    .meters
                    .find_meter(&meter_id)
                    .await?
                    .map(|meter| meter.meter_code)
                    .unwrap_or(meter_id);
                extraneous.push(code);
            }
        }
        if !extraneous.is_empty() {
            extraneous.sort();
            record_scope_conflict();
            return Err(CoordinationError::ScopeConflict(
                ScopeConflict::ExtraneousReadings {
                    meter_codes: extraneous,
                },
            ));
        }
        Ok(())
    }
}

/// 任务记录转出口 DTO。
pub fn assignment_dto(record: &AssignmentRecord) -> AssignmentDto {
    AssignmentDto {
        assignment_id: record.assignment_id.clone(),
        cycle_id: record.cycle_id.clone(),
        service_id: record.service_id.clone(),
        building_id: record.building_id.clone(),
        floor: record.floor,
        unit_ids: record.unit_ids.clone(),
        assigned_to: record.assigned_to.clone(),
        assigned_by: record.assigned_by.clone(),
        assigned_at_ms: record.assigned_at_ms,
        start_date: record.start_date,
        end_date: record.end_date,
        status: record.status,
        completed_at_ms: record.completed_at_ms,
        reminder_last_sent: record.reminder_last_sent,
        note: record.note.clone(),
    }
}
