//! # MRC Reading 模块
//!
//! 读数记录能力：录入、前值推导、范围校验与按键更新。
//!
//! ## 规则
//!
//! - 前值缺省自动续接：取该表计最近一次读数（按抄表日期，
//!   同日按创建时刻）的止度；无历史读数为 0
//! - 止度不得小于前值（负用量永远非法），校验通过才落库
//! - 挂任务的读数必须落在任务范围内（楼栋一致、楼层匹配、
//!   单元集合成员）
//! - 同一（表计，任务）至多一行：重复提交原地覆盖，不追加
//! - 用量 = 止度 − 前值，仅在出口 DTO 上现算，永不落库

use std::sync::Arc;

use api_contract::{MeterReadingDto, RecordReadingRequest, UpdateReadingRequest};
use domain::{ActorContext, Clock, CoordinationError};
use mrc_directory::UnitDirectory;
use mrc_scope::ScopeResolver;
use mrc_storage::{
    AssignmentStore, CycleLocks, MeterReadingRecord, MeterReadingStore, MeterReadingUpdate,
    MeterStore,
};
use mrc_telemetry::{record_reading_recorded, record_reading_updated};
use tracing::info;

/// 读数记录服务。
pub struct ReadingService {
    readings: Arc<dyn MeterReadingStore>,
    meters: Arc<dyn MeterStore>,
    assignments: Arc<dyn AssignmentStore>,
    scope: ScopeResolver,
    locks: Arc<CycleLocks>,
    clock: Arc<dyn Clock>,
}

impl ReadingService {
    pub fn new(
        readings: Arc<dyn MeterReadingStore>,
        meters: Arc<dyn MeterStore>,
        assignments: Arc<dyn AssignmentStore>,
        directory: Arc<dyn UnitDirectory>,
        locks: Arc<CycleLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scope = ScopeResolver::new(meters.clone(), directory);
        Self {
            readings,
            meters,
            assignments,
            scope,
            locks,
            clock,
        }
    }

    /// 录入读数（同一表计同一任务重复提交为原地覆盖）。
    pub async fn record_reading(
        &self,
        ctx: &ActorContext,
        req: RecordReadingRequest,
    ) -> Result<MeterReadingRecord, CoordinationError> {
        let meter = self
            .meters
            .find_meter(&req.meter_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("meter", req.meter_id.clone()))?;

        let assignment = match req.assignment_id.as_deref() {
            Some(assignment_id) => Some(
                self.assignments
                    .find_assignment(assignment_id)
                    .await?
                    .ok_or_else(|| CoordinationError::not_found("assignment", assignment_id))?,
            ),
            None => None,
        };

        // 挂任务的写入持周期锁,与完成校验串行
        let _guard = match &assignment {
            Some(assignment) => Some(self.locks.acquire(&assignment.cycle_id).await?),
            None => None,
        };

        if let Some(assignment) = &assignment {
            let in_scope = self.scope.unit_in_scope(assignment, &meter.unit_id).await?;
            if !in_scope {
                return Err(CoordinationError::validation(format!(
                    "meter {} (unit {}) is outside the assignment scope",
                    meter.meter_code, meter.unit_id
                )));
            }
        }

        let existing = match &assignment {
            Some(assignment) => {
                self.readings
                    .find_reading_by_meter_and_assignment(
                        &meter.meter_id,
                        &assignment.assignment_id,
                    )
                    .await?
            }
            None => None,
        };

        let prev_index = match req.prev_index {
            Some(prev) => prev,
            None => {
                self.derive_prev_index(
                    &meter.meter_id,
                    req.reading_date,
                    existing.as_ref().map(|reading| reading.reading_id.as_str()),
                )
                .await?
            }
        };
        if req.curr_index < prev_index {
            return Err(CoordinationError::validation(format!(
                "current index {} is below previous index {}",
                req.curr_index, prev_index
            )));
        }

        let reader_id = req.reader_id.unwrap_or_else(|| ctx.user_id.clone());
        let cycle_id = req
            .cycle_id
            .or_else(|| assignment.as_ref().map(|a| a.cycle_id.clone()));
        let now_ms = self.clock.now_ms();

        let record = if let Some(existing) = existing {
            // 按（表计,任务）自然键覆盖,不产生第二行
            let update = MeterReadingUpdate {
                reading_date: Some(req.reading_date),
                prev_index: Some(prev_index),
                curr_index: Some(req.curr_index),
                note: req.note,
                photo_file_id: req.photo_file_id,
                reader_id: Some(reader_id),
                cycle_id,
                read_at_ms: Some(now_ms),
                updated_at_ms: Some(now_ms),
            };
            let updated = self
                .readings
                .update_reading(&existing.reading_id, update)
                .await?
                .ok_or_else(|| {
                    CoordinationError::not_found("reading", existing.reading_id.clone())
                })?;
            record_reading_updated();
            info!(
                target: "mrc.reading",
                reading_id = %updated.reading_id,
                meter_code = %meter.meter_code,
                assignment_id = ?updated.assignment_id,
                curr_index = updated.curr_index,
                actor = %reader_or(ctx, &updated.reader_id),
                "reading_replaced"
            );
            updated
        } else {
            let record = MeterReadingRecord {
                reading_id: uuid::Uuid::new_v4().to_string(),
                meter_id: meter.meter_id.clone(),
                unit_id: meter.unit_id.clone(),
                assignment_id: req.assignment_id,
                cycle_id,
                reading_date: req.reading_date,
                prev_index,
                curr_index: req.curr_index,
                note: req.note,
                reader_id,
                photo_file_id: req.photo_file_id,
                read_at_ms: now_ms,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            };
            let created = self.readings.create_reading(record).await?;
            record_reading_recorded();
            info!(
                target: "mrc.reading",
                reading_id = %created.reading_id,
                meter_code = %meter.meter_code,
                assignment_id = ?created.assignment_id,
                prev_index = created.prev_index,
                curr_index = created.curr_index,
                actor = %reader_or(ctx, &created.reader_id),
                "reading_recorded"
            );
            created
        };
        Ok(record)
    }

    /// 修正读数（部分字段），重校验止度不小于前值。
    pub async fn update_reading(
        &self,
        ctx: &ActorContext,
        reading_id: &str,
        req: UpdateReadingRequest,
    ) -> Result<MeterReadingRecord, CoordinationError> {
        let current = self
            .readings
            .find_reading(reading_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("reading", reading_id))?;

        let prev_index = req.prev_index.unwrap_or(current.prev_index);
        let curr_index = req.curr_index.unwrap_or(current.curr_index);
        if curr_index < prev_index {
            return Err(CoordinationError::validation(format!(
                "current index {curr_index} is below previous index {prev_index}"
            )));
        }

        let now_ms = self.clock.now_ms();
        let update = MeterReadingUpdate {
            reading_date: req.reading_date,
            prev_index: req.prev_index,
            curr_index: req.curr_index,
            note: req.note,
            photo_file_id: req.photo_file_id,
            reader_id: None,
            cycle_id: None,
            read_at_ms: Some(now_ms),
            updated_at_ms: Some(now_ms),
        };
        let updated = self
            .readings
            .update_reading(reading_id, update)
            .await?
            .ok_or_else(|| CoordinationError::not_found("reading", reading_id))?;
        record_reading_updated();
        info!(
            target: "mrc.reading",
            reading_id = %reading_id,
            curr_index = updated.curr_index,
            actor = %ctx.user_id,
            "reading_corrected"
        );
        Ok(updated)
    }

    pub async fn get_reading(
        &self,
        reading_id: &str,
    ) -> Result<MeterReadingRecord, CoordinationError> {
        self.readings
            .find_reading(reading_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("reading", reading_id))
    }

    pub async fn list_by_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, CoordinationError> {
        Ok(self.readings.list_readings_by_assignment(assignment_id).await?)
    }

    /// 周期内读数（可选按单元过滤）。
    pub async fn list_by_cycle(
        &self,
        cycle_id: &str,
        unit_id: Option<&str>,
    ) -> Result<Vec<MeterReadingRecord>, CoordinationError> {
        let mut readings = self.readings.list_readings_by_cycle(cycle_id).await?;
        if let Some(unit_id) = unit_id {
            readings.retain(|reading| reading.unit_id == unit_id);
        }
        Ok(readings)
    }

    pub async fn list_by_meter(
        &self,
        meter_id: &str,
    ) -> Result<Vec<MeterReadingRecord>, CoordinationError> {
        Ok(self.readings.list_readings_by_meter(meter_id).await?)
    }

    /// 推导前值：该表计不晚于抄表日的最近读数止度；无历史为 0。
    ///
    /// 覆盖场景下排除被覆盖的那行自身。
    async fn derive_prev_index(
        &self,
        meter_id: &str,
        reading_date: chrono::NaiveDate,
        exclude_reading_id: Option<&str>,
    ) -> Result<f64, CoordinationError> {
        let history = self.readings.list_readings_by_meter(meter_id).await?;
        Ok(history
            .iter()
            .filter(|reading| Some(reading.reading_id.as_str()) != exclude_reading_id)
            .filter(|reading| reading.reading_date <= reading_date)
            .max_by_key(|reading| (reading.reading_date, reading.created_at_ms))
            .map(|reading| reading.curr_index)
            .unwrap_or(0.0))
    }
}

fn reader_or<'a>(ctx: &'a ActorContext, reader_id: &'a str) -> &'a str {
    if ctx.user_id.is_empty() {
        reader_id
    } else {
        &ctx.user_id
    }
}

/// 读数记录转出口 DTO（用量在此现算）。
pub fn reading_dto(record: &MeterReadingRecord) -> MeterReadingDto {
    MeterReadingDto {
        reading_id: record.reading_id.clone(),
        meter_id: record.meter_id.clone(),
        unit_id: record.unit_id.clone(),
        assignment_id: record.assignment_id.clone(),
        cycle_id: record.cycle_id.clone(),
        reading_date: record.reading_date,
        prev_index: record.prev_index,
        curr_index: record.curr_index,
        usage: record.curr_index - record.prev_index,
        note: record.note.clone(),
        reader_id: record.reader_id.clone(),
        photo_file_id: record.photo_file_id.clone(),
        read_at_ms: record.read_at_ms,
    }
}
