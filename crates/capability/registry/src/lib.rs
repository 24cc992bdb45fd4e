//! # MRC Registry 模块
//!
//! 表计台账能力：表计登记、生命周期、查询与抄表员工作清单。
//!
//! ## 规则
//!
//! - `meter_code` 全局唯一（登记与改号均校验）
//! - 同一（单元，服务）最多一只在用表计（登记时强制；历史停用表计可共存）
//! - 存在读数的表计不可删除，只能停用；历史读数永久有效
//!
//! 表计编号的生成不在本仓范围内，编号由调用方提供。

use std::collections::BTreeMap;
use std::sync::Arc;

use api_contract::{CreateMeterRequest, MeterDto, UpdateMeterRequest};
use domain::{ActorContext, Clock, CoordinationError};
use mrc_directory::{BuildingInfo, ServiceCatalog, ServiceInfo, UnitDirectory, UnitInfo};
use mrc_scope::ScopeResolver;
use mrc_storage::{
    AssignmentStore, MeterReadingRecord, MeterReadingStore, MeterRecord, MeterStore, MeterUpdate,
    ReadingCycleStore,
};
use tracing::info;

/// 无表计单元条目（运营提示清单）。
#[derive(Debug, Clone)]
pub struct UnmeteredUnit {
    pub unit: UnitInfo,
    pub building: Option<BuildingInfo>,
    pub service: ServiceInfo,
}

/// 抄表员工作清单条目：范围内表计及其本周期读数（或前值预填）。
#[derive(Debug, Clone)]
pub struct StaffMeterWorkItem {
    pub meter: MeterRecord,
    pub assignment_id: String,
    /// 本周期内已录入的读数（最新一条）
    pub current_reading: Option<MeterReadingRecord>,
    /// 未录入时的前值预填（周期前最近读数的本期止度；无历史为 0）
    pub prefill_prev_index: f64,
}

/// 表计台账服务。
pub struct MeterRegistry {
    meters: Arc<dyn MeterStore>,
    readings: Arc<dyn MeterReadingStore>,
    assignments: Arc<dyn AssignmentStore>,
    cycles: Arc<dyn ReadingCycleStore>,
    directory: Arc<dyn UnitDirectory>,
    catalog: Arc<dyn ServiceCatalog>,
    scope: ScopeResolver,
    clock: Arc<dyn Clock>,
}

impl MeterRegistry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        meters: Arc<dyn MeterStore>,
        readings: Arc<dyn MeterReadingStore>,
        assignments: Arc<dyn AssignmentStore>,
        cycles: Arc<dyn ReadingCycleStore>,
        directory: Arc<dyn UnitDirectory>,
        catalog: Arc<dyn ServiceCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scope = ScopeResolver::new(meters.clone(), directory.clone());
        Self {
            meters,
            readings,
            assignments,
            cycles,
            directory,
            catalog,
            scope,
            clock,
        }
    }

    /// 登记表计。
    pub async fn create_meter(
        &self,
        ctx: &ActorContext,
        req: CreateMeterRequest,
    ) -> Result<MeterRecord, CoordinationError> {
        let meter_code = req.meter_code.trim().to_string();
        if meter_code.is_empty() {
            return Err(CoordinationError::validation("meter code must not be empty"));
        }
        let unit = self
            .directory
            .find_unit(&req.unit_id)
            .await
            .map_err(|err| CoordinationError::collaborator("directory", err.to_string()))?;
        if unit.is_none() {
            return Err(CoordinationError::not_found("unit", req.unit_id));
        }
        let service = self
            .catalog
            .find_service(&req.service_id)
            .await
            .map_err(|err| CoordinationError::collaborator("catalog", err.to_string()))?;
        if service.is_none() {
            return Err(CoordinationError::not_found("service", req.service_id));
        }
        if self.meters.find_meter_by_code(&meter_code).await?.is_some() {
            return Err(CoordinationError::validation(format!(
                "meter code already in use: {meter_code}"
            )));
        }
        let existing_active = self
            .meters
            .list_meters_by_unit(&req.unit_id)
            .await?
            .into_iter()
            .any(|meter| meter.active && meter.service_id == req.service_id);
        if existing_active {
            return Err(CoordinationError::invalid_state(format!(
                "unit {} already has an active meter for service {}",
                req.unit_id, req.service_id
            )));
        }

        let now_ms = self.clock.now_ms();
        let record = MeterRecord {
            meter_id: uuid::Uuid::new_v4().to_string(),
            unit_id: req.unit_id,
            service_id: req.service_id,
            meter_code,
            active: true,
            installed_at: req.installed_at.unwrap_or_else(|| self.clock.today()),
            removed_at: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        let created = self.meters.create_meter(record).await?;
        info!(
            target: "mrc.registry",
            meter_id = %created.meter_id,
            meter_code = %created.meter_code,
            unit_id = %created.unit_id,
            service_id = %created.service_id,
            actor = %ctx.user_id,
            "meter_created"
        );
        Ok(created)
    }

    /// 更新表计（改号、启停、拆除日期）。
    pub async fn update_meter(
        &self,
        ctx: &ActorContext,
        meter_id: &str,
        req: UpdateMeterRequest,
    ) -> Result<MeterRecord, CoordinationError> {
        let current = self
            .meters
            .find_meter(meter_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("meter", meter_id))?;

        let mut update = MeterUpdate {
            updated_at_ms: Some(self.clock.now_ms()),
            ..MeterUpdate::default()
        };
        if let Some(code) = req.meter_code {
            let code = code.trim().to_string();
            if code.is_empty() {
                return Err(CoordinationError::validation("meter code must not be empty"));
            }
            if let Some(holder) = self.meters.find_meter_by_code(&code).await? {
                if holder.meter_id != current.meter_id {
                    return Err(CoordinationError::validation(format!(
                        "meter code already in use: {code}"
                    )));
                }
            }
            update.meter_code = Some(code);
        }
        // 拆除日期写入即意味着停用
        if let Some(removed_at) = req.removed_at {
            update.active = Some(false);
            update.removed_at = Some(Some(removed_at));
        } else if let Some(active) = req.active {
            update.active = Some(active);
            if active {
                update.removed_at = Some(None);
            } else if current.removed_at.is_none() {
                update.removed_at = Some(Some(self.clock.today()));
            }
        }

        let updated = self
            .meters
            .update_meter(meter_id, update)
            .await?
            .ok_or_else(|| CoordinationError::not_found("meter", meter_id))?;
        info!(
            target: "mrc.registry",
            meter_id = %updated.meter_id,
            meter_code = %updated.meter_code,
            active = updated.active,
            actor = %ctx.user_id,
            "meter_updated"
        );
        Ok(updated)
    }

    /// 停用表计（保留历史读数）。
    pub async fn deactivate_meter(
        &self,
        ctx: &ActorContext,
        meter_id: &str,
    ) -> Result<MeterRecord, CoordinationError> {
        self.update_meter(
            ctx,
            meter_id,
            UpdateMeterRequest {
                meter_code: None,
                active: Some(false),
                removed_at: None,
            },
        )
        .await
    }

    /// 删除表计：存在读数时拒绝（应改用停用）。
    pub async fn delete_meter(
        &self,
        ctx: &ActorContext,
        meter_id: &str,
    ) -> Result<(), CoordinationError> {
        let meter = self
            .meters
            .find_meter(meter_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("meter", meter_id))?;
        let readings = self.readings.list_readings_by_meter(meter_id).await?;
        if !readings.is_empty() {
            return Err(CoordinationError::invalid_state(format!(
                "meter {} has {} reading(s); deactivate instead of deleting",
                meter.meter_code,
                readings.len()
            )));
        }
        self.meters.delete_meter(meter_id).await?;
        info!(
            target: "mrc.registry",
            meter_id = %meter_id,
            meter_code = %meter.meter_code,
            actor = %ctx.user_id,
            "meter_deleted"
        );
        Ok(())
    }

    pub async fn get_meter(&self, meter_id: &str) -> Result<MeterRecord, CoordinationError> {
        self.meters
            .find_meter(meter_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("meter", meter_id))
    }

    pub async fn list_meters(&self) -> Result<Vec<MeterRecord>, CoordinationError> {
        Ok(self.meters.list_meters().await?)
    }

    pub async fn list_meters_by_unit(
        &self,
        unit_id: &str,
    ) -> Result<Vec<MeterRecord>, CoordinationError> {
        Ok(self.meters.list_meters_by_unit(unit_id).await?)
    }

    pub async fn list_meters_by_service(
        &self,
        service_id: &str,
        active_only: bool,
    ) -> Result<Vec<MeterRecord>, CoordinationError> {
        let mut meters = self.meters.list_meters_by_service(service_id).await?;
        if active_only {
            meters.retain(|meter| meter.active);
        }
        Ok(meters)
    }

    /// 楼栋内全部表计（经目录展开单元）。
    pub async fn list_meters_by_building(
        &self,
        building_id: &str,
    ) -> Result<Vec<MeterRecord>, CoordinationError> {
        let units = self
            .directory
            .units_in_building(building_id)
            .await
            .map_err(|err| CoordinationError::collaborator("directory", err.to_string()))?;
        let mut meters = Vec::new();
        for unit in units {
            meters.extend(self.meters.list_meters_by_unit(&unit.unit_id).await?);
        }
        meters.sort_by(|a, b| a.meter_code.cmp(&b.meter_code));
        Ok(meters)
    }

    /// 指定服务下无表计的单元清单（可限定楼栋）。
    ///
    /// 仅作运营提示，不参与周期完成闸门。
    pub async fn units_without_meter(
        &self,
        service_id: &str,
        building_id: Option<&str>,
    ) -> Result<Vec<UnmeteredUnit>, CoordinationError> {
        let service = self
            .catalog
            .find_service(service_id)
            .await
            .map_err(|err| CoordinationError::collaborator("catalog", err.to_string()))?
            .ok_or_else(|| CoordinationError::not_found("service", service_id))?;
        let units = match building_id {
            Some(building_id) => self
                .directory
                .units_in_building(building_id)
                .await
                .map_err(|err| CoordinationError::collaborator("directory", err.to_string()))?,
            None => self
                .directory
                .list_units()
                .await
                .map_err(|err| CoordinationError::collaborator("directory", err.to_string()))?,
        };
        let metered: std::collections::BTreeSet<String> = self
            .meters
            .list_meters_by_service(service_id)
            .await?
            .into_iter()
            .map(|meter| meter.unit_id)
            .collect();

        let mut buildings: BTreeMap<String, Option<BuildingInfo>> = BTreeMap::new();
        let mut result = Vec::new();
        for unit in units {
            if metered.contains(&unit.unit_id) {
                continue;
            }
            let building = match buildings.get(&unit.building_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self
                        .directory
                        .find_building(&unit.building_id)
                        .await
                        .unwrap_or(None);
                    buildings.insert(unit.building_id.clone(), found.clone());
                    found
                }
            };
            result.push(UnmeteredUnit {
                unit,
                building,
                service: service.clone(),
            });
        }
        Ok(result)
    }

    /// 任务范围展开后的必读表计清单。
    pub async fn meters_for_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<MeterRecord>, CoordinationError> {
        let assignment = self
            .assignments
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("assignment", assignment_id))?;
        self.scope.required_meters(&assignment).await
    }

    /// 抄表员在指定周期的工作清单。
    ///
    /// 名下各任务范围内的表计并集；每只表计带本周期最新读数，
    /// 未录入时带前值预填（周期前最近读数的止度，无历史为 0）。
    pub async fn meters_with_readings_for_staff(
        &self,
        staff_id: &str,
        cycle_id: &str,
    ) -> Result<Vec<StaffMeterWorkItem>, CoordinationError> {
        let cycle = self
            .cycles
            .find_cycle(cycle_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", cycle_id))?;
        let assignments = self
            .assignments
            .list_assignments_by_assignee_and_cycle(staff_id, cycle_id)
            .await?;

        let mut items: BTreeMap<String, StaffMeterWorkItem> = BTreeMap::new();
        for assignment in &assignments {
            for meter in self.scope.required_meters(assignment).await? {
                if items.contains_key(&meter.meter_code) {
                    continue;
                }
                let history = self.readings.list_readings_by_meter(&meter.meter_id).await?;
                let current_reading = latest_reading(
                    history
                        .iter()
                        .filter(|reading| reading.cycle_id.as_deref() == Some(cycle_id)),
                );
                let prefill_prev_index = latest_reading(
                    history
                        .iter()
                        .filter(|reading| reading.reading_date < cycle.period_from),
                )
                .map(|reading| reading.curr_index)
                .unwrap_or(0.0);
                items.insert(
                    meter.meter_code.clone(),
                    StaffMeterWorkItem {
                        meter,
                        assignment_id: assignment.assignment_id.clone(),
                        current_reading,
                        prefill_prev_index,
                    },
                );
            }
        }
        Ok(items.into_values().collect())
    }
}

/// 按（抄表日期，创建时刻）取最新读数。
fn latest_reading<'a, I>(readings: I) -> Option<MeterReadingRecord>
where
    I: Iterator<Item = &'a MeterReadingRecord>,
{
    readings
        .max_by_key(|reading| (reading.reading_date, reading.created_at_ms))
        .cloned()
}

/// 表计记录转出口 DTO。
pub fn meter_dto(record: &MeterRecord) -> MeterDto {
    MeterDto {
        meter_id: record.meter_id.clone(),
        unit_id: record.unit_id.clone(),
        service_id: record.service_id.clone(),
        meter_code: record.meter_code.clone(),
        active: record.active,
        installed_at: record.installed_at,
        removed_at: record.removed_at,
    }
}
