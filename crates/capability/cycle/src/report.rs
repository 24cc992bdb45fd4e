//! 周期未分配单元报告。
//!
//! "未分配"＝装有在用表计却不被本周期任何任务范围覆盖的单元。
//! 任务存在即算覆盖：已完成、已取消的任务照常计入（闸门关心的是
//! 分配是否存在，不是工作是否进行中）。无表计的单元单独罗列，
//! 仅作运营提示，从不阻塞周期完成。

use std::collections::{BTreeMap, BTreeSet};

use api_contract::{UnassignedFloorDto, UnassignedUnitsDto, UnitBriefDto};
use domain::CoordinationError;
use mrc_directory::{BuildingInfo, UnitInfo};
use tracing::warn;

use crate::CycleService;

/// 未分配单元的楼栋/楼层分组。
#[derive(Debug, Clone)]
pub struct UnassignedFloorGroup {
    pub building_id: Option<String>,
    pub building_code: Option<String>,
    pub building_name: Option<String>,
    pub floor: Option<i32>,
    pub unit_codes: Vec<String>,
}

/// 单元简要描述（缺表清单）。
#[derive(Debug, Clone)]
pub struct UnitBrief {
    pub unit_id: String,
    pub code: String,
    pub building_code: Option<String>,
    pub floor: Option<i32>,
}

/// 周期未分配单元报告。
#[derive(Debug, Clone)]
pub struct UnassignedUnitsReport {
    pub cycle_id: String,
    pub service_id: String,
    /// 仅统计装有在用表计的未分配单元
    pub total_unassigned: usize,
    pub floors: Vec<UnassignedFloorGroup>,
    pub message: String,
    /// 无该服务表计的单元（展示用，不阻塞闸门）
    pub units_without_meter: Vec<UnitBrief>,
}

impl From<&UnassignedUnitsReport> for UnassignedUnitsDto {
    fn from(report: &UnassignedUnitsReport) -> Self {
        UnassignedUnitsDto {
            cycle_id: report.cycle_id.clone(),
            service_id: report.service_id.clone(),
            total_unassigned: report.total_unassigned,
            floors: report
                .floors
                .iter()
                .map(|group| UnassignedFloorDto {
                    building_id: group.building_id.clone(),
                    building_code: group.building_code.clone(),
                    building_name: group.building_name.clone(),
                    floor: group.floor,
                    unit_codes: group.unit_codes.clone(),
                    count: group.unit_codes.len(),
                })
                .collect(),
            message: report.message.clone(),
            units_without_meter: report
                .units_without_meter
                .iter()
                .map(|unit| UnitBriefDto {
                    unit_id: unit.unit_id.clone(),
                    code: unit.code.clone(),
                    building_code: unit.building_code.clone(),
                    floor: unit.floor,
                })
                .collect(),
        }
    }
}

impl CycleService {
    /// 计算周期的未分配单元报告。
    ///
    /// `only_with_payer` 为真时剔除无付款人的单元：空置单元无法开票，
    /// 不应阻塞周期完成。付款人查询失败降级为"无付款人"并告警，
    /// 报告本身不失败。
    pub async fn unassigned_units(
        &self,
        cycle_id: &str,
        only_with_payer: bool,
    ) -> Result<UnassignedUnitsReport, CoordinationError> {
        let cycle = self.get_cycle(cycle_id).await?;
        let assignments = self.assignments.list_assignments_by_cycle(cycle_id).await?;

        // 覆盖集合：周期内全部任务（含已完成/已取消）的范围展开并集
        let mut covered: BTreeSet<String> = BTreeSet::new();
        for assignment in assignments
            .iter()
            .filter(|assignment| assignment.service_id == cycle.service_id)
        {
            covered.extend(self.scope.covered_unit_ids(assignment).await?);
        }

        let meters = self.meters.list_meters_by_service(&cycle.service_id).await?;
        let units_with_meter: BTreeSet<String> = meters
            .iter()
            .filter(|meter| meter.active)
            .map(|meter| meter.unit_id.clone())
            .collect();
        let units_with_any_meter: BTreeSet<String> =
            meters.iter().map(|meter| meter.unit_id.clone()).collect();

        let mut unassigned: Vec<String> = units_with_meter
            .difference(&covered)
            .cloned()
            .collect();
        if only_with_payer {
            let mut billable = Vec::new();
            for unit_id in unassigned {
                if self.unit_has_payer(&unit_id).await {
                    billable.push(unit_id);
                }
            }
            unassigned = billable;
        }

        let mut buildings: BTreeMap<String, Option<BuildingInfo>> = BTreeMap::new();
        let mut groups: BTreeMap<(Option<String>, Option<i32>), Vec<String>> = BTreeMap::new();
        for unit_id in &unassigned {
            let unit = self.lookup_unit(unit_id).await;
            let (key, code) = match unit {
                Some(unit) => (
                    (Some(unit.building_id.clone()), unit.floor),
                    unit.code.clone(),
                ),
                // 表计指向目录不认识的单元:归入未知分组,以 ID 代号
                None => ((None, None), unit_id.clone()),
            };
            groups.entry(key).or_default().push(code);
        }

        let mut floors = Vec::new();
        for ((building_id, floor), mut unit_codes) in groups {
            unit_codes.sort();
            let building = match &building_id {
                Some(id) => self.lookup_building(&mut buildings, id).await,
                None => None,
            };
            floors.push(UnassignedFloorGroup {
                building_id,
                building_code: building.as_ref().map(|info| info.code.clone()),
                building_name: building.as_ref().map(|info| info.name.clone()),
                floor,
                unit_codes,
            });
        }

        let mut units_without_meter = Vec::new();
        let all_units = match self.directory.list_units().await {
            Ok(units) => units,
            Err(err) => {
                warn!(
                    target: "mrc.cycle",
                    cycle_id = %cycle_id,
                    error = %err,
                    "unassigned_report_unit_listing_failed"
                );
                Vec::new()
            }
        };
        for unit in all_units {
            if units_with_any_meter.contains(&unit.unit_id) {
                continue;
            }
            if only_with_payer && !self.unit_has_payer(&unit.unit_id).await {
                continue;
            }
            let building = self.lookup_building(&mut buildings, &unit.building_id).await;
            units_without_meter.push(UnitBrief {
                unit_id: unit.unit_id,
                code: unit.code,
                building_code: building.map(|info| info.code),
                floor: unit.floor,
            });
        }
        units_without_meter.sort_by(|a, b| a.code.cmp(&b.code));

        let message = summary_message(&cycle.name, unassigned.len(), &floors);
        Ok(UnassignedUnitsReport {
            cycle_id: cycle.cycle_id,
            service_id: cycle.service_id,
            total_unassigned: unassigned.len(),
            floors,
            message,
            units_without_meter,
        })
    }

    /// 付款人查询失败降级为"无付款人"，报告不失败。
    async fn unit_has_payer(&self, unit_id: &str) -> bool {
        match self.directory.payer_for_unit(unit_id).await {
            Ok(payer) => payer.is_some(),
            Err(err) => {
                warn!(
                    target: "mrc.cycle",
                    unit_id = %unit_id,
                    error = %err,
                    "payer_lookup_failed_treated_as_vacant"
                );
                false
            }
        }
    }

    async fn lookup_unit(&self, unit_id: &str) -> Option<UnitInfo> {
        self.directory.find_unit(unit_id).await.unwrap_or(None)
    }

    async fn lookup_building(
        &self,
        cache: &mut BTreeMap<String, Option<BuildingInfo>>,
        building_id: &str,
    ) -> Option<BuildingInfo> {
        if let Some(cached) = cache.get(building_id) {
            return cached.clone();
        }
        let found = self
            .directory
            .find_building(building_id)
            .await
            .unwrap_or(None);
        cache.insert(building_id.to_string(), found.clone());
        found
    }
}

fn summary_message(cycle_name: &str, total: usize, floors: &[UnassignedFloorGroup]) -> String {
    if total == 0 {
        return format!("cycle {cycle_name}: every metered unit is covered by an assignment");
    }
    let mut lines = Vec::new();
    for group in floors {
        let building = group
            .building_code
            .as_deref()
            .unwrap_or("unknown building");
        let floor = match group.floor {
            Some(level) => format!("floor {level}"),
            None => "no floor".to_string(),
        };
        lines.push(format!(
            "{} {}: {}",
            building,
            floor,
            group.unit_codes.join(", ")
        ));
    }
    format!(
        "cycle {cycle_name}: {total} metered unit(s) without an assignment: {}",
        lines.join("; ")
    )
}
