//! # MRC Scope 模块
//!
//! 抄表任务范围的解析能力：
//! - 覆盖单元集合（显式单元 ∪ 楼栋/楼层展开）
//! - 范围内必读表计（服务的在用表计按范围过滤）
//! - 单元是否落在任务范围内
//! - 范围相交判定（冲突检测的纯函数，见 [`scopes_intersect`]）
//!
//! 范围语义：`building_id` 限定楼栋，`floor` 为空表示整栋，
//! `unit_ids` 为空表示范围片内全部单元。

use std::collections::BTreeSet;
use std::sync::Arc;

use domain::CoordinationError;
pub use domain::scopes_intersect;
use mrc_directory::{DirectoryError, UnitDirectory};
use mrc_storage::{AssignmentRecord, MeterRecord, MeterStore};

fn directory_unavailable(err: DirectoryError) -> CoordinationError {
    CoordinationError::collaborator("directory", err.to_string())
}

/// 任务范围解析器。
#[derive(Clone)]
pub struct ScopeResolver {
    meters: Arc<dyn MeterStore>,
    directory: Arc<dyn UnitDirectory>,
}

impl ScopeResolver {
    pub fn new(meters: Arc<dyn MeterStore>, directory: Arc<dyn UnitDirectory>) -> Self {
        Self { meters, directory }
    }

    /// 任务范围覆盖的单元 ID 集合。
    ///
    /// 显式单元列表与楼栋/楼层展开取并集；两者可同时存在。
    pub async fn covered_unit_ids(
        &self,
        assignment: &AssignmentRecord,
    ) -> Result<BTreeSet<String>, CoordinationError> {
        let mut covered: BTreeSet<String> = assignment
            .unit_ids
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();

        if let Some(building_id) = assignment.building_id.as_deref() {
            let units = match assignment.floor {
                Some(floor) => self
                    .directory
                    .units_in_building_floor(building_id, floor)
                    .await
                    .map_err(directory_unavailable)?,
                None => self
                    .directory
                    .units_in_building(building_id)
                    .await
                    .map_err(directory_unavailable)?,
            };
            covered.extend(units.into_iter().map(|unit| unit.unit_id));
        }

        Ok(covered)
    }

    /// 单元是否落在任务范围内。
    ///
    /// 依次校验单元集合成员、楼栋一致、楼层匹配；
    /// 未限定楼栋且未限定楼层时只看单元集合。
    pub async fn unit_in_scope(
        &self,
        assignment: &AssignmentRecord,
        unit_id: &str,
    ) -> Result<bool, CoordinationError> {
        if !assignment.unit_scope().contains(unit_id) {
            return Ok(false);
        }
        if assignment.building_id.is_none() && assignment.floor.is_none() {
            return Ok(true);
        }

        let unit = self
            .directory
            .find_unit(unit_id)
            .await
            .map_err(directory_unavailable)?;
        let Some(unit) = unit else {
            return Ok(false);
        };
        if let Some(building_id) = assignment.building_id.as_deref() {
            if unit.building_id != building_id {
                return Ok(false);
            }
        }
        Ok(assignment.floor_scope().matches(unit.floor))
    }

    /// 任务范围内必读的表计（服务的在用表计按范围过滤，按编号排序）。
    pub async fn required_meters(
        &self,
        assignment: &AssignmentRecord,
    ) -> Result<Vec<MeterRecord>, CoordinationError> {
        let meters = self
            .meters
            .list_meters_by_service(&assignment.service_id)
            .await?;
        let mut required = Vec::new();
        for meter in meters.into_iter().filter(|meter| meter.active) {
            if self.unit_in_scope(assignment, &meter.unit_id).await? {
                required.push(meter);
            }
        }
        required.sort_by(|a, b| a.meter_code.cmp(&b.meter_code));
        Ok(required)
    }
}

/// 冲突详情中的范围描述（楼层 + 单元集合）。
pub fn scope_label(assignment: &AssignmentRecord) -> String {
    format!(
        "{}, {}",
        assignment.floor_scope(),
        assignment.unit_scope()
    )
}
