//! # MRC Directory 模块
//!
//! 主数据协作方的接口层：单元/楼栋目录、服务目录、付款人解析。
//!
//! 主数据本身（楼栋/单元维护、住户关系）不在本仓范围内，
//! 这里只定义协调服务消费主数据所需的最小异步接口，
//! 以及测试与演示用的内存实现。
//!
//! ## 接口
//!
//! - [`UnitDirectory`]：单元与楼栋解析、楼栋/楼层枚举、付款人查询
//! - [`ServiceCatalog`]：服务解析、启用中按表计费服务枚举
//!
//! ## 约定
//!
//! - 查询不到返回 `Ok(None)`；协作方故障返回 [`DirectoryError`]
//! - `payer_for_unit` 返回 `Ok(None)` 表示单元空置（无当前付款人）

use async_trait::async_trait;
use std::collections::HashMap;

/// 单元描述。
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub unit_id: String,
    pub code: String,
    pub building_id: String,
    pub floor: Option<i32>,
}

/// 楼栋描述。
#[derive(Debug, Clone)]
pub struct BuildingInfo {
    pub building_id: String,
    pub code: String,
    pub name: String,
}

/// 服务目录条目。
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub service_id: String,
    pub code: String,
    pub name: String,
    /// 是否按表计费（需要抄表）
    pub metered: bool,
    pub active: bool,
}

/// 目录协作方错误。
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// 单元/楼栋目录接口。
#[async_trait]
pub trait UnitDirectory: Send + Sync {
    /// 查找指定单元
    async fn find_unit(&self, unit_id: &str) -> Result<Option<UnitInfo>, DirectoryError>;

    /// 查找指定楼栋
    async fn find_building(
        &self,
        building_id: &str,
    ) -> Result<Option<BuildingInfo>, DirectoryError>;

    /// 列出全部单元
    async fn list_units(&self) -> Result<Vec<UnitInfo>, DirectoryError>;

    /// 列出指定楼栋的单元
    async fn units_in_building(&self, building_id: &str)
    -> Result<Vec<UnitInfo>, DirectoryError>;

    /// 列出指定楼栋指定楼层的单元
    async fn units_in_building_floor(
        &self,
        building_id: &str,
        floor: i32,
    ) -> Result<Vec<UnitInfo>, DirectoryError>;

    /// 解析单元当前付款人（空置单元返回 None）
    async fn payer_for_unit(&self, unit_id: &str) -> Result<Option<String>, DirectoryError>;
}

/// 服务目录接口。
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// 查找指定服务
    async fn find_service(&self, service_id: &str) -> Result<Option<ServiceInfo>, DirectoryError>;

    /// 列出启用中的按表计费服务
    async fn list_active_metered(&self) -> Result<Vec<ServiceInfo>, DirectoryError>;
}

/// 内存目录实现
///
/// 以固定主数据构造，仅用于测试和演示。
pub struct InMemoryDirectory {
    buildings: HashMap<String, BuildingInfo>,
    units: HashMap<String, UnitInfo>,
    payers: HashMap<String, String>,
}

impl InMemoryDirectory {
    /// 以固定主数据构造目录。
    pub fn with_fixtures(
        buildings: Vec<BuildingInfo>,
        units: Vec<UnitInfo>,
        payers: Vec<(String, String)>,
    ) -> Self {
        Self {
            buildings: buildings
                .into_iter()
                .map(|building| (building.building_id.clone(), building))
                .collect(),
            units: units
                .into_iter()
                .map(|unit| (unit.unit_id.clone(), unit))
                .collect(),
            payers: payers.into_iter().collect(),
        }
    }

    fn sorted_by_code(mut units: Vec<UnitInfo>) -> Vec<UnitInfo> {
        units.sort_by(|a, b| a.code.cmp(&b.code));
        units
    }
}

#[async_trait]
impl UnitDirectory for InMemoryDirectory {
    async fn find_unit(&self, unit_id: &str) -> Result<Option<UnitInfo>, DirectoryError> {
        Ok(self.units.get(unit_id).cloned())
    }

    async fn find_building(
        &self,
        building_id: &str,
    ) -> Result<Option<BuildingInfo>, DirectoryError> {
        Ok(self.buildings.get(building_id).cloned())
    }

    async fn list_units(&self) -> Result<Vec<UnitInfo>, DirectoryError> {
        Ok(Self::sorted_by_code(self.units.values().cloned().collect()))
    }

    async fn units_in_building(
        &self,
        building_id: &str,
    ) -> Result<Vec<UnitInfo>, DirectoryError> {
        let selected = self
            .units
            .values()
            .filter(|unit| unit.building_id == building_id)
            .cloned()
            .collect();
        Ok(Self::sorted_by_code(selected))
    }

    async fn units_in_building_floor(
        &self,
        building_id: &str,
        floor: i32,
    ) -> Result<Vec<UnitInfo>, DirectoryError> {
        let selected = self
            .units
            .values()
            .filter(|unit| unit.building_id == building_id && unit.floor == Some(floor))
            .cloned()
            .collect();
        Ok(Self::sorted_by_code(selected))
    }

    async fn payer_for_unit(&self, unit_id: &str) -> Result<Option<String>, DirectoryError> {
        Ok(self.payers.get(unit_id).cloned())
    }
}

/// 内存服务目录实现
pub struct InMemoryServiceCatalog {
    services: HashMap<String, ServiceInfo>,
}

impl InMemoryServiceCatalog {
    /// 以固定服务清单构造目录。
    pub fn with_services(services: Vec<ServiceInfo>) -> Self {
        Self {
            services: services
                .into_iter()
                .map(|service| (service.service_id.clone(), service))
                .collect(),
        }
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryServiceCatalog {
    async fn find_service(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceInfo>, DirectoryError> {
        Ok(self.services.get(service_id).cloned())
    }

    async fn list_active_metered(&self) -> Result<Vec<ServiceInfo>, DirectoryError> {
        let mut selected: Vec<ServiceInfo> = self
            .services
            .values()
            .filter(|service| service.active && service.metered)
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::with_fixtures(
            vec![BuildingInfo {
                building_id: "bldg-a".to_string(),
                code: "A".to_string(),
                name: "Block A".to_string(),
            }],
            vec![
                UnitInfo {
                    unit_id: "unit-301".to_string(),
                    code: "A-301".to_string(),
                    building_id: "bldg-a".to_string(),
                    floor: Some(3),
                },
                UnitInfo {
                    unit_id: "unit-401".to_string(),
                    code: "A-401".to_string(),
                    building_id: "bldg-a".to_string(),
                    floor: Some(4),
                },
            ],
            vec![("unit-301".to_string(), "resident-9".to_string())],
        )
    }

    #[tokio::test]
    async fn floor_enumeration_filters_units() {
        let directory = directory();
        let floor3 = directory
            .units_in_building_floor("bldg-a", 3)
            .await
            .expect("query");
        assert_eq!(floor3.len(), 1);
        assert_eq!(floor3[0].unit_id, "unit-301");

        let all = directory.units_in_building("bldg-a").await.expect("query");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn payer_lookup_distinguishes_vacant_units() {
        let directory = directory();
        let payer = directory.payer_for_unit("unit-301").await.expect("query");
        assert_eq!(payer.as_deref(), Some("resident-9"));

        let vacant = directory.payer_for_unit("unit-401").await.expect("query");
        assert!(vacant.is_none());
    }

    #[tokio::test]
    async fn catalog_lists_only_active_metered_services() {
        let catalog = InMemoryServiceCatalog::with_services(vec![
            ServiceInfo {
                service_id: "svc-electric".to_string(),
                code: "ELECTRIC".to_string(),
                name: "Electricity".to_string(),
                metered: true,
                active: true,
            },
            ServiceInfo {
                service_id: "svc-cleaning".to_string(),
                code: "CLEANING".to_string(),
                name: "Cleaning".to_string(),
                metered: false,
                active: true,
            },
            ServiceInfo {
                service_id: "svc-gas".to_string(),
                code: "GAS".to_string(),
                name: "Gas".to_string(),
                metered: true,
                active: false,
            },
        ]);

        let metered = catalog.list_active_metered().await.expect("query");
        assert_eq!(metered.len(), 1);
        assert_eq!(metered[0].code, "ELECTRIC");
    }
}
