//! # MRC Billing 模块
//!
//! 账单协作能力：向外部账单系统镜像账期、对账扫描、读数批量导出。
//!
//! ## 设计要点
//!
//! - 镜像调用与周期创建事务解耦：`push_cycle_detached` 后台推送，
//!   失败只记日志，绝不回滚周期创建
//! - 幂等：推送前先按外部周期 ID 查询，已存在即跳过
//! - 对账：`sync_cycles` 周期性全量扫描补齐漏推的账期
//! - 导出行携带 `external_reading_id`（= 读数 ID），接收方可幂等重放

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use domain::CoordinationError;
use mrc_directory::{ServiceCatalog, UnitDirectory};
use mrc_storage::{MeterReadingStore, MeterStore, ReadingCycleRecord, ReadingCycleStore};
use mrc_telemetry::{
    record_billing_push_failure, record_billing_push_success, record_billing_reading_exported,
    record_billing_reading_skipped,
};
use tracing::{info, warn};

/// 账单协作方错误。
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("billing collaborator unavailable: {0}")]
    Unavailable(String),
}

/// 外部账单系统中的账期记录。
#[derive(Debug, Clone)]
pub struct BillingPeriod {
    pub period_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    /// 本服务周期 ID，作为幂等键
    pub external_cycle_id: String,
}

/// 账期创建输入。
#[derive(Debug, Clone)]
pub struct NewBillingPeriod {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub external_cycle_id: String,
}

/// 导出到账单系统的单条读数。
#[derive(Debug, Clone)]
pub struct BillingReadingExport {
    /// 读数 ID，接收方按此幂等重放
    pub external_reading_id: String,
    pub unit_id: String,
    pub payer_id: Option<String>,
    pub cycle_id: String,
    pub reading_date: NaiveDate,
    pub usage: f64,
    pub service_code: String,
    pub description: String,
}

/// 账单导入结果摘要。
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingImportSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// 账单协作方抽象。
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// 按外部周期 ID 查询已镜像的账期
    async fn find_periods_by_external_id(
        &self,
        external_cycle_id: &str,
    ) -> Result<Vec<BillingPeriod>, BillingError>;

    /// 创建账期
    async fn create_period(&self, period: NewBillingPeriod) -> Result<BillingPeriod, BillingError>;

    /// 导入读数批次
    async fn import_readings(
        &self,
        readings: Vec<BillingReadingExport>,
    ) -> Result<BillingImportSummary, BillingError>;
}

/// 空账单客户端（用于占位：全部成功、无副作用）。
#[derive(Debug, Default)]
pub struct NoopBillingClient;

#[async_trait]
impl BillingClient for NoopBillingClient {
    async fn find_periods_by_external_id(
        &self,
        _external_cycle_id: &str,
    ) -> Result<Vec<BillingPeriod>, BillingError> {
        Ok(Vec::new())
    }

    async fn create_period(&self, period: NewBillingPeriod) -> Result<BillingPeriod, BillingError> {
        Ok(BillingPeriod {
            period_id: uuid::Uuid::new_v4().to_string(),
            name: period.name,
            start_date: period.start_date,
            end_date: period.end_date,
            status: period.status,
            external_cycle_id: period.external_cycle_id,
        })
    }

    async fn import_readings(
        &self,
        _readings: Vec<BillingReadingExport>,
    ) -> Result<BillingImportSummary, BillingError> {
        Ok(BillingImportSummary::default())
    }
}

/// 记录型账单客户端（测试用）。
///
/// 捕获全部创建的账期与导入批次；可预置失败次数模拟协作方故障。
#[derive(Default)]
pub struct RecordingBillingClient {
    state: std::sync::Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    periods: Vec<BillingPeriod>,
    imports: Vec<Vec<BillingReadingExport>>,
    fail_next_creates: usize,
}

impl RecordingBillingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置接下来 `count` 次 `create_period` 调用失败。
    pub fn fail_next_creates(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_creates = count;
        }
    }

    /// 已创建的账期快照。
    pub fn created_periods(&self) -> Vec<BillingPeriod> {
        self.state
            .lock()
            .map(|state| state.periods.clone())
            .unwrap_or_default()
    }

    /// 已导入的读数批次快照。
    pub fn imported_batches(&self) -> Vec<Vec<BillingReadingExport>> {
        self.state
            .lock()
            .map(|state| state.imports.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BillingClient for RecordingBillingClient {
    async fn find_periods_by_external_id(
        &self,
        external_cycle_id: &str,
    ) -> Result<Vec<BillingPeriod>, BillingError> {
        let state = self
            .state
            .lock()
            .map_err(|_| BillingError::Unavailable("lock failed".to_string()))?;
        Ok(state
            .periods
            .iter()
            .filter(|period| period.external_cycle_id == external_cycle_id)
            .cloned()
            .collect())
    }

    async fn create_period(&self, period: NewBillingPeriod) -> Result<BillingPeriod, BillingError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BillingError::Unavailable("lock failed".to_string()))?;
        if state.fail_next_creates > 0 {
            state.fail_next_creates -= 1;
            return Err(BillingError::Unavailable("scripted failure".to_string()));
        }
        let created = BillingPeriod {
            period_id: stable_period_id(&period.external_cycle_id),
            name: period.name,
            start_date: period.start_date,
            end_date: period.end_date,
            status: period.status,
            external_cycle_id: period.external_cycle_id,
        };
        state.periods.push(created.clone());
        Ok(created)
    }

    async fn import_readings(
        &self,
        readings: Vec<BillingReadingExport>,
    ) -> Result<BillingImportSummary, BillingError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BillingError::Unavailable("lock failed".to_string()))?;
        let accepted = readings.len();
        state.imports.push(readings);
        Ok(BillingImportSummary {
            accepted,
            rejected: 0,
        })
    }
}

/// 由周期 ID 派生稳定账期 ID（v5，重复推送得到同一标识）。
pub fn stable_period_id(external_cycle_id: &str) -> String {
    uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_URL,
        format!("mrc-billing-period:{external_cycle_id}").as_bytes(),
    )
    .to_string()
}

/// 单次镜像推送的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// 账单侧新建了账期
    Created,
    /// 账单侧已有该周期的账期，跳过
    Skipped,
}

/// 对账扫描结果。
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingSyncReport {
    pub scanned: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 镜像推送配置。
#[derive(Debug, Clone, Copy)]
pub struct BillingMirrorConfig {
    pub max_retries: u64,
    pub retry_backoff_ms: u64,
}

impl Default for BillingMirrorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

/// 账单镜像服务。
///
/// 周期创建走 `push_cycle_detached`（后台、尽力而为）；
/// `sync_cycles` 为独立的幂等对账扫描。
pub struct BillingMirror {
    client: Arc<dyn BillingClient>,
    cycles: Arc<dyn ReadingCycleStore>,
    readings: Arc<dyn MeterReadingStore>,
    meters: Arc<dyn MeterStore>,
    directory: Arc<dyn UnitDirectory>,
    catalog: Arc<dyn ServiceCatalog>,
    config: BillingMirrorConfig,
}

impl BillingMirror {
    pub fn new(
        client: Arc<dyn BillingClient>,
        cycles: Arc<dyn ReadingCycleStore>,
        readings: Arc<dyn MeterReadingStore>,
        meters: Arc<dyn MeterStore>,
        directory: Arc<dyn UnitDirectory>,
        catalog: Arc<dyn ServiceCatalog>,
        config: BillingMirrorConfig,
    ) -> Self {
        Self {
            client,
            cycles,
            readings,
            meters,
            directory,
            catalog,
            config,
        }
    }

    /// 幂等推送单个周期的账期镜像。
    ///
    /// 先按外部周期 ID 查询；已存在即跳过。创建按配置重试。
    pub async fn push_cycle(
        &self,
        cycle: &ReadingCycleRecord,
    ) -> Result<MirrorOutcome, CoordinationError> {
        let existing = self
            .find_existing_with_retry(&cycle.cycle_id)
            .await
            .map_err(|err| {
                record_billing_push_failure();
                CoordinationError::collaborator("billing", err.to_string())
            })?;
        if !existing.is_empty() {
            info!(
                target: "mrc.billing",
                cycle_id = %cycle.cycle_id,
                "billing_mirror_skipped"
            );
            return Ok(MirrorOutcome::Skipped);
        }

        let period = self.period_for_cycle(cycle).await;
        match self.create_with_retry(period).await {
            Ok(created) => {
                record_billing_push_success();
                info!(
                    target: "mrc.billing",
                    cycle_id = %cycle.cycle_id,
                    period_id = %created.period_id,
                    period_name = %created.name,
                    "billing_mirror_created"
                );
                Ok(MirrorOutcome::Created)
            }
            Err(err) => {
                record_billing_push_failure();
                Err(CoordinationError::collaborator("billing", err.to_string()))
            }
        }
    }

    /// 后台推送周期镜像（尽力而为，失败仅告警）。
    pub fn push_cycle_detached(self: &Arc<Self>, cycle: ReadingCycleRecord) {
        let mirror = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = mirror.push_cycle(&cycle).await {
                warn!(
                    target: "mrc.billing",
                    cycle_id = %cycle.cycle_id,
                    error = %err,
                    "billing_mirror_push_failed"
                );
            }
        });
    }

    /// 对账扫描：遍历全部周期,补齐账单侧缺失的账期。
    pub async fn sync_cycles(&self) -> Result<BillingSyncReport, CoordinationError> {
        let cycles = self.cycles.list_cycles().await?;
        let mut report = BillingSyncReport {
            scanned: cycles.len(),
            ..BillingSyncReport::default()
        };
        for cycle in cycles {
            match self.push_cycle(&cycle).await {
                Ok(MirrorOutcome::Created) => report.created += 1,
                Ok(MirrorOutcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        target: "mrc.billing",
                        cycle_id = %cycle.cycle_id,
                        error = %err,
                        "billing_sync_cycle_failed"
                    );
                }
            }
        }
        info!(
            target: "mrc.billing",
            scanned = report.scanned,
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "billing_sync_done"
        );
        Ok(report)
    }

    /// 导出一个周期（可选限定单元）的最终读数批次。
    ///
    /// 无法解析表计/单元/服务或用量为负的行跳过并告警；
    /// 付款人缺失允许导出（账单侧决定如何处理空置单元）。
    pub async fn export_cycle_readings(
        &self,
        cycle_id: &str,
        unit_id: Option<&str>,
    ) -> Result<BillingImportSummary, CoordinationError> {
        let cycle = self
            .cycles
            .find_cycle(cycle_id)
            .await?
            .ok_or_else(|| CoordinationError::not_found("cycle", cycle_id))?;
        let service_code = self
            .catalog
            .find_service(&cycle.service_id)
            .await
            .map_err(|err| CoordinationError::collaborator("catalog", err.to_string()))?
            .map(|service| service.code)
            .ok_or_else(|| CoordinationError::not_found("service", cycle.service_id.clone()))?;

        let readings = self.readings.list_readings_by_cycle(cycle_id).await?;
        let mut batch = Vec::new();
        for reading in readings {
            if let Some(unit_id) = unit_id {
                if reading.unit_id != unit_id {
                    continue;
                }
            }
            let usage = reading.curr_index - reading.prev_index;
            if usage < 0.0 {
                record_billing_reading_skipped();
                warn!(
                    target: "mrc.billing",
                    reading_id = %reading.reading_id,
                    usage,
                    "billing_export_negative_usage_skipped"
                );
                continue;
            }
            let meter = self.meters.find_meter(&reading.meter_id).await?;
            let Some(meter) = meter else {
                record_billing_reading_skipped();
                warn!(
                    target: "mrc.billing",
                    reading_id = %reading.reading_id,
                    meter_id = %reading.meter_id,
                    "billing_export_meter_missing_skipped"
                );
                continue;
            };
            // 付款人解析失败降级为空置，不中断导出
            let payer_id = match self.directory.payer_for_unit(&reading.unit_id).await {
                Ok(payer) => payer,
                Err(err) => {
                    warn!(
                        target: "mrc.billing",
                        unit_id = %reading.unit_id,
                        error = %err,
                        "billing_export_payer_lookup_failed"
                    );
                    None
                }
            };
            if payer_id.is_none() {
                warn!(
                    target: "mrc.billing",
                    reading_id = %reading.reading_id,
                    unit_id = %reading.unit_id,
                    "billing_export_no_payer"
                );
            }
            record_billing_reading_exported();
            batch.push(BillingReadingExport {
                external_reading_id: reading.reading_id.clone(),
                unit_id: reading.unit_id.clone(),
                payer_id,
                cycle_id: cycle_id.to_string(),
                reading_date: reading.reading_date,
                usage,
                service_code: service_code.clone(),
                description: format!("{} {} ({})", service_code, cycle.name, meter.meter_code),
            });
        }

        if batch.is_empty() {
            return Ok(BillingImportSummary::default());
        }
        let exported = batch.len();
        let summary = self
            .client
            .import_readings(batch)
            .await
            .map_err(|err| CoordinationError::collaborator("billing", err.to_string()))?;
        info!(
            target: "mrc.billing",
            cycle_id = %cycle_id,
            exported,
            accepted = summary.accepted,
            rejected = summary.rejected,
            "billing_export_done"
        );
        Ok(summary)
    }

    /// 镜像账期覆盖周期月份的 1 日至 24 日，名称含服务编码。
    async fn period_for_cycle(&self, cycle: &ReadingCycleRecord) -> NewBillingPeriod {
        let service_code = match self.catalog.find_service(&cycle.service_id).await {
            Ok(Some(service)) => service.code,
            _ => cycle.service_id.clone(),
        };
        let from = cycle.period_from;
        let start = NaiveDate::from_ymd_opt(from.year(), from.month(), 1).unwrap_or(from);
        let end = NaiveDate::from_ymd_opt(from.year(), from.month(), 24).unwrap_or(from);
        NewBillingPeriod {
            name: format!("{} • {}", cycle.name, service_code),
            start_date: start,
            end_date: end,
            status: "OPEN".to_string(),
            external_cycle_id: cycle.cycle_id.clone(),
        }
    }

    async fn find_existing_with_retry(
        &self,
        external_cycle_id: &str,
    ) -> Result<Vec<BillingPeriod>, BillingError> {
        let mut attempt = 0;
        loop {
            match self
                .client
                .find_periods_by_external_id(external_cycle_id)
                .await
            {
                Ok(periods) => return Ok(periods),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                }
            }
        }
    }

    async fn create_with_retry(
        &self,
        period: NewBillingPeriod,
    ) -> Result<BillingPeriod, BillingError> {
        let mut attempt = 0;
        loop {
            match self.client.create_period(period.clone()).await {
                Ok(created) => return Ok(created),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                }
            }
        }
    }
}
