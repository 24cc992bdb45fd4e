//! 抄表协调守护进程。
//!
//! 启动后装配内存存储与演示主数据，并运行三条后台扫描：
//!
//! - 周期供给：为每个活跃计量服务确保当月与次月的抄表周期存在
//! - 提醒扫描：为临近截止的抄表任务创建提醒
//! - 账单对账：把所有周期幂等镜像到账单侧
//!
//! 扫描间隔与提醒提前天数由 `MRC_*` 环境变量控制。

use std::sync::Arc;
use std::time::{Duration, Instant};

use api_contract::CreateMeterRequest;
use chrono::Datelike;
use domain::calendar::next_month_first_day;
use domain::{ActorContext, Clock, SystemClock};
use mrc_billing::{BillingMirror, BillingMirrorConfig, NoopBillingClient};
use mrc_config::AppConfig;
use mrc_cycle::CycleService;
use mrc_directory::{
    BuildingInfo, InMemoryDirectory, InMemoryServiceCatalog, ServiceCatalog, ServiceInfo, UnitInfo,
};
use mrc_registry::MeterRegistry;
use mrc_reminder::ReminderService;
use mrc_storage::{
    CycleLocks, InMemoryAssignmentStore, InMemoryMeterReadingStore, InMemoryMeterStore,
    InMemoryReadingCycleStore, InMemoryReminderStore,
};
use mrc_telemetry::{
    init_tracing, new_sweep_ids, record_billing_sync_latency_ms, record_reminder_sweep_latency_ms,
};
use tracing::{Instrument, error, info, warn};

/// 守护进程装配好的服务集。
struct Services {
    cycles: Arc<CycleService>,
    reminders: Arc<ReminderService>,
    mirror: Arc<BillingMirror>,
    registry: Arc<MeterRegistry>,
    catalog: Arc<dyn ServiceCatalog>,
    clock: Arc<dyn Clock>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let services = build_services(&config);
    seed_demo_meters(&services).await;

    info!(
        target: "mrc.coordinator",
        reminder_lead_days = config.reminder_lead_days,
        reminder_sweep_seconds = config.reminder_sweep_seconds,
        cycle_provision_seconds = config.cycle_provision_seconds,
        billing_sync_seconds = config.billing_sync_seconds,
        "coordinator_started"
    );

    let services = Arc::new(services);
    tokio::spawn(cycle_provision_loop(
        services.clone(),
        config.cycle_provision_seconds,
    ));
    tokio::spawn(reminder_sweep_loop(
        services.clone(),
        config.reminder_sweep_seconds,
    ));
    tokio::spawn(billing_sync_loop(
        services.clone(),
        config.billing_sync_seconds,
    ));

    tokio::signal::ctrl_c().await?;
    info!(target: "mrc.coordinator", "coordinator_stopped");
    Ok(())
}

/// 装配内存存储、演示主数据与全部能力服务。
fn build_services(config: &AppConfig) -> Services {
    let cycle_store = Arc::new(InMemoryReadingCycleStore::new());
    let assignment_store = Arc::new(InMemoryAssignmentStore::new());
    let meter_store = Arc::new(InMemoryMeterStore::new());
    let reading_store = Arc::new(InMemoryMeterReadingStore::new());
    let reminder_store = Arc::new(InMemoryReminderStore::new());
    let locks = Arc::new(CycleLocks::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let directory = Arc::new(demo_directory());
    let catalog: Arc<dyn ServiceCatalog> = Arc::new(demo_catalog());

    let mirror = Arc::new(BillingMirror::new(
        Arc::new(NoopBillingClient),
        cycle_store.clone(),
        reading_store.clone(),
        meter_store.clone(),
        directory.clone(),
        catalog.clone(),
        BillingMirrorConfig {
            max_retries: config.billing_max_retries,
            retry_backoff_ms: config.billing_retry_backoff_ms,
        },
    ));
    let cycles = Arc::new(
        CycleService::new(
            cycle_store.clone(),
            assignment_store.clone(),
            meter_store.clone(),
            directory.clone(),
            catalog.clone(),
            locks.clone(),
            clock.clone(),
        )
        .with_mirror(mirror.clone()),
    );
    let registry = Arc::new(MeterRegistry::new(
        meter_store.clone(),
        reading_store.clone(),
        assignment_store.clone(),
        cycle_store.clone(),
        directory.clone(),
        catalog.clone(),
        clock.clone(),
    ));
    let reminders = Arc::new(ReminderService::new(
        reminder_store,
        assignment_store,
        cycle_store,
        clock.clone(),
        config.reminder_lead_days,
    ));

    Services {
        cycles,
        reminders,
        mirror,
        registry,
        catalog,
        clock,
    }
}

/// 演示楼栋/单元/付款人主数据。
fn demo_directory() -> InMemoryDirectory {
    let buildings = vec![BuildingInfo {
        building_id: "bldg-a".to_string(),
        code: "A".to_string(),
        name: "Building A".to_string(),
    }];
    let units = vec![
        UnitInfo {
            unit_id: "unit-301".to_string(),
            code: "A-301".to_string(),
            building_id: "bldg-a".to_string(),
            floor: Some(3),
        },
        UnitInfo {
            unit_id: "unit-302".to_string(),
            code: "A-302".to_string(),
            building_id: "bldg-a".to_string(),
            floor: Some(3),
        },
        UnitInfo {
            unit_id: "unit-401".to_string(),
            code: "A-401".to_string(),
            building_id: "bldg-a".to_string(),
            floor: Some(4),
        },
    ];
    let payers = vec![
        ("unit-301".to_string(), "payer-301".to_string()),
        ("unit-302".to_string(), "payer-302".to_string()),
    ];
    InMemoryDirectory::with_fixtures(buildings, units, payers)
}

/// 演示服务目录：电与水为活跃计量服务。
fn demo_catalog() -> InMemoryServiceCatalog {
    InMemoryServiceCatalog::with_services(vec![
        ServiceInfo {
            service_id: "svc-electric".to_string(),
            code: "ELECTRIC".to_string(),
            name: "Electricity".to_string(),
            metered: true,
            active: true,
        },
        ServiceInfo {
            service_id: "svc-water".to_string(),
            code: "WATER".to_string(),
            name: "Water".to_string(),
            metered: true,
            active: true,
        },
    ])
}

/// 通过台账登记演示表计；重复启动时的冲突仅告警。
async fn seed_demo_meters(services: &Services) {
    let ctx = ActorContext::for_user("system");
    let seeds = [
        ("unit-301", "svc-electric", "EL-301"),
        ("unit-302", "svc-electric", "EL-302"),
        ("unit-401", "svc-electric", "EL-401"),
        ("unit-301", "svc-water", "WA-301"),
    ];
    for (unit_id, service_id, meter_code) in seeds {
        let request = CreateMeterRequest {
            unit_id: unit_id.to_string(),
            service_id: service_id.to_string(),
            meter_code: meter_code.to_string(),
            installed_at: None,
        };
        if let Err(err) = services.registry.create_meter(&ctx, request).await {
            warn!(
                target: "mrc.coordinator",
                meter_code,
                error = %err,
                "demo_meter_seed_skipped"
            );
        }
    }
}

/// 周期供给扫描：确保每个活跃计量服务的当月与次月周期存在。
async fn cycle_provision_loop(services: Arc<Services>, interval_seconds: u64) {
    let ctx = ActorContext::for_user("system");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        let ids = new_sweep_ids();
        let span = tracing::info_span!(
            "cycle_provision_sweep",
            sweep_id = %ids.sweep_id,
            trace_id = %ids.trace_id
        );
        provision_cycles(&services, &ctx).instrument(span).await;
    }
}

async fn provision_cycles(services: &Services, ctx: &ActorContext) {
    let today = services.clock.today();
    let next = next_month_first_day(today);
    let catalog_services = match services.catalog.list_active_metered().await {
        Ok(list) => list,
        Err(err) => {
            error!(
                target: "mrc.coordinator",
                error = %err,
                "cycle_provision_catalog_unavailable"
            );
            return;
        }
    };
    for service in catalog_services {
        for first_day in [today, next] {
            let result = services
                .cycles
                .ensure_monthly_cycle(ctx, first_day.year(), first_day.month(), &service.service_id)
                .await;
            match result {
                Ok(cycle) => {
                    // 幂等推送，已镜像的周期会被跳过
                    if let Err(err) = services.mirror.push_cycle(&cycle).await {
                        warn!(
                            target: "mrc.coordinator",
                            cycle_id = %cycle.cycle_id,
                            error = %err,
                            "cycle_provision_mirror_failed"
                        );
                    }
                }
                Err(err) => {
                    // 单个服务失败不影响其余服务的供给
                    warn!(
                        target: "mrc.coordinator",
                        service_id = %service.service_id,
                        year = first_day.year(),
                        month = first_day.month(),
                        error = %err,
                        "cycle_provision_failed"
                    );
                }
            }
        }
    }
}

/// 提醒扫描：为临近截止的任务创建提醒。
async fn reminder_sweep_loop(services: Arc<Services>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        let ids = new_sweep_ids();
        let span = tracing::info_span!(
            "reminder_sweep",
            sweep_id = %ids.sweep_id,
            trace_id = %ids.trace_id
        );
        async {
            let started = Instant::now();
            let today = services.clock.today();
            match services.reminders.process_due(today).await {
                Ok(summary) => {
                    record_reminder_sweep_latency_ms(started.elapsed().as_millis() as u64);
                    info!(
                        target: "mrc.coordinator",
                        matched = summary.matched,
                        created = summary.created,
                        skipped = summary.skipped,
                        "reminder_sweep_completed"
                    );
                }
                Err(err) => {
                    error!(
                        target: "mrc.coordinator",
                        error = %err,
                        "reminder_sweep_failed"
                    );
                }
            }
        }
        .instrument(span)
        .await;
    }
}

/// 账单对账扫描：幂等镜像所有周期。
async fn billing_sync_loop(services: Arc<Services>, interval_seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    loop {
        ticker.tick().await;
        let ids = new_sweep_ids();
        let span = tracing::info_span!(
            "billing_sync_sweep",
            sweep_id = %ids.sweep_id,
            trace_id = %ids.trace_id
        );
        async {
            let started = Instant::now();
            match services.mirror.sync_cycles().await {
                Ok(report) => {
                    record_billing_sync_latency_ms(started.elapsed().as_millis() as u64);
                    info!(
                        target: "mrc.coordinator",
                        scanned = report.scanned,
                        created = report.created,
                        skipped = report.skipped,
                        failed = report.failed,
                        "billing_sync_completed"
                    );
                }
                Err(err) => {
                    error!(
                        target: "mrc.coordinator",
                        error = %err,
                        "billing_sync_failed"
                    );
                }
            }
        }
        .instrument(span)
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_config() -> AppConfig {
        AppConfig {
            reminder_lead_days: 3,
            reminder_sweep_seconds: 3600,
            cycle_provision_seconds: 86_400,
            billing_sync_seconds: 86_400,
            billing_max_retries: 2,
            billing_retry_backoff_ms: 200,
        }
    }

    #[test]
    fn provisioning_month_pair_rolls_over_year_end() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 7).expect("valid date");
        let next = next_month_first_day(today);
        assert_eq!((next.year(), next.month(), next.day()), (2025, 1, 1));
    }

    #[tokio::test]
    async fn demo_fixtures_seed_catalog_and_meters() {
        let services = build_services(&test_config());
        seed_demo_meters(&services).await;

        let metered = services
            .catalog
            .list_active_metered()
            .await
            .expect("catalog");
        assert_eq!(metered.len(), 2);

        let meters = services.registry.list_meters().await.expect("meters");
        assert_eq!(meters.len(), 4);

        // 重复播种只告警，不产生重复表计
        seed_demo_meters(&services).await;
        let meters = services.registry.list_meters().await.expect("meters");
        assert_eq!(meters.len(), 4);
    }
}
