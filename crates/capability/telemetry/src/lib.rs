//! 追踪与巡检 ID 生成。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 巡检轮次追踪标识。
#[derive(Debug, Clone)]
pub struct SweepIds {
    pub sweep_id: String,
    pub trace_id: String,
}

/// 基础指标快照（MVP）。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub cycles_created: u64,
    pub cycles_completed: u64,
    pub assignments_created: u64,
    pub assignments_completed: u64,
    pub scope_conflicts: u64,
    pub readings_recorded: u64,
    pub readings_updated: u64,
    pub reminders_sent: u64,
    pub reminders_skipped: u64,
    pub billing_push_success: u64,
    pub billing_push_failure: u64,
    pub billing_readings_exported: u64,
    pub billing_readings_skipped: u64,
    pub reminder_sweep_latency_ms_total: u64,
    pub reminder_sweep_latency_ms_count: u64,
    pub billing_sync_latency_ms_total: u64,
    pub billing_sync_latency_ms_count: u64,
}

/// 基础指标（MVP）。
pub struct TelemetryMetrics {
    cycles_created: AtomicU64,
    cycles_completed: AtomicU64,
    assignments_created: AtomicU64,
    assignments_completed: AtomicU64,
    scope_conflicts: AtomicU64,
    readings_recorded: AtomicU64,
    readings_updated: AtomicU64,
    reminders_sent: AtomicU64,
    reminders_skipped: AtomicU64,
    billing_push_success: AtomicU64,
    billing_push_failure: AtomicU64,
    billing_readings_exported: AtomicU64,
    billing_readings_skipped: AtomicU64,
    reminder_sweep_latency_ms_total: AtomicU64,
    reminder_sweep_latency_ms_count: AtomicU64,
    billing_sync_latency_ms_total: AtomicU64,
    billing_sync_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            cycles_created: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            assignments_created: AtomicU64::new(0),
            assignments_completed: AtomicU64::new(0),
            scope_conflicts: AtomicU64::new(0),
            readings_recorded: AtomicU64::new(0),
            readings_updated: AtomicU64::new(0),
            reminders_sent: AtomicU64::new(0),
            reminders_skipped: AtomicU64::new(0),
            billing_push_success: AtomicU64::new(0),
            billing_push_failure: AtomicU64::new(0),
            billing_readings_exported: AtomicU64::new(0),
            billing_readings_skipped: AtomicU64::new(0),
            reminder_sweep_latency_ms_total: AtomicU64::new(0),
            reminder_sweep_latency_ms_count: AtomicU64::new(0),
            billing_sync_latency_ms_total: AtomicU64::new(0),
            billing_sync_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_created: self.cycles_created.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            assignments_created: self.assignments_created.load(Ordering::Relaxed),
            assignments_completed: self.assignments_completed.load(Ordering::Relaxed),
            scope_conflicts: self.scope_conflicts.load(Ordering::Relaxed),
            readings_recorded: self.readings_recorded.load(Ordering::Relaxed),
            readings_updated: self.readings_updated.load(Ordering::Relaxed),
            reminders_sent: self.reminders_sent.load(Ordering::Relaxed),
            reminders_skipped: self.reminders_skipped.load(Ordering::Relaxed),
            billing_push_success: self.billing_push_success.load(Ordering::Relaxed),
            billing_push_failure: self.billing_push_failure.load(Ordering::Relaxed),
            billing_readings_exported: self.billing_readings_exported.load(Ordering::Relaxed),
            billing_readings_skipped: self.billing_readings_skipped.load(Ordering::Relaxed),
            reminder_sweep_latency_ms_total: self
                .reminder_sweep_latency_ms_total
                .load(Ordering::Relaxed),
            reminder_sweep_latency_ms_count: self
                .reminder_sweep_latency_ms_count
                .load(Ordering::Relaxed),
            billing_sync_latency_ms_total: self
                .billing_sync_latency_ms_total
                .load(Ordering::Relaxed),
            billing_sync_latency_ms_count: self
                .billing_sync_latency_ms_count
                .load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例（MVP）。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 sweep_id 与 trace_id。
pub fn new_sweep_ids() -> SweepIds {
    SweepIds {
        sweep_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录周期创建次数。
pub fn record_cycle_created() {
    metrics().cycles_created.fetch_add(1, Ordering::Relaxed);
}

/// 记录周期进入 COMPLETED 次数。
pub fn record_cycle_completed() {
    metrics().cycles_completed.fetch_add(1, Ordering::Relaxed);
}

/// 记录任务创建次数。
pub fn record_assignment_created() {
    metrics()
        .assignments_created
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录任务完成次数。
pub fn record_assignment_completed() {
    metrics()
        .assignments_completed
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录范围冲突拒绝次数（重叠或覆盖校验失败）。
pub fn record_scope_conflict() {
    metrics().scope_conflicts.fetch_add(1, Ordering::Relaxed);
}

/// 记录读数录入次数。
pub fn record_reading_recorded() {
    metrics().readings_recorded.fetch_add(1, Ordering::Relaxed);
}

/// 记录读数修正次数。
pub fn record_reading_updated() {
    metrics().readings_updated.fetch_add(1, Ordering::Relaxed);
}

/// 记录提醒发送次数。
pub fn record_reminder_sent() {
    metrics().reminders_sent.fetch_add(1, Ordering::Relaxed);
}

/// 记录提醒跳过次数（当天已发或上一条未确认）。
pub fn record_reminder_skipped() {
    metrics().reminders_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录账单侧推送成功次数。
pub fn record_billing_push_success() {
    metrics()
        .billing_push_success
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录账单侧推送失败次数（重试耗尽）。
pub fn record_billing_push_failure() {
    metrics()
        .billing_push_failure
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录读数导出条数。
pub fn record_billing_reading_exported() {
    metrics()
        .billing_readings_exported
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录读数导出跳过条数（表计/单元无法解析或用量非法）。
pub fn record_billing_reading_skipped() {
    metrics()
        .billing_readings_skipped
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录提醒巡检耗时（毫秒）。
pub fn record_reminder_sweep_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .reminder_sweep_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .reminder_sweep_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录账单同步巡检耗时（毫秒）。
pub fn record_billing_sync_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .billing_sync_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .billing_sync_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
