use chrono::{NaiveDate, Utc};

/// 时钟接口：为日期规则与时间戳提供可替换来源。
pub trait Clock: Send + Sync {
    /// 当前日历日期（UTC）。
    fn today(&self) -> NaiveDate;
    /// 当前 Unix 毫秒时间戳。
    fn now_ms(&self) -> i64;
}

/// 系统时钟。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// 固定时钟（仅用于测试）。
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub today: NaiveDate,
    pub now_ms: i64,
}

impl FixedClock {
    /// 固定在指定日期，时间戳从 0 开始。
    pub fn at(today: NaiveDate) -> Self {
        Self { today, now_ms: 0 }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now_ms(&self) -> i64 {
        self.now_ms
    }
}
