use std::fmt;

use chrono::{Datelike, NaiveDate};

/// 闭区间日期窗口。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 日期是否落在窗口内（含边界）。
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// 两个窗口是否相交（含边界）。
    pub fn intersects(&self, other: &DateWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// 本窗口是否完全包含另一个窗口。
    pub fn encloses(&self, other: &DateWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 月份标签：`YYYY-MM`。
pub fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// 两个日期是否属于同一个日历月。
pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// 当月第一天。
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// 当月第十五天（标准抄表窗口的结束日）。
pub fn mid_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 15).unwrap_or(date)
}

/// 下个月的第一天。
pub fn next_month_first_day(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// 当月最后一天。
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    next_month_first_day(date).pred_opt().unwrap_or(date)
}

/// 指定日期所在月的标准抄表窗口（1 日至 15 日）。
pub fn standard_reading_window(date: NaiveDate) -> DateWindow {
    DateWindow::new(first_day_of_month(date), mid_of_month(date))
}
