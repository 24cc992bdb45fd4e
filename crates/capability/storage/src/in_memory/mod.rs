//! 内存存储实现模块
//!
//! 仅用于本地演示和测试。
//!
//! 包含以下实现：
//! - ReadingCycleStore: InMemoryReadingCycleStore
//! - AssignmentStore: InMemoryAssignmentStore
//! - MeterStore: InMemoryMeterStore
//! - MeterReadingStore: InMemoryMeterReadingStore
//! - ReminderStore: InMemoryReminderStore

pub mod assignment;
pub mod cycle;
pub mod meter;
pub mod reading;
pub mod reminder;

pub use assignment::*;
pub use cycle::*;
pub use meter::*;
pub use reading::*;
pub use reminder::*;
