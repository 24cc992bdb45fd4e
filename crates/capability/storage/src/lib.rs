//! # MRC Storage 模块
//!
//! 本模块提供抄表协调服务的统一存储抽象层。
//!
//! ## 架构设计
//!
//! 该模块采用分层架构，遵循以下原则：
//!
//! 1. **接口抽象层** (`traits.rs`)：定义所有资源存储的异步 Trait 接口
//! 2. **数据模型层** (`models.rs`)：定义存储相关的数据结构
//! 3. **错误处理层** (`error.rs`)：统一的存储错误类型
//! 4. **并发控制层** (`locks.rs`)：周期级写锁表
//! 5. **实现层**：
//!    - `in_memory/`：内存存储实现（用于测试和演示；持久化技术不在本仓范围内）
//!
//! ## 核心特性
//!
//! - **类型化状态**：周期与任务状态以领域枚举存放，转移规则在领域层集中定义
//! - **单写者周期**：`CycleLocks` 保证同一周期的"检查后写入"序列串行执行
//! - **异步支持**：基于 Tokio 的异步接口，读路径无锁
//! - **可扩展性**：通过 Trait 接口支持多种存储后端
//!
//! ## 数据模型
//!
//! 本模块定义以下数据模型：
//!
//! - **ReadingCycleRecord**：抄表周期（cycle_id, service_id, name, period_from/to, status）
//! - **AssignmentRecord**：抄表任务（assignment_id, cycle_id, 范围字段, 窗口, status）
//! - **MeterRecord**：表计（meter_id, unit_id, service_id, meter_code, active）
//! - **MeterReadingRecord**：表计读数（reading_id, meter_id, prev/curr_index, reading_date）
//! - **ReminderRecord**：抄表提醒（reminder_id, assignment_id, due_date, acknowledged_at_ms）
//!
//! ## 设计约束
//!
//! - **规则在服务层**：存储只做过滤与写入，业务校验统一在各能力服务中
//! - **用量不落库**：读数用量始终由 `curr_index - prev_index` 现算
//! - **冗余字段**：读数上的 `unit_id`、`cycle_id` 为检索冗余，写入时由服务层填充

// 模块导出：将子模块的内容导出到 crate 根目录
pub mod error;
pub mod in_memory;
pub mod locks;
pub mod models;
pub mod traits;

// 导出常用类型到 crate 根目录，方便外部引用
pub use error::*;
pub use locks::*;
pub use models::*;
pub use traits::*;

// 导出内存存储实现类型
pub use in_memory::{
    InMemoryAssignmentStore, InMemoryMeterReadingStore, InMemoryMeterStore,
    InMemoryReadingCycleStore, InMemoryReminderStore,
};
