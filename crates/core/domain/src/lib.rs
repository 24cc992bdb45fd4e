pub mod calendar;
pub mod clock;
pub mod error;
pub mod scope;
pub mod status;

pub use calendar::DateWindow;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoordinationError, OverlapDetail, ScopeConflict};
pub use scope::{FloorScope, UnitScope, scopes_intersect};
pub use status::{AssignmentStatus, CycleStatus};

/// 操作者上下文：所有模块共享的执行上下文。
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub user_id: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
}

impl ActorContext {
    /// 构造显式身份的操作者上下文。
    pub fn new(
        user_id: impl Into<String>,
        display_name: Option<String>,
        roles: Vec<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name,
            roles,
        }
    }

    /// 仅携带用户 ID 的上下文。
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self::new(user_id, None, Vec::new())
    }
}

impl Default for ActorContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self {
            user_id: "".to_string(),
            display_name: None,
            roles: Vec::new(),
        }
    }
}
