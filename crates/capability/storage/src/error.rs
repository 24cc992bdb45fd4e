//! 存储层错误类型
//!
//! 定义统一的存储错误类型，用于封装底层错误：
//! - 锁获取失败
//! - 重复主键
//! - 数据一致性错误

#[derive(Debug)]
pub struct StorageError {
    message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for domain::CoordinationError {
    fn from(err: StorageError) -> Self {
        domain::CoordinationError::Storage(err.to_string())
    }
}
