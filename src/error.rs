//! 统一错误模型
//! 定义变更日志子系统的所有错误类型

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储不可用或底层查询失败，与"没有数据"严格区分
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 写入的变更记录不合法（缺少表名、主键或字段名）
    #[error("Invalid change record: {0}")]
    InvalidChange(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 是否为"存储不可用"状态
    ///
    /// 调用方可以据此渲染空状态，而不是错误页面；
    /// 但这个判断必须由调用方做出，存储层不会把它折叠为空结果。
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AppError::Database(_))
    }

    /// 获取稳定的错误码
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "STORE_UNAVAILABLE",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::InvalidChange(_) => "INVALID_CHANGE",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) => "Change log is temporarily unavailable".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::InvalidChange(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(_) => "Internal error".to_string(),
        }
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 派生校验失败统一视为非法写入
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = e
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        AppError::InvalidChange(format!("invalid fields: {}", fields.join(", ")))
    }
}
