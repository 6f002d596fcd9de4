//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use crate::error::AppError;
use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

/// 变更日志查询相关配置
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// 调用方未指定时的默认条数
    pub default_limit: i64,
    /// 单次查询允许的最大条数
    pub max_limit: i64,
    /// 整条读取链路的超时时间（毫秒）
    pub query_timeout_ms: u64,
    /// 单次显示名批量查询的最大 id 数
    pub enrich_batch_size: usize,
}

impl AuditConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// 本次查询的条数：未指定时取默认值，超出 [1, max_limit] 直接拒绝
    ///
    /// 日志不分页，也不做截断。
    pub fn resolve_limit(&self, requested: Option<i64>) -> Result<i64, AppError> {
        match requested {
            None => Ok(self.default_limit),
            Some(n) if n < 1 => Err(AppError::BadRequest("limit must be at least 1".to_string())),
            Some(n) if n > self.max_limit => Err(AppError::BadRequest(format!(
                "limit must not exceed {}",
                self.max_limit
            ))),
            Some(n) => Ok(n),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 500,
            query_timeout_ms: 5000,
            enrich_batch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("audit.default_limit", 50)?
            .set_default("audit.max_limit", 500)?
            .set_default("audit.query_timeout_ms", 5000)?
            .set_default("audit.enrich_batch_size", 500)?;

        // 从环境变量加载配置（前缀为 CATALOG_）
        settings = settings.add_source(
            Environment::with_prefix("CATALOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.audit.default_limit < 1 || self.audit.max_limit < 1 {
            return Err(ConfigError::Message(
                "audit limits must be positive".to_string(),
            ));
        }

        if self.audit.default_limit > self.audit.max_limit {
            return Err(ConfigError::Message(
                "audit.default_limit must be <= audit.max_limit".to_string(),
            ));
        }

        if self.audit.query_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "audit.query_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.audit.enrich_batch_size == 0 {
            return Err(ConfigError::Message(
                "audit.enrich_batch_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
