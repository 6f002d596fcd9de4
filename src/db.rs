//! 变更日志存储的 Postgres 连接
//!
//! 连接池在宿主进程启动时创建一次，交给 `ChangeLogService::from_pool`，
//! 之后由各个仓库共享持有；单次读写只从池里借用连接，不随请求开关。

use crate::{config::DatabaseConfig, error::AppError};
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 建立连接池
///
/// 连接失败属于存储不可用，返回 `AppError::Database`。
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Change store unreachable");
            e
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Change store pool ready"
    );

    Ok(pool)
}

/// 应用 change_records 及参考表的迁移
pub async fn migrate(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Change store migration failed");
            sqlx::Error::from(e)
        })?;

    tracing::info!("Change store schema up to date");
    Ok(())
}

/// 探测存储是否可用，同时刷新连接池指标
pub async fn ping(pool: &PgPool) -> HealthStatus {
    record_pool_gauges(pool);

    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Change store ping failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

pub fn record_pool_gauges(pool: &PgPool) {
    metrics::gauge!("change_store_pool_size").set(pool.size() as f64);
    metrics::gauge!("change_store_pool_idle").set(pool.num_idle() as f64);
}

/// 存储健康状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
