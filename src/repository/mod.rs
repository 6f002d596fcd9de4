//! Database repository layer
//!
//! 读取链路只依赖这里定义的三个接口；Postgres 实现位于各子模块。

pub mod actor_repo;
pub mod change_repo;
pub mod hierarchy_repo;

pub use actor_repo::*;
pub use change_repo::*;
pub use hierarchy_repo::*;

use crate::{
    db::HealthStatus,
    error::AppError,
    models::{ChangeFilter, ChangeRecord, EntityNode, EntityTable, NewChangeRecord, ParentMatch},
};
use async_trait::async_trait;
use std::collections::HashMap;

/// 变更日志存储：只追加，不更新也不删除
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// 追加一条记录，返回落库后的完整记录
    async fn append(&self, change: &NewChangeRecord) -> Result<ChangeRecord, AppError>;

    /// 按 changed_at 倒序返回匹配的记录，changed_at 相同时按插入顺序
    async fn query(&self, filter: &ChangeFilter, limit: i64) -> Result<Vec<ChangeRecord>, AppError>;

    /// 存储是否可用
    async fn health(&self) -> HealthStatus;
}

/// 实体层级数据源（由外部 CRUD 系统拥有，只读）
#[async_trait]
pub trait HierarchySource: Send + Sync {
    /// 读取单个实体及其父级引用；不存在时返回 None
    async fn find_node(&self, table: EntityTable, id: &str) -> Result<Option<EntityNode>, AppError>;

    /// 返回任一父级条件命中的子实体 id（条件之间为 OR）
    async fn child_ids(
        &self,
        table: EntityTable,
        matches: &[ParentMatch],
    ) -> Result<Vec<String>, AppError>;

    /// 批量读取显示名，缺失的 id 不出现在结果中
    async fn display_names(
        &self,
        table: EntityTable,
        ids: &[String],
    ) -> Result<HashMap<String, String>, AppError>;
}

/// 操作人目录（员工账号或外部代理账号）
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// 一次查询返回所有命中的 id -> 显示名
    async fn names_by_ids(&self, ids: &[String]) -> Result<HashMap<String, String>, AppError>;
}
