//! Actor directory repository (操作人目录)

use super::ActorDirectory;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

/// 两个互不重叠的身份池，解析时按此顺序尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorPool {
    /// 内部员工账号
    Staff,
    /// 外部代理账号
    Agent,
}

impl ActorPool {
    fn table(self) -> &'static str {
        match self {
            ActorPool::Staff => "users",
            ActorPool::Agent => "agents",
        }
    }
}

pub struct ActorRepository {
    db: PgPool,
    pool: ActorPool,
}

impl ActorRepository {
    pub fn new(db: PgPool, pool: ActorPool) -> Self {
        Self { db, pool }
    }

    pub fn staff(db: PgPool) -> Self {
        Self::new(db, ActorPool::Staff)
    }

    pub fn agents(db: PgPool) -> Self {
        Self::new(db, ActorPool::Agent)
    }
}

#[async_trait]
impl ActorDirectory for ActorRepository {
    async fn names_by_ids(&self, ids: &[String]) -> Result<HashMap<String, String>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, name FROM {} WHERE id = ANY($1)",
            self.pool.table()
        );
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().collect())
    }
}
