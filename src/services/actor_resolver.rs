//! 操作人显示名解析

use crate::{error::AppError, repository::ActorDirectory};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct ActorNameResolver {
    staff: Arc<dyn ActorDirectory>,
    agents: Arc<dyn ActorDirectory>,
}

impl ActorNameResolver {
    pub fn new(staff: Arc<dyn ActorDirectory>, agents: Arc<dyn ActorDirectory>) -> Self {
        Self { staff, agents }
    }

    /// 解析单个操作人；None 表示系统操作
    pub async fn resolve(&self, actor_id: &str) -> Result<Option<String>, AppError> {
        let names = self.resolve_batch([actor_id]).await?;
        Ok(names.get(actor_id).cloned())
    }

    /// 批量解析
    ///
    /// 先收集全部去重后的 id，再依次查询员工目录和代理目录，
    /// 无论多少条记录最多两次查询。两个目录都没有命中且 id 含 `@` 时，
    /// 直接把它当作邮箱地址返回。
    pub async fn resolve_batch<I, S>(&self, actor_ids: I) -> Result<HashMap<String, String>, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pending: BTreeSet<String> = actor_ids
            .into_iter()
            .map(|id| id.as_ref().to_string())
            .filter(|id| !id.trim().is_empty())
            .collect();

        if pending.is_empty() {
            return Ok(HashMap::new());
        }

        let pending: Vec<String> = pending.into_iter().collect();
        let mut names = self.staff.names_by_ids(&pending).await?;

        let remaining: Vec<String> = pending
            .iter()
            .filter(|id| !names.contains_key(*id))
            .cloned()
            .collect();

        if !remaining.is_empty() {
            let agent_names = self.agents.names_by_ids(&remaining).await?;
            for id in &remaining {
                if let Some(name) = agent_names.get(id) {
                    names.insert(id.clone(), name.clone());
                } else if id.contains('@') {
                    names.insert(id.clone(), id.clone());
                }
            }
        }

        tracing::debug!(
            requested = pending.len(),
            resolved = names.len(),
            "Actor names resolved"
        );

        Ok(names)
    }
}
