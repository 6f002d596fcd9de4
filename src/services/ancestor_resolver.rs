//! 祖先解析
//!
//! 从变更记录的 (source_table, source_key) 出发，沿子 -> 父方向逐跳查询，
//! 得到由近及远的祖先链。

use crate::{
    error::AppError,
    models::{AncestorHints, AncestorLink, EntityNode, EntityTable},
    repository::HierarchySource,
};
use std::collections::HashMap;
use std::sync::Arc;

/// 单次请求内的节点缓存，避免同一父级被重复查询
type NodeCache = HashMap<(EntityTable, String), Option<EntityNode>>;

pub struct AncestorResolver {
    hierarchy: Arc<dyn HierarchySource>,
}

impl AncestorResolver {
    pub fn new(hierarchy: Arc<dyn HierarchySource>) -> Self {
        Self { hierarchy }
    }

    /// 解析单条记录的祖先链
    pub async fn resolve(
        &self,
        source_table: &str,
        source_key: &str,
    ) -> Result<Vec<AncestorLink>, AppError> {
        let mut cache = NodeCache::new();
        let nodes = self.walk(source_table, source_key, &mut cache).await?;
        Ok(nodes.iter().map(to_link).collect())
    }

    /// 批量解析，同一请求内共享节点缓存
    pub async fn resolve_many(
        &self,
        sources: &[(String, String)],
    ) -> Result<HashMap<(String, String), Vec<AncestorLink>>, AppError> {
        let mut cache = NodeCache::new();
        let mut chains = HashMap::with_capacity(sources.len());

        for (table, key) in sources {
            if chains.contains_key(&(table.clone(), key.clone())) {
                continue;
            }
            let nodes = self.walk(table, key, &mut cache).await?;
            chains.insert(
                (table.clone(), key.clone()),
                nodes.iter().map(to_link).collect(),
            );
        }

        Ok(chains)
    }

    /// 祖先节点本身（由近及远），不含起点
    pub async fn ancestor_nodes(
        &self,
        source_table: &str,
        source_key: &str,
    ) -> Result<Vec<EntityNode>, AppError> {
        let mut cache = NodeCache::new();
        self.walk(source_table, source_key, &mut cache).await
    }

    /// 根据当前层级数据推导写入时的冗余祖先 id
    pub async fn hints_for(
        &self,
        source_table: &str,
        source_key: &str,
    ) -> Result<AncestorHints, AppError> {
        let mut hints = AncestorHints::default();

        if let Some(field) = EntityTable::from_name(source_table).and_then(|t| t.hint()) {
            hints.set(field, Some(source_key.to_string()));
        }

        for node in self.ancestor_nodes(source_table, source_key).await? {
            if let Some(field) = node.table.hint() {
                hints.set(field, Some(node.id));
            }
        }

        Ok(hints)
    }

    async fn walk(
        &self,
        source_table: &str,
        source_key: &str,
        cache: &mut NodeCache,
    ) -> Result<Vec<EntityNode>, AppError> {
        let Some(table) = EntityTable::from_name(source_table) else {
            tracing::debug!(source_table, "Table not wired into any tree, empty ancestor chain");
            return Ok(Vec::new());
        };

        let mut chain = Vec::new();
        let Some(mut current) = self.node(table, source_key, cache).await? else {
            return Ok(chain);
        };

        // 父级深度严格小于子级，循环必然终止
        while let Some((parent_table, parent_id)) = current.preferred_parent() {
            let parent_id = parent_id.to_string();
            match self.node(parent_table, &parent_id, cache).await? {
                Some(parent) => {
                    chain.push(parent.clone());
                    current = parent;
                }
                None => {
                    tracing::debug!(
                        table = parent_table.name(),
                        id = %parent_id,
                        "Ancestor missing, chain truncated"
                    );
                    break;
                }
            }
        }

        Ok(chain)
    }

    async fn node(
        &self,
        table: EntityTable,
        id: &str,
        cache: &mut NodeCache,
    ) -> Result<Option<EntityNode>, AppError> {
        let cache_key = (table, id.to_string());
        if let Some(cached) = cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let node = self.hierarchy.find_node(table, id).await?;
        cache.insert(cache_key, node.clone());
        Ok(node)
    }
}

fn to_link(node: &EntityNode) -> AncestorLink {
    AncestorLink {
        level_name: node.table.level_name().to_string(),
        display_field: node.table.display_column().to_string(),
        value: node.display.clone().unwrap_or_else(|| node.id.clone()),
    }
}
