//! 范围解析
//!
//! 从锚点实体出发，沿父 -> 子方向逐层收集后代 id，得到
//! (表, 主键集合) 列表，用于变更日志的 OR 查询。

use crate::{
    error::AppError,
    models::{EntityTable, ParentMatch, ResolvedScope, ScopeEntry, ScopeRequest},
    repository::HierarchySource,
};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct ScopeResolver {
    hierarchy: Arc<dyn HierarchySource>,
}

impl ScopeResolver {
    pub fn new(hierarchy: Arc<dyn HierarchySource>) -> Self {
        Self { hierarchy }
    }

    /// 解析调用方给出的范围
    pub async fn resolve(&self, request: &ScopeRequest) -> Result<ResolvedScope, AppError> {
        match request {
            ScopeRequest::Anchor { kind, id } => {
                if id.trim().is_empty() {
                    return Err(AppError::BadRequest("scope id must not be empty".to_string()));
                }
                self.resolve_anchor(kind.anchor_table(), id).await
            }
            ScopeRequest::Table { table, key } => Self::resolve_table(table, key.as_deref()),
        }
    }

    /// 单表范围：不做级联，未接入的表同样可以查询
    pub fn resolve_table(table: &str, key: Option<&str>) -> Result<ResolvedScope, AppError> {
        if table.trim().is_empty() {
            return Err(AppError::BadRequest("scope table must not be empty".to_string()));
        }

        let keys = match key {
            Some(key) if key.trim().is_empty() => {
                return Err(AppError::BadRequest("scope key must not be empty".to_string()))
            }
            Some(key) => Some(vec![key.to_string()]),
            None => None,
        };

        Ok(ResolvedScope {
            entries: vec![ScopeEntry { table: table.to_string(), keys }],
            hints: Vec::new(),
        })
    }

    /// 锚点范围：锚点自身 + 逐层向下的全部后代
    ///
    /// 每一层依赖上一层的结果，层与层之间严格顺序执行。
    /// 锚点不存在时只会得到锚点自身的主键，查询结果为空而不是报错。
    #[tracing::instrument(skip(self), fields(anchor = anchor.name()))]
    pub async fn resolve_anchor(
        &self,
        anchor: EntityTable,
        id: &str,
    ) -> Result<ResolvedScope, AppError> {
        let mut collected: Vec<(EntityTable, Vec<String>)> = vec![(anchor, vec![id.to_string()])];

        for table in anchor.descendants() {
            // 产品表有三条父级引用，任一条命中已收集的 id 即属于范围
            let matches: Vec<ParentMatch> = table
                .parents()
                .iter()
                .filter_map(|link| {
                    collected
                        .iter()
                        .find(|(collected_table, _)| *collected_table == link.parent)
                        .map(|(_, ids)| ParentMatch {
                            column: link.column,
                            ids: ids.clone(),
                        })
                })
                .collect();

            if matches.is_empty() {
                continue;
            }

            let ids: BTreeSet<String> = self
                .hierarchy
                .child_ids(table, &matches)
                .await?
                .into_iter()
                .collect();

            if ids.is_empty() {
                tracing::debug!(table = table.name(), "No descendants at level");
                continue;
            }

            collected.push((table, ids.into_iter().collect()));
        }

        let hints = collected
            .iter()
            .filter_map(|(table, ids)| table.hint().map(|field| (field, ids.clone())))
            .collect();

        let entries: Vec<ScopeEntry> = collected
            .into_iter()
            .map(|(table, ids)| ScopeEntry {
                table: table.name().to_string(),
                keys: Some(ids),
            })
            .collect();

        tracing::debug!(levels = entries.len(), "Scope resolved");

        Ok(ResolvedScope { entries, hints })
    }
}
