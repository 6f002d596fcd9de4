//! Scope query models

use super::change::{ChangeClause, ChangeFilter};
use super::hierarchy::{EntityTable, HintField};
use serde::{Deserialize, Serialize};

/// 可以作为查询锚点的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Brand,
    Category,
    Subcategory,
    Knowledge,
    #[serde(rename = "SOP", alias = "Sop")]
    Sop,
    QualityTraining,
}

impl ScopeKind {
    pub fn anchor_table(self) -> EntityTable {
        match self {
            ScopeKind::Brand => EntityTable::Brand,
            ScopeKind::Category => EntityTable::Category,
            ScopeKind::Subcategory => EntityTable::Subcategory,
            ScopeKind::Knowledge => EntityTable::Knowledge,
            ScopeKind::Sop => EntityTable::Sop,
            ScopeKind::QualityTraining => EntityTable::QualityTraining,
        }
    }
}

/// 读取接口的范围参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeRequest {
    /// 锚点实体及其全部后代
    Anchor { kind: ScopeKind, id: String },
    /// 单张表（可选单条记录）的历史
    Table { table: String, key: Option<String> },
}

/// 范围中的一张表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub table: String,
    /// None 表示整张表
    pub keys: Option<Vec<String>>,
}

/// 解析后的范围：若干 (表, 主键集合) 以及冗余祖先列条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedScope {
    pub entries: Vec<ScopeEntry>,
    pub hints: Vec<(HintField, Vec<String>)>,
}

impl ResolvedScope {
    pub fn keys_for(&self, table: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.table == table)
            .and_then(|e| e.keys.as_deref())
    }

    pub fn contains(&self, table: &str, key: &str) -> bool {
        self.entries.iter().any(|e| {
            e.table == table
                && e.keys
                    .as_ref()
                    .map(|keys| keys.iter().any(|k| k == key))
                    .unwrap_or(true)
        })
    }

    /// 转换为变更日志存储的 OR 查询
    pub fn to_filter(&self) -> ChangeFilter {
        let mut filter = ChangeFilter::new();

        for entry in &self.entries {
            match &entry.keys {
                Some(keys) => filter.push(ChangeClause::table_keys(entry.table.clone(), keys.clone())),
                None => filter.push(ChangeClause::table(entry.table.clone())),
            };
        }

        for (field, ids) in &self.hints {
            filter.push(ChangeClause::hint(*field, ids.clone()));
        }

        filter
    }
}
