//! Change record domain models

use super::hierarchy::HintField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 源实体上发生的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "change_action", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Insert,
    Update,
    Delete,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Insert => "INSERT",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
        }
    }
}

/// 写入时冗余记录的祖先 id
///
/// 只是索引提示：缺失或过期不影响正确性，只影响查询路径。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AncestorHints {
    pub brand_id: Option<String>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub knowledge_id: Option<String>,
    pub sop_id: Option<String>,
    pub quality_training_id: Option<String>,
}

impl AncestorHints {
    pub fn get(&self, field: HintField) -> Option<&str> {
        match field {
            HintField::Brand => self.brand_id.as_deref(),
            HintField::Category => self.category_id.as_deref(),
            HintField::Subcategory => self.subcategory_id.as_deref(),
            HintField::Knowledge => self.knowledge_id.as_deref(),
            HintField::Sop => self.sop_id.as_deref(),
            HintField::QualityTraining => self.quality_training_id.as_deref(),
        }
    }

    pub fn set(&mut self, field: HintField, value: Option<String>) {
        let slot = match field {
            HintField::Brand => &mut self.brand_id,
            HintField::Category => &mut self.category_id,
            HintField::Subcategory => &mut self.subcategory_id,
            HintField::Knowledge => &mut self.knowledge_id,
            HintField::Sop => &mut self.sop_id,
            HintField::QualityTraining => &mut self.quality_training_id,
        };
        *slot = value;
    }

    pub fn is_empty(&self) -> bool {
        HintField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// 变更日志条目（写入后不可变）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChangeRecord {
    pub id: Uuid,
    /// 插入顺序，用于 changed_at 相同时的稳定排序
    pub seq: i64,
    pub source_table: String,
    pub source_key: String,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub action_type: ActionType,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub hints: AncestorHints,
}

/// 待写入的变更记录
#[derive(Debug, Clone, Validate)]
pub struct NewChangeRecord {
    #[validate(length(min = 1, max = 64))]
    pub source_table: String,
    #[validate(length(min = 1, max = 191))]
    pub source_key: String,
    #[validate(length(min = 1, max = 128))]
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub action_type: ActionType,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    pub hints: AncestorHints,
}

impl NewChangeRecord {
    /// 写入前的同步校验；日志中不允许出现没有判别标签的记录
    pub fn check(&self) -> Result<(), crate::error::AppError> {
        self.validate()?;

        for (name, value) in [
            ("source_table", &self.source_table),
            ("source_key", &self.source_key),
            ("field_name", &self.field_name),
        ] {
            if value.trim().is_empty() {
                return Err(crate::error::AppError::InvalidChange(format!(
                    "{} must not be blank",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// 过滤条件中的单个谓词
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    SourceTable(String),
    SourceKeyIn(Vec<String>),
    HintIn(HintField, Vec<String>),
}

impl Condition {
    /// 空集合的 IN 永远不匹配
    fn is_vacuous(&self) -> bool {
        match self {
            Condition::SourceTable(_) => false,
            Condition::SourceKeyIn(keys) => keys.is_empty(),
            Condition::HintIn(_, ids) => ids.is_empty(),
        }
    }

    fn matches(&self, record: &ChangeRecord) -> bool {
        match self {
            Condition::SourceTable(table) => &record.source_table == table,
            Condition::SourceKeyIn(keys) => keys.iter().any(|k| k == &record.source_key),
            Condition::HintIn(field, ids) => record
                .hints
                .get(*field)
                .map(|v| ids.iter().any(|id| id == v))
                .unwrap_or(false),
        }
    }
}

/// 若干谓词的 AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeClause {
    pub conditions: Vec<Condition>,
}

impl ChangeClause {
    /// `source_table = table AND source_key IN keys`
    pub fn table_keys(table: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            conditions: vec![Condition::SourceTable(table.into()), Condition::SourceKeyIn(keys)],
        }
    }

    /// `source_table = table`
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            conditions: vec![Condition::SourceTable(table.into())],
        }
    }

    /// `<hint column> IN ids`
    pub fn hint(field: HintField, ids: Vec<String>) -> Self {
        Self {
            conditions: vec![Condition::HintIn(field, ids)],
        }
    }

    /// 没有谓词或含有空集合的子句不会被发出
    pub fn is_vacuous(&self) -> bool {
        self.conditions.is_empty() || self.conditions.iter().any(Condition::is_vacuous)
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        !self.is_vacuous() && self.conditions.iter().all(|c| c.matches(record))
    }
}

/// 子句的 OR；没有子句时不匹配任何记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    clauses: Vec<ChangeClause>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加子句，空子句直接丢弃
    pub fn push(&mut self, clause: ChangeClause) -> &mut Self {
        if !clause.is_vacuous() && !self.clauses.contains(&clause) {
            self.clauses.push(clause);
        }
        self
    }

    pub fn clauses(&self) -> &[ChangeClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        self.clauses.iter().any(|c| c.matches(record))
    }
}

impl FromIterator<ChangeClause> for ChangeFilter {
    fn from_iter<I: IntoIterator<Item = ChangeClause>>(iter: I) -> Self {
        let mut filter = ChangeFilter::new();
        for clause in iter {
            filter.push(clause);
        }
        filter
    }
}

/// 祖先链上的一个节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorLink {
    pub level_name: String,
    pub display_field: String,
    pub value: String,
}

/// 返回给调用方的变更记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedChangeRecord {
    pub id: Uuid,
    pub source_table: String,
    pub source_key: String,
    /// 原始字段名，显示转换只读取它
    pub field_name: String,
    pub display_field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub old_value_display: Option<String>,
    pub new_value_display: Option<String>,
    pub action_type: ActionType,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    /// None 时调用方显示 "System"
    pub changed_by_display_name: Option<String>,
    pub ancestor_chain: Vec<AncestorLink>,
}

impl From<ChangeRecord> for EnrichedChangeRecord {
    fn from(record: ChangeRecord) -> Self {
        Self {
            id: record.id,
            display_field_name: record.field_name.clone(),
            old_value_display: record.old_value.clone(),
            new_value_display: record.new_value.clone(),
            source_table: record.source_table,
            source_key: record.source_key,
            field_name: record.field_name,
            old_value: record.old_value,
            new_value: record.new_value,
            action_type: record.action_type,
            changed_at: record.changed_at,
            changed_by: record.changed_by,
            changed_by_display_name: None,
            ancestor_chain: Vec::new(),
        }
    }
}

/// 同一次实体变更产生的全部字段记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub source_table: String,
    pub source_key: String,
    pub action_type: ActionType,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<String>,
    pub changed_by_display_name: Option<String>,
    pub ancestor_chain: Vec<AncestorLink>,
    pub changes: Vec<EnrichedChangeRecord>,
}

/// 把按时间倒序排列的记录折叠为变更事件
///
/// 只合并相邻且 (表, 主键, 时间, 操作人) 完全相同的记录。
pub fn group_into_events(records: Vec<EnrichedChangeRecord>) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = Vec::new();

    for record in records {
        if let Some(last) = events.last_mut() {
            if last.source_table == record.source_table
                && last.source_key == record.source_key
                && last.changed_at == record.changed_at
                && last.changed_by == record.changed_by
            {
                last.changes.push(record);
                continue;
            }
        }

        events.push(ChangeEvent {
            source_table: record.source_table.clone(),
            source_key: record.source_key.clone(),
            action_type: record.action_type,
            changed_at: record.changed_at,
            changed_by: record.changed_by.clone(),
            changed_by_display_name: record.changed_by_display_name.clone(),
            ancestor_chain: record.ancestor_chain.clone(),
            changes: vec![record],
        });
    }

    events
}
