//! 变更日志服务
//!
//! 写入：外部 CRUD 层每持久化一次字段变更就调用一次 `record_change`，
//! 或者交给 `record_mutation` 按快照差异批量生成。
//! 读取：范围解析 -> 日志查询 -> 祖先链 / 显示转换 / 操作人解析 -> 返回。

use crate::{
    config::{AppConfig, AuditConfig},
    db::{self, HealthStatus},
    error::AppError,
    models::{
        group_into_events, ActionType, AncestorHints, ChangeEvent, ChangeRecord,
        EnrichedChangeRecord, NewChangeRecord, ScopeRequest,
    },
    repository::{
        ActorDirectory, ActorRepository, ChangeRepository, ChangeStore, HierarchyRepository,
        HierarchySource,
    },
    services::{ActorNameResolver, AncestorResolver, DisplayTranslator, ScopeResolver},
};
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 记账字段，不产生变更记录
const IGNORED_FIELDS: [&str; 4] = ["createdAt", "updatedAt", "created_at", "updated_at"];

/// 单字段变更写入参数
#[derive(Debug, Clone)]
pub struct RecordChangeParams<'a> {
    pub source_table: &'a str,
    pub source_key: &'a str,
    pub field_name: &'a str,
    pub old_value: Option<&'a str>,
    pub new_value: Option<&'a str>,
    pub action_type: ActionType,
    pub changed_by: Option<&'a str>,
    /// 尽力而为的冗余祖先 id，省略总是正确的
    pub hints: Option<AncestorHints>,
}

/// 整个实体的一次变更（前后快照）
#[derive(Debug, Clone)]
pub struct EntityMutation<'a> {
    pub source_table: &'a str,
    pub source_key: &'a str,
    pub action_type: ActionType,
    pub changed_by: Option<&'a str>,
    pub before: Option<&'a Value>,
    pub after: Option<&'a Value>,
    pub hints: Option<AncestorHints>,
}

/// 单个字段的前后值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// 把 JSON 值转为日志中的字符串快照
pub fn stringify_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 对比前后快照，返回取值不同的字段（按字段名排序）
pub fn diff_fields(before: Option<&Value>, after: Option<&Value>) -> Result<Vec<FieldChange>, AppError> {
    let as_object = |snapshot: Option<&Value>, which: &str| match snapshot {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(AppError::InvalidChange(format!(
            "{} snapshot must be a JSON object",
            which
        ))),
    };

    let before = as_object(before, "before")?;
    let after = as_object(after, "after")?;

    let fields: BTreeSet<&String> = before
        .iter()
        .chain(after.iter())
        .flat_map(|map| map.keys())
        .collect();

    let mut changes = Vec::new();
    for field in fields {
        if IGNORED_FIELDS.contains(&field.as_str()) {
            continue;
        }

        let old_value = before.as_ref().and_then(|m| m.get(field)).and_then(stringify_value);
        let new_value = after.as_ref().and_then(|m| m.get(field)).and_then(stringify_value);

        if old_value != new_value {
            changes.push(FieldChange {
                field_name: field.clone(),
                old_value,
                new_value,
            });
        }
    }

    Ok(changes)
}

pub struct ChangeLogService {
    store: Arc<dyn ChangeStore>,
    scope: ScopeResolver,
    ancestors: AncestorResolver,
    translator: DisplayTranslator,
    actors: ActorNameResolver,
    config: AuditConfig,
}

impl ChangeLogService {
    pub fn new(
        store: Arc<dyn ChangeStore>,
        hierarchy: Arc<dyn HierarchySource>,
        staff: Arc<dyn ActorDirectory>,
        agents: Arc<dyn ActorDirectory>,
        config: AuditConfig,
    ) -> Self {
        Self {
            store,
            scope: ScopeResolver::new(hierarchy.clone()),
            ancestors: AncestorResolver::new(hierarchy.clone()),
            translator: DisplayTranslator::new(hierarchy, config.enrich_batch_size),
            actors: ActorNameResolver::new(staff, agents),
            config,
        }
    }

    /// 使用 Postgres 仓库装配服务，连接池由调用方创建并持有
    pub fn from_pool(db: PgPool, config: AuditConfig) -> Self {
        Self::new(
            Arc::new(ChangeRepository::new(db.clone())),
            Arc::new(HierarchyRepository::new(db.clone())),
            Arc::new(ActorRepository::staff(db.clone())),
            Arc::new(ActorRepository::agents(db)),
            config,
        )
    }

    /// 建立连接池、应用迁移并装配服务
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await?;
        Ok(Self::from_pool(pool, config.audit.clone()))
    }

    /// 变更日志存储的健康状态
    pub async fn health_check(&self) -> HealthStatus {
        let status = self.store.health().await;
        metrics::gauge!("change_store_healthy").set(if status.is_healthy() { 1.0 } else { 0.0 });
        status
    }

    // ==================== 写入 ====================

    /// 记录单个字段的变更
    pub async fn record_change(&self, params: RecordChangeParams<'_>) -> Result<ChangeRecord, AppError> {
        let change = NewChangeRecord {
            source_table: params.source_table.to_string(),
            source_key: params.source_key.to_string(),
            field_name: params.field_name.to_string(),
            old_value: params.old_value.map(|s| s.to_string()),
            new_value: params.new_value.map(|s| s.to_string()),
            action_type: params.action_type,
            changed_at: Utc::now(),
            changed_by: params.changed_by.map(|s| s.to_string()),
            hints: params.hints.unwrap_or_default(),
        };

        self.append(change).await
    }

    /// 记录一次实体变更：每个变化字段一条记录，共享同一个 changed_at
    ///
    /// 所有记录先整体校验，任何一条不合法都不会写入。
    #[tracing::instrument(skip(self, mutation), fields(table = mutation.source_table, key = mutation.source_key))]
    pub async fn record_mutation(&self, mutation: EntityMutation<'_>) -> Result<Vec<ChangeRecord>, AppError> {
        let fields = diff_fields(mutation.before, mutation.after)?;
        let changed_at = Utc::now();
        let hints = mutation.hints.unwrap_or_default();

        let changes: Vec<NewChangeRecord> = fields
            .into_iter()
            .map(|field| NewChangeRecord {
                source_table: mutation.source_table.to_string(),
                source_key: mutation.source_key.to_string(),
                field_name: field.field_name,
                old_value: field.old_value,
                new_value: field.new_value,
                action_type: mutation.action_type,
                changed_at,
                changed_by: mutation.changed_by.map(|s| s.to_string()),
                hints: hints.clone(),
            })
            .collect();

        for change in &changes {
            change.check()?;
        }

        let mut records = Vec::with_capacity(changes.len());
        for change in changes {
            records.push(self.append(change).await?);
        }

        tracing::info!(fields = records.len(), "Entity mutation recorded");

        Ok(records)
    }

    /// 按当前层级推导冗余祖先 id，供写入时携带
    pub async fn hints_for(&self, source_table: &str, source_key: &str) -> Result<AncestorHints, AppError> {
        self.ancestors.hints_for(source_table, source_key).await
    }

    async fn append(&self, change: NewChangeRecord) -> Result<ChangeRecord, AppError> {
        change.check().map_err(|e| {
            tracing::warn!(error = %e, "Rejected malformed change record");
            e
        })?;

        let record = self.store.append(&change).await?;
        metrics::counter!("change_records_appended_total").increment(1);

        tracing::debug!(
            id = %record.id,
            table = %record.source_table,
            key = %record.source_key,
            field = %record.field_name,
            action = record.action_type.as_str(),
            "Change recorded"
        );

        Ok(record)
    }

    // ==================== 读取 ====================

    /// 查询范围内的变更，使用配置中的默认超时
    pub async fn get_changes(
        &self,
        scope: &ScopeRequest,
        limit: Option<i64>,
    ) -> Result<Vec<EnrichedChangeRecord>, AppError> {
        self.get_changes_with_timeout(scope, limit, self.config.query_timeout())
            .await
    }

    /// 查询范围内的变更
    ///
    /// 超时返回空结果而不是半解析的结果；存储不可用仍然作为错误返回。
    #[tracing::instrument(skip(self))]
    pub async fn get_changes_with_timeout(
        &self,
        scope: &ScopeRequest,
        limit: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<EnrichedChangeRecord>, AppError> {
        let limit = self.config.resolve_limit(limit)?;

        let start = Instant::now();
        metrics::counter!("change_queries_total").increment(1);

        let result = tokio::time::timeout(timeout, self.load_changes(scope, limit)).await;

        metrics::histogram!("change_query_duration_seconds").record(start.elapsed().as_secs_f64());

        match result {
            Ok(records) => records,
            Err(_) => {
                metrics::counter!("change_query_timeouts_total").increment(1);
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Change query timed out, returning empty result"
                );
                Ok(Vec::new())
            }
        }
    }

    /// 查询并按实体变更事件分组
    pub async fn get_change_events(
        &self,
        scope: &ScopeRequest,
        limit: Option<i64>,
    ) -> Result<Vec<ChangeEvent>, AppError> {
        let records = self.get_changes(scope, limit).await?;
        Ok(group_into_events(records))
    }

    async fn load_changes(
        &self,
        scope: &ScopeRequest,
        limit: i64,
    ) -> Result<Vec<EnrichedChangeRecord>, AppError> {
        let resolved = self.scope.resolve(scope).await?;
        let filter = resolved.to_filter();

        let records = self.store.query(&filter, limit).await?;
        let mut enriched: Vec<EnrichedChangeRecord> =
            records.into_iter().map(EnrichedChangeRecord::from).collect();

        self.enrich(&mut enriched).await?;

        tracing::info!(rows = enriched.len(), "Changes loaded");
        Ok(enriched)
    }

    /// 补全祖先链、显示字段与操作人名称
    ///
    /// 三项互不依赖，并发执行；操作人名称在整页收集后批量解析。
    pub async fn enrich(&self, records: &mut [EnrichedChangeRecord]) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let sources: Vec<(String, String)> = records
            .iter()
            .map(|r| (r.source_table.clone(), r.source_key.clone()))
            .collect();
        let actor_ids: Vec<String> = records.iter().filter_map(|r| r.changed_by.clone()).collect();

        let (chains, (), actor_names) = tokio::try_join!(
            self.ancestors.resolve_many(&sources),
            self.translator.translate_in_place(&mut *records),
            self.actors.resolve_batch(actor_ids.iter()),
        )?;

        for record in records.iter_mut() {
            if let Some(chain) =
                chains.get(&(record.source_table.clone(), record.source_key.clone()))
            {
                record.ancestor_chain = chain.clone();
            }
            record.changed_by_display_name = record
                .changed_by
                .as_ref()
                .and_then(|id| actor_names.get(id))
                .cloned();
        }

        Ok(())
    }
}
