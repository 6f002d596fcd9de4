//! Change record repository (变更日志数据访问)

use super::ChangeStore;
use crate::{
    db::{self, HealthStatus},
    error::AppError,
    models::{ChangeFilter, ChangeRecord, Condition, NewChangeRecord},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, seq, source_table, source_key, field_name, old_value, new_value, \
     action_type, changed_at, changed_by, brand_id, category_id, subcategory_id, knowledge_id, \
     sop_id, quality_training_id";

pub struct ChangeRepository {
    db: PgPool,
}

impl ChangeRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 把过滤条件拼接为 `(a AND b) OR (c) ...`
    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ChangeFilter) {
        for (i, clause) in filter.clauses().iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push("(");
            for (j, condition) in clause.conditions.iter().enumerate() {
                if j > 0 {
                    builder.push(" AND ");
                }
                match condition {
                    Condition::SourceTable(table) => {
                        builder.push("source_table = ").push_bind(table.clone());
                    }
                    Condition::SourceKeyIn(keys) => {
                        builder
                            .push("source_key = ANY(")
                            .push_bind(keys.clone())
                            .push(")");
                    }
                    Condition::HintIn(field, ids) => {
                        builder
                            .push(field.column())
                            .push(" = ANY(")
                            .push_bind(ids.clone())
                            .push(")");
                    }
                }
            }
            builder.push(")");
        }
    }
}

#[async_trait]
impl ChangeStore for ChangeRepository {
    async fn append(&self, change: &NewChangeRecord) -> Result<ChangeRecord, AppError> {
        change.check()?;

        let sql = format!(
            r#"
            INSERT INTO change_records (
                id, source_table, source_key, field_name, old_value, new_value, action_type,
                changed_at, changed_by, brand_id, category_id, subcategory_id, knowledge_id,
                sop_id, quality_training_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, ChangeRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&change.source_table)
            .bind(&change.source_key)
            .bind(&change.field_name)
            .bind(&change.old_value)
            .bind(&change.new_value)
            .bind(change.action_type)
            .bind(change.changed_at)
            .bind(&change.changed_by)
            .bind(&change.hints.brand_id)
            .bind(&change.hints.category_id)
            .bind(&change.hints.subcategory_id)
            .bind(&change.hints.knowledge_id)
            .bind(&change.hints.sop_id)
            .bind(&change.hints.quality_training_id)
            .fetch_one(&self.db)
            .await?;

        Ok(record)
    }

    async fn query(&self, filter: &ChangeFilter, limit: i64) -> Result<Vec<ChangeRecord>, AppError> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM change_records WHERE ",
            RECORD_COLUMNS
        ));
        Self::push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY changed_at DESC, seq ASC LIMIT ")
            .push_bind(limit);

        let records = builder
            .build_query_as::<ChangeRecord>()
            .fetch_all(&self.db)
            .await?;

        db::record_pool_gauges(&self.db);
        tracing::debug!(
            clauses = filter.clauses().len(),
            rows = records.len(),
            "Change records queried"
        );

        Ok(records)
    }

    async fn health(&self) -> HealthStatus {
        db::ping(&self.db).await
    }
}
