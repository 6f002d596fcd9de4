//! Catalog hierarchy repository (实体层级只读访问)
//!
//! 表名和列名全部来自静态表描述，不拼接任何外部输入。

use super::HierarchySource;
use crate::{
    error::AppError,
    models::{EntityNode, EntityTable, ParentMatch, ParentRef},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashMap;

pub struct HierarchyRepository {
    db: PgPool,
}

impl HierarchyRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn node_sql(table: EntityTable) -> String {
        let spec = table.spec();
        let mut sql = format!("SELECT id, {}::text AS display", spec.display_column);
        for link in spec.parents {
            sql.push_str(", ");
            sql.push_str(link.column);
        }
        sql.push_str(&format!(" FROM {} WHERE id = $1", spec.name));
        sql
    }
}

#[async_trait]
impl HierarchySource for HierarchyRepository {
    async fn find_node(&self, table: EntityTable, id: &str) -> Result<Option<EntityNode>, AppError> {
        let row = sqlx::query(&Self::node_sql(table))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut parents = Vec::with_capacity(table.parents().len());
        for (i, link) in table.parents().iter().enumerate() {
            parents.push(ParentRef {
                link: *link,
                id: row.try_get::<Option<String>, _>(i + 2)?,
            });
        }

        Ok(Some(EntityNode {
            table,
            id: row.try_get("id")?,
            display: row.try_get("display")?,
            parents,
        }))
    }

    async fn child_ids(
        &self,
        table: EntityTable,
        matches: &[ParentMatch],
    ) -> Result<Vec<String>, AppError> {
        let matches: Vec<&ParentMatch> = matches.iter().filter(|m| !m.ids.is_empty()).collect();
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT id FROM {} WHERE ", table.name()));
        for (i, m) in matches.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder
                .push(m.column)
                .push(" = ANY(")
                .push_bind(m.ids.clone())
                .push(")");
        }

        let ids: Vec<String> = builder
            .build_query_scalar::<String>()
            .fetch_all(&self.db)
            .await?;

        Ok(ids)
    }

    async fn display_names(
        &self,
        table: EntityTable,
        ids: &[String],
    ) -> Result<HashMap<String, String>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT id, {}::text AS display FROM {} WHERE id = ANY($1)",
            table.display_column(),
            table.name()
        );
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.db).await?;

        let mut names = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let display: Option<String> = row.try_get("display")?;
            if let Some(display) = display {
                names.insert(id, display);
            }
        }

        Ok(names)
    }
}
