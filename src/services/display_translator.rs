//! 显示转换
//!
//! 1. 字段名：`id` 显示为 `Name`，已知外键字段去掉 `Id` 后缀并转为可读形式；
//! 2. 取值：外键字段的旧值和新值替换为被引用实体的显示名，找不到时保留原值。
//!
//! 转换只读取记录上的原始字段（field_name / old_value / new_value），
//! 因此对同一条记录重复转换不会产生额外变化。

use crate::{
    error::AppError,
    models::{EnrichedChangeRecord, EntityTable},
    repository::HierarchySource,
};
use futures::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid camel-case pattern"));

/// 字段名的显示规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLabel {
    pub label: String,
    /// 取值需要按 id 解析的目标表
    pub target: Option<EntityTable>,
}

/// 计算字段的显示名与取值目标表
pub fn field_label(source_table: &str, field_name: &str) -> FieldLabel {
    let passthrough = FieldLabel {
        label: field_name.to_string(),
        target: None,
    };

    // 未接入的表原样透传
    let Some(source) = EntityTable::from_name(source_table) else {
        return passthrough;
    };

    if field_name == "id" {
        return FieldLabel {
            label: "Name".to_string(),
            target: Some(source),
        };
    }

    if !has_id_suffix(field_name) {
        return passthrough;
    }

    match source.foreign_key_target(field_name) {
        Some(target) => FieldLabel {
            label: humanize(&field_name[..field_name.len() - 2]),
            target: Some(target),
        },
        None => passthrough,
    }
}

fn has_id_suffix(field_name: &str) -> bool {
    field_name.len() > 2
        && field_name.is_char_boundary(field_name.len() - 2)
        && field_name[field_name.len() - 2..].eq_ignore_ascii_case("id")
}

/// `qualityTraining` -> `Quality Training`，`kategori_sop_` -> `Kategori Sop`
pub fn humanize(name: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(name, "$1 $2").replace('_', " ");
    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 单条记录的显示结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedField {
    pub display_field_name: String,
    pub old_value_display: Option<String>,
    pub new_value_display: Option<String>,
}

pub struct DisplayTranslator {
    hierarchy: Arc<dyn HierarchySource>,
    batch_size: usize,
}

impl DisplayTranslator {
    pub fn new(hierarchy: Arc<dyn HierarchySource>, batch_size: usize) -> Self {
        Self {
            hierarchy,
            batch_size: batch_size.max(1),
        }
    }

    /// 计算一页记录的显示结果，与输入一一对应
    ///
    /// 每张目标表的 id 统一收集后批量查询，不同表之间并发。
    pub async fn translate(
        &self,
        records: &[EnrichedChangeRecord],
    ) -> Result<Vec<TranslatedField>, AppError> {
        let labels: Vec<FieldLabel> = records
            .iter()
            .map(|r| field_label(&r.source_table, &r.field_name))
            .collect();

        let mut wanted: HashMap<EntityTable, BTreeSet<String>> = HashMap::new();
        for (record, label) in records.iter().zip(&labels) {
            if let Some(target) = label.target {
                let ids = wanted.entry(target).or_default();
                for value in [&record.old_value, &record.new_value].into_iter().flatten() {
                    if !value.is_empty() {
                        ids.insert(value.clone());
                    }
                }
            }
        }

        let lookups = wanted.into_iter().flat_map(|(table, ids)| {
            let ids: Vec<String> = ids.into_iter().collect();
            ids.chunks(self.batch_size)
                .map(|chunk| (table, chunk.to_vec()))
                .collect::<Vec<_>>()
        });

        let results = try_join_all(lookups.map(|(table, ids)| async move {
            let names = self.hierarchy.display_names(table, &ids).await?;
            Ok::<_, AppError>((table, names))
        }))
        .await?;

        let mut names: HashMap<EntityTable, HashMap<String, String>> = HashMap::new();
        for (table, found) in results {
            names.entry(table).or_default().extend(found);
        }

        Ok(records
            .iter()
            .zip(labels)
            .map(|(record, label)| {
                let lookup = |value: &Option<String>| -> Option<String> {
                    let raw = value.as_ref()?;
                    let resolved = label
                        .target
                        .and_then(|t| names.get(&t))
                        .and_then(|table_names| table_names.get(raw));
                    Some(resolved.cloned().unwrap_or_else(|| raw.clone()))
                };

                TranslatedField {
                    old_value_display: lookup(&record.old_value),
                    new_value_display: lookup(&record.new_value),
                    display_field_name: label.label.clone(),
                }
            })
            .collect())
    }

    /// 就地写入显示字段；只修改本次响应的副本
    pub async fn translate_in_place(
        &self,
        records: &mut [EnrichedChangeRecord],
    ) -> Result<(), AppError> {
        let translated = self.translate(records).await?;
        apply_translations(records, translated);
        Ok(())
    }
}

fn apply_translations(records: &mut [EnrichedChangeRecord], translated: Vec<TranslatedField>) {
    for (record, field) in records.iter_mut().zip(translated) {
        record.display_field_name = field.display_field_name;
        record.old_value_display = field.old_value_display;
        record.new_value_display = field.new_value_display;
    }
}
