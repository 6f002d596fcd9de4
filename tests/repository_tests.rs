//! 仓库层集成测试
//!
//! 需要 Postgres（TEST_DATABASE_URL），默认忽略：
//! `cargo test --test repository_tests -- --ignored`

use catalog_audit::{
    models::{ActionType, AncestorHints, EntityTable, NewChangeRecord, ParentMatch, ScopeKind, ScopeRequest},
    repository::{
        ActorDirectory, ActorRepository, ChangeRepository, ChangeStore, HierarchyRepository,
        HierarchySource,
    },
    services::{ChangeLogService, ScopeResolver},
};
use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;
use sqlx::PgPool;

mod common;
use common::{create_test_config, setup_test_db};

async fn seed_products(pool: &PgPool) {
    for sql in [
        "INSERT INTO brands (id, name) VALUES ('b-acme', 'Acme'), ('b-other', 'Other')",
        "INSERT INTO kategori_produks (id, name, brand_id) VALUES ('c-skin', 'Skincare', 'b-acme')",
        "INSERT INTO subkategori_produks (id, name, category_id) VALUES ('s-serum', 'Serums', 'c-skin'), ('s-mask', 'Masks', 'c-skin')",
        "INSERT INTO produks (id, name, subcategory_id, category_id, brand_id) VALUES \
         ('p-hydra', 'Hydra Serum', 's-serum', NULL, NULL), \
         ('p-direct', 'Acme Gift Set', NULL, NULL, 'b-acme'), \
         ('p-catlink', 'Skincare Sampler', NULL, 'c-skin', NULL), \
         ('p-other', 'Other Product', NULL, NULL, 'b-other')",
        "INSERT INTO detail_produks (id, name, produk_id) VALUES ('d-hydra', 'Bottle', 'p-hydra')",
        "INSERT INTO users (id, name) VALUES ('u-1', 'Dewi')",
        "INSERT INTO agents (id, name) VALUES ('a-1', 'Agent Rina')",
    ] {
        sqlx::query(sql).execute(pool).await.expect("Failed to seed catalog");
    }
}

fn new_change(table: &str, key: &str, field: &str, new_value: &str) -> NewChangeRecord {
    NewChangeRecord {
        source_table: table.to_string(),
        source_key: key.to_string(),
        field_name: field.to_string(),
        old_value: None,
        new_value: Some(new_value.to_string()),
        action_type: ActionType::Update,
        changed_at: Utc::now(),
        changed_by: Some("u-1".to_string()),
        hints: AncestorHints::default(),
    }
}

#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_change_repository_append_and_order() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let repo = ChangeRepository::new(pool.clone());

    let now = Utc::now();
    let mut older = new_change("produks", "p-hydra", "name", "v1");
    older.changed_at = now - ChronoDuration::seconds(10);
    let mut first = new_change("produks", "p-hydra", "name", "v2");
    first.changed_at = now;
    let mut second = new_change("produks", "p-hydra", "price", "12");
    second.changed_at = now;

    for change in [&older, &first, &second] {
        repo.append(change).await.unwrap();
    }

    let scope = ScopeResolver::resolve_table("produks", Some("p-hydra")).unwrap();
    let records = repo.query(&scope.to_filter(), 10).await.unwrap();

    assert_eq!(records.len(), 3);
    // 同一时间戳按插入顺序
    assert_eq!(records[0].field_name, "name");
    assert_eq!(records[0].new_value.as_deref(), Some("v2"));
    assert_eq!(records[1].field_name, "price");
    assert_eq!(records[2].new_value.as_deref(), Some("v1"));
    assert!(records[0].seq < records[1].seq);

    let limited = repo.query(&scope.to_filter(), 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

/// 日志表拒绝更新与删除
#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_change_records_are_append_only() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let repo = ChangeRepository::new(pool.clone());

    let record = repo
        .append(&new_change("brands", "b-acme", "name", "Acme"))
        .await
        .unwrap();

    let update = sqlx::query("UPDATE change_records SET new_value = 'x' WHERE id = $1")
        .bind(record.id)
        .execute(&pool)
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM change_records WHERE id = $1")
        .bind(record.id)
        .execute(&pool)
        .await;
    assert!(delete.is_err());
}

#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_hint_columns_round_trip() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    let repo = ChangeRepository::new(pool.clone());

    let mut change = new_change("detail_produks", "d-hydra", "name", "Jar");
    change.hints.brand_id = Some("b-acme".to_string());
    let record = repo.append(&change).await.unwrap();
    assert_eq!(record.hints.brand_id.as_deref(), Some("b-acme"));

    let scope = ScopeResolver::resolve_table("detail_produks", None).unwrap();
    let records = repo.query(&scope.to_filter(), 10).await.unwrap();
    assert_eq!(records[0].hints, change.hints);
}

#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_hierarchy_repository() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    seed_products(&pool).await;
    let repo = HierarchyRepository::new(pool.clone());

    let node = repo
        .find_node(EntityTable::Product, "p-hydra")
        .await
        .unwrap()
        .expect("Product not found");
    assert_eq!(node.display.as_deref(), Some("Hydra Serum"));
    assert_eq!(node.preferred_parent().map(|(_, id)| id), Some("s-serum"));

    assert!(repo.find_node(EntityTable::Brand, "b-gone").await.unwrap().is_none());

    let mut children = repo
        .child_ids(
            EntityTable::Product,
            &[
                ParentMatch { column: "brand_id", ids: vec!["b-acme".to_string()] },
                ParentMatch { column: "category_id", ids: vec!["c-skin".to_string()] },
            ],
        )
        .await
        .unwrap();
    children.sort();
    assert_eq!(children, vec!["p-catlink".to_string(), "p-direct".to_string()]);

    let names = repo
        .display_names(EntityTable::Subcategory, &["s-serum".to_string(), "s-gone".to_string()])
        .await
        .unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names.get("s-serum").map(String::as_str), Some("Serums"));
}

#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_actor_repository() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    seed_products(&pool).await;

    let staff = ActorRepository::staff(pool.clone());
    let names = staff
        .names_by_ids(&["u-1".to_string(), "a-1".to_string()])
        .await
        .unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names.get("u-1").map(String::as_str), Some("Dewi"));

    let agents = ActorRepository::agents(pool.clone());
    assert!(agents.names_by_ids(&[]).await.unwrap().is_empty());
}

/// 完整读取链路：品牌范围 -> 日志 -> 上下文
#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_service_against_postgres() {
    let config = create_test_config();
    let pool = setup_test_db(&config).await;
    seed_products(&pool).await;

    let service = ChangeLogService::from_pool(pool.clone(), config.audit.clone());
    let repo = ChangeRepository::new(pool.clone());

    let mut rename = new_change("produks", "p-hydra", "name", "Hydra Serum 50ml");
    rename.old_value = Some("Hydra Serum".to_string());
    repo.append(&rename).await.unwrap();
    repo.append(&new_change("produks", "p-other", "name", "Other v2")).await.unwrap();

    let changes = service
        .get_changes(&ScopeRequest::Anchor { kind: ScopeKind::Brand, id: "b-acme".to_string() }, None)
        .await
        .unwrap();

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].changed_by_display_name.as_deref(), Some("Dewi"));
    let chain: Vec<&str> = changes[0].ancestor_chain.iter().map(|l| l.value.as_str()).collect();
    assert_eq!(chain, vec!["Serums", "Skincare", "Acme"]);
}

#[tokio::test]
#[ignore = "requires Postgres"]
#[serial]
async fn test_connect_and_health_check() {
    let config = create_test_config();
    setup_test_db(&config).await;

    let service = ChangeLogService::connect(&config).await.unwrap();
    assert!(service.health_check().await.is_healthy());
}
