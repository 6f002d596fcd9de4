//! 实体层级模型
//!
//! 四棵目录树（产品、知识、SOP、质量培训）的表结构以静态数据描述：
//! 每张表的逻辑表名、层级名、显示字段、父级引用列（按优先级排列）以及
//! 变更记录上对应的冗余祖先列。范围解析和祖先解析都只读这份数据，
//! 新增一棵树只需要追加表描述，不需要改动遍历逻辑。

use serde::{Deserialize, Serialize};

/// 所属目录树
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    Product,
    Knowledge,
    Sop,
    QualityTraining,
}

impl TreeKind {
    /// 该树内的所有表，自顶向下
    pub fn tables(self) -> impl Iterator<Item = EntityTable> {
        EntityTable::ALL.into_iter().filter(move |t| t.tree() == self)
    }
}

/// 变更记录上的冗余祖先列（写入时的提示，可能缺失或过期）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintField {
    Brand,
    Category,
    Subcategory,
    Knowledge,
    Sop,
    QualityTraining,
}

impl HintField {
    pub const ALL: [HintField; 6] = [
        HintField::Brand,
        HintField::Category,
        HintField::Subcategory,
        HintField::Knowledge,
        HintField::Sop,
        HintField::QualityTraining,
    ];

    /// change_records 上的列名
    pub fn column(self) -> &'static str {
        match self {
            HintField::Brand => "brand_id",
            HintField::Category => "category_id",
            HintField::Subcategory => "subcategory_id",
            HintField::Knowledge => "knowledge_id",
            HintField::Sop => "sop_id",
            HintField::QualityTraining => "quality_training_id",
        }
    }

    /// 提示列指向的实体表
    pub fn table(self) -> EntityTable {
        match self {
            HintField::Brand => EntityTable::Brand,
            HintField::Category => EntityTable::Category,
            HintField::Subcategory => EntityTable::Subcategory,
            HintField::Knowledge => EntityTable::Knowledge,
            HintField::Sop => EntityTable::Sop,
            HintField::QualityTraining => EntityTable::QualityTraining,
        }
    }
}

/// 已接入变更追踪的实体表
///
/// 变体顺序必须与 `TABLES` 一致，同一棵树内按层级自顶向下。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTable {
    Brand,
    Category,
    Subcategory,
    Product,
    ProductDetail,
    Knowledge,
    DetailKnowledge,
    JenisDetailKnowledge,
    ProdukJenisDetailKnowledge,
    KategoriSop,
    Sop,
    JenisSop,
    DetailSop,
    QualityTraining,
    JenisQualityTraining,
    DetailQualityTraining,
    SubdetailQualityTraining,
}

/// 子表到父表的一条引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub parent: EntityTable,
    /// 子表上保存父级 id 的列
    pub column: &'static str,
}

/// 单张表的静态描述
#[derive(Debug)]
pub struct TableSpec {
    pub table: EntityTable,
    /// 变更记录里 source_table 使用的名字
    pub name: &'static str,
    /// 展示给用户的层级名
    pub level_name: &'static str,
    pub display_column: &'static str,
    pub tree: TreeKind,
    pub depth: u8,
    /// 父级引用，按祖先解析的优先级排列
    pub parents: &'static [ParentLink],
    pub hint: Option<HintField>,
    /// 指向本表的外键字段名（大小写和下划线不敏感），任何表上都成立
    pub foreign_keys: &'static [&'static str],
    /// 只在同一棵树内成立的简写外键名，例如 `kategoriId`
    pub tree_foreign_keys: &'static [&'static str],
}

const fn link(parent: EntityTable, column: &'static str) -> ParentLink {
    ParentLink { parent, column }
}

static TABLES: [TableSpec; 17] = [
    // ===== 产品树 =====
    TableSpec {
        table: EntityTable::Brand,
        name: "brands",
        level_name: "Brand",
        display_column: "name",
        tree: TreeKind::Product,
        depth: 0,
        parents: &[],
        hint: Some(HintField::Brand),
        foreign_keys: &["brandId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::Category,
        name: "kategori_produks",
        level_name: "Category",
        display_column: "name",
        tree: TreeKind::Product,
        depth: 1,
        parents: &[link(EntityTable::Brand, "brand_id")],
        hint: Some(HintField::Category),
        foreign_keys: &["kategoriProdukId"],
        tree_foreign_keys: &["categoryId", "kategoriId"],
    },
    TableSpec {
        table: EntityTable::Subcategory,
        name: "subkategori_produks",
        level_name: "Subcategory",
        display_column: "name",
        tree: TreeKind::Product,
        depth: 2,
        parents: &[link(EntityTable::Category, "category_id")],
        hint: Some(HintField::Subcategory),
        foreign_keys: &["subkategoriProdukId"],
        tree_foreign_keys: &["subcategoryId", "subkategoriId"],
    },
    // 产品可以直接挂在品牌或分类下，跳过中间层级
    TableSpec {
        table: EntityTable::Product,
        name: "produks",
        level_name: "Product",
        display_column: "name",
        tree: TreeKind::Product,
        depth: 3,
        parents: &[
            link(EntityTable::Subcategory, "subcategory_id"),
            link(EntityTable::Category, "category_id"),
            link(EntityTable::Brand, "brand_id"),
        ],
        hint: None,
        foreign_keys: &["produkId", "productId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::ProductDetail,
        name: "detail_produks",
        level_name: "Product Detail",
        display_column: "name",
        tree: TreeKind::Product,
        depth: 4,
        parents: &[link(EntityTable::Product, "produk_id")],
        hint: None,
        foreign_keys: &["detailProdukId", "productDetailId"],
        tree_foreign_keys: &[],
    },
    // ===== 知识树 =====
    TableSpec {
        table: EntityTable::Knowledge,
        name: "knowledges",
        level_name: "Knowledge",
        display_column: "title",
        tree: TreeKind::Knowledge,
        depth: 0,
        parents: &[],
        hint: Some(HintField::Knowledge),
        foreign_keys: &["knowledgeId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::DetailKnowledge,
        name: "detail_knowledges",
        level_name: "Detail Knowledge",
        display_column: "name",
        tree: TreeKind::Knowledge,
        depth: 1,
        parents: &[link(EntityTable::Knowledge, "knowledge_id")],
        hint: None,
        foreign_keys: &["detailKnowledgeId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::JenisDetailKnowledge,
        name: "jenis_detail_knowledges",
        level_name: "Jenis Detail Knowledge",
        display_column: "name",
        tree: TreeKind::Knowledge,
        depth: 2,
        parents: &[link(EntityTable::DetailKnowledge, "detail_knowledge_id")],
        hint: None,
        foreign_keys: &["jenisDetailKnowledgeId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::ProdukJenisDetailKnowledge,
        name: "produk_jenis_detail_knowledges",
        level_name: "Produk Jenis Detail Knowledge",
        display_column: "name",
        tree: TreeKind::Knowledge,
        depth: 3,
        parents: &[link(EntityTable::JenisDetailKnowledge, "jenis_detail_knowledge_id")],
        hint: None,
        foreign_keys: &["produkJenisDetailKnowledgeId"],
        tree_foreign_keys: &[],
    },
    // ===== SOP 树 =====
    TableSpec {
        table: EntityTable::KategoriSop,
        name: "kategori_sops",
        level_name: "Kategori SOP",
        display_column: "name",
        tree: TreeKind::Sop,
        depth: 0,
        parents: &[],
        hint: None,
        foreign_keys: &["kategoriSopId"],
        tree_foreign_keys: &["kategoriId"],
    },
    TableSpec {
        table: EntityTable::Sop,
        name: "sops",
        level_name: "SOP",
        display_column: "title",
        tree: TreeKind::Sop,
        depth: 1,
        parents: &[link(EntityTable::KategoriSop, "kategori_sop_id")],
        hint: Some(HintField::Sop),
        foreign_keys: &["sopId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::JenisSop,
        name: "jenis_sops",
        level_name: "Jenis SOP",
        display_column: "name",
        tree: TreeKind::Sop,
        depth: 2,
        parents: &[link(EntityTable::Sop, "sop_id")],
        hint: None,
        foreign_keys: &["jenisSopId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::DetailSop,
        name: "detail_sops",
        level_name: "Detail SOP",
        display_column: "title",
        tree: TreeKind::Sop,
        depth: 3,
        parents: &[link(EntityTable::JenisSop, "jenis_sop_id")],
        hint: None,
        foreign_keys: &["detailSopId"],
        tree_foreign_keys: &[],
    },
    // ===== 质量培训树 =====
    TableSpec {
        table: EntityTable::QualityTraining,
        name: "quality_trainings",
        level_name: "Quality Training",
        display_column: "title",
        tree: TreeKind::QualityTraining,
        depth: 0,
        parents: &[],
        hint: Some(HintField::QualityTraining),
        foreign_keys: &["qualityTrainingId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::JenisQualityTraining,
        name: "jenis_quality_trainings",
        level_name: "Jenis Quality Training",
        display_column: "name",
        tree: TreeKind::QualityTraining,
        depth: 1,
        parents: &[link(EntityTable::QualityTraining, "quality_training_id")],
        hint: None,
        foreign_keys: &["jenisQualityTrainingId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::DetailQualityTraining,
        name: "detail_quality_trainings",
        level_name: "Detail Quality Training",
        display_column: "name",
        tree: TreeKind::QualityTraining,
        depth: 2,
        parents: &[link(EntityTable::JenisQualityTraining, "jenis_quality_training_id")],
        hint: None,
        foreign_keys: &["detailQualityTrainingId"],
        tree_foreign_keys: &[],
    },
    TableSpec {
        table: EntityTable::SubdetailQualityTraining,
        name: "subdetail_quality_trainings",
        level_name: "Subdetail Quality Training",
        display_column: "name",
        tree: TreeKind::QualityTraining,
        depth: 3,
        parents: &[link(EntityTable::DetailQualityTraining, "detail_quality_training_id")],
        hint: None,
        foreign_keys: &["subdetailQualityTrainingId"],
        tree_foreign_keys: &[],
    },
];

impl EntityTable {
    pub const ALL: [EntityTable; 17] = [
        EntityTable::Brand,
        EntityTable::Category,
        EntityTable::Subcategory,
        EntityTable::Product,
        EntityTable::ProductDetail,
        EntityTable::Knowledge,
        EntityTable::DetailKnowledge,
        EntityTable::JenisDetailKnowledge,
        EntityTable::ProdukJenisDetailKnowledge,
        EntityTable::KategoriSop,
        EntityTable::Sop,
        EntityTable::JenisSop,
        EntityTable::DetailSop,
        EntityTable::QualityTraining,
        EntityTable::JenisQualityTraining,
        EntityTable::DetailQualityTraining,
        EntityTable::SubdetailQualityTraining,
    ];

    pub fn spec(self) -> &'static TableSpec {
        &TABLES[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn level_name(self) -> &'static str {
        self.spec().level_name
    }

    pub fn display_column(self) -> &'static str {
        self.spec().display_column
    }

    pub fn tree(self) -> TreeKind {
        self.spec().tree
    }

    pub fn parents(self) -> &'static [ParentLink] {
        self.spec().parents
    }

    pub fn hint(self) -> Option<HintField> {
        self.spec().hint
    }

    /// 根据 source_table 查找；未接入的表返回 None
    pub fn from_name(name: &str) -> Option<EntityTable> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// 本表记录上的外键字段指向哪张表
    ///
    /// `brandId`、`brand_id`、`BRANDID` 都视为同一个字段。
    /// 简写外键名先在本表所在的树内查找，同名简写在不同树里指向不同的表。
    pub fn foreign_key_target(self, field_name: &str) -> Option<EntityTable> {
        let wanted = normalize_field(field_name);
        let matches = |aliases: &[&str]| aliases.iter().any(|fk| normalize_field(fk) == wanted);

        self.tree()
            .tables()
            .find(|t| matches(t.spec().tree_foreign_keys))
            .or_else(|| Self::ALL.into_iter().find(|t| matches(t.spec().foreign_keys)))
    }

    /// 同一棵树内位于本表之下的所有表，自顶向下
    pub fn descendants(self) -> impl Iterator<Item = EntityTable> {
        let depth = self.spec().depth;
        self.tree()
            .tables()
            .filter(move |t| t.spec().depth > depth)
    }
}

fn normalize_field(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 父级引用的当前取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub link: ParentLink,
    pub id: Option<String>,
}

/// 从层级数据源读取到的单个实体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNode {
    pub table: EntityTable,
    pub id: String,
    pub display: Option<String>,
    /// 与 `table.parents()` 顺序一致
    pub parents: Vec<ParentRef>,
}

impl EntityNode {
    /// 按优先级选出第一个非空的父级引用
    pub fn preferred_parent(&self) -> Option<(EntityTable, &str)> {
        self.parents.iter().find_map(|p| match p.id.as_deref() {
            Some(id) if !id.is_empty() => Some((p.link.parent, id)),
            _ => None,
        })
    }
}

/// 向下级联时的一组父级条件：`column IN ids`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentMatch {
    pub column: &'static str,
    pub ids: Vec<String>,
}
