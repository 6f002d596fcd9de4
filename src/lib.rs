//! 目录变更追踪与审计解析
//!
//! 记录产品 / 知识 / SOP / 质量培训四棵目录树上的字段级变更，
//! 并在读取时把变更还原到可读的上下文：所属品牌、分类、产品，
//! 外键取值对应的名称，以及操作人的显示名。

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod telemetry;

pub use error::AppError;
pub use services::ChangeLogService;
