//! 数据模型模块
//! 变更记录、实体层级描述与查询范围

pub mod change;
pub mod hierarchy;
pub mod scope;

pub use change::*;
pub use hierarchy::*;
pub use scope::*;
