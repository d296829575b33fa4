//! # DI Common
//!
//! 编译期依赖解析引擎的公共词汇表。
//!
//! ## 核心类型
//!
//! - [`TypeRef`] - 结构化的类型描述，支持泛型标记
//! - [`Tag`] / [`TagValue`] - 绑定标签
//! - [`Lifetime`] - 实例共享范围
//! - [`InjectionSite`] / [`TypeDescriptor`] - 外部提供的类型元数据
//! - [`Diagnostic`] / [`Diagnostics`] - 解析诊断信息
//!
//! ## 设计原则
//!
//! - 纯数据，无运行时反射
//! - 所有类型均可通过 serde 序列化，方便与外部解析器和代码生成器交换

pub mod diagnostics;
pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod metadata;
pub mod tag;
pub mod types;

pub use diagnostics::*;
pub use errors::*;
pub use ids::*;
pub use lifecycle::*;
pub use metadata::*;
pub use tag::*;
pub use types::*;
