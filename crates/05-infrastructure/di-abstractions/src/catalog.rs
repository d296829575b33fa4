//! 类型元数据目录
//!
//! 保存外部元数据提取器提供的类型描述符，供自动绑定和能力查询使用

use crate::unifier::{Substitution, TypeUnifier};
use di_common::{TypeDescriptor, TypeRef};
use serde::{Deserialize, Serialize};

/// 类型元数据目录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCatalog {
    types: Vec<TypeDescriptor>,
}

impl TypeCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加类型描述符，返回其索引
    pub fn add(&mut self, descriptor: TypeDescriptor) -> usize {
        self.types.push(descriptor);
        self.types.len() - 1
    }

    /// 链式添加
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.add(descriptor);
        self
    }

    /// 按序号获取类型描述符
    pub fn get(&self, index: usize) -> Option<&TypeDescriptor> {
        self.types.get(index)
    }

    /// 类型数量
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// 是否没有类型
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// 按添加顺序迭代
    pub fn iter(&self) -> std::slice::Iter<'_, TypeDescriptor> {
        self.types.iter()
    }

    /// 查找描述指定类型的描述符
    ///
    /// 优先精确相等的描述符，其次是第一个可合一的泛型描述符
    pub fn find(
        &self,
        ty: &TypeRef,
        unifier: &dyn TypeUnifier,
    ) -> Option<(usize, Substitution)> {
        if let Some(index) = self.types.iter().position(|d| &d.ty == ty) {
            return Some((index, Substitution::new()));
        }
        self.types
            .iter()
            .enumerate()
            .filter(|(_, d)| d.ty.is_open())
            .find_map(|(index, d)| unifier.unify(ty, &d.ty).map(|s| (index, s)))
    }

    /// 类型是否具备某项能力（自身即该能力，或其实现集合包含该能力）
    pub fn implements(
        &self,
        ty: &TypeRef,
        capability: &TypeRef,
        unifier: &dyn TypeUnifier,
    ) -> bool {
        if unifier.matches(ty, capability) {
            return true;
        }
        match self.find(ty, unifier) {
            Some((index, substitution)) => self.types[index]
                .implements
                .iter()
                .any(|declared| unifier.matches(&substitution.apply(declared), capability)),
            None => false,
        }
    }

    /// 能力查询：返回实现了全部指定能力的具体类型索引（声明顺序）
    pub fn types_implementing(
        &self,
        capabilities: &[TypeRef],
        unifier: &dyn TypeUnifier,
    ) -> Vec<usize> {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, d)| d.concrete && !d.ty.is_open())
            .filter(|(_, d)| {
                capabilities
                    .iter()
                    .all(|capability| self.implements(&d.ty, capability, unifier))
            })
            .map(|(index, _)| index)
            .collect()
    }
}
