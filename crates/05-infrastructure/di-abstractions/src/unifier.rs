//! 类型合一抽象接口
//!
//! 将请求的契约类型与绑定声明的类型（可含泛型标记）进行匹配

use di_common::{InjectionSite, TypeRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// 泛型标记替换表
///
/// 有序存储，保证输出确定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Substitution {
    bindings: BTreeMap<String, TypeRef>,
}

impl Substitution {
    /// 创建空替换表
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取标记绑定的类型
    pub fn get(&self, marker: &str) -> Option<&TypeRef> {
        self.bindings.get(marker)
    }

    /// 绑定标记，若标记已绑定到其他类型则返回 false
    pub fn bind(&mut self, marker: &str, ty: &TypeRef) -> bool {
        match self.bindings.get(marker) {
            Some(bound) => bound == ty,
            None => {
                self.bindings.insert(marker.to_string(), ty.clone());
                true
            }
        }
    }

    /// 是否没有任何绑定
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 绑定的标记数量
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 按标记名顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeRef)> {
        self.bindings.iter()
    }

    /// 将替换应用到类型上，未绑定的标记保持原样
    pub fn apply(&self, ty: &TypeRef) -> TypeRef {
        if self.is_empty() {
            return ty.clone();
        }
        match ty {
            TypeRef::Marker(name) => self.get(name).cloned().unwrap_or_else(|| ty.clone()),
            TypeRef::Named { path, args } => TypeRef::Named {
                path: path.clone(),
                args: args.iter().map(|arg| self.apply(arg)).collect(),
            },
            TypeRef::Tuple(items) => TypeRef::Tuple(items.iter().map(|i| self.apply(i)).collect()),
            TypeRef::Func(inner) => TypeRef::func(self.apply(inner)),
            TypeRef::Lazy(inner) => TypeRef::lazy(self.apply(inner)),
            TypeRef::Owned(inner) => TypeRef::owned(self.apply(inner)),
            TypeRef::Collection { kind, element } => TypeRef::collection(*kind, self.apply(element)),
        }
    }

    /// 将替换应用到注入点的契约类型上
    pub fn apply_site(&self, site: &InjectionSite) -> InjectionSite {
        site.with_contract(self.apply(&site.contract))
    }
}

/// 类型合一器 trait
///
/// 不匹配是正常结果而非错误
pub trait TypeUnifier: Send + Sync {
    /// 在已有替换的基础上合一
    fn unify_with(
        &self,
        requested: &TypeRef,
        declared: &TypeRef,
        substitution: Substitution,
    ) -> Option<Substitution>;

    /// 合一请求类型与声明类型
    fn unify(&self, requested: &TypeRef, declared: &TypeRef) -> Option<Substitution> {
        self.unify_with(requested, declared, Substitution::new())
    }

    /// 两个类型是否可合一
    fn matches(&self, requested: &TypeRef, declared: &TypeRef) -> bool {
        self.unify(requested, declared).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_binds_markers_consistently() {
        let mut substitution = Substitution::new();
        assert!(substitution.bind("TT", &TypeRef::named("int")));
        assert!(substitution.bind("TT", &TypeRef::named("int")));
        assert!(!substitution.bind("TT", &TypeRef::named("string")));
        assert_eq!(substitution.len(), 1);
    }

    #[test]
    fn substitution_rewrites_nested_markers() {
        let mut substitution = Substitution::new();
        substitution.bind("TT", &TypeRef::named("User"));
        let declared: TypeRef = "Repo<List<TT>, TT1>".parse().unwrap();
        assert_eq!(
            substitution.apply(&declared).to_string(),
            "Repo<List<User>, TT1>"
        );
    }
}
