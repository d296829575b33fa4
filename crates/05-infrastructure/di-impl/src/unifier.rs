//! 结构化类型合一器

use di_abstractions::{Substitution, TypeUnifier};
use di_common::TypeRef;

/// 结构化类型合一器
///
/// 只有声明一侧的泛型标记可以绑定；请求一侧出现的标记按普通名称比较
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralUnifier;

impl StructuralUnifier {
    /// 创建合一器
    pub fn new() -> Self {
        Self
    }

    fn unify_into(requested: &TypeRef, declared: &TypeRef, substitution: &mut Substitution) -> bool {
        match (requested, declared) {
            (_, TypeRef::Marker(marker)) => substitution.bind(marker, requested),
            (
                TypeRef::Named { path, args },
                TypeRef::Named {
                    path: declared_path,
                    args: declared_args,
                },
            ) => path == declared_path && Self::unify_all(args, declared_args, substitution),
            (TypeRef::Tuple(items), TypeRef::Tuple(declared_items)) => {
                Self::unify_all(items, declared_items, substitution)
            }
            (TypeRef::Func(inner), TypeRef::Func(declared_inner))
            | (TypeRef::Lazy(inner), TypeRef::Lazy(declared_inner))
            | (TypeRef::Owned(inner), TypeRef::Owned(declared_inner)) => {
                Self::unify_into(inner, declared_inner, substitution)
            }
            (
                TypeRef::Collection { kind, element },
                TypeRef::Collection {
                    kind: declared_kind,
                    element: declared_element,
                },
            ) => kind == declared_kind && Self::unify_into(element, declared_element, substitution),
            _ => false,
        }
    }

    fn unify_all(requested: &[TypeRef], declared: &[TypeRef], substitution: &mut Substitution) -> bool {
        requested.len() == declared.len()
            && requested
                .iter()
                .zip(declared)
                .all(|(r, d)| Self::unify_into(r, d, substitution))
    }
}

impl TypeUnifier for StructuralUnifier {
    fn unify_with(
        &self,
        requested: &TypeRef,
        declared: &TypeRef,
        mut substitution: Substitution,
    ) -> Option<Substitution> {
        Self::unify_into(requested, declared, &mut substitution).then_some(substitution)
    }
}
