//! 隐式绑定合成器
//!
//! 查找未命中时按固定顺序尝试合成策略：累加器、自动绑定、集合、工厂函数、
//! 惰性值、所有权包装、元组。全部不适用时由构建器记录未解析哨兵。

use di_abstractions::{
    AccumulatorSpec, Binding, BindingRegistry, LookupRequest, ResolveOptions, Substitution,
};
use di_common::{
    CollectionKind, ConstructorDescriptor, Diagnostic, DiagnosticKind, Diagnostics, Lifetime,
    TagValue, TypeDescriptor, TypeRef,
};
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 合成方案
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplicitPlan {
    /// 请求的是累加器类型
    Accumulator { spec: usize },
    /// 自动绑定具体类型
    AutoBinding { binding: Binding },
    /// 收集元素类型的全部绑定
    Collection { kind: CollectionKind, element: TypeRef },
    /// 工厂函数，延迟到调用时解析目标
    Func { target: TypeRef },
    /// 惰性值
    Lazy { target: TypeRef },
    /// 所有权包装
    Owned { target: TypeRef },
    /// 元组，各分量独立解析
    Tuple { items: Vec<TypeRef> },
    /// 无可用策略
    Unresolved,
}

/// 构造函数选择结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructorChoice {
    /// 选中的构造函数索引，None 表示隐式无参构造
    pub index: Option<usize>,
    /// 所有参数是否都可解析
    pub fully_resolvable: bool,
}

/// 隐式绑定合成器
pub struct ImplicitBindingSynthesizer<'a> {
    registry: &'a dyn BindingRegistry,
    options: &'a ResolveOptions,
    accumulators: &'a [AccumulatorSpec],
    auto_binding: bool,
    filter: Option<Regex>,
    resolvable: HashMap<TypeRef, bool>,
}

impl<'a> ImplicitBindingSynthesizer<'a> {
    /// 创建合成器；过滤表达式无效时返回诊断并关闭自动绑定
    pub fn new(
        registry: &'a dyn BindingRegistry,
        options: &'a ResolveOptions,
        accumulators: &'a [AccumulatorSpec],
    ) -> (Self, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut auto_binding = options.auto_binding;
        let filter = match options.auto_binding_filter.as_deref() {
            None => None,
            Some(pattern) => match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("自动绑定过滤表达式无效: {} ({})", pattern, e);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::InvalidMetadata,
                        format!("自动绑定过滤表达式无效: {pattern}: {e}"),
                    ));
                    auto_binding = false;
                    None
                }
            },
        };

        let synthesizer = Self {
            registry,
            options,
            accumulators,
            auto_binding,
            filter,
            resolvable: HashMap::new(),
        };
        (synthesizer, diagnostics)
    }

    /// 为未命中的请求制定合成方案
    pub fn plan(&self, contract: &TypeRef) -> ImplicitPlan {
        if let Some(spec) = self.accumulator_for(contract) {
            return ImplicitPlan::Accumulator { spec };
        }
        let plan = match contract {
            TypeRef::Named { .. } => match self.auto_binding(contract) {
                Some(binding) => ImplicitPlan::AutoBinding { binding },
                None => ImplicitPlan::Unresolved,
            },
            TypeRef::Collection { kind, element } => ImplicitPlan::Collection {
                kind: *kind,
                element: element.as_ref().clone(),
            },
            TypeRef::Func(target) => ImplicitPlan::Func {
                target: target.as_ref().clone(),
            },
            TypeRef::Lazy(target) => ImplicitPlan::Lazy {
                target: target.as_ref().clone(),
            },
            TypeRef::Owned(target) => ImplicitPlan::Owned {
                target: target.as_ref().clone(),
            },
            TypeRef::Tuple(items) => ImplicitPlan::Tuple {
                items: items.clone(),
            },
            TypeRef::Marker(_) => ImplicitPlan::Unresolved,
        };
        debug!("为 {} 合成方案: {:?}", contract, plan);
        plan
    }

    /// 请求类型对应的累加器声明
    pub fn accumulator_for(&self, contract: &TypeRef) -> Option<usize> {
        let unifier = self.registry.unifier();
        self.accumulators
            .iter()
            .position(|spec| unifier.matches(contract, &spec.accumulator))
    }

    /// 为具体类型合成瞬时绑定
    pub fn auto_binding(&self, contract: &TypeRef) -> Option<Binding> {
        if !self.auto_binding || !matches!(contract, TypeRef::Named { .. }) || contract.is_open() {
            return None;
        }
        let name = contract.to_string();
        if let Some(filter) = &self.filter {
            if !filter.is_match(&name) {
                debug!("类型 {} 未通过自动绑定过滤", name);
                return None;
            }
        }

        let catalog = self.registry.catalog();
        let (index, _) = catalog.find(contract, self.registry.unifier())?;
        let descriptor = catalog.get(index)?;
        let constructible = descriptor.concrete
            && (descriptor.constructors.is_empty() || descriptor.constructors.iter().any(|c| c.public));
        if !constructible {
            return None;
        }

        debug!("自动绑定具体类型: {}", name);
        Some(Binding::to(contract.clone(), contract.clone()).with_lifetime(Lifetime::Transient))
    }

    /// 选择构造函数
    ///
    /// 在所有参数都可解析的公开构造函数中选参数最多的；并列时取最小的显式序号，
    /// 再按声明顺序。没有完全可解析的构造函数时选可解析参数最多的，其余参数成为未解析边
    pub fn choose_constructor(
        &mut self,
        descriptor: &TypeDescriptor,
        substitution: &Substitution,
    ) -> ConstructorChoice {
        let mut visiting = vec![substitution.apply(&descriptor.ty)];
        self.choose_in(descriptor, substitution, &mut visiting, 1)
    }

    fn choose_in(
        &mut self,
        descriptor: &TypeDescriptor,
        substitution: &Substitution,
        visiting: &mut Vec<TypeRef>,
        depth: usize,
    ) -> ConstructorChoice {
        if descriptor.constructors.is_empty() {
            return ConstructorChoice {
                index: None,
                fully_resolvable: true,
            };
        }

        let consumer = substitution.apply(&descriptor.ty);
        let public: Vec<(usize, &ConstructorDescriptor)> = descriptor
            .constructors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.public)
            .collect();
        let has_parameterized = public.iter().any(|(_, c)| !c.params.is_empty());
        let fallback = self.options.parameterless_fallback;

        // (索引, 参数数, 可解析参数数, 序号)
        let mut scored = Vec::with_capacity(public.len());
        for (index, constructor) in public {
            if constructor.params.is_empty() && !fallback && has_parameterized {
                continue;
            }
            let resolvable = constructor
                .params
                .iter()
                .filter(|param| {
                    let site = substitution.apply_site(param);
                    let path = site.path(&consumer);
                    self.probe(&site.contract, site.tag.as_ref(), Some(path.as_str()), visiting, depth)
                })
                .count();
            scored.push((index, constructor.params.len(), resolvable, constructor.ordinal));
        }

        let rank = |ordinal: Option<i32>, index: usize| (Reverse(ordinal.unwrap_or(i32::MAX)), Reverse(index));
        let full = scored
            .iter()
            .filter(|(_, params, resolvable, _)| params == resolvable)
            .max_by_key(|(index, params, _, ordinal)| (*params, rank(*ordinal, *index)));
        if let Some((index, ..)) = full {
            return ConstructorChoice {
                index: Some(*index),
                fully_resolvable: true,
            };
        }

        let partial = scored
            .iter()
            .max_by_key(|(index, _, resolvable, ordinal)| (*resolvable, rank(*ordinal, *index)));
        ConstructorChoice {
            index: partial.map(|(index, ..)| *index),
            fully_resolvable: false,
        }
    }

    /// 请求是否可以独立解析
    pub fn is_resolvable(&mut self, contract: &TypeRef, tag: Option<&TagValue>, site_path: Option<&str>) -> bool {
        let mut visiting = Vec::new();
        self.probe(contract, tag, site_path, &mut visiting, 0)
    }

    fn probe(
        &mut self,
        contract: &TypeRef,
        tag: Option<&TagValue>,
        site_path: Option<&str>,
        visiting: &mut Vec<TypeRef>,
        depth: usize,
    ) -> bool {
        if depth > self.options.max_depth {
            return false;
        }
        let request = LookupRequest::new(contract).tagged(tag).at_site(site_path);
        if self.registry.lookup(&request, self.options).is_some()
            || self.accumulator_for(contract).is_some()
        {
            return true;
        }

        match contract {
            TypeRef::Collection { .. } => true,
            TypeRef::Func(inner) | TypeRef::Lazy(inner) | TypeRef::Owned(inner) => {
                self.probe(inner, tag, site_path, visiting, depth + 1)
            }
            TypeRef::Tuple(items) => items
                .iter()
                .all(|item| self.probe(item, None, None, visiting, depth + 1)),
            TypeRef::Marker(_) => false,
            TypeRef::Named { .. } => {
                if let Some(known) = self.resolvable.get(contract) {
                    return *known;
                }
                // 路径上的类型视为可解析，循环由检查器另行报告
                if visiting.contains(contract) {
                    return true;
                }
                if self.auto_binding(contract).is_none() {
                    self.resolvable.insert(contract.clone(), false);
                    return false;
                }
                let registry = self.registry;
                let catalog = registry.catalog();
                let Some((index, substitution)) = catalog.find(contract, registry.unifier()) else {
                    return false;
                };
                let Some(descriptor) = catalog.get(index) else {
                    return false;
                };

                visiting.push(contract.clone());
                let choice = self.choose_in(descriptor, &substitution, visiting, depth + 1);
                visiting.pop();
                self.resolvable.insert(contract.clone(), choice.fully_resolvable);
                choice.fully_resolvable
            }
        }
    }
}
