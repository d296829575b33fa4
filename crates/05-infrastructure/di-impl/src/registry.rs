//! 绑定注册表实现

use crate::unifier::StructuralUnifier;
use di_abstractions::{
    Binding, BindingMatch, BindingRegistry, Implementation, LookupRequest, MatchKind,
    ResolveOptions, Substitution, TypeCatalog, TypeUnifier,
};
use di_common::{
    tag_on_matches, BindingId, Diagnostic, DiagnosticKind, DiagnosticTarget, Diagnostics, Tag,
    TagKey, TagValue, TypeHead, TypeRef,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 绑定注册表实现
///
/// 按契约类型头部建立索引，契约为裸泛型标记的绑定单独存放
pub struct BindingRegistryImpl {
    catalog: TypeCatalog,
    unifier: Box<dyn TypeUnifier>,
    bindings: Vec<Binding>,
    keys: Vec<TagKey>,
    by_head: HashMap<TypeHead, Vec<BindingId>>,
    open_contracts: Vec<BindingId>,
    by_key: HashMap<(TypeRef, TagKey), BindingId>,
    overridden: HashSet<BindingId>,
    /// 能力索引：每个绑定的 {实现类型, 契约, 实现集合}
    capabilities: Vec<Vec<TypeRef>>,
    unique_count: usize,
}

impl BindingRegistryImpl {
    /// 使用结构化合一器创建注册表
    pub fn new(catalog: TypeCatalog) -> Self {
        Self::with_unifier(catalog, Box::new(StructuralUnifier::new()))
    }

    /// 使用自定义合一器创建注册表
    pub fn with_unifier(catalog: TypeCatalog, unifier: Box<dyn TypeUnifier>) -> Self {
        Self {
            catalog,
            unifier,
            bindings: Vec::new(),
            keys: Vec::new(),
            by_head: HashMap::new(),
            open_contracts: Vec::new(),
            by_key: HashMap::new(),
            overridden: HashSet::new(),
            capabilities: Vec::new(),
            unique_count: 0,
        }
    }

    /// 批量注册绑定，返回覆盖警告
    pub fn register_all<I>(&mut self, bindings: I) -> Diagnostics
    where
        I: IntoIterator<Item = Binding>,
    {
        bindings
            .into_iter()
            .filter_map(|binding| self.register(binding).1)
            .collect()
    }

    /// 绑定是否被后声明的同键绑定覆盖
    pub fn is_overridden(&self, id: BindingId) -> bool {
        self.overridden.contains(&id)
    }

    /// 已注册的绑定数量（包含被覆盖的）
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 是否没有任何绑定
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 契约可合一的候选绑定（声明顺序）
    fn candidates(&self, contract: &TypeRef) -> Vec<(BindingId, Substitution)> {
        let mut ids: Vec<BindingId> = contract
            .head()
            .and_then(|head| self.by_head.get(&head))
            .map(|ids| ids.to_vec())
            .unwrap_or_default();
        ids.extend(self.open_contracts.iter().copied());
        ids.sort_unstable();

        ids.into_iter()
            .filter_map(|id| {
                self.unifier
                    .unify(contract, &self.bindings[id.0].contract)
                    .map(|substitution| (id, substitution))
            })
            .collect()
    }

    /// 按标签优先级对候选绑定分级
    fn classify(
        &self,
        id: BindingId,
        substitution: &Substitution,
        request: &LookupRequest<'_>,
        options: &ResolveOptions,
    ) -> Option<(MatchKind, Option<String>)> {
        let binding = &self.bindings[id.0];
        match (&self.keys[id.0], request.tag) {
            (TagKey::Value(value), Some(requested)) if value == requested => {
                Some((MatchKind::Exact, None))
            }
            (TagKey::Value(_), _) => None,
            (TagKey::On(patterns), _) => request.site_path.and_then(|path| {
                patterns
                    .iter()
                    .find(|pattern| tag_on_matches(pattern, path))
                    .map(|pattern| (MatchKind::TagOn, Some(pattern.clone())))
            }),
            (TagKey::Unique(_), _) => Some((MatchKind::Unique, None)),
            (TagKey::Type, Some(TagValue::Type(requested))) => binding
                .implementation_type()
                .filter(|ty| &substitution.apply(ty) == requested)
                .map(|_| (MatchKind::TypeMarker, None)),
            (TagKey::Type, _) => None,
            (TagKey::Any, Some(_)) if options.wildcard_tag_matching => {
                Some((MatchKind::Wildcard, None))
            }
            (TagKey::Any, None) if options.wildcard_tag_matching => {
                Some((MatchKind::Fallback, None))
            }
            (TagKey::Any, _) => None,
            (TagKey::None, _) => Some((MatchKind::Fallback, None)),
        }
    }

    fn index_capabilities(&self, binding: &Binding) -> Vec<TypeRef> {
        let mut capabilities = vec![binding.contract.clone()];
        if let Some(ty) = binding.implementation_type() {
            capabilities.push(ty.clone());
            if let Some((index, substitution)) = self.catalog.find(ty, self.unifier.as_ref()) {
                if let Some(descriptor) = self.catalog.get(index) {
                    capabilities.extend(descriptor.implements.iter().map(|c| substitution.apply(c)));
                }
            }
        }
        capabilities
    }

    fn invalid(&self, id: BindingId, message: String) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::InvalidMetadata, message)
            .at(self.bindings[id.0].location.clone())
            .on(DiagnosticTarget::Binding(id))
    }
}

impl BindingRegistry for BindingRegistryImpl {
    fn register(&mut self, binding: Binding) -> (BindingId, Option<Diagnostic>) {
        let id = BindingId(self.bindings.len());
        let key = match binding.tag {
            Some(Tag::Unique) => {
                self.unique_count += 1;
                TagKey::Unique(self.unique_count)
            }
            _ => TagKey::from(&binding.tag),
        };

        debug!("注册绑定: {} ({}) -> {:?}", binding.contract, key, binding.implementation);

        // 类型标签按实现类型区分
        let override_key = match (&key, binding.implementation_type()) {
            (TagKey::Type, Some(ty)) => TagKey::Value(TagValue::Type(ty.clone())),
            _ => key.clone(),
        };

        let mut warning = None;
        if !matches!(key, TagKey::Unique(_)) {
            if let Some(previous) = self.by_key.insert((binding.contract.clone(), override_key), id) {
                self.overridden.insert(previous);
                warn!("绑定 {} ({}) 覆盖了先前的声明 {}", binding.contract, key, previous);
                warning = Some(
                    Diagnostic::new(
                        DiagnosticKind::OverrideWarning,
                        format!(
                            "绑定 {} ({}) 覆盖了先前的声明 {}",
                            binding.contract, key, previous
                        ),
                    )
                    .at(binding.location.clone())
                    .on(DiagnosticTarget::Binding(id)),
                );
            }
        }

        match binding.contract.head() {
            Some(head) => self.by_head.entry(head).or_default().push(id),
            None => self.open_contracts.push(id),
        }
        let capabilities = self.index_capabilities(&binding);
        self.capabilities.push(capabilities);
        self.keys.push(key);
        self.bindings.push(binding);
        (id, warning)
    }

    fn binding(&self, id: BindingId) -> Option<&Binding> {
        self.bindings.get(id.0)
    }

    fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn tag_key(&self, id: BindingId) -> TagKey {
        self.keys.get(id.0).cloned().unwrap_or(TagKey::None)
    }

    fn lookup(&self, request: &LookupRequest<'_>, options: &ResolveOptions) -> Option<BindingMatch> {
        let mut best: Option<BindingMatch> = None;
        for (id, substitution) in self.candidates(request.contract) {
            if self.overridden.contains(&id) {
                continue;
            }
            let Some((kind, pattern)) = self.classify(id, &substitution, request, options) else {
                continue;
            };
            // 同一优先级内后声明者胜出
            let better = best.as_ref().map_or(true, |current| kind <= current.kind);
            if better {
                best = Some(BindingMatch {
                    binding: id,
                    substitution,
                    kind,
                    pattern,
                });
            }
        }
        if let Some(found) = &best {
            debug!(
                "查找 {} 命中绑定 {} ({:?})",
                request.contract, found.binding, found.kind
            );
        }
        best
    }

    fn all_for_contract(&self, element: &TypeRef) -> Vec<BindingMatch> {
        self.candidates(element)
            .into_iter()
            .map(|(id, substitution)| BindingMatch {
                binding: id,
                substitution,
                kind: MatchKind::Exact,
                pattern: None,
            })
            .collect()
    }

    fn bindings_implementing(&self, capabilities: &[TypeRef]) -> Vec<BindingId> {
        self.capabilities
            .iter()
            .enumerate()
            .filter(|(_, indexed)| {
                capabilities.iter().all(|capability| {
                    indexed
                        .iter()
                        .any(|entry| self.unifier.matches(entry, capability))
                })
            })
            .map(|(index, _)| BindingId(index))
            .collect()
    }

    fn tag_on_rules(&self) -> Vec<(BindingId, String)> {
        self.keys
            .iter()
            .enumerate()
            .flat_map(|(index, key)| match key {
                TagKey::On(patterns) => patterns
                    .iter()
                    .map(|pattern| (BindingId(index), pattern.clone()))
                    .collect(),
                _ => Vec::new(),
            })
            .collect()
    }

    fn matching_tag_on_rules(&self, request: &LookupRequest<'_>) -> Vec<(BindingId, String)> {
        let Some(path) = request.site_path else {
            return Vec::new();
        };
        self.candidates(request.contract)
            .into_iter()
            .filter_map(|(id, _)| match &self.keys[id.0] {
                TagKey::On(patterns) => Some((id, patterns)),
                _ => None,
            })
            .flat_map(|(id, patterns)| {
                patterns
                    .iter()
                    .filter(move |pattern| tag_on_matches(pattern, path))
                    .map(move |pattern| (id, pattern.clone()))
            })
            .collect()
    }

    fn validate(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for (index, binding) in self.bindings.iter().enumerate() {
            let id = BindingId(index);

            if let TagKey::On(patterns) = &self.keys[index] {
                if patterns.is_empty() {
                    diagnostics.push(self.invalid(
                        id,
                        format!("绑定 {} 的位置规则没有任何模式", binding.contract),
                    ));
                }
            }

            let Implementation::Type(ty) = &binding.implementation else {
                continue;
            };
            let extra: Vec<String> = ty
                .markers()
                .difference(&binding.contract.markers())
                .cloned()
                .collect();
            if !extra.is_empty() {
                diagnostics.push(self.invalid(
                    id,
                    format!(
                        "实现类型 {} 含有契约 {} 中不存在的泛型标记: {}",
                        ty,
                        binding.contract,
                        extra.join(", ")
                    ),
                ));
            }

            match self
                .catalog
                .find(ty, self.unifier.as_ref())
                .and_then(|(i, _)| self.catalog.get(i))
            {
                None => diagnostics.push(self.invalid(id, format!("实现类型 {ty} 缺少类型元数据"))),
                Some(descriptor) if !descriptor.concrete => diagnostics.push(
                    self.invalid(id, format!("实现类型 {ty} 不是可构造的具体类型")),
                ),
                Some(descriptor)
                    if !descriptor.constructors.is_empty()
                        && descriptor.constructors.iter().all(|c| !c.public) =>
                {
                    diagnostics.push(self.invalid(id, format!("实现类型 {ty} 没有公开的构造函数")))
                }
                Some(_) => {}
            }
        }
        info!(
            "注册表校验完成: {} 个绑定, {} 条诊断",
            self.bindings.len(),
            diagnostics.len()
        );
        diagnostics
    }

    fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    fn unifier(&self) -> &dyn TypeUnifier {
        self.unifier.as_ref()
    }
}
