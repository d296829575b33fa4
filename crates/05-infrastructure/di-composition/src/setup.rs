//! 组合配置模型
//!
//! 组合配置可以从 TOML 或 JSON 文件读取，包含类型元数据、绑定声明、根声明、
//! 累加器声明和解析选项。绑定声明支持以下便利写法，展开后得到注册表使用的 [`Binding`]：
//!
//! - 一个声明绑定多个契约、多个标签
//! - 省略契约时使用实现类型本身及其实现集合
//! - 省略生命周期时按类型查找 `default_lifetimes`，找不到再使用选项中的默认生命周期
//! - `all_implementations` 按能力查询目录中所有具体类型

use di_abstractions::{
    AccumulatorSpec, Binding, Implementation, ResolveOptions, Root, TypeCatalog, TypeUnifier,
};
use di_common::{
    Diagnostic, DiagnosticKind, Diagnostics, Lifetime, SetupError, SetupResult, SourceRef, Tag,
    TypeDescriptor, TypeRef,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// 绑定声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDeclaration {
    /// 契约列表，为空时使用实现类型本身及其实现集合
    #[serde(default)]
    pub contracts: Vec<TypeRef>,
    /// 标签列表，为空时不带标签
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// 生命周期，为空时按默认规则确定
    #[serde(default)]
    pub lifetime: Option<Lifetime>,
    /// 实现方式
    pub implementation: Implementation,
    #[serde(default)]
    pub location: Option<SourceRef>,
}

impl BindingDeclaration {
    /// 绑定到实现类型，契约由实现类型推导
    pub fn of(implementation: TypeRef) -> Self {
        Self {
            contracts: Vec::new(),
            tags: Vec::new(),
            lifetime: None,
            implementation: Implementation::Type(implementation),
            location: None,
        }
    }

    /// 把契约绑定到实现类型
    pub fn bind(contract: TypeRef, implementation: TypeRef) -> Self {
        Self::of(implementation).to_contract(contract)
    }

    /// 追加契约
    pub fn to_contract(mut self, contract: TypeRef) -> Self {
        self.contracts.push(contract);
        self
    }

    /// 追加标签
    pub fn tagged(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// 显式指定生命周期
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// 记录声明位置
    pub fn with_location(mut self, location: SourceRef) -> Self {
        self.location = Some(location);
        self
    }
}

impl From<Binding> for BindingDeclaration {
    fn from(binding: Binding) -> Self {
        Self {
            contracts: vec![binding.contract],
            tags: binding.tag.into_iter().collect(),
            lifetime: Some(binding.lifetime),
            implementation: binding.implementation,
            location: binding.location,
        }
    }
}

/// 按能力批量绑定的声明
///
/// 目录中实现了全部能力的每个具体类型都会得到一组绑定，契约为这些能力。
/// 未指定标签时使用唯一标签，使所有实现都能进入集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllImplementationsDeclaration {
    /// 实现类型必须具备的全部能力
    pub capabilities: Vec<TypeRef>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub lifetime: Option<Lifetime>,
    #[serde(default)]
    pub location: Option<SourceRef>,
}

/// 类型级默认生命周期
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultLifetime {
    /// 适用的类型，实现类型或契约可合一或实现该类型时生效
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// 生命周期
    pub lifetime: Lifetime,
}

/// 组合配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionSetup {
    /// 类型元数据
    pub types: TypeCatalog,
    /// 绑定声明
    pub bindings: Vec<BindingDeclaration>,
    /// 按能力批量绑定的声明
    pub all_implementations: Vec<AllImplementationsDeclaration>,
    /// 类型级默认生命周期，后声明者优先
    pub default_lifetimes: Vec<DefaultLifetime>,
    /// 根
    pub roots: Vec<Root>,
    /// 累加器
    pub accumulators: Vec<AccumulatorSpec>,
    /// 解析选项，未声明 `[options]` 时为 None
    pub options: Option<ResolveOptions>,
}

/// 展开后的组合配置
#[derive(Debug, Clone)]
pub struct ExpandedSetup {
    /// 按声明顺序展开的绑定
    pub bindings: Vec<Binding>,
    /// 展开过程中产生的诊断
    pub diagnostics: Diagnostics,
}

impl CompositionSetup {
    /// 创建空的组合配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明的解析选项，未声明时为默认选项
    pub fn resolve_options(&self) -> ResolveOptions {
        self.options.clone().unwrap_or_default()
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> SetupResult<Self> {
        toml::from_str(text).map_err(|e| SetupError::ParseError {
            source: Box::new(e),
        })
    }

    /// 从 JSON 文本解析
    pub fn from_json_str(text: &str) -> SetupResult<Self> {
        serde_json::from_str(text).map_err(|e| SetupError::ParseError {
            source: Box::new(e),
        })
    }

    /// 从文件读取，按扩展名选择格式
    pub fn from_file<P: AsRef<Path>>(path: P) -> SetupResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SetupError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        info!("读取组合配置: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(SetupError::InvalidDeclaration {
                message: format!(
                    "不支持的配置文件格式: {} ({})",
                    other.unwrap_or(""),
                    path.display()
                ),
            }),
        }
    }

    /// 合并另一份配置：列表追加，后者声明了选项时以后者为准
    pub fn merge(&mut self, other: CompositionSetup) {
        for descriptor in other.types.iter() {
            self.types.add(descriptor.clone());
        }
        self.bindings.extend(other.bindings);
        self.all_implementations.extend(other.all_implementations);
        self.default_lifetimes.extend(other.default_lifetimes);
        self.roots.extend(other.roots);
        self.accumulators.extend(other.accumulators);
        if other.options.is_some() {
            self.options = other.options;
        }
    }

    /// 展开全部声明
    ///
    /// 先展开按能力批量绑定的声明，再展开普通绑定声明，使显式声明能覆盖批量结果
    pub fn expand(&self, options: &ResolveOptions, unifier: &dyn TypeUnifier) -> ExpandedSetup {
        let mut bindings = Vec::new();
        let mut diagnostics = Diagnostics::new();

        for declaration in &self.all_implementations {
            let matches = self.types.types_implementing(&declaration.capabilities, unifier);
            if matches.is_empty() {
                let capabilities: Vec<String> =
                    declaration.capabilities.iter().map(ToString::to_string).collect();
                warn!("能力查询没有匹配的类型: {}", capabilities.join(", "));
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::InvalidMetadata,
                        format!("没有实现 {} 的具体类型", capabilities.join(" + ")),
                    )
                    .at(declaration.location.clone()),
                );
                continue;
            }

            let tags = if declaration.tags.is_empty() {
                vec![Tag::Unique]
            } else {
                declaration.tags.clone()
            };
            for index in matches {
                let Some(descriptor) = self.types.get(index) else {
                    continue;
                };
                let expanded = BindingDeclaration {
                    contracts: declaration.capabilities.clone(),
                    tags: tags.clone(),
                    lifetime: declaration.lifetime,
                    implementation: Implementation::Type(descriptor.ty.clone()),
                    location: declaration.location.clone(),
                };
                bindings.extend(self.expand_binding(&expanded, options, unifier));
            }
        }

        for declaration in &self.bindings {
            bindings.extend(self.expand_binding(declaration, options, unifier));
        }

        debug!("组合配置展开为 {} 个绑定", bindings.len());
        ExpandedSetup {
            bindings,
            diagnostics,
        }
    }

    fn expand_binding(
        &self,
        declaration: &BindingDeclaration,
        options: &ResolveOptions,
        unifier: &dyn TypeUnifier,
    ) -> Vec<Binding> {
        let contracts = if declaration.contracts.is_empty() {
            self.implicit_contracts(&declaration.implementation, unifier)
        } else {
            declaration.contracts.clone()
        };
        let tags: Vec<Option<Tag>> = if declaration.tags.is_empty() {
            vec![None]
        } else {
            declaration.tags.iter().cloned().map(Some).collect()
        };

        let mut bindings = Vec::with_capacity(contracts.len() * tags.len());
        for contract in &contracts {
            let lifetime = declaration
                .lifetime
                .unwrap_or_else(|| self.default_lifetime(contract, declaration, options, unifier));
            for tag in &tags {
                bindings.push(Binding {
                    contract: contract.clone(),
                    tag: tag.clone(),
                    lifetime,
                    implementation: declaration.implementation.clone(),
                    location: declaration.location.clone(),
                });
            }
        }
        bindings
    }

    /// 实现类型本身加上目录中声明的实现集合
    fn implicit_contracts(
        &self,
        implementation: &Implementation,
        unifier: &dyn TypeUnifier,
    ) -> Vec<TypeRef> {
        let Implementation::Type(ty) = implementation else {
            return Vec::new();
        };
        let mut contracts = vec![ty.clone()];
        if let Some((index, substitution)) = self.types.find(ty, unifier) {
            if let Some(descriptor) = self.types.get(index) {
                for capability in &descriptor.implements {
                    let capability = substitution.apply(capability);
                    if !contracts.contains(&capability) {
                        contracts.push(capability);
                    }
                }
            }
        }
        contracts
    }

    /// 后声明的类型级默认值优先
    fn default_lifetime(
        &self,
        contract: &TypeRef,
        declaration: &BindingDeclaration,
        options: &ResolveOptions,
        unifier: &dyn TypeUnifier,
    ) -> Lifetime {
        let implementation = match &declaration.implementation {
            Implementation::Type(ty) => Some(ty),
            _ => None,
        };
        self.default_lifetimes
            .iter()
            .rev()
            .find(|rule| {
                unifier.matches(contract, &rule.ty)
                    || implementation
                        .is_some_and(|ty| self.types.implements(ty, &rule.ty, unifier))
            })
            .map(|rule| rule.lifetime)
            .unwrap_or(options.default_lifetime)
    }

    /// 追加类型描述符
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.add(descriptor);
        self
    }

    /// 添加绑定声明
    pub fn with_binding(mut self, declaration: BindingDeclaration) -> Self {
        self.bindings.push(declaration);
        self
    }

    /// 添加根
    pub fn with_root(mut self, root: Root) -> Self {
        self.roots.push(root);
        self
    }

    /// 添加累加器
    pub fn with_accumulator(mut self, accumulator: AccumulatorSpec) -> Self {
        self.accumulators.push(accumulator);
        self
    }
}
