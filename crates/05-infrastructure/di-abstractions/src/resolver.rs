//! 解析上下文与解析选项

use crate::graph::{NodeOwner, ScopeKey};
use di_common::{Lifetime, NodeId, TagKey, TypeRef};
use serde::{Deserialize, Serialize};

/// 解析选项
///
/// 由外部配置提供，可通过 serde 反序列化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// 是否对未绑定的具体类型自动绑定
    pub auto_binding: bool,
    /// 自动绑定的类型名过滤（正则表达式）
    pub auto_binding_filter: Option<String>,
    /// 没有完全可解析的构造函数时是否回退到无参构造函数
    pub parameterless_fallback: bool,
    /// 是否启用通配标签匹配
    pub wildcard_tag_matching: bool,
    /// 生命周期冲突是否按错误报告（否则为警告）
    pub strict_lifetimes: bool,
    /// 未显式指定生命周期的绑定所用的默认生命周期
    pub default_lifetime: Lifetime,
    /// 最大解析深度
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            auto_binding: true,
            auto_binding_filter: None,
            parameterless_fallback: true,
            wildcard_tag_matching: true,
            strict_lifetimes: true,
            default_lifetime: Lifetime::Transient,
            max_depth: 100,
        }
    }
}

/// 解析链中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// 契约
    pub contract: TypeRef,
    /// 标签键
    pub tag: TagKey,
    /// 对应节点
    pub node: NodeId,
}

/// 解析上下文
///
/// 解析链是按路径维护的栈而非全局已访问集合，同一节点可以经由不同路径合法地重复出现
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// 当前解析链，用于检测循环依赖
    pub resolution_chain: Vec<ChainEntry>,
    /// 当前根的序号
    pub root: usize,
    /// 当前构造单元
    pub block: usize,
    /// 当前实例的释放归属
    pub owner: NodeOwner,
}

impl ResolveContext {
    /// 创建根解析上下文
    pub fn for_root(root: usize, block: usize) -> Self {
        Self {
            resolution_chain: Vec::new(),
            root,
            block,
            owner: NodeOwner::Resolve(root),
        }
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }

    /// 在解析链上查找（契约，标签）
    pub fn find(&self, contract: &TypeRef, tag: &TagKey) -> Option<NodeId> {
        self.resolution_chain
            .iter()
            .rev()
            .find(|entry| &entry.contract == contract && &entry.tag == tag)
            .map(|entry| entry.node)
    }

    /// 添加到解析链
    pub fn push(&mut self, contract: TypeRef, tag: TagKey, node: NodeId) {
        self.resolution_chain.push(ChainEntry { contract, tag, node });
    }

    /// 从解析链中移除
    pub fn pop(&mut self) {
        self.resolution_chain.pop();
    }

    /// 生命周期对应的共享范围，瞬时返回 None
    pub fn scope_for(&self, lifetime: Lifetime) -> Option<ScopeKey> {
        match lifetime {
            Lifetime::Transient => None,
            Lifetime::Singleton | Lifetime::Scoped => Some(ScopeKey::Composition),
            Lifetime::PerResolve => Some(ScopeKey::Resolve(self.root)),
            Lifetime::PerBlock => Some(ScopeKey::Block(self.block)),
        }
    }

    /// 生命周期对应的释放归属
    ///
    /// 所有权包装之下，除单例与作用域外的实例都归包装节点释放
    pub fn owner_for(&self, lifetime: Lifetime) -> NodeOwner {
        match (lifetime, self.owner) {
            (Lifetime::Singleton | Lifetime::Scoped, _) => NodeOwner::Composition,
            (Lifetime::PerResolve, NodeOwner::Owned(_)) => self.owner,
            (Lifetime::PerResolve, _) => NodeOwner::Resolve(self.root),
            (Lifetime::Transient | Lifetime::PerBlock, _) => self.owner,
        }
    }
}
