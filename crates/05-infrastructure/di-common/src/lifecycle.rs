//! 组件生命周期

use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件生命周期类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Lifetime {
    /// 瞬时模式 - 每次请求都创建新实例，实例可独立释放
    #[default]
    Transient,
    /// 单例模式 - 整个组合生命周期内只创建一个实例
    Singleton,
    /// 单次解析模式 - 在一次根解析调用内共享
    PerResolve,
    /// 构造单元模式 - 仅在一个嵌套构造单元内共享（例如一次序列物化）
    PerBlock,
    /// 作用域模式 - 在同一作用域内共享实例
    Scoped,
}

impl Lifetime {
    /// 所有生命周期
    pub const ALL: [Self; 5] = [
        Self::Transient,
        Self::Singleton,
        Self::PerResolve,
        Self::PerBlock,
        Self::Scoped,
    ];

    /// 是否在某个范围内共享实例
    pub fn is_shared(self) -> bool {
        !matches!(self, Self::Transient)
    }

    /// 共享范围宽度，数值越大范围越宽；瞬时为 0
    pub fn breadth(self) -> u8 {
        match self {
            Self::Transient => 0,
            Self::PerBlock => 1,
            Self::PerResolve => 2,
            Self::Scoped => 3,
            Self::Singleton => 4,
        }
    }

    /// 由组合本身持有的生命周期（只在组合销毁时释放）
    pub fn is_composition_owned(self) -> bool {
        matches!(self, Self::Singleton | Self::Scoped)
    }

    /// 当前生命周期的实例依赖 `dependency` 时是否会泄漏更窄范围的状态
    pub fn captures(self, dependency: Lifetime) -> bool {
        self.is_shared() && dependency.is_shared() && dependency.breadth() < self.breadth()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transient => "Transient",
            Self::Singleton => "Singleton",
            Self::PerResolve => "PerResolve",
            Self::PerBlock => "PerBlock",
            Self::Scoped => "Scoped",
        };
        f.write_str(name)
    }
}
