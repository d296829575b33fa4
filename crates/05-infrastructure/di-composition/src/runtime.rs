//! 运行时支持类型
//!
//! 代码生成器为对象图产出的构造代码依赖这些类型实现共享与释放语义：
//!
//! - [`SingletonSlot`] 首次构造互斥、之后无锁读取
//! - [`DisposalScope`] 后进先出地释放已登记的实例
//! - [`CachedSequence`] 首次迭代时物化一次的惰性序列
//! - [`Deferred`] 每次调用都重新解析的工厂函数
//! - [`Owned`] 携带独立释放作用域的值

use chrono::{DateTime, Utc};
use di_common::{DisposeError, DisposeResult};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// 需要释放的实例
pub trait Disposable: Send + Sync {
    fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>>;
}

struct ScopeState {
    entries: Vec<(String, Arc<dyn Disposable>)>,
    disposed: bool,
}

/// 释放作用域
///
/// 按登记顺序的逆序释放；某个实例释放失败不影响其余实例，所有失败一并返回
pub struct DisposalScope {
    /// 作用域 ID
    pub id: Uuid,
    /// 作用域名称，子作用域以点号连接
    pub name: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    state: Mutex<ScopeState>,
}

impl fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("len", &self.len())
            .finish()
    }
}

impl DisposalScope {
    /// 创建新作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            state: Mutex::new(ScopeState {
                entries: Vec::new(),
                disposed: false,
            }),
        }
    }

    /// 组合级作用域，单例与作用域实例只登记在这里
    pub fn composition() -> Self {
        Self::new("composition")
    }

    /// 创建子作用域
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::new(format!("{}.{}", self.name, name.into()))
    }

    /// 登记实例
    pub fn register(&self, label: impl Into<String>, instance: Arc<dyn Disposable>) -> DisposeResult<()> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(DisposeError::ScopeDisposed {
                scope: self.name.clone(),
            });
        }
        state.entries.push((label.into(), instance));
        Ok(())
    }

    /// 已登记的实例数量
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// 是否没有登记任何实例
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否已经释放
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// 释放所有实例，重复调用不会再次释放
    pub fn dispose(&self) -> Vec<DisposeError> {
        let entries = {
            let mut state = self.state.lock();
            state.disposed = true;
            std::mem::take(&mut state.entries)
        };

        debug!("释放作用域 {}: {} 个实例", self.name, entries.len());
        let mut failures = Vec::new();
        for (label, instance) in entries.into_iter().rev() {
            if let Err(source) = instance.dispose() {
                warn!("实例释放失败: {} ({})", label, source);
                failures.push(DisposeError::DisposeFailed { label, source });
            }
        }
        failures
    }
}

/// 单例槽
///
/// 首次构造互斥，恰有一个调用方执行构造，并发调用方阻塞等待；之后的读取无锁
pub struct SingletonSlot<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> Default for SingletonSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingletonSlot<T> {
    /// 创建空的单例槽
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// 获取实例，尚未构造时构造
    pub fn get_or_init(&self, create: impl FnOnce() -> T) -> Arc<T> {
        Arc::clone(self.cell.get_or_init(|| Arc::new(create())))
    }

    /// 已构造的实例
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    /// 是否已经构造
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: Disposable + 'static> SingletonSlot<T> {
    /// 获取实例，首次构造时登记到组合作用域
    pub fn get_or_init_in(
        &self,
        scope: &DisposalScope,
        label: &str,
        create: impl FnOnce() -> T,
    ) -> DisposeResult<Arc<T>> {
        self.cell
            .get_or_try_init(|| {
                let instance = Arc::new(create());
                scope.register(label, instance.clone())?;
                Ok::<_, DisposeError>(instance)
            })
            .map(Arc::clone)
    }
}

/// 惰性序列
///
/// 首次迭代时物化一次，之后的迭代复用同一批元素
pub struct CachedSequence<T> {
    cell: OnceCell<Vec<T>>,
    materialize: Box<dyn Fn() -> Vec<T> + Send + Sync>,
}

impl<T> CachedSequence<T> {
    /// 以物化函数创建惰性序列
    pub fn new(materialize: impl Fn() -> Vec<T> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            materialize: Box::new(materialize),
        }
    }

    /// 迭代元素，首次调用时物化
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.cell.get_or_init(|| (self.materialize)()).iter()
    }

    /// 元素数量
    pub fn len(&self) -> usize {
        self.iter().len()
    }

    /// 是否没有元素
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否已经物化
    pub fn is_materialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<'a, T> IntoIterator for &'a CachedSequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 工厂函数，每次调用都执行一次解析
pub struct Deferred<T> {
    resolve: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Deferred<T> {
    /// 以解析函数创建工厂
    pub fn new(resolve: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            resolve: Box::new(resolve),
        }
    }

    /// 执行一次解析
    pub fn call(&self) -> T {
        (self.resolve)()
    }
}

/// 所有权包装
///
/// 值依赖图中的瞬时与构造单元实例登记在自带的作用域中，释放包装即释放它们
pub struct Owned<T> {
    value: T,
    scope: DisposalScope,
}

impl<T> Owned<T> {
    /// 以值和它的释放作用域创建包装
    pub fn new(value: T, scope: DisposalScope) -> Self {
        Self { value, scope }
    }

    /// 包装的值
    pub fn value(&self) -> &T {
        &self.value
    }

    /// 包装自带的释放作用域
    pub fn scope(&self) -> &DisposalScope {
        &self.scope
    }

    /// 释放作用域中的实例并返回值
    pub fn dispose(self) -> (T, Vec<DisposeError>) {
        let failures = self.scope.dispose();
        (self.value, failures)
    }
}

impl<T> std::ops::Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Disposable for Recorder {
        fn dispose(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(format!("{} 释放失败", self.name).into());
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Arc<dyn Disposable> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn scope_disposes_in_reverse_order_and_continues_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = DisposalScope::new("resolve");
        scope.register("a", recorder("a", &log, false)).unwrap();
        scope.register("b", recorder("b", &log, true)).unwrap();
        scope.register("c", recorder("c", &log, false)).unwrap();

        let failures = scope.dispose();
        assert_eq!(*log.lock(), vec!["c", "b", "a"]);
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], DisposeError::DisposeFailed { label, .. } if label == "b"));

        assert!(scope.is_disposed());
        assert!(scope.dispose().is_empty());
        assert!(matches!(
            scope.register("d", recorder("d", &log, false)),
            Err(DisposeError::ScopeDisposed { .. })
        ));
    }

    #[test]
    fn child_scope_names_are_nested() {
        let scope = DisposalScope::composition();
        let child = scope.child("request");
        assert_eq!(child.name, "composition.request");
        assert_ne!(child.id, scope.id);
    }

    #[test]
    fn singleton_slot_constructs_once_across_threads() {
        let slot = Arc::new(SingletonSlot::<usize>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slot = slot.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    *slot.get_or_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(slot.is_initialized());
    }

    #[test]
    fn singleton_registers_in_composition_scope_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = DisposalScope::composition();
        let slot = SingletonSlot::new();

        let first = slot
            .get_or_init_in(&scope, "config", || Recorder {
                name: "config",
                log: log.clone(),
                fail: false,
            })
            .unwrap();
        let second = slot
            .get_or_init_in(&scope, "config", || Recorder {
                name: "other",
                log: log.clone(),
                fail: false,
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn cached_sequence_materializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sequence = CachedSequence::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![1, 2, 3]
        });

        assert!(!sequence.is_materialized());
        assert_eq!(sequence.iter().sum::<i32>(), 6);
        assert_eq!((&sequence).into_iter().count(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deferred_resolves_on_every_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory = Deferred::new(move || counter.fetch_add(1, Ordering::SeqCst));

        assert_eq!(factory.call(), 0);
        assert_eq!(factory.call(), 1);
    }

    #[test]
    fn owned_disposes_its_own_scope() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = DisposalScope::new("owned");
        scope.register("worker", recorder("worker", &log, false)).unwrap();

        let owned = Owned::new("value", scope);
        assert_eq!(*owned, "value");
        let (value, failures) = owned.dispose();
        assert_eq!(value, "value");
        assert!(failures.is_empty());
        assert_eq!(*log.lock(), vec!["worker"]);
    }
}
