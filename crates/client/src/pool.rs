use crate::{ClientTransport, ConnectionTarget};
use crossbeam_queue::ArrayQueue;
use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    cell::RefCell,
    fmt::{self, Debug, Formatter},
    hash::Hash,
    marker::PhantomData,
    sync::Arc,
    time::{Duration, Instant},
};

/// bounded number of idle connections retained per target
pub const DEFAULT_CONNECTIONS: usize = 16;

/// how long an idle pooled connection stays usable
pub const DEFAULT_IDLE: Duration = Duration::from_secs(30);

/// An idle pooled item with its expiry deadline.
pub struct PoolEntry<V> {
    item: V,
    until: Option<Instant>,
}

impl<V: Debug> Debug for PoolEntry<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("item", &self.item)
            .field("until", &self.until)
            .finish()
    }
}

impl<V> PoolEntry<V> {
    /// construct an entry, expiring at `until` if provided
    pub fn new(item: V, until: Option<Instant>) -> Self {
        Self { item, until }
    }

    /// has this entry outlived its deadline?
    pub fn is_expired(&self) -> bool {
        match self.until {
            None => false,
            Some(until) => until < Instant::now(),
        }
    }

    /// the item, unless expired. expired items are dropped, which
    /// closes a connection.
    pub fn take(self) -> Option<V> {
        if self.is_expired() {
            None
        } else {
            Some(self.item)
        }
    }
}

pub struct PoolSet<V>(Arc<ArrayQueue<PoolEntry<V>>>);

impl<V> Debug for PoolSet<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolSet").field(&self.0.len()).finish()
    }
}

impl<V> Default for PoolSet<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTIONS)
    }
}

impl<V> Clone for PoolSet<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> PoolSet<V> {
    pub fn new(size: usize) -> Self {
        Self(Arc::new(ArrayQueue::new(size)))
    }

    pub fn insert(&self, entry: PoolEntry<V>) {
        self.0.force_push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Iterator for PoolSet<V> {
    type Item = PoolEntry<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.pop()
    }
}

/// A pool of idle connections, keyed by [`ConnectionTarget`]-like
/// keys. Cheaply cloneable; clones share the same pool.
pub struct Pool<K: Hash + Eq, V> {
    max_set_size: usize,
    connections: Arc<DashMap<K, PoolSet<V>>>,
}

impl<K: Hash + Eq + Debug, V> Debug for Pool<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for item in self.connections.iter() {
            map.entry(item.key(), item.value());
        }
        map.finish()
    }
}

impl<K: Hash + Eq, V> Clone for Pool<K, V> {
    fn clone(&self) -> Self {
        Self {
            connections: Arc::clone(&self.connections),
            max_set_size: self.max_set_size,
        }
    }
}

impl<K: Hash + Eq, V> Default for Pool<K, V> {
    fn default() -> Self {
        Self {
            connections: Default::default(),
            max_set_size: DEFAULT_CONNECTIONS,
        }
    }
}

impl<K, V> Pool<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    /// construct a pool retaining up to `max_set_size` idle
    /// connections per target
    pub fn new(max_set_size: usize) -> Self {
        Self {
            connections: Default::default(),
            max_set_size,
        }
    }

    /// park an entry under the provided key
    pub fn insert(&self, key: K, entry: PoolEntry<V>) {
        log::debug!("saving connection to {key:?}");
        match self.connections.entry(key) {
            Entry::Occupied(occupied) => {
                occupied.get().insert(entry);
            }

            Entry::Vacant(vacant) => {
                let pool_set = PoolSet::new(self.max_set_size);
                pool_set.insert(entry);
                vacant.insert(pool_set);
            }
        }
    }

    /// iterate over unexpired idle connections for the key, removing
    /// them from the pool as they are yielded
    pub fn candidates(&self, key: &K) -> impl Iterator<Item = V> {
        self.connections
            .get(key)
            .map(|poolset| poolset.clone().filter_map(PoolEntry::take))
            .into_iter()
            .flatten()
    }

    /// whether any connections are pooled under any key
    pub fn is_empty(&self) -> bool {
        self.connections.iter().all(|entry| entry.value().is_empty())
    }

    /// Sweep expired entries, dropping (and thereby closing) them,
    /// and remove empty per-target sets.
    pub fn clean(&self) {
        for entry in self.connections.iter() {
            let set = entry.value().clone();
            let mut retained = Vec::new();
            for pool_entry in set.clone() {
                if !pool_entry.is_expired() {
                    retained.push(pool_entry);
                }
            }
            for pool_entry in retained {
                set.insert(pool_entry);
            }
        }
        self.connections.retain(|_k, v| !v.is_empty());
    }

    /// remove and drop every pooled connection
    pub fn drain(&self) {
        for entry in self.connections.iter() {
            for dropped in entry.value().clone() {
                drop(dropped);
            }
        }
        self.connections.retain(|_k, _v| false);
    }
}

pub(crate) type TransportPool = Pool<ConnectionTarget, ClientTransport>;

thread_local! {
    static POOL_STACK: RefCell<Vec<(TransportPool, Duration)>> = RefCell::new(Vec::new());
}

pub(crate) fn current_pool() -> Option<(TransportPool, Duration)> {
    POOL_STACK.with(|stack| stack.borrow().last().cloned())
}

/// A lexical pooling scope.
///
/// While the guard is alive, client connections to the same
/// [`ConnectionTarget`] are parked on its pool and reused. Dropping
/// the guard pops the pool off the context stack and closes every
/// connection it still holds. Scopes nest; connections go to the
/// innermost one.
#[must_use = "pooling() returns a scope guard; connections are pooled only while it is alive"]
#[derive(Debug)]
pub struct PoolScope {
    pool: TransportPool,
    // scope guards belong to the task context that opened them
    _not_send: PhantomData<*const ()>,
}

impl PoolScope {
    /// the pool backing this scope
    pub fn pool(&self) -> &TransportPool {
        &self.pool
    }

    /// sweep expired connections
    pub fn clean(&self) {
        self.pool.clean();
    }

    /// whether the scope currently holds no idle connections
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl Drop for PoolScope {
    fn drop(&mut self) {
        POOL_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        self.pool.drain();
    }
}

/// Open a pooling scope with the default idle duration. See
/// [`PoolScope`].
pub fn pooling() -> PoolScope {
    pooling_with_idle(DEFAULT_IDLE)
}

/// Open a pooling scope whose connections stay valid for `idle` after
/// being parked.
pub fn pooling_with_idle(idle: Duration) -> PoolScope {
    let pool = TransportPool::default();
    POOL_STACK.with(|stack| {
        stack.borrow_mut().push((pool.clone(), idle));
    });
    PoolScope {
        pool,
        _not_send: PhantomData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(host: &str) -> ConnectionTarget {
        ConnectionTarget {
            host: host.into(),
            port: 80,
            ssl: false,
            proxy: None,
            verified: true,
        }
    }

    #[test]
    fn basic_pool_functionality() {
        let pool = Pool::default();
        for n in 0..5 {
            pool.insert(key("127.0.0.1"), PoolEntry::new(n, None));
        }

        assert_eq!(pool.candidates(&key("127.0.0.1")).next(), Some(0));
        assert_eq!(
            pool.candidates(&key("127.0.0.1")).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert!(pool.candidates(&key("elsewhere")).next().is_none());
    }

    #[test]
    fn eviction_at_capacity() {
        let pool = Pool::new(5);
        for n in 0..10 {
            pool.insert(key("h"), PoolEntry::new(n, None));
        }

        assert_eq!(
            pool.candidates(&key("h")).collect::<Vec<_>>(),
            vec![5, 6, 7, 8, 9]
        );
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let pool = Pool::new(5);
        pool.insert(
            key("h"),
            PoolEntry::new(1, Some(Instant::now() - Duration::from_secs(1))),
        );
        pool.insert(
            key("h"),
            PoolEntry::new(2, Some(Instant::now() + Duration::from_secs(60))),
        );
        assert_eq!(pool.candidates(&key("h")).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn clean_sweeps_expired() {
        let pool = Pool::new(5);
        pool.insert(
            key("h"),
            PoolEntry::new(1, Some(Instant::now() - Duration::from_secs(1))),
        );
        assert!(!pool.is_empty());
        pool.clean();
        assert!(pool.is_empty());
    }

    #[test]
    fn scope_stack_nests() {
        assert!(current_pool().is_none());
        let outer = pooling();
        {
            let inner = pooling_with_idle(Duration::from_secs(5));
            let (current, idle) = current_pool().unwrap();
            assert_eq!(idle, Duration::from_secs(5));
            assert!(Arc::ptr_eq(&current.connections, &inner.pool().connections));
            drop(inner);
        }
        let (current, _) = current_pool().unwrap();
        assert!(Arc::ptr_eq(&current.connections, &outer.pool().connections));
        drop(outer);
        assert!(current_pool().is_none());
    }
}
