//! 解析结果缓存
//!
//! 以书籍ID为键的有界LRU缓存。文件变化或书籍被删除时需要宿主显式失效。
//! 同一本书同时只会有一个解析在进行，不同书籍互不阻塞。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::epub::book::BookContent;
use crate::epub::error::Result;

/// 默认容量
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// 一本书正在进行的解析
///
/// `generation`在失效时递增，解析结束时与开始时不同则结果不写入缓存。
/// 最后一个使用者释放时从表中移除。
#[derive(Default)]
struct InFlight {
    lock: Mutex<()>,
    generation: AtomicU64,
}

pub struct BookCache {
    entries: Mutex<LruCache<String, Arc<BookContent>>>,
    /// 每本书的解析锁；加锁顺序先`in_flight`后`entries`
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
}

impl Default for BookCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl BookCache {
    /// 容量为0时使用默认容量
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, book_id: &str) -> Option<Arc<BookContent>> {
        self.entries.lock().get(book_id).cloned()
    }

    pub fn insert(&self, content: BookContent) -> Arc<BookContent> {
        let content = Arc::new(content);
        self.store(content.clone());
        content
    }

    fn store(&self, content: Arc<BookContent>) {
        let book_id = content.book_id.clone();
        if let Some((evicted, _)) = self.entries.lock().push(book_id.clone(), content) {
            if evicted != book_id {
                debug!(book_id = %evicted, "缓存已满，淘汰最久未使用的书籍");
            }
        }
    }

    /// 命中则直接返回，否则调用`parse`并缓存结果
    ///
    /// 解析失败不会写入缓存。解析期间该书被失效时，结果照常返回给调用者但不写入缓存。
    /// 缓存键为`book_id`，解析结果的`book_id`会被覆盖为它。
    pub fn get_or_parse<F>(&self, book_id: &str, parse: F) -> Result<Arc<BookContent>>
    where
        F: FnOnce() -> Result<BookContent>,
    {
        if let Some(hit) = self.get(book_id) {
            return Ok(hit);
        }

        let slot = self
            .in_flight
            .lock()
            .entry(book_id.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = slot.lock.lock();
            // 等锁期间可能已被其他线程解析
            match self.get(book_id) {
                Some(hit) => Ok(hit),
                None => self.parse_and_store(book_id, &slot, parse),
            }
        };

        self.release(book_id, &slot);
        result
    }

    fn parse_and_store<F>(&self, book_id: &str, slot: &InFlight, parse: F) -> Result<Arc<BookContent>>
    where
        F: FnOnce() -> Result<BookContent>,
    {
        let generation = slot.generation.load(Ordering::Acquire);
        debug!(book_id = %book_id, "缓存未命中，开始解析");
        let mut content = parse()?;
        content.book_id = book_id.to_string();
        let content = Arc::new(content);

        let _in_flight = self.in_flight.lock();
        if slot.generation.load(Ordering::Acquire) == generation {
            self.store(content.clone());
        } else {
            debug!(book_id = %book_id, "解析期间缓存已失效，结果不写入缓存");
        }
        Ok(content)
    }

    /// 没有其他线程持有该解析槽时把它移出表
    fn release(&self, book_id: &str, slot: &Arc<InFlight>) {
        let mut in_flight = self.in_flight.lock();
        // 表和当前调用各持有一份
        let unused = in_flight
            .get(book_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unused {
            in_flight.remove(book_id);
        }
    }

    /// 使某本书的缓存失效，正在进行的解析结果也不会写入
    pub fn invalidate(&self, book_id: &str) -> bool {
        let in_flight = self.in_flight.lock();
        if let Some(slot) = in_flight.get(book_id) {
            slot.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.entries.lock().pop(book_id).is_some()
    }

    pub fn clear(&self) {
        let in_flight = self.in_flight.lock();
        for slot in in_flight.values() {
            slot.generation.fetch_add(1, Ordering::AcqRel);
        }
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}
