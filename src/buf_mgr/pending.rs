/// Pending-write registry and eviction mechanisms.
///
/// Items are kept in a doubly linked list stored in a vector of nodes. A node is addressed by
/// a handle which contains node index and node generation, so an item can be removed in O(1),
/// and a handle of a removed item never matches an item which reused the same node.


use crate::common::errors::Error;


/// Position of an item in the registry.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct BufferHandle {
    idx:    usize,
    gen:    u64,
}


struct Node<T> {
    item:   Option<T>,
    gen:    u64,
    prev:   Option<usize>,
    next:   Option<usize>,
}


/// Ordered list of items with O(1) insertion at the back and O(1) removal by handle.
pub struct PendingList<T> {
    nodes:  Vec<Node<T>>,
    unused: Vec<usize>,
    head:   Option<usize>,  // the oldest item
    tail:   Option<usize>,  // the newest item
    len:    usize,
}

impl<T: Clone> PendingList<T> {

    pub fn new() -> Self {
        PendingList {
            nodes:  Vec::new(),
            unused: Vec::new(),
            head:   None,
            tail:   None,
            len:    0,
        }
    }

    pub fn push_back(&mut self, item: T) -> BufferHandle {
        let idx = if let Some(idx) = self.unused.pop() {
            self.nodes[idx].item = Some(item);
            idx
        } else {
            self.nodes.push(Node {
                item: Some(item),
                gen: 0,
                prev: None,
                next: None,
            });
            self.nodes.len() - 1
        };

        self.link_back(idx);
        self.len += 1;

        BufferHandle {
            idx,
            gen: self.nodes[idx].gen,
        }
    }

    /// Remove item; return None if handle is stale.
    pub fn remove(&mut self, h: BufferHandle) -> Option<T> {
        if !self.is_valid(h) {
            return None;
        }

        self.unlink(h.idx);

        let node = &mut self.nodes[h.idx];
        node.gen += 1;
        let ret = node.item.take();

        self.unused.push(h.idx);
        self.len -= 1;

        ret
    }

    /// Move item to the back of the list; return false if handle is stale.
    pub fn move_to_back(&mut self, h: BufferHandle) -> bool {
        if !self.is_valid(h) {
            return false;
        }

        if self.tail != Some(h.idx) {
            self.unlink(h.idx);
            self.link_back(h.idx);
        }

        true
    }

    /// Return the oldest item.
    pub fn front(&self) -> Option<(BufferHandle, T)> {
        self.head.and_then(|idx| self.entry(idx))
    }

    /// Return all items from the oldest to the newest.
    pub fn snapshot(&self) -> Vec<(BufferHandle, T)> {
        let mut ret = Vec::with_capacity(self.len);
        let mut cur = self.head;
        while let Some(idx) = cur {
            if let Some(e) = self.entry(idx) {
                ret.push(e);
            }
            cur = self.nodes[idx].next;
        }
        ret
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_valid(&self, h: BufferHandle) -> bool {
        h.idx < self.nodes.len() && self.nodes[h.idx].gen == h.gen && self.nodes[h.idx].item.is_some()
    }

    fn entry(&self, idx: usize) -> Option<(BufferHandle, T)> {
        let node = &self.nodes[idx];
        node.item.as_ref().map(|item| (BufferHandle { idx, gen: node.gen }, item.clone()))
    }

    fn link_back(&mut self, idx: usize) {
        self.nodes[idx].prev = self.tail;
        self.nodes[idx].next = None;

        if let Some(tail) = self.tail {
            self.nodes[tail].next = Some(idx);
        } else {
            self.head = Some(idx);
        }

        self.tail = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        if let Some(prev) = prev {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }

        if let Some(next) = next {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }
}


/// Eviction mechanism.
/// Client adds items when they become buffered and calls on_access each time an already
/// registered item is touched again. When memory must be released the client asks for a
/// victim, flushes it, and removes it from the mechanism.
pub trait EvictionMech<T>: Send {

    // register an item, return its handle.
    fn add_item(&mut self, item: T) -> BufferHandle;

    // updates eviction priority of the item.
    fn on_access(&mut self, h: BufferHandle);

    // unregister an item.
    fn remove(&mut self, h: BufferHandle) -> Option<T>;

    // item which should be evicted next.
    fn victim(&self) -> Option<(BufferHandle, T)>;

    // all items in eviction order.
    fn snapshot(&self) -> Vec<(BufferHandle, T)>;

    // number of registered items.
    fn len(&self) -> usize;
}


/// Items are evicted in the order they were registered first; access does not change the order.
pub struct FifoList<T> {
    list: PendingList<T>,
}

impl<T: Clone> FifoList<T> {
    pub fn new() -> Self {
        FifoList {
            list: PendingList::new(),
        }
    }
}

impl<T: Clone + Send> EvictionMech<T> for FifoList<T> {

    fn add_item(&mut self, item: T) -> BufferHandle {
        self.list.push_back(item)
    }

    fn on_access(&mut self, _h: BufferHandle) {
    }

    fn remove(&mut self, h: BufferHandle) -> Option<T> {
        self.list.remove(h)
    }

    fn victim(&self) -> Option<(BufferHandle, T)> {
        self.list.front()
    }

    fn snapshot(&self) -> Vec<(BufferHandle, T)> {
        self.list.snapshot()
    }

    fn len(&self) -> usize {
        self.list.len()
    }
}


/// Least recently accessed item is evicted first.
pub struct LruList<T> {
    list: PendingList<T>,
}

impl<T: Clone> LruList<T> {
    pub fn new() -> Self {
        LruList {
            list: PendingList::new(),
        }
    }
}

impl<T: Clone + Send> EvictionMech<T> for LruList<T> {

    fn add_item(&mut self, item: T) -> BufferHandle {
        self.list.push_back(item)
    }

    fn on_access(&mut self, h: BufferHandle) {
        self.list.move_to_back(h);
    }

    fn remove(&mut self, h: BufferHandle) -> Option<T> {
        self.list.remove(h)
    }

    fn victim(&self) -> Option<(BufferHandle, T)> {
        self.list.front()
    }

    fn snapshot(&self) -> Vec<(BufferHandle, T)> {
        self.list.snapshot()
    }

    fn len(&self) -> usize {
        self.list.len()
    }
}


/// Create eviction mechanism by its configuration name.
pub fn eviction_mech<T: Clone + Send + 'static>(name: &str) -> Result<Box<dyn EvictionMech<T>>, Error> {
    match name {
        "fifo" => Ok(Box::new(FifoList::new())),
        "lru" => Ok(Box::new(LruList::new())),
        _ => Err(Error::unknown_eviction_policy(name.to_owned())),
    }
}
