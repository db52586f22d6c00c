//! Generic FIFO queue
//!
//! Singly linked list with a sentinel head node. Nodes live in a slab
//! (`Vec`) and link to each other by index; node 0 is the sentinel and its
//! slot caches the index of the tail, which gives O(1) append without
//! doubly-linked bookkeeping.
//!
//! ```text
//!  nodes[0] Head{tail: 3} ─► nodes[2] Item(a) ─► nodes[5] Item(b) ─► nodes[3] Item(c)
//!  free list: 1 ─► 4
//! ```
//!
//! Removed nodes go on a free list and are reused by later enqueues, so a
//! queue that has reached its working size never allocates again. The
//! scheduler relies on this: yielding from a preemption tick must not call
//! into the allocator.
//!
//! Deletion and search are O(n). Queue population is bounded by the number
//! of live threads.

use core::fmt;
use core::mem;
use core::ops::ControlFlow;
use core::ptr::{self, NonNull};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{QueueError, QueueResult, SchedError};

/// Index of the sentinel node
const HEAD: usize = 0;

enum Slot<T> {
    /// Sentinel; `tail` is the last data node, or HEAD when empty
    Head { tail: usize },
    Item(T),
    Free,
}

struct Node<T> {
    next: Option<usize>,
    slot: Slot<T>,
}

impl<T> Node<T> {
    #[inline]
    fn item(&self) -> Option<&T> {
        match &self.slot {
            Slot::Item(item) => Some(item),
            _ => None,
        }
    }

    #[inline]
    fn item_mut(&mut self) -> Option<&mut T> {
        match &mut self.slot {
            Slot::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// Items that can be compared by identity rather than by value
///
/// Used by [`Queue::delete`]: two references to equal integers are still
/// different items.
pub trait Identity {
    /// True if `self` and `other` designate the same object
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for &T {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}

impl<T: ?Sized> Identity for &mut T {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        ptr::eq(&**self, &**other)
    }
}

impl<T: ?Sized> Identity for *const T {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}

impl<T: ?Sized> Identity for *mut T {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}

impl<T: ?Sized> Identity for NonNull<T> {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        ptr::eq(self.as_ptr(), other.as_ptr())
    }
}

impl<T: ?Sized> Identity for Rc<T> {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// FIFO queue with O(1) enqueue/dequeue and O(n) delete
pub struct Queue<T> {
    nodes: Vec<Node<T>>,
    /// Free list, threaded through `next`
    free: Option<usize>,
    free_count: usize,
    len: usize,
}

impl<T> Queue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            nodes: vec![Self::sentinel()],
            free: None,
            free_count: 0,
            len: 0,
        }
    }

    /// Create an empty queue, reporting allocation failure instead of aborting
    pub fn create() -> QueueResult<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(1)
            .map_err(|_| QueueError::AllocationFailed)?;
        nodes.push(Self::sentinel());
        Ok(Self {
            nodes,
            free: None,
            free_count: 0,
            len: 0,
        })
    }

    /// Release an empty queue
    ///
    /// A non-empty queue is handed back untouched inside [`NotEmpty`].
    pub fn destroy(self) -> Result<(), NotEmpty<T>> {
        if self.len != 0 {
            return Err(NotEmpty(self));
        }
        Ok(())
    }

    #[inline]
    fn sentinel() -> Node<T> {
        Node {
            next: None,
            slot: Slot::Head { tail: HEAD },
        }
    }

    #[inline]
    fn tail(&self) -> usize {
        match self.nodes[HEAD].slot {
            Slot::Head { tail } => tail,
            _ => HEAD,
        }
    }

    #[inline]
    fn set_tail(&mut self, idx: usize) {
        self.nodes[HEAD].slot = Slot::Head { tail: idx };
    }

    /// Take a node from the free list, or grow the slab
    fn alloc_node(&mut self, item: T) -> Result<usize, AllocError<T>> {
        if let Some(idx) = self.free {
            self.free = self.nodes[idx].next;
            self.free_count -= 1;
            self.nodes[idx] = Node {
                next: None,
                slot: Slot::Item(item),
            };
            return Ok(idx);
        }

        if self.nodes.try_reserve(1).is_err() {
            return Err(AllocError(item));
        }
        self.nodes.push(Node {
            next: None,
            slot: Slot::Item(item),
        });
        Ok(self.nodes.len() - 1)
    }

    /// Return a data node to the free list and hand out its item
    fn release_node(&mut self, idx: usize) -> T {
        let node = &mut self.nodes[idx];
        let slot = mem::replace(&mut node.slot, Slot::Free);
        node.next = self.free;
        self.free = Some(idx);
        self.free_count += 1;

        match slot {
            Slot::Item(item) => item,
            _ => unreachable!("queue node {} released twice", idx),
        }
    }

    /// Unlink `cur`, whose predecessor is `prev`
    fn unlink(&mut self, prev: usize, cur: usize) -> T {
        self.nodes[prev].next = self.nodes[cur].next;
        if self.tail() == cur {
            self.set_tail(prev);
        }
        self.len -= 1;
        self.release_node(cur)
    }

    /// Append an item at the tail
    ///
    /// Does not allocate when a previously removed node is available.
    pub fn enqueue(&mut self, item: T) -> Result<(), AllocError<T>> {
        let idx = self.alloc_node(item)?;
        let tail = self.tail();
        self.nodes[tail].next = Some(idx);
        self.set_tail(idx);
        self.len += 1;
        Ok(())
    }

    /// Remove and return the front item
    pub fn dequeue(&mut self) -> QueueResult<T> {
        let first = self.nodes[HEAD].next.ok_or(QueueError::Empty)?;
        Ok(self.unlink(HEAD, first))
    }

    /// Remove the first item matching `pred`, preserving the order of the rest
    pub fn delete_where<F>(&mut self, mut pred: F) -> QueueResult<T>
    where
        F: FnMut(&T) -> bool,
    {
        if self.len == 0 {
            return Err(QueueError::Empty);
        }

        let mut prev = HEAD;
        let mut cur = self.nodes[HEAD].next;
        while let Some(idx) = cur {
            if self.nodes[idx].item().is_some_and(&mut pred) {
                return Ok(self.unlink(prev, idx));
            }
            prev = idx;
            cur = self.nodes[idx].next;
        }

        Err(QueueError::NotFound)
    }

    /// Remove the first node holding `item` itself (identity, not equality)
    pub fn delete(&mut self, item: &T) -> QueueResult<T>
    where
        T: Identity,
    {
        self.delete_where(|candidate| candidate.is_same(item))
    }

    /// Move the front item to the tail without allocating
    pub fn rotate(&mut self) -> QueueResult<()> {
        let first = self.nodes[HEAD].next.ok_or(QueueError::Empty)?;
        let tail = self.tail();
        if first == tail {
            return Ok(());
        }

        self.nodes[HEAD].next = self.nodes[first].next;
        self.nodes[first].next = None;
        self.nodes[tail].next = Some(first);
        self.set_tail(first);
        Ok(())
    }

    /// Visit items front to back until `f` breaks
    ///
    /// Returns the item `f` stopped on, or `None` if it visited everything.
    pub fn iterate<F>(&self, mut f: F) -> Option<&T>
    where
        F: FnMut(&T) -> ControlFlow<()>,
    {
        self.iter().find(|item| f(*item).is_break())
    }

    /// Like [`iterate`](Self::iterate), with mutable access to each item
    pub fn iterate_mut<F>(&mut self, mut f: F) -> Option<&mut T>
    where
        F: FnMut(&mut T) -> ControlFlow<()>,
    {
        let mut stopped = None;
        let mut cur = self.nodes[HEAD].next;
        while let Some(idx) = cur {
            cur = self.nodes[idx].next;
            if let Some(item) = self.nodes[idx].item_mut() {
                if f(item).is_break() {
                    stopped = Some(idx);
                    break;
                }
            }
        }

        let idx = stopped?;
        self.nodes[idx].item_mut()
    }

    /// Lazy front-to-back iterator
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            cur: self.nodes[HEAD].next,
            remaining: self.len,
        }
    }

    /// Front item (the running thread, for the ready queue)
    #[inline]
    pub fn front(&self) -> Option<&T> {
        self.nodes[HEAD].next.and_then(|idx| self.nodes[idx].item())
    }

    /// Mutable front item
    #[inline]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        let idx = self.nodes[HEAD].next?;
        self.nodes[idx].item_mut()
    }

    /// Mutable tail item
    #[inline]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        let tail = self.tail();
        if tail == HEAD {
            return None;
        }
        self.nodes[tail].item_mut()
    }

    /// Make sure the next `additional` enqueues will not allocate
    pub fn reserve(&mut self, additional: usize) -> QueueResult<()> {
        let spare = self.free_count + (self.nodes.capacity() - self.nodes.len());
        if spare < additional {
            self.nodes
                .try_reserve(additional - spare)
                .map_err(|_| QueueError::AllocationFailed)?;
        }
        Ok(())
    }

    /// Number of items
    #[inline]
    pub fn length(&self) -> usize {
        self.len
    }

    /// Number of items
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walk the list and check the cached tail, length and free list
    #[cfg(any(test, feature = "debug-assertions"))]
    pub fn check_invariants(&self) {
        let mut count = 0;
        let mut last = HEAD;
        let mut cur = self.nodes[HEAD].next;
        while let Some(idx) = cur {
            assert!(self.nodes[idx].item().is_some(), "linked node {} holds no item", idx);
            count += 1;
            last = idx;
            cur = self.nodes[idx].next;
        }
        assert_eq!(count, self.len, "length cache out of sync");
        assert_eq!(last, self.tail(), "tail cache out of sync");

        let mut free = 0;
        let mut cur = self.free;
        while let Some(idx) = cur {
            assert!(matches!(self.nodes[idx].slot, Slot::Free));
            free += 1;
            cur = self.nodes[idx].next;
        }
        assert_eq!(free, self.free_count, "free list count out of sync");
        assert_eq!(1 + self.len + free, self.nodes.len(), "leaked queue node");
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a Queue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

/// Front-to-back iterator over a [`Queue`]
pub struct Iter<'a, T> {
    nodes: &'a [Node<T>],
    cur: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = &self.nodes[self.cur?];
        self.cur = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        node.item()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Enqueue failed for lack of memory; the rejected item is handed back
pub struct AllocError<T>(pub T);

impl<T> AllocError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocError(..)")
    }
}

impl<T> fmt::Display for AllocError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", QueueError::AllocationFailed)
    }
}

impl<T> std::error::Error for AllocError<T> {}

impl<T> From<AllocError<T>> for QueueError {
    fn from(_: AllocError<T>) -> Self {
        QueueError::AllocationFailed
    }
}

impl<T> From<AllocError<T>> for SchedError {
    fn from(_: AllocError<T>) -> Self {
        SchedError::Queue(QueueError::AllocationFailed)
    }
}

/// Destroy refused because the queue still holds items
pub struct NotEmpty<T>(pub Queue<T>);

impl<T> NotEmpty<T> {
    /// Get the intact queue back
    pub fn into_inner(self) -> Queue<T> {
        self.0
    }
}

impl<T> fmt::Debug for NotEmpty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotEmpty(len={})", self.0.len())
    }
}

impl<T> fmt::Display for NotEmpty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue still holds {} item(s)", self.0.len())
    }
}

impl<T> std::error::Error for NotEmpty<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled<'a>(data: &'a [i32]) -> Queue<&'a i32> {
        let mut q = Queue::new();
        for item in data {
            q.enqueue(item).unwrap();
        }
        q
    }

    #[test]
    fn test_create_empty() {
        let q: Queue<&i32> = Queue::create().unwrap();
        assert_eq!(q.length(), 0);
        assert!(q.is_empty());
        assert!(q.front().is_none());
        assert_eq!(q.tail(), HEAD);
        q.check_invariants();
        assert!(q.destroy().is_ok());
    }

    #[test]
    fn test_destroy_non_empty() {
        let data = [85];
        let q = filled(&data);

        let q = q.destroy().unwrap_err().into_inner();
        assert_eq!(q.length(), 1);
        assert!(ptr::eq(*q.front().unwrap(), &data[0]));
        q.check_invariants();
    }

    #[test]
    fn test_destroy_after_delete_and_dequeue() {
        let data = [1, 85];
        let mut q = filled(&data);

        q.delete(&&data[0]).unwrap();
        let out = q.dequeue().unwrap();
        assert!(ptr::eq(out, &data[1]));
        q.check_invariants();
        assert!(q.destroy().is_ok());
    }

    #[test]
    fn test_fifo_order() {
        let data: Vec<i32> = (0..1000).collect();
        let mut q = Queue::new();
        for (i, item) in data.iter().enumerate() {
            q.enqueue(item).unwrap();
            assert_eq!(q.length(), i + 1);
        }
        for expected in &data {
            let out = q.dequeue().unwrap();
            assert!(ptr::eq(out, expected));
        }
        assert_eq!(q.dequeue(), Err(QueueError::Empty));
        q.check_invariants();
    }

    #[test]
    fn test_delete_middle_and_end() {
        let data = [62, 12, 49];

        let mut q = filled(&data);
        q.delete(&&data[0]).unwrap();
        assert!(ptr::eq(q.dequeue().unwrap(), &data[1]));
        assert!(ptr::eq(q.dequeue().unwrap(), &data[2]));

        let mut q = filled(&data);
        q.delete(&&data[2]).unwrap();
        q.check_invariants();
        // Tail moved back; appending must land after data[1]
        q.enqueue(&data[0]).unwrap();
        let order: Vec<i32> = q.iter().map(|x| **x).collect();
        assert_eq!(order, vec![62, 12, 62]);
        q.check_invariants();
    }

    #[test]
    fn test_double_delete() {
        let data = ['a', 'b', 'c', 'd'];
        let mut q = Queue::new();
        for item in &data {
            q.enqueue(item).unwrap();
        }
        q.delete(&&data[0]).unwrap();
        q.delete(&&data[2]).unwrap();
        assert!(ptr::eq(q.dequeue().unwrap(), &data[1]));
        assert!(ptr::eq(q.dequeue().unwrap(), &data[3]));
        assert!(q.is_empty());
    }

    #[test]
    fn test_delete_is_by_identity() {
        let data = [5, 5, 5];
        let mut q = filled(&data);

        q.delete(&&data[1]).unwrap();
        assert!(ptr::eq(q.dequeue().unwrap(), &data[0]));
        assert!(ptr::eq(q.dequeue().unwrap(), &data[2]));
    }

    #[test]
    fn test_delete_absent() {
        let data = [1, 2, 3];
        let other = 2;
        let mut q = filled(&data);

        assert_eq!(q.delete(&&other), Err(QueueError::NotFound));
        let order: Vec<i32> = q.iter().map(|x| **x).collect();
        assert_eq!(order, vec![1, 2, 3]);
        q.check_invariants();

        let mut empty: Queue<&i32> = Queue::new();
        assert_eq!(empty.delete(&&other), Err(QueueError::Empty));
    }

    #[test]
    fn test_delete_where() {
        let mut q = Queue::new();
        for i in 1..=5u32 {
            q.enqueue(i).unwrap();
        }
        assert_eq!(q.delete_where(|x| x % 2 == 0), Ok(2));
        assert_eq!(q.delete_where(|x| *x == 9), Err(QueueError::NotFound));
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_length_tracks_deletes() {
        let data = ['a', 'b'];
        let mut q = Queue::new();
        assert_eq!(q.length(), 0);
        q.enqueue(&data[0]).unwrap();
        assert_eq!(q.length(), 1);
        q.enqueue(&data[1]).unwrap();
        assert_eq!(q.length(), 2);
        q.delete(&&data[1]).unwrap();
        assert_eq!(q.length(), 1);
        q.delete(&&data[0]).unwrap();
        assert_eq!(q.length(), 0);
        q.check_invariants();
    }

    #[test]
    fn test_delete_in_reverse() {
        let data: Vec<i32> = (0..100).collect();
        let mut q = filled(&data);
        for i in (0..100).rev() {
            q.delete(&&data[i]).unwrap();
            assert_eq!(q.length(), i);
        }
        q.check_invariants();
        assert!(q.destroy().is_ok());
    }

    #[test]
    fn test_iterate() {
        let mut q = Queue::new();
        for i in 1..=10 {
            q.enqueue(i).unwrap();
        }

        // Add 1 to every item
        let stopped = q.iterate_mut(|x| {
            *x += 1;
            ControlFlow::Continue(())
        });
        assert!(stopped.is_none());
        assert_eq!(q.front(), Some(&2));

        // Find the item equal to 5
        let found = q.iterate(|x| {
            if *x == 5 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(found, Some(&5));

        let mut visited = 0;
        q.iterate(|_| {
            visited += 1;
            ControlFlow::Break(())
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_iterate_mut_returns_stopped_item() {
        let mut q = Queue::new();
        for i in 0..4 {
            q.enqueue(i).unwrap();
        }
        if let Some(x) = q.iterate_mut(|x| {
            if *x == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }) {
            *x = 20;
        }
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![0, 1, 20, 3]);
    }

    #[test]
    fn test_rotate() {
        let mut q = Queue::new();
        assert_eq!(q.rotate(), Err(QueueError::Empty));

        q.enqueue(1).unwrap();
        q.rotate().unwrap();
        assert_eq!(q.front(), Some(&1));
        q.check_invariants();

        q.enqueue(2).unwrap();
        q.enqueue(3).unwrap();
        q.rotate().unwrap();
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![2, 3, 1]);
        assert_eq!(q.back_mut(), Some(&mut 1));
        q.check_invariants();
    }

    #[test]
    fn test_nodes_are_reused() {
        let mut q = Queue::new();
        for i in 0..8 {
            q.enqueue(i).unwrap();
        }
        let slab = q.nodes.len();

        for i in 0..1000 {
            let x = q.dequeue().unwrap();
            q.enqueue(x + i).unwrap();
        }
        assert_eq!(q.nodes.len(), slab);
        q.check_invariants();
    }

    #[test]
    fn test_reserve() {
        let mut q = Queue::new();
        q.reserve(16).unwrap();
        let cap = q.nodes.capacity();
        for i in 0..16 {
            q.enqueue(i).unwrap();
        }
        assert_eq!(q.nodes.capacity(), cap);
    }

    #[test]
    fn test_repeated_use() {
        let data: Vec<i32> = (0..100).collect();
        let mut q = Queue::new();
        for i in 0..99 {
            q.enqueue(&data[i]).unwrap();
            assert!(ptr::eq(q.dequeue().unwrap(), &data[i]));

            q.enqueue(&data[i]).unwrap();
            q.enqueue(&data[i + 1]).unwrap();
            assert!(ptr::eq(q.dequeue().unwrap(), &data[i]));

            q.enqueue(&data[i]).unwrap();
            q.delete(&&data[i]).unwrap();
            assert!(ptr::eq(q.dequeue().unwrap(), &data[i + 1]));
            assert_eq!(q.length(), 0);
        }
        q.check_invariants();
        assert!(q.destroy().is_ok());
    }

    #[test]
    fn test_iter_size_hint() {
        let q = filled(&[1, 2, 3]);
        let mut it = q.iter();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        assert_eq!(format!("{:?}", q), "[1, 2, 3]");
    }

    #[test]
    fn test_identity_smart_pointers() {
        let a = Rc::new(1);
        let b = Rc::new(1);
        let mut q = Queue::new();
        q.enqueue(a.clone()).unwrap();
        q.enqueue(b.clone()).unwrap();

        let removed = q.delete(&b).unwrap();
        assert!(Rc::ptr_eq(&removed, &b));
        assert!(Rc::ptr_eq(q.front().unwrap(), &a));
    }
}
