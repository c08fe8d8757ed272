use sdd::Guard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};

use loom::model::Builder;
use loom::thread::{spawn, yield_now};

use crate::ConcurrentTree;

#[derive(Debug)]
struct A(usize, Arc<AtomicUsize>);
impl A {
    fn new(d: usize, c: Arc<AtomicUsize>) -> Self {
        c.fetch_add(1, Relaxed);
        Self(d, c)
    }
}
impl Clone for A {
    fn clone(&self) -> Self {
        self.1.fetch_add(1, Relaxed);
        Self(self.0, self.1.clone())
    }
}
impl Drop for A {
    fn drop(&mut self) {
        self.1.fetch_sub(1, Relaxed);
    }
}

static SERIALIZER: Mutex<()> = Mutex::new(());

fn drain_garbage() {
    loop {
        let guard = Guard::new();
        if !guard.has_garbage() {
            break;
        }
        guard.accelerate();
        yield_now();
    }
}

// Checks that two inserts splitting the same edge are both visible.
#[test]
fn concurrent_tree_insert_split() {
    let _guard = SERIALIZER.lock().unwrap();

    let mut model_builder_insert_split = Builder::new();
    model_builder_insert_split.max_threads = 2;
    model_builder_insert_split.max_branches = 1_048_576;
    model_builder_insert_split.check(|| {
        let tree: Arc<ConcurrentTree<u8, usize>> = Arc::new(ConcurrentTree::new());
        assert!(tree.insert(b"romane", 0).is_some());

        let tree_clone = tree.clone();
        let thread_insert = spawn(move || {
            assert!(tree_clone.insert(b"romulus", 1).is_some());
            drop(tree_clone);
            drain_garbage();
        });
        assert!(tree.insert(b"romanus", 2).is_some());
        assert!(thread_insert.join().is_ok());

        assert_eq!(tree.get(b"romane"), Some(0));
        assert_eq!(tree.get(b"romulus"), Some(1));
        assert_eq!(tree.get(b"romanus"), Some(2));
        assert_eq!(tree.len(), 3);

        drop(tree);
        drain_garbage();
    });
}

// Checks that a removal racing with an insert below the removed key leaves the other key intact.
#[test]
fn concurrent_tree_remove_insert() {
    let _guard = SERIALIZER.lock().unwrap();

    let mut model_builder_remove_insert = Builder::new();
    model_builder_remove_insert.max_threads = 2;
    model_builder_remove_insert.max_branches = 1_048_576;
    model_builder_remove_insert.check(|| {
        let tree: Arc<ConcurrentTree<u8, usize>> = Arc::new(ConcurrentTree::new());
        assert!(tree.insert(b"ab", 0).is_some());
        assert!(tree.insert(b"ac", 1).is_some());

        let tree_clone = tree.clone();
        let thread_remove = spawn(move || {
            assert!(tree_clone.remove(b"ab"));
            drop(tree_clone);
            drain_garbage();
        });
        assert!(tree.insert(b"abc", 2).is_some());
        assert!(thread_remove.join().is_ok());

        assert!(tree.get(b"ab").is_none());
        assert_eq!(tree.get(b"ac"), Some(1));
        assert_eq!(tree.get(b"abc"), Some(2));
        assert_eq!(tree.len(), 2);

        drop(tree);
        drain_garbage();
    });
}

// Checks that a reader never observes an edge halfway through a split.
#[test]
fn concurrent_tree_read_split() {
    let _guard = SERIALIZER.lock().unwrap();

    let mut model_builder_read_split = Builder::new();
    model_builder_read_split.max_threads = 2;
    model_builder_read_split.max_branches = 1_048_576;
    model_builder_read_split.check(|| {
        let tree: Arc<ConcurrentTree<u8, usize>> = Arc::new(ConcurrentTree::new());
        assert!(tree.insert(b"stable", 0).is_some());

        let tree_clone = tree.clone();
        let thread_insert = spawn(move || {
            assert!(tree_clone.insert(b"stab", 1).is_some());
            drop(tree_clone);
            drain_garbage();
        });
        let result = tree.longest_common_prefix_match(b"stable");
        assert_eq!(result.prefix, b"stable");
        assert_eq!(result.value, Some(0));
        assert!(result.exact);
        assert!(thread_insert.join().is_ok());

        drop(tree);
        drain_garbage();
    });
}

// Checks that every value is dropped once the tree is dropped.
#[test]
fn concurrent_tree_drop() {
    let _guard = SERIALIZER.lock().unwrap();

    let mut model_builder_drop = Builder::new();
    model_builder_drop.max_threads = 2;
    model_builder_drop.max_branches = 1_048_576;
    model_builder_drop.check(|| {
        let checker = Arc::new(AtomicUsize::new(0));
        let tree: Arc<ConcurrentTree<u8, A>> = Arc::new(ConcurrentTree::new());
        assert!(tree.insert(b"ab", A::new(0, checker.clone())).is_some());

        let tree_clone = tree.clone();
        let checker_clone = checker.clone();
        let thread_insert = spawn(move || {
            assert!(tree_clone.insert(b"ac", A::new(1, checker_clone)).is_some());
            assert!(tree_clone.remove(b"ab"));
            drop(tree_clone);
            drain_garbage();
        });
        assert!(tree.get(b"ab").iter().all(|a| a.0 == 0));
        assert!(thread_insert.join().is_ok());
        assert_eq!(tree.get(b"ac").map(|a| a.0), Some(1));

        drop(tree);
        while checker.load(Relaxed) != 0 {
            Guard::new().accelerate();
            yield_now();
        }
    });
}

// Checks that exactly one of two racing removals of the same key succeeds.
#[test]
fn concurrent_tree_remove_same_key() {
    let _guard = SERIALIZER.lock().unwrap();

    let mut model_builder_remove_same_key = Builder::new();
    model_builder_remove_same_key.max_threads = 2;
    model_builder_remove_same_key.max_branches = 1_048_576;
    model_builder_remove_same_key.check(|| {
        let tree: Arc<ConcurrentTree<u8, usize>> = Arc::new(ConcurrentTree::new());
        assert!(tree.insert(b"ka", 0).is_some());
        assert!(tree.insert(b"kb", 1).is_some());

        let tree_clone = tree.clone();
        let thread_remove = spawn(move || {
            let removed = tree_clone.remove(b"ka");
            drop(tree_clone);
            drain_garbage();
            removed
        });
        let removed = tree.remove(b"ka");
        let removed_by_other = thread_remove.join().unwrap();
        assert!(removed ^ removed_by_other);
        assert!(tree.get(b"ka").is_none());
        assert_eq!(tree.get(b"kb"), Some(1));

        drop(tree);
        drain_garbage();
    });
}
