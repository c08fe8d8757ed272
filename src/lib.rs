//! Prefix-compressed radix trees with longest common prefix matching.
//!
//! # lcp_radix::Tree
//! A single-threaded radix tree that defines the matching semantics.
//!
//! # lcp_radix::ConcurrentTree
//! A radix tree that can be shared by multiple threads; every node is guarded by its own lock.
//!
//! Keys are slices of any hashable unit: bytes, `char`s, tokens, or path segments.
//!
//! ```
//! use lcp_radix::ConcurrentTree;
//!
//! let tree: ConcurrentTree<u8, &str> = ConcurrentTree::new();
//! tree.insert(b"/api/users", "users");
//! tree.insert(b"/api/orders", "orders");
//!
//! let result = tree.longest_common_prefix_match(b"/api/users/42");
//! assert_eq!(result.prefix, b"/api/users");
//! assert_eq!(result.value, Some("users"));
//! assert!(!result.exact);
//! ```

pub mod concurrent_tree;
pub use concurrent_tree::ConcurrentTree;

pub mod tree;
pub use tree::Tree;

mod lock;

mod matches;
pub use matches::{LongestMatch, Match};

mod prefix;
pub use prefix::shared_prefix_len;

#[cfg(feature = "serde")]
mod serde;
