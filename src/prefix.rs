//! Shared-prefix computation over unit sequences.

/// Returns the length of the longest common prefix of `a` and `b`.
///
/// # Examples
///
/// ```
/// use lcp_radix::shared_prefix_len;
///
/// assert_eq!(shared_prefix_len(b"romane", b"romulus"), 3);
/// assert_eq!(shared_prefix_len(b"abc", b"abc"), 3);
/// assert_eq!(shared_prefix_len::<u8>(b"", b"abc"), 0);
/// ```
#[inline]
pub fn shared_prefix_len<K: PartialEq>(a: &[K], b: &[K]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
