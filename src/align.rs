/// Rounds `value` up to the next power of two.
///
/// Inputs of `0` and `1` both round to `1`. Returns `None` when the result
/// would not fit in a `usize`.
///
/// # Examples
///
/// ```rust
/// use arenalloc::align::next_pow2;
///
/// assert_eq!(next_pow2(0), Some(1));
/// assert_eq!(next_pow2(508), Some(512));
/// assert_eq!(next_pow2(512), Some(512));
/// assert_eq!(next_pow2(usize::MAX), None);
/// ```
pub const fn next_pow2(value: usize) -> Option<usize> {
  if value <= 1 {
    return Some(1);
  }
  value.checked_next_power_of_two()
}

/// Checks whether `value` is a multiple of `align`. `align` must be a power of two.
#[inline]
pub const fn is_aligned(
  value: usize,
  align: usize,
) -> bool {
  debug_assert!(align.is_power_of_two());
  value & (align - 1) == 0
}

/// Returns the order of a power-of-two `block` measured in units of `min_chunk`.
///
/// Both arguments must be powers of two with `block >= min_chunk`.
#[inline]
pub const fn order_of(
  block: usize,
  min_chunk: usize,
) -> usize {
  (block.trailing_zeros() - min_chunk.trailing_zeros()) as usize
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_next_pow2() {
    assert_eq!(next_pow2(1), Some(1));
    assert_eq!(next_pow2(2), Some(2));
    assert_eq!(next_pow2(3), Some(4));

    for shift in 2..20 {
      let pow = 1usize << shift;
      assert_eq!(next_pow2(pow - 1), Some(pow));
      assert_eq!(next_pow2(pow), Some(pow));
      assert_eq!(next_pow2(pow + 1), Some(pow << 1));
    }

    assert_eq!(next_pow2((usize::MAX >> 1) + 2), None);
  }

  #[test]
  fn test_is_aligned() {
    assert!(is_aligned(0, 512));
    assert!(is_aligned(1024, 512));
    assert!(!is_aligned(1536, 1024));
    assert!(!is_aligned(7, 8));
  }

  #[test]
  fn test_order_of() {
    assert_eq!(order_of(512, 512), 0);
    assert_eq!(order_of(1024, 512), 1);
    assert_eq!(order_of(8192, 512), 4);
    assert_eq!(order_of(16, 16), 0);
  }
}
