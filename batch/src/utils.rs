/// Round `v` up to a multiple of `a`, which must be a power of two
#[inline]
pub fn align_usize(v: usize, a: usize) -> usize {
    debug_assert!(a.is_power_of_two());
    (v + a - 1) & !(a - 1)
}

/// Round `v` up to a multiple of `a`, which must be a power of two
#[inline]
pub fn align_u64(v: u64, a: u64) -> u64 {
    debug_assert!(a.is_power_of_two());
    (v + a - 1) & !(a - 1)
}
