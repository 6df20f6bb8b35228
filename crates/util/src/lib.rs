/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
#[inline(always)]
pub const fn round_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Returns the smallest power of two greater than or equal to `value`. Zero maps to one.
#[inline(always)]
pub const fn next_pow2(value: u32) -> u32 {
    value.next_power_of_two()
}

/// Like offset_of, except it also supports indexing arrays
#[macro_export]
macro_rules! offset_of {
    ($t:ty, $($path:tt)+) => {{
        const OFFSET: usize = {
            let data = core::mem::MaybeUninit::<$t>::uninit();
            let ptr = data.as_ptr();
            unsafe { (&raw const (*ptr).$($path)+).byte_offset_from(ptr) as usize }
        };

        OFFSET
    }}
}
