/// Round `value` to the nearest multiple of `base`, never below `min_val`.
pub fn width_multiplier(value: f64, base: usize, min_val: usize) -> usize {
    let rounded = (value / base as f64 + 0.5).floor() as usize * base;
    rounded.max(min_val)
}

/// Channel quantization used throughout the network: multiples of 8, at least 8.
pub fn width_multiplier8(value: f64) -> usize {
    width_multiplier(value, 8, 8)
}
