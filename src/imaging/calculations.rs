//! Pure calculation functions for target dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Dimensions are `(width, height)` tuples. Every derived size is computed
//! from the *native* dimensions rather than from a previous derived size, so
//! repeated shrinking never accumulates rounding drift in the aspect ratio.

/// Scale `original` so its longer edge equals `longer_edge`.
///
/// The shorter edge is rounded to the nearest pixel and never drops below 1.
///
/// # Examples
/// ```
/// # use upload_prep::imaging::calculations::scale_to_longer_edge;
/// assert_eq!(scale_to_longer_edge((8000, 6000), 1600), (1600, 1200));
/// assert_eq!(scale_to_longer_edge((1500, 2000), 1000), (750, 1000));
/// ```
pub fn scale_to_longer_edge(original: (u32, u32), longer_edge: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    let longer_edge = longer_edge.max(1);

    if orig_w >= orig_h {
        // Landscape or square
        let ratio = longer_edge as f64 / orig_w.max(1) as f64;
        (longer_edge, ((orig_h as f64 * ratio).round() as u32).max(1))
    } else {
        // Portrait
        let ratio = longer_edge as f64 / orig_h.max(1) as f64;
        (((orig_w as f64 * ratio).round() as u32).max(1), longer_edge)
    }
}

/// Dimensions the first render uses: native size, or scaled down so the
/// longer edge equals `max_dimension`. Never upscales.
pub fn fit_within(original: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let longer = original.0.max(original.1);
    if longer <= max_dimension {
        original
    } else {
        scale_to_longer_edge(original, max_dimension)
    }
}

/// Longer edge for the next dimension-reduction step, or `None` when the
/// image is already at (or below) `min_side`.
///
/// The new edge is `floor(current * ratio)` clamped up to `min_side`; a step
/// that would not actually shrink the image is reported as unavailable.
pub fn next_longer_edge(current_longer: u32, ratio: f64, min_side: u32) -> Option<u32> {
    if current_longer <= min_side {
        return None;
    }
    let shrunk = ((current_longer as f64 * ratio).floor() as u32).max(min_side);
    (shrunk < current_longer).then_some(shrunk)
}
