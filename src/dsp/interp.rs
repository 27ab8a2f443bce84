//! One-dimensional piecewise-linear interpolation.

/// Resample `(x, y)` onto `xi`, writing into `yi`.
///
/// `x` must be strictly increasing. Points of `xi` left of `x[0]` take
/// `y[0]`; points right of the last `x` take the last `y`.
///
/// # Panics
/// If `x` and `y` differ in length or are empty, or `xi` and `yi` differ
/// in length.
pub fn interp1(x: &[f64], y: &[f64], xi: &[f64], yi: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "sample axis and values must have equal length");
    assert!(!x.is_empty(), "sample axis must not be empty");
    assert_eq!(xi.len(), yi.len(), "query axis and output must have equal length");

    let last = x.len() - 1;
    for (out, &q) in yi.iter_mut().zip(xi) {
        *out = if q <= x[0] {
            y[0]
        } else if q >= x[last] {
            y[last]
        } else {
            // First index with x[k] > q; q lies in [x[k-1], x[k]).
            let k = x.partition_point(|&v| v <= q);
            let h = x[k] - x[k - 1];
            let s = (q - x[k - 1]) / h;
            y[k - 1] + s * (y[k] - y[k - 1])
        };
    }
}
