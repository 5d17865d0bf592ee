//! Numerically stable reductions shared by the transport solvers

/// Log-sum-exp of a sequence of values.
///
/// Uses the "shift by max" trick: `logsumexp(x) = max(x) + log(sum(exp(x_i - max(x))))`.
/// Returns `f64::NEG_INFINITY` for an empty sequence or when every value is `-inf`,
/// and propagates `+inf` and NaN.
pub fn logsumexp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let values = values.into_iter();
    let mut max_val = f64::NEG_INFINITY;
    for x in values.clone() {
        if x.is_nan() {
            return f64::NAN;
        }
        max_val = max_val.max(x);
    }

    if max_val.is_infinite() {
        // Either empty / all -inf, or at least one +inf
        return max_val;
    }
    max_val + values.map(|x| (x - max_val).exp()).sum::<f64>().ln()
}
