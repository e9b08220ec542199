pub(crate) fn approx_eq_f64(a: f64, b: f64) -> bool {
    (a - b).abs() <= f64::EPSILON
}

/// `base` 到 `value` 的相对变化，`base` 为零时返回零。
pub(crate) fn pct_change(base: f64, value: f64) -> f64 {
    if approx_eq_f64(base, 0.0) {
        0.0
    } else {
        (value - base) / base
    }
}

pub(crate) fn last_n<T: Clone>(rows: &[T], n: usize) -> Vec<T> {
    let start = rows.len().saturating_sub(n);
    rows[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::{last_n, pct_change};

    #[test]
    fn pct_change_guards_zero_base() {
        assert_eq!(pct_change(0.0, 5.0), 0.0);
        assert!((pct_change(10.0, 12.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn last_n_keeps_order() {
        assert_eq!(last_n(&[1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(last_n(&[1, 2], 5), vec![1, 2]);
    }
}
