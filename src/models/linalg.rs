//! Small dense linear algebra helpers
//!
//! Cholesky factorization and triangular solves for the symmetric
//! positive-definite systems that show up in Gaussian emissions and Newton
//! steps. Matrices here are tiny (feature count squared).

use ndarray::{Array1, Array2, ArrayView1};

/// Lower-triangular Cholesky factor `L` with `A = L * L^T`
///
/// Returns `None` if `A` is not square or not positive definite.
pub fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }

            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Solve `L y = b` for lower-triangular `L`
pub fn solve_lower(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

/// Solve `L^T x = y` for lower-triangular `L`
fn solve_lower_transposed(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in i + 1..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `A x = b` given the Cholesky factor of `A`
pub fn cholesky_solve(l: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let y = solve_lower(l, b);
    solve_lower_transposed(l, &y)
}

/// `ln |A|` from the Cholesky factor of `A`
pub fn log_det(l: &Array2<f64>) -> f64 {
    2.0 * l.diag().iter().map(|d| d.ln()).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array};

    #[test]
    fn test_cholesky_reconstructs() {
        let a = arr2(&[[4.0, 2.0, 0.4], [2.0, 5.0, 1.0], [0.4, 1.0, 3.0]]);
        let l = cholesky(&a).unwrap();
        let rebuilt = l.dot(&l.t());
        for (x, y) in rebuilt.iter().zip(a.iter()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = arr2(&[[1.0, 2.0], [2.0, 1.0]]);
        assert!(cholesky(&a).is_none());
        assert!(cholesky(&arr2(&[[0.0]])).is_none());
    }

    #[test]
    fn test_solve() {
        let a = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let b = array![1.0, 2.0];
        let l = cholesky(&a).unwrap();
        let x = cholesky_solve(&l, b.view());
        let check = a.dot(&x);
        assert_abs_diff_eq!(check[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(check[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_det() {
        let a = arr2(&[[4.0, 1.0], [1.0, 3.0]]);
        let l = cholesky(&a).unwrap();
        assert_abs_diff_eq!(log_det(&l), 11.0f64.ln(), epsilon = 1e-12);
    }
}
