//! Sparse linear algebra for the quadratic placer.
//!
//! The per-axis systems are assembled as triplets (duplicates accumulate)
//! and compressed into CSR once per build. The solver is a
//! Jacobi-preconditioned conjugate gradient with a divergence watch: if
//! the residual grows for three consecutive steps the solve abandons the
//! iterate and restores the best one seen.

use nalgebra::DVector;

/// A single non-zero contribution to a sparse matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Value to accumulate.
    pub value: f64,
}

impl Triplet {
    /// Creates a triplet.
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }
}

/// A square sparse matrix in compressed-sparse-row form.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Builds an `n`×`n` matrix from triplets, accumulating duplicates.
    ///
    /// Repeated `(row, col)` pairs from different nets collapse into one
    /// stored entry, keeping the matrix-vector product cheap.
    pub fn from_triplets(n: usize, mut triplets: Vec<Triplet>) -> Self {
        triplets.sort_unstable_by(|a, b| (a.row, a.col).cmp(&(b.row, b.col)));

        let mut row_ptr = vec![0usize; n + 1];
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());

        let mut last: Option<(usize, usize)> = None;
        for t in &triplets {
            debug_assert!(t.row < n && t.col < n);
            if last == Some((t.row, t.col)) {
                *values.last_mut().unwrap() += t.value;
            } else {
                col_idx.push(t.col);
                values.push(t.value);
                row_ptr[t.row + 1] += 1;
                last = Some((t.row, t.col));
            }
        }

        for i in 0..n {
            row_ptr[i + 1] += row_ptr[i];
        }

        Self {
            n,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Returns the dimension of the matrix.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Returns the number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Computes `y = A·x`.
    pub fn mul_vec(&self, x: &DVector<f64>, y: &mut DVector<f64>) {
        for i in 0..self.n {
            let mut acc = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                acc += self.values[k] * x[self.col_idx[k]];
            }
            y[i] = acc;
        }
    }

    /// Returns the stored value at `(i, j)`, or zero.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let row = &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]];
        match row.binary_search(&j) {
            Ok(pos) => self.values[self.row_ptr[i] + pos],
            Err(_) => 0.0,
        }
    }

    /// Returns the diagonal, with zero entries replaced by one so it can
    /// be used directly as a Jacobi preconditioner.
    pub fn jacobi_diagonal(&self) -> DVector<f64> {
        let mut d = DVector::from_element(self.n, 1.0);
        for i in 0..self.n {
            let v = self.get(i, i);
            if v != 0.0 {
                d[i] = v;
            }
        }
        d
    }

    /// Returns whether every stored entry has a symmetric partner within
    /// `tol`. Intended for assertions and tests.
    pub fn is_symmetric(&self, tol: f64) -> bool {
        for i in 0..self.n {
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                let j = self.col_idx[k];
                let v = self.values[k];
                if (v - self.get(j, i)).abs() > tol * v.abs().max(1.0) {
                    return false;
                }
            }
        }
        true
    }

    /// Returns whether every diagonal entry is strictly positive.
    pub fn has_positive_diagonal(&self) -> bool {
        (0..self.n).all(|i| self.get(i, i) > 0.0)
    }
}

/// Result of a conjugate-gradient call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOutcome {
    /// Iterations actually performed.
    pub iterations: usize,
    /// Final squared residual relative to `‖b‖²`.
    pub residual: f64,
    /// Whether the tolerance was reached.
    pub converged: bool,
    /// Whether the solve was abandoned because the residual kept growing.
    pub diverged: bool,
}

/// Number of consecutive residual increases tolerated before abandoning.
const DIVERGENCE_PATIENCE: usize = 3;

/// Solves `A·x = b` by Jacobi-preconditioned conjugate gradient.
///
/// `x` holds the initial guess on entry and the solution on exit. On
/// divergence `x` is restored to the best iterate observed.
pub fn solve_cg(
    a: &SparseMatrix,
    b: &DVector<f64>,
    x: &mut DVector<f64>,
    tol: f64,
    max_iter: usize,
) -> CgOutcome {
    let n = a.dim();
    debug_assert_eq!(b.len(), n);
    debug_assert_eq!(x.len(), n);

    let d = a.jacobi_diagonal();
    let b_norm2 = b.dot(b).max(f64::MIN_POSITIVE);

    let mut ax = DVector::zeros(n);
    a.mul_vec(x, &mut ax);
    let mut r = b - ax;
    let mut z = r.component_div(&d);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    let mut q = DVector::zeros(n);
    let mut best_x = x.clone();
    let mut best_res = r.dot(&r);
    let mut grow_streak = 0usize;
    let mut iterations = 0usize;

    for _ in 0..max_iter {
        a.mul_vec(&p, &mut q);
        let pq = p.dot(&q);
        if pq <= 0.0 || !pq.is_finite() {
            break;
        }
        let alpha = rz / pq;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &q, 1.0);
        iterations += 1;

        let res2 = r.dot(&r);
        if res2 < best_res {
            best_res = res2;
            best_x.copy_from(x);
            grow_streak = 0;
        } else {
            grow_streak += 1;
            if grow_streak >= DIVERGENCE_PATIENCE {
                x.copy_from(&best_x);
                return CgOutcome {
                    iterations,
                    residual: best_res / b_norm2,
                    converged: false,
                    diverged: true,
                };
            }
        }

        if res2 / b_norm2 < tol {
            return CgOutcome {
                iterations,
                residual: res2 / b_norm2,
                converged: true,
                diverged: false,
            };
        }

        z = r.component_div(&d);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz;
        rz = rz_new;
        p *= beta;
        p += &z;
    }

    CgOutcome {
        iterations,
        residual: best_res / b_norm2,
        converged: false,
        diverged: false,
    }
}
