use ndarray::Array2;

use crate::error::{GswError, Result};

/// Solve the square linear assignment problem for `cost`.
///
/// Returns `(assignment, total)` where `assignment[i]` is the column matched to
/// row `i` and `total` is the summed cost of the matching.
///
/// This is the potential-based Hungarian (Kuhn-Munkres) method: each row is
/// inserted by a Dijkstra-style search for the cheapest augmenting path over
/// reduced costs `c[i][j] - u[i] - v[j]`, after which the potentials are
/// updated so that all reduced costs stay non-negative. Worst case `O(n³)`.
pub fn hungarian(cost: &Array2<f64>) -> Result<(Vec<usize>, f64)> {
    let n = cost.nrows();
    if n != cost.ncols() {
        return Err(GswError::CountMismatch {
            left: n,
            right: cost.ncols(),
        });
    }
    if n == 0 {
        return Err(GswError::EmptyInput);
    }
    if cost.iter().any(|c| !c.is_finite()) {
        return Err(GswError::InvalidConfiguration(
            "assignment costs must be finite".to_string(),
        ));
    }

    let inf = f64::INFINITY;
    // u: row potentials, v: column potentials. Index 0 is the virtual source.
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    // p[j]: row (1-indexed) currently holding column j, 0 when free
    let mut p = vec![0_usize; n + 1];
    // way[j]: previous column on the augmenting path into j
    let mut way = vec![0_usize; n + 1];
    let mut min_val = vec![inf; n + 1];
    let mut used = vec![false; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0_usize;
        min_val.fill(inf);
        used.fill(false);

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let row = cost.row(i0 - 1);
            let mut delta = inf;
            let mut j1 = 0_usize;

            for j in 1..=n {
                if !used[j] {
                    let reduced = row[j - 1] - u[i0] - v[j];
                    if reduced < min_val[j] {
                        min_val[j] = reduced;
                        way[j] = j0;
                    }
                    if min_val[j] < delta {
                        delta = min_val[j];
                        j1 = j;
                    }
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_val[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path back to the source
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0_usize; n];
    for j in 1..=n {
        assignment[p[j] - 1] = j - 1;
    }
    let total = assignment
        .iter()
        .enumerate()
        .map(|(i, &j)| cost[[i, j]])
        .sum();
    Ok((assignment, total))
}
