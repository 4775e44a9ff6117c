//! Least-squares regression trees
//!
//! Trees are grown depth-first with exhaustive threshold search. At every node
//! the features are visited in an order drawn from the caller's RNG; among
//! splits of equal quality the first one visited wins, so a fixed seed fixes
//! the tree.

use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fitted regression tree stored as a node arena (root at index 0)
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Unnormalized impurity decrease per feature, divided by the root sample count
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
    decrease: Vec<f64>,
}

impl RegressionTree {
    /// Fit a tree to `y` over the rows of `x`
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: TreeParams, rng: &mut Pcg32) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            params,
            n_features,
            nodes: Vec::new(),
            decrease: vec![0.0; n_features],
        };

        let indices: Vec<usize> = (0..y.len()).collect();
        builder.grow(indices, 0, rng);

        let n_root = y.len().max(1) as f64;
        let importances = builder.decrease.iter().map(|d| d / n_root).collect();

        Self {
            nodes: builder.nodes,
            importances,
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }
}

impl Builder<'_> {
    /// Grow the subtree for `indices` and return its node index
    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut Pcg32) -> usize {
        let (mean, sse) = mean_and_sse(self.y, &indices);
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let splittable = depth < self.params.max_depth
            && indices.len() >= self.params.min_samples_split
            && indices.len() >= 2 * self.params.min_samples_leaf
            && sse > f64::EPSILON * indices.len() as f64;
        if !splittable {
            return node_idx;
        }

        let Some(best) = self.best_split(&indices, sse, rng) else {
            return node_idx;
        };

        self.decrease[best.feature] += best.gain;
        let left = self.grow(best.left, depth + 1, rng);
        let right = self.grow(best.right, depth + 1, rng);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_idx
    }

    fn best_split(&self, indices: &[usize], parent_sse: f64, rng: &mut Pcg32) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for &feature in &features {
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += self.y[sorted[pos]];
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let here = self.x[sorted[pos]][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let diff = left_sum / n_left as f64 - right_sum / n_right as f64;
                let gain = (n_left * n_right) as f64 / n as f64 * diff * diff;

                let improves = match best {
                    Some((_, _, best_gain)) => gain > best_gain,
                    None => true,
                };
                if improves {
                    let threshold = here + (next - here) / 2.0;
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        if gain <= 0.0 {
            return None;
        }

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x[i][feature] <= threshold);

        // Clamp against rounding: the decrease can never exceed the parent impurity
        Some(BestSplit {
            feature,
            threshold,
            gain: gain.min(parent_sse),
            left,
            right,
        })
    }
}

fn mean_and_sse(y: &[f64], indices: &[usize]) -> (f64, f64) {
    if indices.is_empty() {
        return (0.0, 0.0);
    }
    let n = indices.len() as f64;
    let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n;
    let sse = indices.iter().map(|&i| (y[i] - mean).powi(2)).sum();
    (mean, sse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_step_function_is_learned() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i), 5.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();
        let mut rng = Pcg32::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, params(1), &mut rng);

        assert_eq!(tree.node_count(), 3);
        assert!((tree.predict_row(&[2.0, 5.0]) - 1.0).abs() < 1e-12);
        assert!((tree.predict_row(&[7.0, 5.0]) - 3.0).abs() < 1e-12);
        assert!(tree.importances()[0] > 0.0);
        assert_eq!(tree.importances()[1], 0.0);
    }

    #[test]
    fn test_constant_target_is_a_single_leaf() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![f64::from(i)]).collect();
        let y = vec![2.5; 6];
        let mut rng = Pcg32::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, params(3), &mut rng);

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[100.0]), 2.5);
        assert_eq!(tree.importances(), &[0.0]);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x: Vec<Vec<f64>> = (0..4).map(|i| vec![f64::from(i)]).collect();
        let y = vec![0.0, 0.0, 0.0, 10.0];
        let mut rng = Pcg32::seed_from_u64(0);
        let tree = RegressionTree::fit(
            &x,
            &y,
            TreeParams {
                max_depth: 1,
                min_samples_split: 2,
                min_samples_leaf: 2,
            },
            &mut rng,
        );
        // Best unconstrained split isolates the last row; with leaves of at
        // least two rows the split falls between rows 1 and 2
        assert!((tree.predict_row(&[0.0]) - 0.0).abs() < 1e-12);
        assert!((tree.predict_row(&[3.0]) - 5.0).abs() < 1e-12);
    }
}
