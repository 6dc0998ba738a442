use std::fmt::Debug;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// A fitted regression model.
///
/// The service only relies on this capability, any implementation can be swapped in.
pub trait Regressor: Debug + Send + Sync {
    /// Returns the amount of features each input row must have.
    fn n_features(&self) -> usize;

    /// Predicts one value for each row of `x`.
    ///
    /// # Arguments
    /// * `x` - A (rows x `n_features`) matrix of feature values.
    ///
    /// # Returns
    /// A vector with one prediction per row.
    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64>;
}

/// Serialized description of a model, tagged by its `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        weights: Vec<f64>,
        intercept: f64,
    },
    Forest {
        n_features: usize,
        trees: Vec<Vec<TreeNode>>,
    },
}

impl ModelSpec {
    /// Validates the spec and builds the regressor it describes.
    ///
    /// # Returns
    /// The regressor, or the reason why the spec is invalid.
    pub fn build(self) -> Result<Box<dyn Regressor>, String> {
        match self {
            ModelSpec::Linear { weights, intercept } => {
                if weights.is_empty() {
                    return Err("linear model has no weights".into());
                }

                Ok(Box::new(LinearRegressor::new(weights, intercept)))
            }
            ModelSpec::Forest { n_features, trees } => {
                if trees.is_empty() {
                    return Err("forest has no trees".into());
                }

                let trees = trees
                    .into_iter()
                    .enumerate()
                    .map(|(i, nodes)| {
                        RegressionTree::new(nodes, n_features).map_err(|e| format!("tree {i}: {e}"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Box::new(ForestRegressor { n_features, trees }))
            }
        }
    }
}

/// `y = w . x + b`
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    weights: Array1<f64>,
    intercept: f64,
}

impl LinearRegressor {
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self {
            weights: Array1::from(weights),
            intercept,
        }
    }
}

impl Regressor for LinearRegressor {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.weights) + self.intercept
    }
}

/// A node of a regression tree, children are referenced by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Goes `left` when `x[feature] <= threshold`, `right` otherwise.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A binary regression tree rooted at its first node.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Creates a new `RegressionTree`.
    ///
    /// Children must come after their parent so every walk ends at a leaf.
    ///
    /// # Arguments
    /// * `nodes` - The tree nodes, the root being the first one.
    /// * `n_features` - The width of the rows the tree will be evaluated on.
    ///
    /// # Returns
    /// The tree, or the reason why the nodes don't describe a valid one.
    pub fn new(nodes: Vec<TreeNode>, n_features: usize) -> Result<Self, String> {
        if nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        for (i, node) in nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(format!(
                        "node {i} splits on feature {feature}, but there are only {n_features}"
                    ));
                }

                for child in [left, right] {
                    if child <= i || child >= nodes.len() {
                        return Err(format!("node {i} has an invalid child {child}"));
                    }
                }
            }
        }

        Ok(Self { nodes })
    }

    fn evaluate(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Averages the output of its trees.
#[derive(Debug, Clone)]
pub struct ForestRegressor {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl Regressor for ForestRegressor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let ntrees = self.trees.len() as f64;

        x.rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|tree| tree.evaluate(row)).sum::<f64>() / ntrees)
            .collect()
    }
}
