//! Tabular regression models stored as JSON documents
//!
//! Two model families are supported, selected by the document's `format`
//! tag:
//! - `linear`: intercept + numeric coefficients + one weight per category
//! - `forest`: an ensemble of regression trees, averaged (random forest)
//!
//! Each model carries the category vocabulary it was trained on. A category
//! outside that vocabulary fails at prediction time, the same way a fitted
//! one-hot encoder refuses unseen values.

use super::features::{
    FeatureRow, FeatureValue, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS, SCHEMA_COLUMNS,
};
use super::Regressor;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// JSON model document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum TabularModel {
    Linear(LinearModel),
    Forest(ForestModel),
}

impl TabularModel {
    /// Parse and validate a model document
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: TabularModel =
            serde_json::from_slice(bytes).context("Failed to parse JSON model document")?;
        model.validate()?;
        Ok(model)
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            TabularModel::Linear(m) => m.version.as_deref(),
            TabularModel::Forest(m) => m.version.as_deref(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            TabularModel::Linear(m) => m.validate(),
            TabularModel::Forest(m) => m.validate(),
        }
    }
}

impl Regressor for TabularModel {
    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        match self {
            TabularModel::Linear(m) => m.predict(row),
            TabularModel::Forest(m) => m.predict(row),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TabularModel::Linear(_) => "linear",
            TabularModel::Forest(_) => "forest",
        }
    }
}

/// Linear regression over numeric columns and one-hot encoded categories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub version: Option<String>,
    pub intercept: f64,
    /// Coefficient per numeric column
    pub numeric: HashMap<String, f64>,
    /// Weight per category literal, per categorical column
    pub categorical: HashMap<String, HashMap<String, f64>>,
}

impl LinearModel {
    fn validate(&self) -> Result<()> {
        check_columns("numeric", self.numeric.keys(), &NUMERIC_COLUMNS)?;
        check_columns("categorical", self.categorical.keys(), &CATEGORICAL_COLUMNS)?;
        for (column, weights) in &self.categorical {
            if weights.is_empty() {
                bail!("Categorical column `{}` has no trained categories", column);
            }
        }
        if !self.intercept.is_finite()
            || self.numeric.values().any(|c| !c.is_finite())
            || self.categorical.values().flat_map(|w| w.values()).any(|c| !c.is_finite())
        {
            bail!("Model contains non-finite weights");
        }
        Ok(())
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        let mut total = self.intercept;
        for (column, value) in row.iter() {
            total += match value {
                FeatureValue::Number(v) => {
                    let coefficient = self
                        .numeric
                        .get(column)
                        .with_context(|| format!("No coefficient for column `{}`", column))?;
                    coefficient * v
                }
                FeatureValue::Category(literal, _) => {
                    let weights = self
                        .categorical
                        .get(column)
                        .with_context(|| format!("No weights for column `{}`", column))?;
                    *weights.get(literal).with_context(|| unseen_category(column, literal))?
                }
            };
        }
        Ok(total)
    }
}

/// Random forest regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    #[serde(default)]
    pub version: Option<String>,
    /// Trained category literals per categorical column
    pub vocabulary: HashMap<String, Vec<String>>,
    pub trees: Vec<Tree>,
}

/// Regression tree stored as a flat node list; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Goes left when the numeric feature is `<= threshold`
    SplitLe {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Goes left when the category is one of `categories`
    SplitIn {
        feature: String,
        categories: Vec<String>,
        left: usize,
        right: usize,
    },
    Leaf { value: f64 },
}

impl ForestModel {
    fn validate(&self) -> Result<()> {
        check_columns("vocabulary", self.vocabulary.keys(), &CATEGORICAL_COLUMNS)?;
        if self.trees.is_empty() {
            bail!("Forest has no trees");
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .with_context(|| format!("Tree {} is malformed", index))?;
        }
        Ok(())
    }

    fn predict(&self, row: &FeatureRow) -> Result<f64> {
        for column in CATEGORICAL_COLUMNS {
            if let Some(FeatureValue::Category(literal, _)) = row.get(column) {
                let known = self
                    .vocabulary
                    .get(column)
                    .with_context(|| format!("No vocabulary for column `{}`", column))?;
                if !known.iter().any(|c| c == literal) {
                    return Err(anyhow::anyhow!(unseen_category(column, literal)));
                }
            }
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.evaluate(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

impl Tree {
    fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("Tree has no nodes");
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let (feature, left, right) = match node {
                Node::SplitLe { feature, threshold, left, right } => {
                    if !NUMERIC_COLUMNS.contains(&feature.as_str()) {
                        bail!("Node {} splits numerically on `{}`", index, feature);
                    }
                    if !threshold.is_finite() {
                        bail!("Node {} has a non-finite threshold", index);
                    }
                    (feature, *left, *right)
                }
                Node::SplitIn { feature, left, right, .. } => {
                    if !CATEGORICAL_COLUMNS.contains(&feature.as_str()) {
                        bail!("Node {} splits on categories of `{}`", index, feature);
                    }
                    (feature, *left, *right)
                }
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        bail!("Leaf {} has a non-finite value", index);
                    }
                    continue;
                }
            };
            // Children must point forward so evaluation always terminates
            for child in [left, right] {
                if child <= index || child >= self.nodes.len() {
                    bail!(
                        "Node {} on `{}` links to invalid child {}",
                        index,
                        feature,
                        child
                    );
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, row: &FeatureRow) -> Result<f64> {
        let mut index = 0;
        loop {
            let node = self
                .nodes
                .get(index)
                .with_context(|| format!("Node {} does not exist", index))?;
            index = match node {
                Node::Leaf { value } => return Ok(*value),
                Node::SplitLe { feature, threshold, left, right } => {
                    match row.get(feature) {
                        Some(FeatureValue::Number(v)) if v <= *threshold => *left,
                        Some(FeatureValue::Number(_)) => *right,
                        _ => bail!("Column `{}` is not numeric", feature),
                    }
                }
                Node::SplitIn { feature, categories, left, right } => {
                    match row.get(feature) {
                        Some(FeatureValue::Category(literal, _)) => {
                            if categories.iter().any(|c| c == literal) {
                                *left
                            } else {
                                *right
                            }
                        }
                        _ => bail!("Column `{}` is not categorical", feature),
                    }
                }
            };
        }
    }
}

fn unseen_category(column: &str, literal: &str) -> String {
    format!(
        "Category `{}` for column `{}` was not seen during training",
        literal, column
    )
}

/// The model must cover exactly the expected columns
fn check_columns<'a>(
    section: &str,
    present: impl Iterator<Item = &'a String>,
    expected: &[&str],
) -> Result<()> {
    let present: HashSet<&str> = present.map(String::as_str).collect();
    for column in &present {
        if !SCHEMA_COLUMNS.contains(column) {
            bail!("Section `{}` references unknown column `{}`", section, column);
        }
        if !expected.contains(column) {
            bail!("Section `{}` cannot contain column `{}`", section, column);
        }
    }
    for column in expected {
        if !present.contains(column) {
            bail!("Section `{}` is missing column `{}`", section, column);
        }
    }
    Ok(())
}
