use std::collections::BTreeMap;

use serde_json::Value;

use super::error::{Result, ServingErr};

/// The two accepted shapes of a prediction request body.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictRequest {
    /// `{"features": [..]}`, values in training column order.
    Positional(Vec<f64>),
    /// One field per feature name.
    Named(BTreeMap<String, f64>),
}

impl PredictRequest {
    /// Parses a JSON request body.
    ///
    /// An object whose `features` field is an array is positional, any other object is named.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| ServingErr::InvalidBody(e.to_string()))?;

        let Value::Object(fields) = value else {
            return Err(ServingErr::InvalidBody("expected a JSON object".into()));
        };

        if let Some(Value::Array(values)) = fields.get("features") {
            let features = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    v.as_f64().ok_or_else(|| {
                        ServingErr::InvalidBody(format!("features[{i}] is not a number: {v}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            return Ok(Self::Positional(features));
        }

        let named = fields
            .into_iter()
            .map(|(name, v)| match v.as_f64() {
                Some(x) => Ok((name, x)),
                None => Err(ServingErr::InvalidBody(format!(
                    "field {name:?} is not a number: {v}"
                ))),
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self::Named(named))
    }
}

/// The ordered feature names a loaded model expects, target column excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Derives the schema from an artifact's training columns.
    ///
    /// # Arguments
    /// * `columns` - The artifact's columns, in training order.
    /// * `target` - The label column name, dropped if present.
    ///
    /// # Returns
    /// A new `FeatureSchema` instance.
    pub fn from_columns(columns: &[String], target: &str) -> Self {
        let names = columns.iter().filter(|c| *c != target).cloned().collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves a request into a feature vector in schema order.
    ///
    /// Values are passed through untouched.
    ///
    /// # Returns
    /// The vector, or the shape error describing what the caller should have sent.
    pub fn vectorize(&self, request: &PredictRequest) -> Result<Vec<f64>> {
        match request {
            PredictRequest::Positional(features) => {
                if features.len() != self.len() {
                    return Err(ServingErr::FeatureCountMismatch {
                        got: features.len(),
                        expected: self.names.clone(),
                    });
                }

                Ok(features.clone())
            }
            PredictRequest::Named(fields) => {
                let missing: Vec<_> = self
                    .names
                    .iter()
                    .filter(|name| !fields.contains_key(*name))
                    .cloned()
                    .collect();

                if !missing.is_empty() {
                    return Err(ServingErr::MissingFeatures {
                        missing,
                        expected: self.names.clone(),
                    });
                }

                if fields.len() != self.len() {
                    let unknown = fields
                        .keys()
                        .filter(|key| !self.names.contains(*key))
                        .cloned()
                        .collect();

                    return Err(ServingErr::UnknownFeatures {
                        unknown,
                        expected: self.names.clone(),
                    });
                }

                Ok(self.names.iter().map(|name| fields[name]).collect())
            }
        }
    }
}
