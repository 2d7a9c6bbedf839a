use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::numeric::{NumericType, PrecisionStep, DEFAULT_PRECISION_STEP};

/// Number of layers in the node paths of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesConfig {
    pub nb_layers: usize,
}

impl NodesConfig {
    pub fn new(nb_layers: usize) -> Self {
        Self { nb_layers }
    }

    pub fn check_depth(&self, found: usize) -> Result<()> {
        if found != self.nb_layers {
            return Err(Error::NodeDepthMismatch { expected: self.nb_layers, found });
        }
        Ok(())
    }
}

impl Default for NodesConfig {
    /// Tuple / cell.
    fn default() -> Self {
        Self { nb_layers: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Numeric {
        numeric_type: NumericType,
        #[serde(default = "default_precision_step")]
        precision_step: u32,
    },
}

fn default_precision_step() -> u32 { DEFAULT_PRECISION_STEP }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default)]
    pub nodes: NodesConfig,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldConfig {
    pub fn text(nodes: NodesConfig) -> Self {
        Self { nodes, kind: FieldKind::Text }
    }

    pub fn numeric(nodes: NodesConfig, numeric_type: NumericType, precision_step: u32) -> Self {
        Self { nodes, kind: FieldKind::Numeric { numeric_type, precision_step } }
    }

    /// Indexed numeric type and validated precision step, or an error for text fields.
    pub fn numeric_encoding(&self, field: &str) -> Result<(NumericType, PrecisionStep)> {
        match self.kind {
            FieldKind::Numeric { numeric_type, precision_step } => {
                Ok((numeric_type, PrecisionStep::new(precision_step)?))
            }
            FieldKind::Text => Err(Error::FieldKind { field: field.to_string(), expected: "numeric" }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Apply English stemming to text cells.
    #[serde(default)]
    pub stem: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub fields: BTreeMap<String, FieldConfig>,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self { fields: BTreeMap::new(), analyzer: AnalyzerConfig::default() }
    }

    pub fn with_field(mut self, name: impl Into<String>, config: FieldConfig) -> Self {
        self.fields.insert(name.into(), config);
        self
    }

    pub fn field(&self, name: &str) -> Result<&FieldConfig> {
        self.fields.get(name).ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        for (name, field) in &self.fields {
            if field.nodes.nb_layers == 0 {
                return Err(Error::NodeDepthMismatch { expected: 1, found: 0 });
            }
            if let FieldKind::Numeric { .. } = field.kind {
                field.numeric_encoding(name)?;
            }
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    /// A single two-layer text field named `content`.
    fn default() -> Self {
        Self::new().with_field("content", FieldConfig::text(NodesConfig::default()))
    }
}
