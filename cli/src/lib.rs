use anyhow::{Context, Result};
use nodematch::numeric::{decode_term, NumericTokens};
use nodematch::{collect_matches, EntityId, IndexConfig, MemoryIndex, NodePath, NumericValue, Query};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One input document. `tuples` is shorthand for two-layer text cells of
/// the tuple field; `cells` addresses any field and node explicitly.
#[derive(Debug, Deserialize)]
pub struct InputDoc {
    pub id: String,
    #[serde(default)]
    pub tuples: Vec<Vec<String>>,
    #[serde(default)]
    pub cells: Vec<InputCell>,
}

#[derive(Debug, Deserialize)]
pub struct InputCell {
    pub field: String,
    pub node: NodePath,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub number: Option<NumericValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,
    pub entity: EntityId,
    pub node: NodePath,
    pub score: f32,
}

/// Index plus the external id of every entity, in entity order.
pub struct Corpus {
    pub index: MemoryIndex,
    pub external_ids: Vec<String>,
    tuple_field: String,
}

impl Corpus {
    pub fn new(config: IndexConfig, tuple_field: impl Into<String>) -> Self {
        Self { index: MemoryIndex::new(config), external_ids: Vec::new(), tuple_field: tuple_field.into() }
    }

    pub fn ingest(&mut self, doc: InputDoc) -> Result<EntityId> {
        let entity = self.external_ids.len() as EntityId;
        if !doc.tuples.is_empty() {
            self.index
                .add_tuples(&self.tuple_field, entity, &doc.tuples)
                .with_context(|| format!("document '{}'", doc.id))?;
        }
        for cell in doc.cells {
            match (cell.text, cell.number) {
                (Some(text), None) => self.index.add_text(&cell.field, entity, cell.node, &text),
                (None, Some(number)) => self.index.add_numeric(&cell.field, entity, cell.node, number),
                _ => anyhow::bail!("document '{}': a cell needs exactly one of text or number", doc.id),
            }
            .with_context(|| format!("document '{}', field '{}'", doc.id, cell.field))?;
        }
        self.external_ids.push(doc.id);
        Ok(entity)
    }

    /// Loads every JSON (array or single object) and JSONL file under `input`.
    pub fn load(&mut self, input: &Path) -> Result<()> {
        for file in input_files(input) {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                self.load_jsonl(&file)?;
            } else {
                self.load_json(&file)?;
            }
        }
        tracing::info!(num_entities = self.external_ids.len(), "ingested documents");
        Ok(())
    }

    fn load_jsonl(&mut self, file: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(file)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let doc: InputDoc = serde_json::from_str(&line)?;
            self.ingest(doc)?;
        }
        Ok(())
    }

    fn load_json(&mut self, file: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(file)?);
        let json: serde_json::Value = serde_json::from_reader(reader)?;
        match json {
            serde_json::Value::Array(arr) => {
                for v in arr {
                    self.ingest(serde_json::from_value(v)?)?;
                }
            }
            serde_json::Value::Object(_) => {
                self.ingest(serde_json::from_value(json)?)?;
            }
            _ => {}
        }
        Ok(())
    }

    pub fn search(&self, query: &Query) -> Result<Vec<Hit>> {
        let mut scorer = query.scorer(&self.index)?;
        let matches = collect_matches(scorer.as_mut())?;
        Ok(matches
            .into_iter()
            .map(|m| Hit {
                id: self.external_ids.get(m.entity as usize).cloned().unwrap_or_default(),
                entity: m.entity,
                node: m.node,
                score: m.score,
            })
            .collect())
    }
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

/// Reads a query given inline or, with a leading `@`, from a file.
pub fn parse_query(arg: &str) -> Result<Query> {
    let json = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading query file {path}"))?,
        None => arg.to_string(),
    };
    Ok(Query::from_json_str(&json)?)
}

/// One line per indexed term of `value`: shift, hex term, decoded value.
pub fn describe_encoding(value: NumericValue, precision_step: u32) -> Result<Vec<String>> {
    let step = nodematch::numeric::PrecisionStep::new(precision_step)?;
    let mut lines = Vec::new();
    for token in NumericTokens::new(value, step) {
        let decoded = decode_term(value.numeric_type(), &token.term)?;
        let hex: String = token.term.iter().map(|b| format!("{b:02x}")).collect();
        lines.push(format!("shift={:<2} term={hex} value={:?}", decoded.shift, decoded.value));
    }
    Ok(lines)
}
