//! Tabular input contract and conversion into strides.
//!
//! Loaders (outside this workspace) hand over a column-oriented [`Table`].
//! The schema is inspected once to resolve a [`DatasetKind`]; only
//! phase-indexed tables can become a [`Dataset`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::StructuralError;
use crate::id::StrideId;
use crate::stride::{Dataset, Stride};
use crate::verdict::Warning;

/// One table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum Column {
    /// Text values (identifiers, labels)
    Text(Vec<String>),
    /// Numeric values
    Numeric(Vec<f64>),
}

impl Column {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::Numeric(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row value rendered as an identifier. Integral numbers drop the fraction.
    fn label_at(&self, row: usize) -> String {
        match self {
            Column::Text(v) => v[row].clone(),
            Column::Numeric(v) => {
                let x = v[row];
                if x.is_finite() && x.fract() == 0.0 {
                    format!("{}", x as i64)
                } else {
                    format!("{}", x)
                }
            }
        }
    }
}

/// How the table's rows are indexed, resolved once from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// Rows are gait-phase samples (0-100%)
    PhaseIndexed,
    /// Rows are time samples
    TimeIndexed,
}

/// Column names of the input contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Subject identifier column
    pub subject: String,

    /// Trial identifier column
    pub trial: String,

    /// Cycle identifier column
    pub cycle: String,

    /// Task column
    pub task: String,

    /// Phase percent column
    pub phase: String,

    /// Time column of time-indexed tables
    pub time: String,

    /// Accept tables without a trial column, giving every row trial "1"
    #[serde(default)]
    pub allow_missing_trial: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            subject: "subject".to_string(),
            trial: "trial".to_string(),
            cycle: "cycle".to_string(),
            task: "task".to_string(),
            phase: "phase".to_string(),
            time: "time_s".to_string(),
            allow_missing_trial: false,
        }
    }
}

impl SchemaConfig {
    /// Tolerate a missing trial column.
    pub fn with_missing_trial_allowed(mut self, allow: bool) -> Self {
        self.allow_missing_trial = allow;
        self
    }

    fn identifier_columns(&self) -> [&str; 4] {
        [&self.subject, &self.trial, &self.cycle, &self.task]
    }
}

/// A loaded table, column-oriented.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Source name, used in error context
    pub name: String,

    columns: Vec<(String, Column)>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a text column.
    pub fn with_text(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.columns.push((name.into(), Column::Text(values)));
        self
    }

    /// Add a numeric column.
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.push((name.into(), Column::Numeric(values)));
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Row count (length of the first column).
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    /// Resolve whether the table is phase- or time-indexed.
    pub fn inspect(&self, schema: &SchemaConfig) -> Result<DatasetKind, StructuralError> {
        if self.column(&schema.phase).is_some() {
            Ok(DatasetKind::PhaseIndexed)
        } else if self.column(&schema.time).is_some() {
            Ok(DatasetKind::TimeIndexed)
        } else {
            Err(StructuralError::MissingColumns {
                dataset: self.name.clone(),
                columns: vec![schema.phase.clone()],
            })
        }
    }

    /// Group rows into strides.
    ///
    /// Rows sharing (subject, trial, cycle, task) form one stride, in order of
    /// first appearance. Every numeric column that is not an identifier or the
    /// phase column becomes a variable. A missing trial column is a
    /// structural error unless the schema allows it, in which case every row
    /// gets trial "1" and a warning is raised.
    pub fn to_dataset(&self, schema: &SchemaConfig) -> Result<(Dataset, Vec<Warning>), StructuralError> {
        let rows = self.row_count();
        for (name, column) in &self.columns {
            if column.len() != rows {
                return Err(StructuralError::RaggedColumn {
                    dataset: self.name.clone(),
                    column: name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }

        if self.inspect(schema)? == DatasetKind::TimeIndexed {
            return Err(StructuralError::NotPhaseIndexed {
                dataset: self.name.clone(),
            });
        }

        let subject = self.column(&schema.subject);
        let trial = self.column(&schema.trial);
        let cycle = self.column(&schema.cycle);
        let task = self.column(&schema.task);
        let trial_missing = trial.is_none() && !schema.allow_missing_trial;
        let (Some(subject), Some(cycle), Some(task), false) = (subject, cycle, task, trial_missing)
        else {
            let columns = [
                (&schema.subject, subject.is_some()),
                (&schema.trial, !trial_missing),
                (&schema.cycle, cycle.is_some()),
                (&schema.task, task.is_some()),
            ]
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.clone())
            .collect();
            return Err(StructuralError::MissingColumns {
                dataset: self.name.clone(),
                columns,
            });
        };

        let mut warnings = Vec::new();
        if trial.is_none() {
            warnings.push(Warning::MissingOptionalColumn {
                column: schema.trial.clone(),
            });
        }

        let phase = match self.column(&schema.phase) {
            Some(Column::Numeric(values)) => values,
            _ => {
                return Err(StructuralError::NonNumericColumn {
                    dataset: self.name.clone(),
                    column: schema.phase.clone(),
                })
            }
        };

        let id_columns = schema.identifier_columns();
        let variables: Vec<(&str, &Vec<f64>)> = self
            .columns
            .iter()
            .filter(|(name, _)| name != &schema.phase && !id_columns.contains(&name.as_str()))
            .filter_map(|(name, column)| match column {
                Column::Numeric(values) => Some((name.as_str(), values)),
                Column::Text(_) => None,
            })
            .collect();

        let mut index: HashMap<StrideId, usize> = HashMap::new();
        let mut dataset = Dataset::new(self.name.clone());
        for row in 0..rows {
            let id = StrideId::new(
                subject.label_at(row),
                trial.map(|t| t.label_at(row)).unwrap_or_else(|| "1".to_string()),
                cycle.label_at(row),
                task.label_at(row),
            );
            let slot = *index.entry(id.clone()).or_insert_with(|| {
                let mut stride = Stride::new(id);
                stride.phase.clear();
                for (name, _) in &variables {
                    stride.variables.insert(name.to_string(), Vec::new());
                }
                dataset.strides.push(stride);
                dataset.strides.len() - 1
            });

            let stride = &mut dataset.strides[slot];
            stride.phase.push(phase[row]);
            for (name, values) in &variables {
                if let Some(samples) = stride.variables.get_mut(*name) {
                    samples.push(values[row]);
                }
            }
        }

        Ok((dataset, warnings))
    }
}
