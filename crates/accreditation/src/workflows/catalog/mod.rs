mod parser;

use crate::workflows::accreditation::domain::{AgencyRole, StepId, UnknownRole, WorkflowStep};
use crate::workflows::accreditation::graph::{GraphError, WorkflowGraph};
use crate::workflows::accreditation::WorkflowCatalog;
use std::io::Read;
use std::path::Path;

use parser::{parse_flag, CatalogRow};

#[derive(Debug)]
pub enum CatalogImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRole { step: String, source: UnknownRole },
    InvalidFlag {
        step: String,
        column: &'static str,
        value: String,
    },
    InvalidOrder { step: String, value: String },
    Graph(GraphError),
}

impl std::fmt::Display for CatalogImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogImportError::Io(err) => write!(f, "failed to read workflow catalog: {}", err),
            CatalogImportError::Csv(err) => write!(f, "invalid workflow catalog CSV: {}", err),
            CatalogImportError::InvalidRole { step, source } => {
                write!(f, "step '{}' has an invalid required role: {}", step, source)
            }
            CatalogImportError::InvalidFlag {
                step,
                column,
                value,
            } => write!(
                f,
                "step '{}' has an invalid '{}' value '{}' (expected yes/no)",
                step, column, value
            ),
            CatalogImportError::InvalidOrder { step, value } => write!(
                f,
                "step '{}' has an invalid order '{}' (expected a whole number)",
                step, value
            ),
            CatalogImportError::Graph(err) => write!(f, "workflow catalog is invalid: {}", err),
        }
    }
}

impl std::error::Error for CatalogImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogImportError::Io(err) => Some(err),
            CatalogImportError::Csv(err) => Some(err),
            CatalogImportError::InvalidRole { source, .. } => Some(source),
            CatalogImportError::Graph(err) => Some(err),
            CatalogImportError::InvalidFlag { .. } | CatalogImportError::InvalidOrder { .. } => {
                None
            }
        }
    }
}

impl From<std::io::Error> for CatalogImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<GraphError> for CatalogImportError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

/// Loads entry and exit workflows from a workflow-builder CSV export.
pub struct WorkflowCatalogImporter;

impl WorkflowCatalogImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<WorkflowCatalog, CatalogImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<WorkflowCatalog, CatalogImportError> {
        let steps = Self::steps_from_reader(reader)?;
        let catalog = WorkflowCatalog::from_graph(&WorkflowGraph::from_declared_dependencies(
            steps,
        ))?;
        Ok(catalog)
    }

    /// Parse the rows without validating the graph, for tools that report on raw input.
    pub fn steps_from_reader<R: Read>(reader: R) -> Result<Vec<WorkflowStep>, CatalogImportError> {
        parser::parse_rows(reader)?
            .into_iter()
            .enumerate()
            .map(|(position, row)| step_from_row(position, row))
            .collect()
    }
}

fn step_from_row(position: usize, row: CatalogRow) -> Result<WorkflowStep, CatalogImportError> {
    let required_role: AgencyRole =
        row.required_role
            .parse()
            .map_err(|source| CatalogImportError::InvalidRole {
                step: row.step_id.clone(),
                source,
            })?;

    let order = match row.order.as_deref() {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| CatalogImportError::InvalidOrder {
                step: row.step_id.clone(),
                value: raw.to_string(),
            })?,
        None => position as u32 + 1,
    };

    let flag = |column: &'static str, value: Option<&str>| {
        parse_flag(value).ok_or_else(|| CatalogImportError::InvalidFlag {
            step: row.step_id.clone(),
            column,
            value: value.unwrap_or_default().to_string(),
        })
    };
    let is_exit_step = flag("Exit Step", row.exit_step.as_deref())?;
    let root = flag("Root", row.root.as_deref())?;

    Ok(WorkflowStep {
        id: StepId::new(row.step_id.clone()),
        name: row.name.clone(),
        required_role,
        order,
        is_exit_step,
        parallel_group: None,
        depends_on: row.dependencies().into_iter().map(StepId::new).collect(),
        root,
    })
}
