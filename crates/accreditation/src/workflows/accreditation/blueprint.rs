use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::domain::{AgencyRole, StepId, WorkflowPhase, WorkflowStep};
use super::graph::{validate_graph, DependencyEdge, ExecutionPlan, GraphError, WorkflowGraph};

/// Validated step layout for one phase of the approval pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    phase: WorkflowPhase,
    plan: ExecutionPlan,
}

impl WorkflowDefinition {
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        self.plan.steps()
    }

    pub fn step(&self, step_id: &StepId) -> Option<&WorkflowStep> {
        self.steps().iter().find(|step| &step.id == step_id)
    }

    pub fn steps_for_role(&self, role: AgencyRole) -> Vec<&WorkflowStep> {
        self.steps()
            .iter()
            .filter(|step| step.required_role == role)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Entry and exit workflows used when opening approval records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowCatalog {
    entry: WorkflowDefinition,
    exit: WorkflowDefinition,
}

impl WorkflowCatalog {
    pub fn standard() -> Self {
        Self::from_graph(&WorkflowGraph::from_declared_dependencies(
            standard_steps(),
        ))
        .expect("standard workflow catalog is a valid graph")
    }

    /// Split a builder graph by phase and validate each phase independently.
    pub fn from_graph(graph: &WorkflowGraph) -> Result<Self, GraphError> {
        let mut phases: HashMap<&StepId, WorkflowPhase> = HashMap::new();
        for step in &graph.steps {
            if phases.insert(&step.id, step.phase()).is_some() {
                return Err(GraphError::DuplicateStep(step.id.clone()));
            }
        }

        for edge in &graph.edges {
            let from = phases
                .get(&edge.from)
                .ok_or_else(|| GraphError::UnknownStep(edge.from.clone()))?;
            let to = phases
                .get(&edge.to)
                .ok_or_else(|| GraphError::UnknownStep(edge.to.clone()))?;
            if from != to {
                return Err(GraphError::MixedPhase {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }

        Ok(Self {
            entry: phase_definition(graph, WorkflowPhase::Entry)?,
            exit: phase_definition(graph, WorkflowPhase::Exit)?,
        })
    }

    pub fn definition(&self, phase: WorkflowPhase) -> &WorkflowDefinition {
        match phase {
            WorkflowPhase::Entry => &self.entry,
            WorkflowPhase::Exit => &self.exit,
        }
    }

    pub fn entry(&self) -> &WorkflowDefinition {
        &self.entry
    }

    pub fn exit(&self) -> &WorkflowDefinition {
        &self.exit
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn phase_definition(
    graph: &WorkflowGraph,
    phase: WorkflowPhase,
) -> Result<WorkflowDefinition, GraphError> {
    let steps: Vec<WorkflowStep> = graph
        .steps
        .iter()
        .filter(|step| step.phase() == phase)
        .cloned()
        .collect();
    let members: HashSet<&StepId> = steps.iter().map(|step| &step.id).collect();
    let edges: Vec<DependencyEdge> = graph
        .edges
        .iter()
        .filter(|edge| members.contains(&edge.to))
        .cloned()
        .collect();

    let plan = validate_graph(&steps, &edges)?;
    Ok(WorkflowDefinition { phase, plan })
}

fn standard_steps() -> Vec<WorkflowStep> {
    let ema = StepId::new("ema_accreditation_review");
    let customs_exit = StepId::new("customs_exit_clearance");

    vec![
        WorkflowStep::new(
            "ema_accreditation_review",
            "Media Authority Accreditation Review",
            AgencyRole::EmaOfficer,
            1,
        )
        .as_root(),
        WorkflowStep {
            depends_on: vec![ema.clone()],
            ..WorkflowStep::new(
                "ics_visa_clearance",
                "Immigration Visa Clearance",
                AgencyRole::IcsOfficer,
                2,
            )
        },
        WorkflowStep {
            depends_on: vec![ema.clone()],
            ..WorkflowStep::new(
                "customs_equipment_clearance",
                "Customs Equipment Clearance",
                AgencyRole::CustomsOfficer,
                2,
            )
        },
        WorkflowStep {
            depends_on: vec![ema],
            ..WorkflowStep::new(
                "insa_security_screening",
                "Security Services Screening",
                AgencyRole::InsaOfficer,
                2,
            )
        },
        WorkflowStep::new(
            "customs_exit_clearance",
            "Customs Exit Clearance",
            AgencyRole::CustomsOfficer,
            1,
        )
        .exit()
        .as_root(),
        WorkflowStep {
            depends_on: vec![customs_exit],
            ..WorkflowStep::new(
                "ics_exit_clearance",
                "Immigration Exit Clearance",
                AgencyRole::IcsOfficer,
                2,
            )
            .exit()
        },
    ]
}
