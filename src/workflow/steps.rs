//! Step vocabulary for the package activation workflow.
//!
//! Owners pick the branch first; partners join a two-person package at trainer
//! selection. Every role-dependent lookup goes through [`StepVocabulary`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The registration's payer.
    Owner,
    /// Co-participant in a two-person package.
    Partner,
}

impl Role {
    pub fn from_is_owner(is_owner: bool) -> Self {
        if is_owner {
            Role::Owner
        } else {
            Role::Partner
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepName {
    SelectBranch,
    SelectTrainer,
    CreateSchedule,
    Completed,
}

impl StepName {
    /// Backend spelling of the step.
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::SelectBranch => "selectBranch",
            StepName::SelectTrainer => "selectTrainer",
            StepName::CreateSchedule => "createSchedule",
            StepName::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "selectBranch" => Some(StepName::SelectBranch),
            "selectTrainer" => Some(StepName::SelectTrainer),
            "createSchedule" => Some(StepName::CreateSchedule),
            "completed" => Some(StepName::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered step lists keyed by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepVocabulary {
    owner: Vec<StepName>,
    partner: Vec<StepName>,
}

impl Default for StepVocabulary {
    fn default() -> Self {
        Self {
            owner: vec![
                StepName::SelectBranch,
                StepName::SelectTrainer,
                StepName::CreateSchedule,
                StepName::Completed,
            ],
            partner: vec![
                StepName::SelectTrainer,
                StepName::CreateSchedule,
                StepName::Completed,
            ],
        }
    }
}

impl StepVocabulary {
    pub fn steps(&self, role: Role) -> &[StepName] {
        match role {
            Role::Owner => &self.owner,
            Role::Partner => &self.partner,
        }
    }

    pub fn total(&self, role: Role) -> usize {
        self.steps(role).len()
    }

    pub fn terminal_index(&self, role: Role) -> usize {
        self.total(role).saturating_sub(1)
    }

    pub fn index_of(&self, role: Role, step: StepName) -> Option<usize> {
        self.steps(role).iter().position(|s| *s == step)
    }

    pub fn step_at(&self, role: Role, index: usize) -> Option<StepName> {
        self.steps(role).get(index).copied()
    }
}
