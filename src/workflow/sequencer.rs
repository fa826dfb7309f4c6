//! Step sequencing for the package activation workflow.
//!
//! The backend decides whether a step is satisfied; the client decides which
//! step UI to show. [`StepSequencer::reduce`] is the only place the current step
//! changes, so it can be exercised without a network or a screen.

use super::steps::{Role, StepName, StepVocabulary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    /// No successful status fetch yet for this workflow instance.
    Loading,
    /// Step chosen by the first status fetch.
    InitialStep(usize),
    /// Step reached by a successful action after the initial load.
    Advancing(usize),
    /// `completed`. Absorbing.
    Terminal,
}

/// The parts of a status fetch the sequencer looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSignal {
    pub role: Role,
    /// `None` when the backend sent no step or one outside the vocabulary.
    pub reported_step: Option<StepName>,
    /// `trangThaiDangKy == HOAN_THANH`
    pub registration_completed: bool,
}

impl StatusSignal {
    pub fn is_terminal(&self) -> bool {
        self.registration_completed || self.reported_step == Some(StepName::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    StatusLoaded(StatusSignal),
    /// Owner confirmed the branch.
    BranchConfirmed,
    /// The current step's action succeeded.
    StepCompleted,
    /// Explicit re-fetch that rebuilds the step from the next status.
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    /// Fixed by the initial load.
    pub role: Option<Role>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: WorkflowPhase::Loading,
            role: None,
        }
    }
}

impl WorkflowState {
    pub fn is_loading(&self) -> bool {
        self.phase == WorkflowPhase::Loading
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == WorkflowPhase::Terminal
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepSequencer {
    vocabulary: StepVocabulary,
}

impl StepSequencer {
    pub fn new(vocabulary: StepVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &StepVocabulary {
        &self.vocabulary
    }

    pub fn reduce(&self, state: WorkflowState, event: WorkflowEvent) -> WorkflowState {
        match (state.phase, event) {
            (WorkflowPhase::Terminal, _) => state,
            (_, WorkflowEvent::Reload) => WorkflowState::default(),
            (WorkflowPhase::Loading, WorkflowEvent::StatusLoaded(signal)) => self.initial(signal),
            (WorkflowPhase::Loading, _) => state,
            // Later fetches never move the step; only action successes do.
            (_, WorkflowEvent::StatusLoaded(_)) => state,
            (
                WorkflowPhase::InitialStep(index) | WorkflowPhase::Advancing(index),
                WorkflowEvent::BranchConfirmed,
            ) => match state.role {
                Some(Role::Owner) => {
                    match self.vocabulary.index_of(Role::Owner, StepName::SelectTrainer) {
                        Some(target) if target > index => self.advanced(Role::Owner, target),
                        _ => state,
                    }
                }
                _ => state,
            },
            (WorkflowPhase::InitialStep(index) | WorkflowPhase::Advancing(index), WorkflowEvent::StepCompleted) => {
                match state.role {
                    Some(role) => self.advanced(role, index + 1),
                    None => state,
                }
            }
        }
    }

    fn initial(&self, signal: StatusSignal) -> WorkflowState {
        let role = signal.role;
        let phase = if signal.is_terminal() {
            WorkflowPhase::Terminal
        } else {
            match role {
                // A returning owner always re-confirms the branch.
                Role::Owner => WorkflowPhase::InitialStep(0),
                Role::Partner => {
                    let index = signal
                        .reported_step
                        .and_then(|step| self.vocabulary.index_of(Role::Partner, step))
                        .unwrap_or(0);
                    self.clamp(role, index, WorkflowPhase::InitialStep)
                }
            }
        };

        WorkflowState {
            phase,
            role: Some(role),
        }
    }

    fn advanced(&self, role: Role, index: usize) -> WorkflowState {
        WorkflowState {
            phase: self.clamp(role, index, WorkflowPhase::Advancing),
            role: Some(role),
        }
    }

    fn clamp(&self, role: Role, index: usize, phase: fn(usize) -> WorkflowPhase) -> WorkflowPhase {
        if index >= self.vocabulary.terminal_index(role) {
            WorkflowPhase::Terminal
        } else {
            phase(index)
        }
    }

    pub fn current_index(&self, state: &WorkflowState) -> Option<usize> {
        match (state.phase, state.role) {
            (WorkflowPhase::InitialStep(index) | WorkflowPhase::Advancing(index), _) => Some(index),
            (WorkflowPhase::Terminal, Some(role)) => Some(self.vocabulary.terminal_index(role)),
            _ => None,
        }
    }

    pub fn current_step(&self, state: &WorkflowState) -> Option<StepName> {
        let role = state.role?;
        self.current_index(state)
            .and_then(|index| self.vocabulary.step_at(role, index))
    }

    pub fn total_steps(&self, state: &WorkflowState) -> Option<usize> {
        state.role.map(|role| self.vocabulary.total(role))
    }
}
