use std::fmt;

/// Stages reported during greedy feature selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectionStage {
    Baseline,
    Search,
}

impl SelectionStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Baseline => "all-feature baseline",
            Self::Search => "greedy feature search",
        }
    }
}

impl fmt::Display for SelectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress while selecting features.
pub trait SelectionObserver {
    fn on_stage_start(&mut self, stage: SelectionStage, total_rounds: usize) {
        let _ = (stage, total_rounds);
    }
    fn on_stage_advance(&mut self, stage: SelectionStage, completed_rounds: usize) {
        let _ = (stage, completed_rounds);
    }
    fn on_stage_finish(&mut self, stage: SelectionStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopSelectionProgress;

impl SelectionObserver for NoopSelectionProgress {}
