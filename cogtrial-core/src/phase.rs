use serde::{Deserialize, Serialize};

/// Lifecycle of a single trial
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialPhase {
    Presenting,
    AwaitingInput,
    Evaluating,
    Complete { success: bool },
}

impl Default for TrialPhase {
    fn default() -> Self {
        TrialPhase::Presenting
    }
}

impl TrialPhase {
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::AwaitingInput)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    /// Forward transition. `Evaluating` needs the verdict so it is resolved by the caller.
    pub fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            Presenting => AwaitingInput,
            AwaitingInput => Evaluating,
            Evaluating | Complete { .. } => return None,
        })
    }

    pub fn can_enter(&self, to: TrialPhase) -> bool {
        match (self, to) {
            (TrialPhase::Evaluating, TrialPhase::Complete { .. }) => true,
            (from, to) => from.next() == Some(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_only_move_forward() {
        let mut phase = TrialPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert!(phase.can_enter(next));
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                TrialPhase::Presenting,
                TrialPhase::AwaitingInput,
                TrialPhase::Evaluating
            ]
        );
        assert!(phase.can_enter(TrialPhase::Complete { success: false }));
        assert!(!TrialPhase::AwaitingInput.can_enter(TrialPhase::Presenting));
        assert!(!TrialPhase::Complete { success: true }.can_enter(TrialPhase::Evaluating));
    }

    #[test]
    fn only_awaiting_input_accepts_selections() {
        assert!(TrialPhase::AwaitingInput.allows_input());
        assert!(!TrialPhase::Presenting.allows_input());
        assert!(!TrialPhase::Evaluating.allows_input());
        assert!(!TrialPhase::Complete { success: true }.allows_input());
    }
}
