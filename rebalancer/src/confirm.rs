//! Confirmation of planned orders before execution.

use std::cell::RefCell;
use std::collections::VecDeque;

use log::warn;

/// Answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Execute the plan.
    Approve,
    /// Skip this plan; continue with the next account.
    Decline,
    /// Stop the whole run.
    Cancel,
}

/// Asks whether a plan should be executed.
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> Decision;
}

/// Interactive yes/no prompt on the terminal.
///
/// An interrupted or failed prompt (Ctrl-C, closed stdin) cancels the run.
#[derive(Debug, Default)]
pub struct DialoguerConfirmer;

impl Confirmer for DialoguerConfirmer {
    fn confirm(&self, prompt: &str) -> Decision {
        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact_opt()
        {
            Ok(Some(true)) => Decision::Approve,
            Ok(Some(false)) => Decision::Decline,
            Ok(None) => Decision::Cancel,
            Err(e) => {
                warn!("confirmation prompt failed: {e}");
                Decision::Cancel
            }
        }
    }
}

/// Approves everything (`--yes`).
#[derive(Debug, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> Decision {
        Decision::Approve
    }
}

/// Replays a fixed list of decisions, then repeats the fallback.
///
/// Records every prompt it was shown.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    decisions: RefCell<VecDeque<Decision>>,
    fallback: Decision,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(decisions: impl IntoIterator<Item = Decision>, fallback: Decision) -> Self {
        Self {
            decisions: RefCell::new(decisions.into_iter().collect()),
            fallback,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, prompt: &str) -> Decision {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.decisions
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_approves() {
        assert_eq!(AutoConfirm.confirm("go?"), Decision::Approve);
    }

    #[test]
    fn scripted_replays_then_falls_back() {
        let c = ScriptedConfirmer::new([Decision::Decline, Decision::Approve], Decision::Cancel);
        assert_eq!(c.confirm("a"), Decision::Decline);
        assert_eq!(c.confirm("b"), Decision::Approve);
        assert_eq!(c.confirm("c"), Decision::Cancel);
        assert_eq!(c.prompts(), ["a", "b", "c"]);
    }
}
