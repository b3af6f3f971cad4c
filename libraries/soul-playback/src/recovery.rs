//! Recovery policy for fatal pipeline errors
//!
//! A small table from error class to action, consulted by the engine's
//! session driver. Budgets (how often an action may repeat) are tracked per
//! session by [`RecoveryState`].

use serde::{Deserialize, Serialize};

/// Coarse classification of a pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    /// Manifest or segment transport failure
    Network,
    /// Decoder or demuxer failure
    MediaDecode,
    /// Anything else
    Other,
}

/// What the engine does about a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryAction {
    /// Restart loading from the current position
    RestartLoad,
    /// Try in-place decoder recovery, once per session
    RecoverOnce,
    /// Detach and report `UnrecoverablePlaybackError`
    Fail,
}

/// Error class to recovery action table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    rules: Vec<(ErrorClass, RecoveryAction)>,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                (ErrorClass::Network, RecoveryAction::RestartLoad),
                (ErrorClass::MediaDecode, RecoveryAction::RecoverOnce),
                (ErrorClass::Other, RecoveryAction::Fail),
            ],
        }
    }
}

impl RecoveryPolicy {
    /// Policy that fails on everything
    pub fn fail_fast() -> Self {
        Self { rules: Vec::new() }
    }

    /// Override the action for one class
    pub fn with(mut self, class: ErrorClass, action: RecoveryAction) -> Self {
        self.rules.retain(|(c, _)| *c != class);
        self.rules.push((class, action));
        self
    }

    /// Configured action; classes without a rule fail
    pub fn action_for(&self, class: ErrorClass) -> RecoveryAction {
        self.rules
            .iter()
            .find(|(c, _)| *c == class)
            .map_or(RecoveryAction::Fail, |(_, action)| *action)
    }
}

/// Per-session recovery budget.
///
/// A restart is refused when the previous restart has not been followed by
/// any progress; decoder recovery is allowed once.
#[derive(Debug, Clone, Default)]
pub struct RecoveryState {
    restarted_without_progress: bool,
    decoder_recovery_used: bool,
}

/// Decision for one fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Restart loading
    Restart,
    /// Run decoder recovery
    RecoverDecoder,
    /// Give up
    Fail,
}

impl RecoveryState {
    /// Decide what to do with a fatal error and charge the budget.
    pub fn decide(&mut self, policy: &RecoveryPolicy, class: ErrorClass) -> RecoveryDecision {
        match policy.action_for(class) {
            RecoveryAction::RestartLoad if self.restarted_without_progress => {
                RecoveryDecision::Fail
            }
            RecoveryAction::RestartLoad => {
                self.restarted_without_progress = true;
                RecoveryDecision::Restart
            }
            RecoveryAction::RecoverOnce if self.decoder_recovery_used => RecoveryDecision::Fail,
            RecoveryAction::RecoverOnce => {
                self.decoder_recovery_used = true;
                RecoveryDecision::RecoverDecoder
            }
            RecoveryAction::Fail => RecoveryDecision::Fail,
        }
    }

    /// Media advanced (segment buffered or playhead moved)
    pub fn progressed(&mut self) {
        self.restarted_without_progress = false;
    }
}
