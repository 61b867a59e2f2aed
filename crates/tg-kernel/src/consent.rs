// SPDX-License-Identifier: MIT OR Apache-2.0
//! Consent signals and the per-actor consent ledger.
//!
//! Signals are ordered by timestamp; when two signals from the same actor
//! share a timestamp, the lexicographically greater kind wins, with
//! `stop` ordered last so it wins a tie. An anchor actor's stop overrides
//! every non-anchor resume; an anchor's later resume clears actor-level
//! stops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::info;

/// A consent signal kind. Ordering is the tiebreak for equal timestamps:
/// `Pause < Resume < Stop`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    /// Suspend the actor's actions until a resume.
    Pause,
    /// Clear a previous stop or pause.
    Resume,
    /// Deny the actor's actions until a resume.
    Stop,
}

/// One recorded consent signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSignal {
    /// Actor the signal concerns.
    pub actor: String,
    /// The signal kind.
    pub kind: ConsentKind,
    /// When the signal was issued.
    pub at: DateTime<Utc>,
}

/// Effective consent state for an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentStatus {
    /// No active restriction.
    Clear,
    /// The actor (or an anchor) paused activity.
    Paused,
    /// The actor's own stop is active.
    ActorStopped,
    /// An anchor-issued stop is active; every action is denied.
    AnchorStopped,
}

#[derive(Debug, Default)]
struct State {
    per_actor: HashMap<String, ConsentSignal>,
    anchor: Option<ConsentSignal>,
}

/// In-memory consent state, rebuilt from signals and the clock.
#[derive(Debug)]
pub struct ConsentLedger {
    anchors: BTreeSet<String>,
    state: RwLock<State>,
}

impl ConsentLedger {
    /// Create a ledger with the given anchor actor set.
    #[must_use]
    pub fn new(anchors: BTreeSet<String>) -> Self {
        Self {
            anchors,
            state: RwLock::new(State::default()),
        }
    }

    /// Returns `true` if the actor is an anchor.
    #[must_use]
    pub fn is_anchor(&self, actor: &str) -> bool {
        self.anchors.contains(actor)
    }

    /// Record a signal, keeping the winning signal per actor and the
    /// winning anchor-scoped signal.
    pub fn record(&self, signal: ConsentSignal) {
        let is_anchor = self.is_anchor(&signal.actor);
        let mut state = self.state.write().expect("consent lock poisoned");

        let entry = state.per_actor.get(&signal.actor);
        if entry.is_none_or(|existing| supersedes(&signal, existing)) {
            state.per_actor.insert(signal.actor.clone(), signal.clone());
        }

        if is_anchor {
            let current = state.anchor.as_ref();
            if current.is_none_or(|existing| supersedes(&signal, existing)) {
                info!(
                    target: "tg.consent",
                    actor = %signal.actor,
                    kind = ?signal.kind,
                    "anchor consent signal recorded"
                );
                state.anchor = Some(signal);
            }
        }
    }

    /// Effective status for an actor under current signals.
    #[must_use]
    pub fn status(&self, actor: &str) -> ConsentStatus {
        let state = self.state.read().expect("consent lock poisoned");

        if let Some(anchor) = &state.anchor {
            match anchor.kind {
                ConsentKind::Stop => return ConsentStatus::AnchorStopped,
                ConsentKind::Pause => return ConsentStatus::Paused,
                ConsentKind::Resume => {}
            }
        }

        match state.per_actor.get(actor) {
            Some(own) => match own.kind {
                ConsentKind::Stop => {
                    if anchor_resumed_after(state.anchor.as_ref(), own) {
                        ConsentStatus::Clear
                    } else {
                        ConsentStatus::ActorStopped
                    }
                }
                ConsentKind::Pause => {
                    if anchor_resumed_after(state.anchor.as_ref(), own) {
                        ConsentStatus::Clear
                    } else {
                        ConsentStatus::Paused
                    }
                }
                ConsentKind::Resume => ConsentStatus::Clear,
            },
            None => ConsentStatus::Clear,
        }
    }

    /// Latest winning signal recorded for an actor, if any.
    #[must_use]
    pub fn latest(&self, actor: &str) -> Option<ConsentSignal> {
        self.state
            .read()
            .expect("consent lock poisoned")
            .per_actor
            .get(actor)
            .cloned()
    }
}

/// `true` when `candidate` wins over `existing`: later timestamp, or
/// equal timestamp with the greater kind.
fn supersedes(candidate: &ConsentSignal, existing: &ConsentSignal) -> bool {
    (candidate.at, candidate.kind) >= (existing.at, existing.kind)
}

/// An anchor resume at or after the actor's own restriction clears it.
fn anchor_resumed_after(anchor: Option<&ConsentSignal>, own: &ConsentSignal) -> bool {
    anchor.is_some_and(|a| a.kind == ConsentKind::Resume && a.at >= own.at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn anchors() -> BTreeSet<String> {
        ["anchor".to_string()].into_iter().collect()
    }

    fn sig(actor: &str, kind: ConsentKind, at: DateTime<Utc>) -> ConsentSignal {
        ConsentSignal {
            actor: actor.into(),
            kind,
            at,
        }
    }

    #[test]
    fn default_is_clear() {
        let ledger = ConsentLedger::new(anchors());
        assert_eq!(ledger.status("anyone"), ConsentStatus::Clear);
    }

    #[test]
    fn own_stop_denies_until_own_resume() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("alice", ConsentKind::Stop, t0));
        assert_eq!(ledger.status("alice"), ConsentStatus::ActorStopped);
        assert_eq!(ledger.status("bob"), ConsentStatus::Clear);

        ledger.record(sig("alice", ConsentKind::Resume, t0 + Duration::seconds(1)));
        assert_eq!(ledger.status("alice"), ConsentStatus::Clear);
    }

    #[test]
    fn anchor_stop_denies_everyone() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("anchor", ConsentKind::Stop, t0));
        assert_eq!(ledger.status("alice"), ConsentStatus::AnchorStopped);
        assert_eq!(ledger.status("anchor"), ConsentStatus::AnchorStopped);
    }

    #[test]
    fn anchor_stop_beats_non_anchor_resume() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("anchor", ConsentKind::Stop, t0));
        ledger.record(sig("alice", ConsentKind::Resume, t0 + Duration::seconds(5)));
        assert_eq!(ledger.status("alice"), ConsentStatus::AnchorStopped);
    }

    #[test]
    fn anchor_resume_clears_anchor_stop() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("anchor", ConsentKind::Stop, t0));
        ledger.record(sig("anchor", ConsentKind::Resume, t0 + Duration::seconds(1)));
        assert_eq!(ledger.status("alice"), ConsentStatus::Clear);
    }

    #[test]
    fn anchor_resume_clears_actor_stop() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("alice", ConsentKind::Stop, t0));
        ledger.record(sig("anchor", ConsentKind::Resume, t0 + Duration::seconds(1)));
        assert_eq!(ledger.status("alice"), ConsentStatus::Clear);
    }

    #[test]
    fn later_signal_wins() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("alice", ConsentKind::Resume, t0 + Duration::seconds(2)));
        ledger.record(sig("alice", ConsentKind::Stop, t0));
        // The stale stop must not override the newer resume.
        assert_eq!(ledger.status("alice"), ConsentStatus::Clear);
    }

    #[test]
    fn equal_timestamp_tiebreak_prefers_stop() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("alice", ConsentKind::Resume, t0));
        ledger.record(sig("alice", ConsentKind::Stop, t0));
        assert_eq!(ledger.status("alice"), ConsentStatus::ActorStopped);

        // Order of arrival does not matter.
        let ledger = ConsentLedger::new(anchors());
        ledger.record(sig("alice", ConsentKind::Stop, t0));
        ledger.record(sig("alice", ConsentKind::Resume, t0));
        assert_eq!(ledger.status("alice"), ConsentStatus::ActorStopped);
    }

    #[test]
    fn pause_suspends_until_resume() {
        let ledger = ConsentLedger::new(anchors());
        let t0 = Utc::now();
        ledger.record(sig("alice", ConsentKind::Pause, t0));
        assert_eq!(ledger.status("alice"), ConsentStatus::Paused);
        ledger.record(sig("alice", ConsentKind::Resume, t0 + Duration::seconds(1)));
        assert_eq!(ledger.status("alice"), ConsentStatus::Clear);
    }
}
