//! Projection of an order's lifecycle status onto the fulfillment progression.
//!
//! The backend owns the order status; all we get is a string. This module maps
//! that string onto the fixed linear sequence of [`Stage`]s, or onto one of the
//! [`Terminal`] exceptions that replace the sequence entirely. Anything else is
//! an unrecognized status and projects to "nothing started".

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize, Serializer};

/// A linear fulfillment stage, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Pending,
    Accepted,
    Packed,
    Shipped,
    Delivered,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Pending,
        Stage::Accepted,
        Stage::Packed,
        Stage::Shipped,
        Stage::Delivered,
    ];

    /// Zero-based position in [`Stage::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Pending => "PENDING",
            Stage::Accepted => "ACCEPTED",
            Stage::Packed => "PACKED",
            Stage::Shipped => "SHIPPED",
            Stage::Delivered => "DELIVERED",
        }
    }

    /// Exact, case-sensitive match against the backend's status values.
    pub fn from_status(status: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.as_str() == status)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An end state outside the linear sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Terminal {
    Cancelled,
    Returned,
}

impl Terminal {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminal::Cancelled => "CANCELLED",
            Terminal::Returned => "RETURNED",
        }
    }

    pub fn from_status(status: &str) -> Option<Terminal> {
        match status {
            "CANCELLED" => Some(Terminal::Cancelled),
            "RETURNED" => Some(Terminal::Returned),
            _ => None,
        }
    }
}

impl Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the three mutually exclusive projections applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Linear,
    Terminal,
    Unrecognized,
}

/// Display-ready progression state derived from a raw status value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionResult {
    status: String,
    kind: ProgressKind,
    /// Serialized as `-1` when there is no linear position.
    #[serde(serialize_with = "serialize_stage_index")]
    stage_index: Option<usize>,
    completed_up_to: Vec<Stage>,
    current_stage: Option<Stage>,
    terminal: Option<Terminal>,
    is_terminal: bool,
    progress_fraction: f64,
}

fn serialize_stage_index<S: Serializer>(
    index: &Option<usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match index {
        Some(index) => serializer.serialize_i64(*index as i64),
        None => serializer.serialize_i64(-1),
    }
}

impl ProgressionResult {
    /// The raw status this result was computed from.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn kind(&self) -> ProgressKind {
        self.kind
    }

    pub fn stage_index(&self) -> Option<usize> {
        self.stage_index
    }

    /// `stage_index` with `-1` standing for "no linear position".
    pub fn position(&self) -> i64 {
        self.stage_index.map(|i| i as i64).unwrap_or(-1)
    }

    pub fn completed_up_to(&self) -> &[Stage] {
        &self.completed_up_to
    }

    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage
    }

    pub fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    pub fn is_unrecognized(&self) -> bool {
        self.kind == ProgressKind::Unrecognized
    }

    /// In `[0, 1]`. Always `0` for terminal and unrecognized statuses.
    pub fn progress_fraction(&self) -> f64 {
        self.progress_fraction
    }
}

/// Project `status` onto the fulfillment progression.
///
/// Total over all strings: values that are neither a [`Stage`] nor a
/// [`Terminal`] fall back to an unstarted projection with
/// [`ProgressKind::Unrecognized`].
pub fn compute_progression(status: &str) -> ProgressionResult {
    if let Some(terminal) = Terminal::from_status(status) {
        return ProgressionResult {
            status: status.to_owned(),
            kind: ProgressKind::Terminal,
            stage_index: None,
            completed_up_to: Vec::new(),
            current_stage: None,
            terminal: Some(terminal),
            is_terminal: true,
            progress_fraction: 0.0,
        };
    }

    match Stage::from_status(status) {
        Some(stage) => {
            let index = stage.index();
            let last = (Stage::ALL.len() - 1) as f64;
            ProgressionResult {
                status: status.to_owned(),
                kind: ProgressKind::Linear,
                stage_index: Some(index),
                completed_up_to: Stage::ALL[..=index].to_vec(),
                current_stage: Some(stage),
                terminal: None,
                is_terminal: false,
                progress_fraction: index as f64 / last,
            }
        }
        None => ProgressionResult {
            status: status.to_owned(),
            kind: ProgressKind::Unrecognized,
            stage_index: None,
            completed_up_to: Vec::new(),
            current_stage: None,
            terminal: None,
            is_terminal: false,
            progress_fraction: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn linear_stages_complete_everything_up_to_their_index() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            let result = compute_progression(stage.as_str());
            assert_eq!(result.stage_index(), Some(i));
            assert_eq!(result.completed_up_to(), &Stage::ALL[..=i]);
            assert_eq!(result.current_stage(), Some(*stage));
            assert_eq!(result.kind(), ProgressKind::Linear);
        }
    }

    #[test]
    fn fraction_spans_zero_to_one() {
        assert_eq!(compute_progression("PENDING").progress_fraction(), 0.0);
        assert_eq!(compute_progression("DELIVERED").progress_fraction(), 1.0);
    }

    #[test]
    fn accepted_is_a_quarter_of_the_way() {
        let result = compute_progression("ACCEPTED");
        assert_eq!(result.position(), 1);
        assert_eq!(
            result.completed_up_to(),
            &[Stage::Pending, Stage::Accepted]
        );
        assert!(!result.is_terminal());
        assert_eq!(result.progress_fraction(), 0.25);
    }

    #[test]
    fn shipped_is_three_quarters() {
        let result = compute_progression("SHIPPED");
        assert_eq!(result.position(), 3);
        assert_eq!(result.progress_fraction(), 0.75);
    }

    #[test]
    fn terminal_statuses_replace_the_sequence() {
        let cancelled = compute_progression("CANCELLED");
        assert!(cancelled.is_terminal());
        assert_eq!(cancelled.position(), -1);
        assert_eq!(cancelled.terminal(), Some(Terminal::Cancelled));
        assert!(cancelled.completed_up_to().is_empty());
        assert_eq!(cancelled.progress_fraction(), 0.0);

        let returned = compute_progression("RETURNED");
        assert!(returned.is_terminal());
        assert_eq!(returned.terminal(), Some(Terminal::Returned));
    }

    #[test]
    fn unknown_status_falls_back_to_unstarted() {
        for status in ["UNKNOWN_STATUS", "REFUNDED", "", "pending", " PENDING"] {
            let result = compute_progression(status);
            assert!(!result.is_terminal(), "{status:?}");
            assert_eq!(result.position(), -1, "{status:?}");
            assert!(result.is_unrecognized(), "{status:?}");
            assert_eq!(result.current_stage(), None);
            assert!(result.completed_up_to().is_empty());
            assert_eq!(result.progress_fraction(), 0.0);
        }
    }

    #[test]
    fn fraction_strictly_increases_along_the_sequence() {
        let fractions: Vec<f64> = Stage::ALL
            .iter()
            .map(|s| compute_progression(s.as_str()).progress_fraction())
            .collect();
        assert!(fractions.windows(2).all(|w| w[0] < w[1]), "{fractions:?}");
    }

    #[test]
    fn serializes_missing_index_as_minus_one() {
        let json = serde_json::to_value(compute_progression("CANCELLED")).unwrap();
        assert_eq!(json["stageIndex"], -1);
        assert_eq!(json["isTerminal"], true);
        assert_eq!(json["kind"], "terminal");
        assert_eq!(json["terminal"], "CANCELLED");

        let json = serde_json::to_value(compute_progression("PACKED")).unwrap();
        assert_eq!(json["stageIndex"], 2);
        assert_eq!(json["currentStage"], "PACKED");
        assert_eq!(
            json["completedUpTo"],
            serde_json::json!(["PENDING", "ACCEPTED", "PACKED"])
        );
    }

    proptest! {
        #[test]
        fn projection_is_total_and_idempotent(status in ".*") {
            let first = compute_progression(&status);
            let second = compute_progression(&status);
            prop_assert_eq!(&first, &second);
            prop_assert!((0.0..=1.0).contains(&first.progress_fraction()));
        }

        #[test]
        fn exactly_one_projection_holds(status in "[A-Z_]{0,12}") {
            let result = compute_progression(&status);
            let linear = result.stage_index().is_some();
            let terminal = result.is_terminal();
            let unrecognized = result.is_unrecognized();
            prop_assert_eq!(
                [linear, terminal, unrecognized].iter().filter(|b| **b).count(),
                1
            );
        }
    }
}
