//! Stepper view model driven by a [`ProgressionResult`].
//!
//! Nothing here interprets status strings; every decision comes from the
//! projection in [`crate::progress`].

use std::fmt::{self, Display};

use serde::Serialize;

use crate::progress::{ProgressionResult, Stage, Terminal};

const BAR_WIDTH: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Completed,
    Current,
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepMarker {
    /// 1-based, as shown on the marker.
    pub number: usize,
    pub stage: Stage,
    pub state: StepState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum Stepper {
    /// One marker per stage plus a progress line of extent `fraction`. The
    /// vehicle rides the end of the line once the order has a position.
    Linear {
        steps: Vec<StepMarker>,
        fraction: f64,
        vehicle: bool,
    },
    /// A single marker replacing the linear steps.
    Terminal { terminal: Terminal, label: String },
}

impl Stepper {
    pub fn steps(&self) -> &[StepMarker] {
        match self {
            Stepper::Linear { steps, .. } => steps,
            Stepper::Terminal { .. } => &[],
        }
    }
}

impl From<&ProgressionResult> for Stepper {
    fn from(progression: &ProgressionResult) -> Self {
        if let Some(terminal) = progression.terminal() {
            return Stepper::Terminal {
                terminal,
                label: progression.status().to_owned(),
            };
        }

        let steps = Stage::ALL
            .iter()
            .map(|&stage| {
                let state = match progression.stage_index() {
                    Some(current) if stage.index() == current => StepState::Current,
                    Some(current) if stage.index() < current => StepState::Completed,
                    _ => StepState::Pending,
                };
                StepMarker {
                    number: stage.index() + 1,
                    stage,
                    state,
                }
            })
            .collect();

        Stepper::Linear {
            steps,
            fraction: progression.progress_fraction(),
            vehicle: progression.stage_index().is_some(),
        }
    }
}

impl Display for Stepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stepper::Terminal { terminal, label } => {
                let mark = match terminal {
                    Terminal::Cancelled => "X",
                    Terminal::Returned => "<",
                };
                write!(f, "[{}] {}", mark, label)
            }
            Stepper::Linear {
                steps,
                fraction,
                vehicle,
            } => {
                let markers: Vec<String> = steps
                    .iter()
                    .map(|step| {
                        let mark = match step.state {
                            StepState::Completed => "x".to_owned(),
                            StepState::Current => "*".to_owned(),
                            StepState::Pending => step.number.to_string(),
                        };
                        format!("[{}] {}", mark, step.stage)
                    })
                    .collect();
                writeln!(f, "{}", markers.join(" -- "))?;

                let filled = (fraction * BAR_WIDTH as f64).round() as usize;
                let mut bar = "=".repeat(filled);
                if *vehicle {
                    bar.push('>');
                }
                write!(
                    f,
                    "|{:<width$}| {:>3.0}%",
                    bar,
                    fraction * 100.0,
                    width = BAR_WIDTH + 1
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::compute_progression;

    fn states(stepper: &Stepper) -> Vec<StepState> {
        stepper.steps().iter().map(|s| s.state).collect()
    }

    #[test]
    fn marks_steps_relative_to_the_current_stage() {
        let stepper = Stepper::from(&compute_progression("PACKED"));
        assert_eq!(
            states(&stepper),
            vec![
                StepState::Completed,
                StepState::Completed,
                StepState::Current,
                StepState::Pending,
                StepState::Pending,
            ]
        );
        let numbers: Vec<usize> = stepper.steps().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn terminal_replaces_linear_steps() {
        let stepper = Stepper::from(&compute_progression("RETURNED"));
        assert!(stepper.steps().is_empty());
        assert_eq!(
            stepper,
            Stepper::Terminal {
                terminal: Terminal::Returned,
                label: "RETURNED".into()
            }
        );
        assert_eq!(stepper.to_string(), "[<] RETURNED");
    }

    #[test]
    fn unrecognized_status_renders_unstarted_without_vehicle() {
        let stepper = Stepper::from(&compute_progression("ON_HOLD"));
        assert!(states(&stepper).iter().all(|s| *s == StepState::Pending));
        match stepper {
            Stepper::Linear {
                fraction, vehicle, ..
            } => {
                assert_eq!(fraction, 0.0);
                assert!(!vehicle);
            }
            other => panic!("unexpected stepper {other:?}"),
        }
    }

    #[test]
    fn pending_shows_vehicle_at_the_start() {
        let stepper = Stepper::from(&compute_progression("PENDING"));
        let text = stepper.to_string();
        assert!(text.starts_with("[*] PENDING -- [2] ACCEPTED"), "{text}");
        assert!(text.contains("|>"), "{text}");
        assert!(text.ends_with("  0%"), "{text}");
    }

    #[test]
    fn delivered_fills_the_bar() {
        let text = Stepper::from(&compute_progression("DELIVERED")).to_string();
        assert!(text.contains(&format!("|{}>|", "=".repeat(BAR_WIDTH))), "{text}");
        assert!(text.ends_with("100%"), "{text}");
    }

    #[test]
    fn serializes_with_layout_tag() {
        let json = serde_json::to_value(Stepper::from(&compute_progression("SHIPPED"))).unwrap();
        assert_eq!(json["layout"], "linear");
        assert_eq!(json["fraction"], 0.75);
        assert_eq!(json["steps"][3]["state"], "current");
        assert_eq!(json["steps"][3]["stage"], "SHIPPED");
    }
}
