//! Decide which runs of an order to download.

mod marker;

use std::collections::HashMap;
use std::fmt;
use std::io;

use crate::api::{ModelRun, OrderSummary};
use crate::settings::RunMode;

pub use marker::{MarkerCheck, MarkerStore};

/// Why an order produced no work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Latest run already recorded in the order's marker.
    AlreadyProcessed { run: String, stamp: String },
    /// Latest run is not one the order is entitled to.
    RunNotWanted { run: String },
    /// No run metadata for the order's model.
    NoModelRun { model: String },
    /// None of the requested runs are in the order's allow-list.
    NoRunsSelected,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyProcessed { run, stamp } => {
                write!(f, "latest run {} ({}) already processed", run, stamp)
            }
            SkipReason::RunNotWanted { run } => {
                write!(f, "latest run {} is not in the order's required runs", run)
            }
            SkipReason::NoModelRun { model } => write!(f, "no run data for model {}", model),
            SkipReason::NoRunsSelected => write!(f, "no runs selected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Runs(Vec<String>),
    Skip(SkipReason),
}

pub struct RunSelector<'a> {
    mode: &'a RunMode,
    model_runs: &'a HashMap<String, ModelRun>,
    markers: &'a MarkerStore,
}

impl<'a> RunSelector<'a> {
    pub fn new(
        mode: &'a RunMode,
        model_runs: &'a HashMap<String, ModelRun>,
        markers: &'a MarkerStore,
    ) -> Self {
        Self {
            mode,
            model_runs,
            markers,
        }
    }

    /// Only marker I/O can fail; every other outcome is a `Selection`.
    pub fn select(&self, order: &OrderSummary) -> io::Result<Selection> {
        match self.mode {
            RunMode::Explicit(runs) => Ok(self.select_explicit(order, runs)),
            RunMode::Latest => self.select_latest(order),
        }
    }

    fn select_explicit(&self, order: &OrderSummary, runs: &[String]) -> Selection {
        let mut selected = Vec::new();
        for run in runs {
            if order.wants_run(run) {
                selected.push(run.clone());
            } else {
                tracing::warn!(
                    order_id = %order.order_id,
                    run = %run,
                    "run not in the order's required runs, dropping"
                );
            }
        }
        if selected.is_empty() {
            Selection::Skip(SkipReason::NoRunsSelected)
        } else {
            Selection::Runs(selected)
        }
    }

    fn select_latest(&self, order: &OrderSummary) -> io::Result<Selection> {
        let Some(latest) = self.model_runs.get(&order.model_id) else {
            return Ok(Selection::Skip(SkipReason::NoModelRun {
                model: order.model_id.clone(),
            }));
        };
        let stamp = latest.stamp();
        match self.markers.check_and_advance(&order.order_id, &stamp)? {
            MarkerCheck::AlreadyProcessed { last } => {
                tracing::info!(order_id = %order.order_id, %last, "latest run already processed");
                return Ok(Selection::Skip(SkipReason::AlreadyProcessed {
                    run: latest.run.clone(),
                    stamp,
                }));
            }
            MarkerCheck::Created => {
                tracing::info!(order_id = %order.order_id, %stamp, "first run seen for order");
            }
            MarkerCheck::Advanced { previous } => {
                tracing::info!(order_id = %order.order_id, %previous, %stamp, "newer run available");
            }
        }
        if !order.wants_run(&latest.run) {
            return Ok(Selection::Skip(SkipReason::RunNotWanted {
                run: latest.run.clone(),
            }));
        }
        Ok(Selection::Runs(vec![latest.run.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::OutputLayout;

    fn order(runs: &[&str]) -> OrderSummary {
        OrderSummary {
            order_id: "o1".into(),
            name: None,
            model_id: "mo-global".into(),
            required_latest_runs: runs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn model_runs(run: &str, at: &str) -> HashMap<String, ModelRun> {
        let mut m = HashMap::new();
        m.insert(
            "mo-global".to_string(),
            ModelRun {
                model_id: "mo-global".into(),
                run: run.into(),
                run_date_time: at.into(),
            },
        );
        m
    }

    #[test]
    fn explicit_drops_runs_outside_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let markers = MarkerStore::new(OutputLayout::new(dir.path()));
        let mode = RunMode::Explicit(vec!["00".into(), "06".into(), "12".into()]);
        let none = HashMap::new();
        let sel = RunSelector::new(&mode, &none, &markers);
        assert_eq!(
            sel.select(&order(&["00", "12"])).unwrap(),
            Selection::Runs(vec!["00".into(), "12".into()])
        );
        assert_eq!(
            sel.select(&order(&["18"])).unwrap(),
            Selection::Skip(SkipReason::NoRunsSelected)
        );
    }

    #[test]
    fn latest_is_idempotent_per_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let markers = MarkerStore::new(OutputLayout::new(dir.path()));
        let runs = model_runs("06", "2026-10-18T06:00:00Z");
        let sel = RunSelector::new(&RunMode::Latest, &runs, &markers);
        let o = order(&["00", "06"]);
        assert_eq!(sel.select(&o).unwrap(), Selection::Runs(vec!["06".into()]));
        assert!(matches!(
            sel.select(&o).unwrap(),
            Selection::Skip(SkipReason::AlreadyProcessed { .. })
        ));
        assert_eq!(markers.read("o1").unwrap().as_deref(), Some("2026-10-18:06"));
    }

    #[test]
    fn latest_unwanted_run_still_advances_marker() {
        let dir = tempfile::tempdir().unwrap();
        let markers = MarkerStore::new(OutputLayout::new(dir.path()));
        let runs = model_runs("18", "2026-10-18T18:00:00Z");
        let sel = RunSelector::new(&RunMode::Latest, &runs, &markers);
        assert_eq!(
            sel.select(&order(&["00"])).unwrap(),
            Selection::Skip(SkipReason::RunNotWanted { run: "18".into() })
        );
        assert_eq!(markers.read("o1").unwrap().as_deref(), Some("2026-10-18:18"));
    }

    #[test]
    fn latest_without_model_run_skips() {
        let dir = tempfile::tempdir().unwrap();
        let markers = MarkerStore::new(OutputLayout::new(dir.path()));
        let none = HashMap::new();
        let sel = RunSelector::new(&RunMode::Latest, &none, &markers);
        assert_eq!(
            sel.select(&order(&["00"])).unwrap(),
            Selection::Skip(SkipReason::NoModelRun {
                model: "mo-global".into()
            })
        );
    }
}
