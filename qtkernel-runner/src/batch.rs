//! Batch execution of independent runs.
//!
//! Every run owns its scratch state, so runs fan out across the rayon pool
//! with no shared mutable data. Sequential mode gives the same results in the
//! same order and is meant for debugging.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use qtkernel_core::strategy::{BandParams, BollConfig, Strategy};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::data_loader::{load_data, BarTable};
use crate::runner::{run, RunResult};

/// Run many configurations. Each distinct data file is loaded once.
///
/// Results keep the input order; a failed run does not stop the others.
pub fn run_batch(configs: &[RunConfig], parallel: bool) -> Vec<Result<RunResult>> {
    let mut tables: HashMap<PathBuf, Result<BarTable, String>> = HashMap::new();
    for config in configs {
        tables
            .entry(config.data.path.clone())
            .or_insert_with(|| load_data(&config.data).map_err(|e| e.to_string()));
    }

    let run_one = |config: &RunConfig| -> Result<RunResult> {
        let table = match tables.get(&config.data.path) {
            Some(Ok(table)) => table,
            Some(Err(msg)) => return Err(anyhow!("{}: {msg}", config.data.path.display())),
            None => return Err(anyhow!("no data loaded for {}", config.data.path.display())),
        };
        run(config, table).map_err(|e| {
            warn!(run = %config.label(), error = %e, "run failed");
            anyhow::Error::new(e)
        })
    };

    let results: Vec<Result<RunResult>> = if parallel {
        configs.par_iter().map(run_one).collect()
    } else {
        configs.iter().map(run_one).collect()
    };

    let failed = results.iter().filter(|r| r.is_err()).count();
    info!(runs = configs.len(), failed, parallel, "batch finished");
    results
}

/// Bollinger parameter grid. Every combination of the three axes is run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollGrid {
    pub windows: Vec<usize>,
    pub open_widths: Vec<f64>,
    #[serde(default = "default_close_widths")]
    pub close_widths: Vec<f64>,
}

fn default_close_widths() -> Vec<f64> {
    vec![0.0]
}

impl BollGrid {
    pub fn params(&self) -> Vec<BandParams> {
        let mut out =
            Vec::with_capacity(self.windows.len() * self.open_widths.len() * self.close_widths.len());
        for &w in &self.windows {
            for &open in &self.open_widths {
                for &close in &self.close_widths {
                    out.push(BandParams::new(w, open).with_close_width(close));
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.windows.len() * self.open_widths.len() * self.close_widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One grid point and its run.
#[derive(Debug, Clone)]
pub struct SweepPoint {
    pub params: BandParams,
    pub result: RunResult,
}

/// Run the boll generator over a parameter grid on one table.
///
/// When the base config already uses boll, its other settings (delay,
/// reversal, signal values, min periods) carry over to every grid point.
pub fn sweep_boll(
    base: &RunConfig,
    table: &BarTable,
    grid: &BollGrid,
    parallel: bool,
) -> Result<Vec<SweepPoint>> {
    let template = match &base.strategy.kind {
        Strategy::Boll(cfg) => cfg.clone(),
        _ => BollConfig::new(BandParams::new(1, 0.0)),
    };

    let run_point = |params: BandParams| -> Result<SweepPoint> {
        let mut config = base.clone();
        config.strategy.kind = Strategy::Boll(BollConfig {
            params,
            ..template.clone()
        });
        config.name = base
            .name
            .as_ref()
            .map(|n| format!("{n}_{}_{}_{}", params.window, params.open_width, params.close_width));
        let result = run(&config, table)?;
        Ok(SweepPoint { params, result })
    };

    let params = grid.params();
    let points = if parallel {
        params.into_par_iter().map(run_point).collect::<Result<Vec<_>>>()?
    } else {
        params.into_iter().map(run_point).collect::<Result<Vec<_>>>()?
    };
    info!(points = points.len(), "boll sweep finished");
    Ok(points)
}

/// Grid point with the highest final equity.
pub fn best_point(points: &[SweepPoint]) -> Option<&SweepPoint> {
    points
        .iter()
        .filter(|p| !p.result.final_equity.is_nan())
        .max_by(|a, b| a.result.final_equity.total_cmp(&b.result.final_equity))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
time,close
2024-01-02,10
2024-01-03,11
2024-01-04,12
2024-01-05,10
2024-01-06,11
2024-01-07,12
2024-01-08,10
2024-01-09,11
2024-01-10,12
2024-01-11,13
2024-01-12,14
2024-01-13,10
2024-01-14,7
2024-01-15,5
2024-01-16,4
2024-01-17,3
";

    fn config(data: &std::path::Path, window: usize) -> RunConfig {
        RunConfig::from_toml_str(&format!(
            r#"
            [data]
            path = "{}"

            [strategy]
            type = "boll"
            factor = "close"
            params = [{window}, 1.0]

            [equity]
            type = "future"
            open_column = "close"
            init_cash = 100000
            "#,
            data.display()
        ))
        .unwrap()
    }

    fn write_csv() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        std::fs::write(&path, CSV).unwrap();
        (dir, path)
    }

    #[test]
    fn parallel_matches_sequential() {
        let (_dir, path) = write_csv();
        let configs: Vec<RunConfig> = (2..8).map(|w| config(&path, w)).collect();
        let par = run_batch(&configs, true);
        let seq = run_batch(&configs, false);
        assert_eq!(par.len(), 6);
        for (p, s) in par.iter().zip(&seq) {
            let (p, s) = (p.as_ref().unwrap(), s.as_ref().unwrap());
            assert_eq!(p.run_id, s.run_id);
            assert_eq!(p.equity, s.equity);
        }
    }

    #[test]
    fn failed_run_does_not_stop_batch() {
        let (dir, path) = write_csv();
        let missing = config(&dir.path().join("missing.csv"), 4);
        let configs = vec![config(&path, 4), missing, config(&path, 5)];
        let results = run_batch(&configs, true);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn grid_expands_every_combination() {
        let grid = BollGrid {
            windows: vec![4, 8],
            open_widths: vec![1.0, 1.5, 2.0],
            close_widths: vec![0.0],
        };
        assert_eq!(grid.len(), 6);
        let params = grid.params();
        assert_eq!(params[0], BandParams::new(4, 1.0));
        assert_eq!(params[5], BandParams::new(8, 2.0));
    }

    #[test]
    fn sweep_keeps_grid_order_and_base_settings() {
        let (_dir, path) = write_csv();
        let mut base = config(&path, 4);
        if let Strategy::Boll(cfg) = &mut base.strategy.kind {
            cfg.delay_open = false;
        }
        let table = load_data(&base.data).unwrap();
        let grid = BollGrid {
            windows: vec![3, 4],
            open_widths: vec![1.0, 2.0],
            close_widths: vec![0.0],
        };
        let points = sweep_boll(&base, &table, &grid, true).unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[1].params, BandParams::new(3, 2.0));
        let direct = run(&base, &table).unwrap();
        assert_eq!(points[2].result.signal.len(), direct.signal.len());
        // window 4, width 1 is the base config itself
        assert_eq!(points[2].result.run_id, direct.run_id);
        assert!(best_point(&points).is_some());
    }
}
