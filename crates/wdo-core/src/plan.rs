//! Turn an order manifest plus selected runs into per-run download tasks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::pool::{DownloadTask, OrderLog};

/// File ids embed their run as `_+<run>`.
pub const RUN_TOKEN_PREFIX: &str = "_+";

/// File ids longer than this get a generated local name.
pub const MAX_FILE_ID_NAME_LEN: usize = 100;

pub const FILE_EXTENSION: &str = "grib2";

/// File ids belonging to `run`, in manifest order, capped at `cap` (0 = all).
pub fn files_for_run<'a>(file_ids: &[&'a str], run: &str, cap: usize) -> Vec<&'a str> {
    let token = format!("{}{}", RUN_TOKEN_PREFIX, run);
    let matching = file_ids.iter().copied().filter(|id| id.contains(&token));
    if cap == 0 {
        matching.collect()
    } else {
        matching.take(cap).collect()
    }
}

/// `<downloaded>/<order>_<run>`, or `<downloaded>/<YYYYMMDDhhmm>_<run>/<order>_<run>`
/// when dated.
pub fn run_folder(
    downloaded: &Path,
    order_id: &str,
    run: &str,
    dated: Option<DateTime<Local>>,
) -> PathBuf {
    let leaf = format!("{}_{}", order_id, run);
    match dated {
        Some(at) => downloaded
            .join(format!("{}_{}", at.format("%Y%m%d%H%M"), run))
            .join(leaf),
        None => downloaded.join(leaf),
    }
}

pub fn local_file_name(file_id: &str, guid: bool) -> String {
    if guid || file_id.len() > MAX_FILE_ID_NAME_LEN {
        format!("{}.{}", uuid::Uuid::new_v4(), FILE_EXTENSION)
    } else {
        format!("{}.{}", file_id, FILE_EXTENSION)
    }
}

/// Files of one run and where they go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub run: String,
    pub folder: PathBuf,
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    pub order_id: String,
    pub runs: Vec<RunPlan>,
}

impl OrderPlan {
    pub fn build(
        order_id: &str,
        file_ids: &[&str],
        runs: &[String],
        cap: usize,
        downloaded: &Path,
        dated: Option<DateTime<Local>>,
    ) -> Self {
        let runs = runs
            .iter()
            .map(|run| RunPlan {
                run: run.clone(),
                folder: run_folder(downloaded, order_id, run, dated),
                file_ids: files_for_run(file_ids, run, cap)
                    .into_iter()
                    .map(String::from)
                    .collect(),
            })
            .collect();
        Self {
            order_id: order_id.to_string(),
            runs,
        }
    }

    pub fn file_count(&self) -> usize {
        self.runs.iter().map(|r| r.file_ids.len()).sum()
    }

    /// Create the folder of every run that has files.
    pub fn create_folders(&self) -> io::Result<()> {
        for run in self.runs.iter().filter(|r| !r.file_ids.is_empty()) {
            fs::create_dir_all(&run.folder)?;
        }
        Ok(())
    }

    pub fn tasks(&self, log: &Arc<OrderLog>, guid: bool) -> Vec<DownloadTask> {
        self.runs
            .iter()
            .flat_map(|run| {
                run.file_ids.iter().map(move |file_id| DownloadTask {
                    order_id: self.order_id.clone(),
                    file_id: file_id.clone(),
                    folder: run.folder.clone(),
                    file_name: local_file_name(file_id, guid),
                    log: Arc::clone(log),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const IDS: [&str; 5] = [
        "agl_temperature_+00",
        "agl_temperature_+06",
        "mslp_+00",
        "mslp_+12",
        "rain_+00",
    ];

    fn runs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_by_run_token_in_manifest_order() {
        assert_eq!(
            files_for_run(&IDS, "00", 0),
            vec!["agl_temperature_+00", "mslp_+00", "rain_+00"]
        );
        assert_eq!(files_for_run(&IDS, "12", 0), vec!["mslp_+12"]);
        assert!(files_for_run(&IDS, "18", 0).is_empty());
    }

    #[test]
    fn cap_limits_files_per_run() {
        assert_eq!(files_for_run(&IDS, "00", 2).len(), 2);
    }

    #[test]
    fn folder_with_and_without_dating() {
        let dl = Path::new("/r/downloaded");
        assert_eq!(
            run_folder(dl, "o1", "06", None),
            PathBuf::from("/r/downloaded/o1_06")
        );
        let at = Local.with_ymd_and_hms(2026, 10, 18, 9, 5, 0).unwrap();
        assert_eq!(
            run_folder(dl, "o1", "06", Some(at)),
            PathBuf::from("/r/downloaded/202610180905_06/o1_06")
        );
    }

    #[test]
    fn long_ids_get_generated_names() {
        assert_eq!(local_file_name("mslp_+00", false), "mslp_+00.grib2");
        let long = "x".repeat(MAX_FILE_ID_NAME_LEN + 1);
        let name = local_file_name(&long, false);
        assert_eq!(name.len(), 36 + ".grib2".len());
        assert_ne!(local_file_name("mslp_+00", true), "mslp_+00.grib2");
    }

    #[test]
    fn tasks_follow_plan() {
        let plan = OrderPlan::build("o1", &IDS, &runs(&["00", "06"]), 0, Path::new("/r/dl"), None);
        assert_eq!(plan.file_count(), 4);
        let log = Arc::new(OrderLog::default());
        let tasks = plan.tasks(&log, false);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[3].file_id, "agl_temperature_+06");
        assert_eq!(
            tasks[3].dest_path(),
            PathBuf::from("/r/dl/o1_06/agl_temperature_+06.grib2")
        );
    }

    #[test]
    fn create_folders_skips_empty_runs() {
        let dir = tempfile::tempdir().unwrap();
        let plan = OrderPlan::build("o1", &IDS, &runs(&["12", "18"]), 0, dir.path(), None);
        plan.create_folders().unwrap();
        assert!(dir.path().join("o1_12").is_dir());
        assert!(!dir.path().join("o1_18").exists());
    }
}
