use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use shared::domain::{CollectionView, Row};

const INPUT_KINDS: [&str; 4] = ["CSV upload", "Sensor batch", "Survey export", "Form submission"];
const ARTIFACT_KINDS: [&str; 4] = ["Report", "Model snapshot", "Chart bundle", "Data extract"];
const JOB_KINDS: [&str; 4] = ["Render", "Train", "Export", "Validate"];
const ACTIVITY_KINDS: [&str; 6] = [
    "Signed in",
    "Viewed artifact",
    "Uploaded input",
    "Downloaded output",
    "Started job",
    "Changed password",
];
const PROFILE_SETTINGS: [&str; 8] = [
    "Email notifications",
    "Two-factor authentication",
    "Dark mode",
    "Weekly digest",
    "API access",
    "Compact tables",
    "Job failure alerts",
    "Share usage data",
];

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DatasetConfig {
    pub seed: u64,
    pub rows_per_collection: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            rows_per_collection: 100,
        }
    }
}

/// Generated rows for every collection, newest first.
#[derive(Debug, Clone)]
pub struct CollectionCatalog {
    collections: HashMap<CollectionView, Vec<Row>>,
}

impl CollectionCatalog {
    pub fn generate(config: DatasetConfig) -> Self {
        Self::generate_at(config, Utc::now())
    }

    pub fn generate_at(config: DatasetConfig, now: DateTime<Utc>) -> Self {
        let collections = CollectionView::ALL
            .into_iter()
            .enumerate()
            .map(|(index, view)| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(index as u64));
                let rows = generate_rows(view, config.rows_per_collection, now, &mut rng);
                (view, rows)
            })
            .collect();
        Self { collections }
    }

    pub fn rows(&self, view: CollectionView) -> &[Row] {
        self.collections
            .get(&view)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn generate_rows(
    view: CollectionView,
    count: usize,
    now: DateTime<Utc>,
    rng: &mut StdRng,
) -> Vec<Row> {
    let mut created_at = now;
    (0..count)
        .map(|i| {
            created_at -= Duration::minutes(rng.gen_range(1..240));
            let id = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
            let (name, status) = describe(view, i, rng);
            Row::new(id.to_string())
                .with_field("name", name)
                .with_field("status", status)
                .with_field(
                    "createdAt",
                    created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                )
        })
        .collect()
}

fn describe(view: CollectionView, i: usize, rng: &mut StdRng) -> (String, &'static str) {
    let n = i + 1;
    match view {
        CollectionView::Input => (
            format!("{} {n}", INPUT_KINDS[rng.gen_range(0..INPUT_KINDS.len())]),
            active_or_inactive(rng),
        ),
        CollectionView::ArtifactOutput => (
            format!("{} {n}", ARTIFACT_KINDS[rng.gen_range(0..ARTIFACT_KINDS.len())]),
            active_or_inactive(rng),
        ),
        CollectionView::ArtifactJobs => {
            let status = match rng.gen_range(0..10) {
                0 => "Queued",
                1 | 2 => "Running",
                3 => "Failed",
                _ => "Succeeded",
            };
            (
                format!("{} job {n}", JOB_KINDS[rng.gen_range(0..JOB_KINDS.len())]),
                status,
            )
        }
        CollectionView::UserActivity => (
            ACTIVITY_KINDS[rng.gen_range(0..ACTIVITY_KINDS.len())].to_string(),
            if rng.gen_bool(0.9) { "Success" } else { "Denied" },
        ),
        CollectionView::Profile => {
            let setting = PROFILE_SETTINGS[i % PROFILE_SETTINGS.len()];
            let name = if i < PROFILE_SETTINGS.len() {
                setting.to_string()
            } else {
                format!("{setting} #{}", i / PROFILE_SETTINGS.len() + 1)
            };
            (name, if rng.gen_bool(0.5) { "Enabled" } else { "Disabled" })
        }
    }
}

fn active_or_inactive(rng: &mut StdRng) -> &'static str {
    if rng.gen_bool(0.5) {
        "Active"
    } else {
        "Inactive"
    }
}
