// Command handlers
use crate::application::migration::MigrationReport;
use crate::infrastructure::canonical_json;
use crate::presentation::app_state::AppState;
use crate::presentation::cli::MigrateArgs;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// What happened to one dashboard document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    #[serde(flatten)]
    pub report: MigrationReport,
    pub completed_panels: usize,
}

/// Migrates one stored document and returns its canonical encoding.
pub async fn migrate_document(
    state: &AppState,
    raw: &Value,
    target: i64,
    complete_plugins: bool,
) -> anyhow::Result<(String, DocumentOutcome)> {
    let (mut dashboard, report) = state.migrator.load_to(raw, target);
    let completed_panels = if complete_plugins {
        state.plugin_migrations.complete_pending(&mut dashboard).await
    } else {
        0
    };
    let encoded = canonical_json::to_string(&dashboard.save_model(), state.output.pretty)?;
    Ok((encoded, DocumentOutcome { report, completed_panels }))
}

async fn migrate_file(state: &AppState, path: &Path, args: &MigrateArgs) -> anyhow::Result<DocumentOutcome> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?;

    let target = args.target.unwrap_or(state.target_version);
    let (encoded, outcome) = migrate_document(state, &raw, target, args.complete_plugins).await?;

    match &args.out {
        Some(dir) => {
            let destination = output_path(dir, path)?;
            tokio::fs::write(&destination, encoded)
                .await
                .with_context(|| format!("failed to write {}", destination.display()))?;
        }
        None => println!("{}", encoded),
    }
    Ok(outcome)
}

fn output_path(dir: &Path, source: &Path) -> anyhow::Result<PathBuf> {
    let name = source
        .file_name()
        .with_context(|| format!("{} has no file name", source.display()))?;
    Ok(dir.join(name))
}

/// Migrates every file named on the command line. A failing file is logged and the
/// remaining files are still processed.
pub async fn migrate_files(state: &AppState, args: &MigrateArgs) -> anyhow::Result<Vec<DocumentOutcome>> {
    if let Some(dir) = &args.out {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut outcomes = Vec::new();
    let mut failures = 0;
    for path in &args.files {
        match migrate_file(state, path, args).await {
            Ok(outcome) => {
                info!(
                    file = %path.display(),
                    from = outcome.report.from_version,
                    to = outcome.report.to_version,
                    steps = outcome.report.applied.len(),
                    completed_panels = outcome.completed_panels,
                    "migrated"
                );
                outcomes.push(outcome);
            }
            Err(e) => {
                error!(file = %path.display(), error = ?e, "migration failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} files failed to migrate", failures, args.files.len());
    }
    Ok(outcomes)
}
