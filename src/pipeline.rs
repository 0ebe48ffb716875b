use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::{DedupStore, Outcome};
use crate::fetch::{PageFetcher, Transport};
use crate::parser::listing::PetitionSummary;
use crate::parser::{detail, listing, ExtractError};
use crate::reconcile::{self, ReconcileError, ReconcilePolicy};
use crate::settings::{Settings, UrlTemplates};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("detail page for petition {reference_id} unavailable ({url})")]
    DetailUnavailable { reference_id: String, url: String },
}

/// Problems with one petition's page, as opposed to storage or network faults.
fn is_page_failure(e: &anyhow::Error) -> bool {
    e.is::<HarvestError>() || e.is::<ExtractError>() || e.is::<ReconcileError>()
}

/// Counts returned after a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.added + self.skipped
    }
}

/// One harvest pass: listing, then each petition in turn. Owns the store; the
/// connection closes when the harvester drops, whether or not the run succeeded.
pub struct Harvester<T: Transport> {
    list_url: String,
    urls: UrlTemplates,
    policy: ReconcilePolicy,
    skip_failed_items: bool,
    fetcher: PageFetcher<T>,
    store: DedupStore,
    quiet: bool,
}

impl<T: Transport> Harvester<T> {
    pub fn new(settings: &Settings, fetcher: PageFetcher<T>, store: DedupStore) -> Self {
        Harvester {
            list_url: settings.list_url.clone(),
            urls: settings.urls(),
            policy: ReconcilePolicy::from_strict(settings.strict_reconciliation),
            skip_failed_items: settings.skip_failed_items,
            fetcher,
            store,
            quiet: false,
        }
    }

    /// Suppress the progress bar and per-item lines.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn run(&self, now: NaiveDateTime) -> Result<RunReport> {
        self.say("Reading petition list");
        let list_doc = self.fetcher.fetch(&self.list_url)?;
        if list_doc.is_none() {
            warn!("Petition list unavailable at {}", self.list_url);
        }
        let items = listing::extract(list_doc.as_ref(), &self.urls).context("Failed to read petition list")?;
        info!("Found {} petitions", items.len());

        let pb = self.progress_bar(items.len());
        self.say(&format!("Reading {} petitions", items.len()));

        let mut report = RunReport::default();
        for item in &items {
            match self.harvest_one(item, now) {
                Ok((Outcome::Inserted, title)) => {
                    report.added += 1;
                    self.line(&pb, &format!("Adding {} - \"{}\"", item.reference_id, title))?;
                }
                Ok((Outcome::Skipped, title)) => {
                    report.skipped += 1;
                    self.line(&pb, &format!("Already exists {} - \"{}\"", item.reference_id, title))?;
                }
                Err(e) if self.skip_failed_items && is_page_failure(&e) => {
                    report.failed += 1;
                    warn!("Skipping petition {}: {:#}", item.reference_id, e);
                }
                Err(e) => {
                    pb.finish_and_clear();
                    return Err(e.context(format!("Petition {} failed", item.reference_id)));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        self.say(&format!(
            "Added {}, skipped {}, total {}",
            report.added,
            report.skipped,
            report.total()
        ));
        if report.failed > 0 {
            self.say(&format!("Failed {}", report.failed));
        }
        self.say("Completed successfully.");
        Ok(report)
    }

    /// Fetch, extract, reconcile and store a single petition; committed on return.
    fn harvest_one(&self, item: &PetitionSummary, now: NaiveDateTime) -> Result<(Outcome, String)> {
        let url = self.urls.item_url(&item.reference_id);
        let doc = self
            .fetcher
            .fetch(&url)?
            .ok_or_else(|| HarvestError::DetailUnavailable {
                reference_id: item.reference_id.clone(),
                url: url.clone(),
            })?;

        let detail = detail::extract(&item.reference_id, &url, now, &doc, &self.urls)?;
        let record = reconcile::reconcile(item, detail, self.policy)?;
        let outcome = self.store.record_if_new(&record)?;
        Ok((outcome, record.title))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }

    fn say(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    fn line(&self, pb: &ProgressBar, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        print_above(pb, msg, &mut io::stdout().lock())
    }
}

/// Write a line to `out` with the bar out of the way. A bar drawn to a non-terminal
/// is hidden, and the line still has to appear.
fn print_above(pb: &ProgressBar, msg: &str, out: &mut impl Write) -> io::Result<()> {
    if pb.is_hidden() {
        writeln!(out, "{}", msg)
    } else {
        pb.suspend(|| writeln!(out, "{}", msg))
    }
}
