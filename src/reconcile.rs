use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::db::PetitionRecord;
use crate::parser::detail::PetitionDetail;
use crate::parser::listing::PetitionSummary;
use crate::parser::{format_store_date, format_store_datetime};

/// What to do when the index page and the petition page disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePolicy {
    /// Note the disagreement at debug level and keep the detail values.
    #[default]
    Tolerant,
    Strict,
}

impl ReconcilePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ReconcilePolicy::Strict
        } else {
            ReconcilePolicy::Tolerant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub field: &'static str,
    pub listing: String,
    pub detail: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: listing {:?} vs detail {:?}", self.field, self.listing, self.detail)
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("petition {reference_id}: listing and detail pages disagree ({})", join(.mismatches))]
    Mismatch {
        reference_id: String,
        mismatches: Vec<Mismatch>,
    },
}

fn join(mismatches: &[Mismatch]) -> String {
    mismatches.iter().map(|m| m.to_string()).collect::<Vec<_>>().join("; ")
}

/// Fields where the two views differ. The listing principal only has to appear
/// somewhere in the detail principal, which usually carries a suburb as well.
pub fn mismatches(summary: &PetitionSummary, detail: &PetitionDetail) -> Vec<Mismatch> {
    let mut out = Vec::new();
    let mut check = |field: &'static str, from_listing: String, from_detail: String| {
        if from_listing != from_detail {
            out.push(Mismatch {
                field,
                listing: from_listing,
                detail: from_detail,
            });
        }
    };
    check("reference_id", summary.reference_id.clone(), detail.reference_id.clone());
    check("title", summary.title.clone(), detail.title.clone());
    check("url", summary.url.clone(), detail.url.clone());
    check("closed_at", summary.closed_at.to_string(), detail.closed_at.to_string());

    if !detail.principal.contains(&summary.principal) {
        out.push(Mismatch {
            field: "principal",
            listing: summary.principal.clone(),
            detail: detail.principal.clone(),
        });
    }
    out
}

/// Build the stored row. Detail values always win.
pub fn reconcile(
    summary: &PetitionSummary,
    detail: PetitionDetail,
    policy: ReconcilePolicy,
) -> Result<PetitionRecord, ReconcileError> {
    let found = mismatches(summary, &detail);
    if !found.is_empty() {
        match policy {
            ReconcilePolicy::Tolerant => {
                for m in &found {
                    debug!(reference_id = %detail.reference_id, "ignoring mismatch {}", m);
                }
            }
            ReconcilePolicy::Strict => {
                return Err(ReconcileError::Mismatch {
                    reference_id: detail.reference_id,
                    mismatches: found,
                });
            }
        }
    }

    Ok(PetitionRecord {
        retrieved_at: format_store_datetime(&detail.retrieved_at),
        closed_at: format_store_date(&detail.closed_at),
        url: detail.url,
        sign_uri: detail.sign_uri,
        reference_id: detail.reference_id,
        title: detail.title,
        principal: detail.principal,
        body: detail.body,
        signatures: detail.signatures,
    })
}
