//! Duplicate suppression.
//!
//! Two phases, both keyed on article identity (link *or* title):
//!
//! 1. [`dedup_batch`] collapses repeats inside the freshly listed batch,
//!    keeping the first occurrence in input order.
//! 2. [`suppress_existing`] drops anything already in the persisted store.
//!
//! Both run in one linear pass and keep the input order of survivors.

use crate::models::{CandidateArticle, ExistingKeys};
use crate::utils::truncate_for_log;
use std::collections::HashSet;
use tracing::{debug, info};

/// Counts reported by a dedup phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub input: usize,
    pub duplicates: usize,
    pub survivors: usize,
}

impl DedupReport {
    fn new(input: usize, survivors: usize) -> Self {
        Self {
            input,
            duplicates: input - survivors,
            survivors,
        }
    }
}

/// Keep the first candidate for every link and every title.
///
/// A candidate is dropped if its link *or* its title was already taken by
/// an earlier survivor.
pub fn dedup_batch(candidates: Vec<CandidateArticle>) -> (Vec<CandidateArticle>, DedupReport) {
    let input = candidates.len();
    let mut links: HashSet<String> = HashSet::with_capacity(input);
    let mut titles: HashSet<String> = HashSet::with_capacity(input);
    let mut kept = Vec::with_capacity(input);

    for candidate in candidates {
        if links.contains(&candidate.link) || titles.contains(&candidate.title) {
            debug!(title = %truncate_for_log(&candidate.title, 50), "Dropped in-batch duplicate");
            continue;
        }
        links.insert(candidate.link.clone());
        titles.insert(candidate.title.clone());
        kept.push(candidate);
    }

    let report = DedupReport::new(input, kept.len());
    info!(
        input = report.input,
        duplicates = report.duplicates,
        survivors = report.survivors,
        "In-batch dedup complete"
    );
    (kept, report)
}

/// Drop candidates whose link or title is already stored.
pub fn suppress_existing(
    candidates: Vec<CandidateArticle>,
    existing: &ExistingKeys,
) -> (Vec<CandidateArticle>, DedupReport) {
    let input = candidates.len();
    let kept: Vec<CandidateArticle> = candidates
        .into_iter()
        .filter(|candidate| {
            let stored = existing.contains(candidate);
            if stored {
                debug!(title = %truncate_for_log(&candidate.title, 50), "Already in store");
            }
            !stored
        })
        .collect();

    let report = DedupReport::new(input, kept.len());
    info!(
        input = report.input,
        duplicates = report.duplicates,
        survivors = report.survivors,
        "Store dedup complete"
    );
    (kept, report)
}
