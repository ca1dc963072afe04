use crate::types::ResultRecord;

use super::DefaultCounts;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CrossSourceOutcome {
    /// Knowledge-center positions flagged as duplicates, in flagging order.
    marked: Vec<usize>,
    /// Flagged positions before the interleave cutoff: entries the page
    /// would have shown that must now be replaced from further down.
    pub extra_consumed: usize,
}

impl CrossSourceOutcome {
    pub fn found(&self) -> usize {
        self.marked.len()
    }
}

/// Knowledge-center entries the interleaved page consumes: its own per-page
/// allotment plus any shortfall when esqs returned fewer than its allotment.
pub fn interleave_count(esqs_len: usize, defaults: DefaultCounts) -> usize {
    defaults.esqs.saturating_sub(esqs_len) + defaults.knowledge_center
}

/// For each supplemental esqs entry, flags the first unflagged knowledge-center
/// entry with the same title and description. Flags the knowledge-center
/// entries arrived with are cleared first.
pub fn suppress_cross_source(
    sm_slice: &[ResultRecord],
    kc_results: &mut [ResultRecord],
    interleave: usize,
) -> CrossSourceOutcome {
    for kc in kc_results.iter_mut() {
        kc.is_duplicate = false;
    }
    let mut marked = Vec::new();
    for sm in sm_slice {
        if let Some(i) = kc_results
            .iter()
            .position(|kc| !kc.is_duplicate && kc.identity() == sm.identity())
        {
            kc_results[i].is_duplicate = true;
            marked.push(i);
        }
    }

    let cutoff = interleave_cutoff(kc_results, interleave);
    let extra_consumed = marked.iter().filter(|&&i| i < cutoff).count();
    CrossSourceOutcome {
        marked,
        extra_consumed,
    }
}

/// Index of the unflagged entry that completes the interleave count, or the
/// full length when there are not enough unflagged entries.
fn interleave_cutoff(kc_results: &[ResultRecord], interleave: usize) -> usize {
    if interleave == 0 {
        return 0;
    }
    let mut kept = 0;
    for (i, kc) in kc_results.iter().enumerate() {
        if !kc.is_duplicate {
            kept += 1;
            if kept == interleave {
                return i;
            }
        }
    }
    kc_results.len()
}
