//! Merge validation runs into the stored findings table.

use std::collections::{BTreeSet, HashMap};

use nr_rules::{Finding, FindingStatus};

use crate::error::{SyncError, SyncResult};

/// Rows to upsert after a merge, with counts for the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerDelta {
    pub upserts: Vec<Finding>,
    pub opened: usize,
    pub reopened: usize,
    pub resolved: usize,
    pub unchanged: usize,
}

/// Fold a fresh validation run into the stored findings.
///
/// Findings are matched by id (the hash of their key). A known finding keeps
/// its first-detected time and an acknowledgement; a resolved one that shows
/// up again is reopened. Stored findings missing from the run are marked
/// resolved. Nothing is ever removed.
pub fn merge_findings(stored: &[Finding], fresh: &[Finding]) -> LedgerDelta {
    let known: HashMap<&str, &Finding> = stored.iter().map(|f| (f.id.as_str(), f)).collect();
    let seen: BTreeSet<&str> = fresh.iter().map(|f| f.id.as_str()).collect();
    let mut delta = LedgerDelta::default();

    for f in fresh {
        let Some(old) = known.get(f.id.as_str()) else {
            let mut new = f.clone();
            new.status = FindingStatus::Open;
            delta.upserts.push(new);
            delta.opened += 1;
            continue;
        };
        let status = match old.status {
            FindingStatus::Resolved => {
                delta.reopened += 1;
                FindingStatus::Open
            }
            other => other,
        };
        let merged = Finding {
            first_detected: old.first_detected,
            status,
            ..f.clone()
        };
        if merged == **old {
            delta.unchanged += 1;
        } else {
            delta.upserts.push(merged);
        }
    }

    for old in stored {
        if old.status != FindingStatus::Resolved && !seen.contains(old.id.as_str()) {
            let mut resolved = old.clone();
            resolved.status = FindingStatus::Resolved;
            delta.upserts.push(resolved);
            delta.resolved += 1;
        }
    }
    delta
}

/// Open -> Acknowledged. Acknowledging twice is a no-op; resolved findings
/// cannot be acknowledged.
pub fn acknowledge(finding: &Finding) -> SyncResult<Finding> {
    match finding.status {
        FindingStatus::Open | FindingStatus::Acknowledged => {
            let mut acked = finding.clone();
            acked.status = FindingStatus::Acknowledged;
            Ok(acked)
        }
        FindingStatus::Resolved => Err(SyncError::FindingState {
            id: finding.id.clone(),
            status: finding.status,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use nr_core::EntityId;
    use nr_rules::{FindingKey, FindingKind};

    fn finding(pipe: &str, deviation: f64) -> Finding {
        let key = FindingKey::new(FindingKind::UnconnectedEnd, [EntityId::from(pipe)])
            .with_qualifier("end");
        Finding::new(key, deviation, Utc::now())
    }

    #[test]
    fn new_findings_open_and_missing_ones_resolve() {
        let stored = vec![finding("P1", 0.5)];
        let fresh = vec![finding("P2", 0.2)];
        let delta = merge_findings(&stored, &fresh);
        assert_eq!(delta.opened, 1);
        assert_eq!(delta.resolved, 1);
        let p1 = delta.upserts.iter().find(|f| f.id == stored[0].id).unwrap();
        assert_eq!(p1.status, FindingStatus::Resolved);
    }

    #[test]
    fn rerun_keeps_first_detected_and_acknowledgement() {
        let mut old = finding("P1", 0.5);
        old.first_detected = Utc::now() - Duration::days(3);
        old.status = FindingStatus::Acknowledged;
        let mut fresh = finding("P1", 0.6);
        fresh.first_detected = Utc::now();

        let delta = merge_findings(std::slice::from_ref(&old), &[fresh]);
        assert_eq!(delta.upserts.len(), 1);
        let merged = &delta.upserts[0];
        assert_eq!(merged.first_detected, old.first_detected);
        assert_eq!(merged.status, FindingStatus::Acknowledged);
        assert_eq!(merged.deviation, 0.6);
    }

    #[test]
    fn identical_rerun_writes_nothing() {
        let old = finding("P1", 0.5);
        let delta = merge_findings(std::slice::from_ref(&old), std::slice::from_ref(&old));
        assert!(delta.upserts.is_empty());
        assert_eq!(delta.unchanged, 1);
    }

    #[test]
    fn resolved_finding_reopens() {
        let mut old = finding("P1", 0.5);
        old.status = FindingStatus::Resolved;
        let delta = merge_findings(std::slice::from_ref(&old), &[finding("P1", 0.5)]);
        assert_eq!(delta.reopened, 1);
        assert_eq!(delta.upserts[0].status, FindingStatus::Open);
    }

    #[test]
    fn acknowledge_transitions() {
        let f = finding("P1", 0.5);
        let acked = acknowledge(&f).unwrap();
        assert_eq!(acked.status, FindingStatus::Acknowledged);
        assert_eq!(acknowledge(&acked).unwrap(), acked);

        let mut resolved = f;
        resolved.status = FindingStatus::Resolved;
        assert!(matches!(
            acknowledge(&resolved),
            Err(SyncError::FindingState { .. })
        ));
    }
}
