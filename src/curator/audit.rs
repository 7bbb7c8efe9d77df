// Interop audit over the optional-dependency attribution map
//
// Surfaces optional dependencies that two or more *selected* mods would use.
// Informational only: nothing here is ever auto-installed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::models::AuditEntry;

/// One recommendation: an optional dependency shared by several selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub dependency_id: String,
    /// All attributed requesters, in attribution order
    pub requested_by: Vec<String>,
    /// How many of the requesters are in the current selection
    pub selected_requesters: usize,
}

/// Filter the audit map down to dependencies requested by at least two
/// selected mods. Ordered by selected-requester count descending, then id.
pub fn audit(
    optional_audit: &BTreeMap<String, AuditEntry>,
    selected: &BTreeSet<String>,
) -> Vec<AuditFinding> {
    let mut findings: Vec<AuditFinding> = optional_audit
        .values()
        .filter_map(|entry| {
            if entry.requested_by.len() < 2 {
                return None;
            }
            let selected_requesters = entry
                .requested_by
                .iter()
                .filter(|r| selected.contains(*r))
                .count();
            if selected_requesters < 2 {
                return None;
            }
            Some(AuditFinding {
                dependency_id: entry.dependency_id.clone(),
                requested_by: entry.requested_by.clone(),
                selected_requesters,
            })
        })
        .collect();

    findings.sort_by(|a, b| {
        b.selected_requesters
            .cmp(&a.selected_requesters)
            .then_with(|| a.dependency_id.cmp(&b.dependency_id))
    });
    findings
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn entry(dep: &str, requesters: &[&str]) -> (String, AuditEntry) {
        let mut e = AuditEntry::new(dep);
        for r in requesters {
            e.push_requester(r);
        }
        (dep.to_string(), e)
    }

    fn selected(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_dependency_shared_by_two_selected_mods() {
        let map: BTreeMap<String, AuditEntry> =
            [entry("modmenu", &["m1", "m2"])].into_iter().collect();

        let findings = audit(&map, &selected(&["m1", "m2"]));

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].dependency_id, "modmenu");
        assert_eq!(findings[0].selected_requesters, 2);
    }

    #[test]
    fn single_selected_requester_is_never_flagged() {
        let map: BTreeMap<String, AuditEntry> = [
            entry("modmenu", &["m1"]),
            // two requesters, but only one of them is selected
            entry("jade", &["m1", "m9"]),
        ]
        .into_iter()
        .collect();

        let findings = audit(&map, &selected(&["m1", "m2"]));

        assert!(findings.is_empty());
    }

    #[test]
    fn ordered_by_selected_requesters_then_id() {
        let map: BTreeMap<String, AuditEntry> = [
            entry("aaa", &["m1", "m2"]),
            entry("zzz", &["m1", "m2", "m3"]),
            entry("bbb", &["m1", "m2"]),
        ]
        .into_iter()
        .collect();

        let findings = audit(&map, &selected(&["m1", "m2", "m3"]));

        let ids: Vec<&str> = findings.iter().map(|f| f.dependency_id.as_str()).collect();
        assert_eq!(ids, vec!["zzz", "aaa", "bbb"]);
    }
}
