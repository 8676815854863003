// ⚖️ Reconciliation - one-way union of remote expenses into the local view
//
// `created_at_millis` is the join key: a remote expense is admitted only if
// no local expense carries the same value. Nothing local is ever removed
// because of its absence remotely, so merging the same snapshot twice gives
// the same result as merging it once.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::entities::{ledger_timestamps, Expense, Ledger, UserExpense};
use crate::remote::{Document, ExpenseDoc};

// ============================================================================
// REMOTE NORMALIZATION
// ============================================================================

/// A remote expense after filling in what partial documents leave out.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteExpense {
    /// Owner name, or owner id when the document carries no name
    pub owner: Option<String>,
    pub expense: Expense,
}

impl RemoteExpense {
    /// Missing type is `Variable`; missing date falls back to the server
    /// write time, then `now`. A missing timestamp falls back to the server
    /// write time, then to a key derived from the document id, so the same
    /// document always reconciles under the same key.
    pub fn from_doc(doc: ExpenseDoc, id: &str, now: DateTime<Utc>) -> Self {
        let date = doc
            .date
            .or_else(|| doc.created_at.map(|t| t.to_rfc3339()))
            .unwrap_or_else(|| now.to_rfc3339());
        let created_at_millis = doc
            .created_at_millis
            .or_else(|| doc.created_at.map(|t| t.timestamp_millis()))
            .unwrap_or_else(|| id_key(id));

        RemoteExpense {
            owner: doc.username.or(doc.uid),
            expense: Expense {
                description: doc.description,
                amount: doc.amount,
                category: doc.category,
                kind: doc.kind.unwrap_or_default(),
                date,
                created_at_millis,
            },
        }
    }
}

/// Stable stand-in timestamp for a document that carries none. Always
/// negative so it never collides with a real epoch-millisecond stamp.
pub fn id_key(id: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    -((u64::from_be_bytes(bytes) >> 1) as i64) - 1
}

/// Decode fetched documents, skipping any that are not expense-shaped.
pub fn decode_remote(docs: &[Document], now: DateTime<Utc>) -> Vec<RemoteExpense> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<ExpenseDoc>() {
            Ok(parsed) => Some(RemoteExpense::from_doc(parsed, &doc.id, now)),
            Err(e) => {
                tracing::debug!(id = %doc.id, error = %e, "skipping malformed remote expense");
                None
            }
        })
        .collect()
}

// ============================================================================
// MERGE
// ============================================================================

/// Combined view for reports.
///
/// Local expenses come first, users in ledger key order and each ledger in
/// stored order, followed by remote expenses whose timestamp appears nowhere
/// in the local ledger, in fetch order. Remote expenses without an owner are
/// attributed to `current_user`.
pub fn merge_remote(
    local: &Ledger,
    remote: &[RemoteExpense],
    current_user: Option<&str>,
) -> Vec<UserExpense> {
    let local_ts = ledger_timestamps(local);

    let mut merged: Vec<UserExpense> = local
        .iter()
        .flat_map(|(username, expenses)| {
            expenses.iter().map(move |e| UserExpense {
                username: username.clone(),
                expense: e.clone(),
            })
        })
        .collect();

    merged.extend(
        remote
            .iter()
            .filter(|r| !local_ts.contains(&r.expense.created_at_millis))
            .map(|r| UserExpense {
                username: r
                    .owner
                    .clone()
                    .or_else(|| current_user.map(str::to_string))
                    .unwrap_or_default(),
                expense: r.expense.clone(),
            }),
    );

    merged
}

/// Login-time resync: append to `username`'s ledger every remote expense
/// whose timestamp that ledger does not already hold. Returns how many were
/// admitted.
pub fn sync_into_ledger(ledger: &mut Ledger, remote: &[RemoteExpense], username: &str) -> usize {
    let entries = ledger.entry(username.to_string()).or_default();
    let mut seen: HashSet<i64> = entries.iter().map(|e| e.created_at_millis).collect();

    let mut admitted = 0;
    for r in remote {
        if seen.insert(r.expense.created_at_millis) {
            entries.push(r.expense.clone());
            admitted += 1;
        }
    }
    admitted
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ExpenseType;

    fn create_test_expense(amount: f64, category: &str, ts: i64) -> Expense {
        Expense {
            description: format!("Test expense: {}", category),
            amount,
            category: category.to_string(),
            kind: ExpenseType::Variable,
            date: "2025-01-15T09:30:00+00:00".to_string(),
            created_at_millis: ts,
        }
    }

    fn remote(owner: Option<&str>, amount: f64, ts: i64) -> RemoteExpense {
        RemoteExpense {
            owner: owner.map(str::to_string),
            expense: create_test_expense(amount, "Food", ts),
        }
    }

    fn sample_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.insert(
            "ana".to_string(),
            vec![
                create_test_expense(100.0, "Food", 1),
                create_test_expense(50.0, "Food", 2),
            ],
        );
        ledger.insert(
            "bob".to_string(),
            vec![create_test_expense(200.0, "Transport", 3)],
        );
        ledger
    }

    #[test]
    fn test_merge_keeps_local_first_then_new_remote() {
        let local = sample_ledger();
        let fetched = vec![
            remote(Some("bob"), 999.0, 3), // already local (bob)
            remote(Some("carla"), 10.0, 4),
            remote(Some("ana"), 999.0, 1), // already local (ana)
            remote(Some("ana"), 20.0, 5),
        ];

        let merged = merge_remote(&local, &fetched, Some("ana"));
        let ts: Vec<i64> = merged.iter().map(|e| e.expense.created_at_millis).collect();
        assert_eq!(ts, vec![1, 2, 3, 4, 5]);

        assert_eq!(merged[3].username, "carla");
        assert_eq!(merged[3].expense.amount, 10.0);

        // local copy wins over the remote one with the same timestamp
        assert_eq!(merged[2].expense.amount, 200.0);
    }

    #[test]
    fn test_merge_dedup_spans_all_local_users() {
        let local = sample_ledger();
        // remote copy of bob's expense attributed to ana must still be dropped
        let fetched = vec![remote(Some("ana"), 200.0, 3)];

        let merged = merge_remote(&local, &fetched, Some("ana"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let local = sample_ledger();
        let fetched = vec![remote(Some("ana"), 20.0, 5), remote(None, 30.0, 6)];

        let once = merge_remote(&local, &fetched, Some("ana"));

        // feed the merged view back in as the new local state
        let mut as_ledger = Ledger::new();
        for ue in &once {
            as_ledger
                .entry(ue.username.clone())
                .or_default()
                .push(ue.expense.clone());
        }
        let twice = merge_remote(&as_ledger, &fetched, Some("ana"));

        let mut a: Vec<i64> = once.iter().map(|e| e.expense.created_at_millis).collect();
        let mut b: Vec<i64> = twice.iter().map(|e| e.expense.created_at_millis).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);

        // and merging the same snapshot twice against the same local is stable
        assert_eq!(once, merge_remote(&local, &fetched, Some("ana")));
    }

    #[test]
    fn test_merge_attributes_ownerless_remote_to_current_user() {
        let merged = merge_remote(&Ledger::new(), &[remote(None, 5.0, 9)], Some("ana"));
        assert_eq!(merged[0].username, "ana");

        let merged = merge_remote(&Ledger::new(), &[remote(None, 5.0, 9)], None);
        assert_eq!(merged[0].username, "");
    }

    #[test]
    fn test_merge_never_drops_local() {
        let local = sample_ledger();
        let merged = merge_remote(&local, &[], None);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_sync_into_ledger_only_checks_target_user() {
        let mut ledger = sample_ledger();
        let fetched = vec![
            remote(Some("ana"), 100.0, 1), // already in ana's ledger
            remote(Some("ana"), 70.0, 8),
            remote(Some("ana"), 70.0, 8), // duplicate inside the snapshot
        ];

        let admitted = sync_into_ledger(&mut ledger, &fetched, "ana");
        assert_eq!(admitted, 1);
        assert_eq!(ledger["ana"].len(), 3);
        assert_eq!(ledger["bob"].len(), 1);

        // second run admits nothing
        assert_eq!(sync_into_ledger(&mut ledger, &fetched, "ana"), 0);
    }

    #[test]
    fn test_sync_creates_missing_ledger() {
        let mut ledger = Ledger::new();
        let admitted = sync_into_ledger(&mut ledger, &[remote(None, 1.0, 1)], "new");
        assert_eq!(admitted, 1);
        assert_eq!(ledger["new"].len(), 1);
    }

    #[test]
    fn test_from_doc_fills_defaults() {
        let now = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let written = DateTime::parse_from_rfc3339("2025-05-20T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let doc = ExpenseDoc {
            uid: Some("u-1".into()),
            description: "Gas".into(),
            amount: 30000.0,
            category: "Transport".into(),
            created_at: Some(written),
            ..Default::default()
        };
        let r = RemoteExpense::from_doc(doc, "doc-1", now);

        assert_eq!(r.owner.as_deref(), Some("u-1"));
        assert_eq!(r.expense.kind, ExpenseType::Variable);
        assert_eq!(r.expense.date, written.to_rfc3339());
        assert_eq!(r.expense.created_at_millis, written.timestamp_millis());

        let bare = RemoteExpense::from_doc(ExpenseDoc::default(), "doc-2", now);
        assert_eq!(bare.expense.date, now.to_rfc3339());
        assert_eq!(bare.expense.created_at_millis, id_key("doc-2"));
        assert_eq!(bare.owner, None);
    }

    #[test]
    fn test_untimestamped_docs_get_stable_distinct_keys() {
        let docs: Vec<Document> = ["a", "b"]
            .iter()
            .map(|id| Document {
                id: id.to_string(),
                data: serde_json::json!({"description": "no stamp", "amount": 1}),
            })
            .collect();

        let first = decode_remote(&docs, Utc::now());
        let later = decode_remote(&docs, Utc::now() + chrono::Duration::seconds(5));

        assert_ne!(first[0].expense.created_at_millis, first[1].expense.created_at_millis);
        assert_eq!(first[0].expense.created_at_millis, later[0].expense.created_at_millis);
        assert!(id_key("a") < 0 && id_key("b") < 0);

        // both admitted once, nothing on a second pass
        let mut ledger = Ledger::new();
        assert_eq!(sync_into_ledger(&mut ledger, &first, "ana"), 2);
        assert_eq!(sync_into_ledger(&mut ledger, &later, "ana"), 0);
    }

    #[test]
    fn test_decode_remote_skips_malformed() {
        let now = Utc::now();
        let docs = vec![
            Document {
                id: "a".into(),
                data: serde_json::json!({"description": "ok", "amount": 1, "createdAtMillis": 1}),
            },
            Document {
                id: "b".into(),
                data: serde_json::json!({"amount": "not a number"}),
            },
        ];
        let decoded = decode_remote(&docs, now);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].expense.description, "ok");
    }
}
