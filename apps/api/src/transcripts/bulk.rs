//! Bulk transcript operations: delete, markPrivate, relinquish.
//!
//! The whole batch is rejected if any record belongs to another user. After
//! that each id is processed on its own; there is no cross-record transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::transcript::TranscriptRow;
use crate::state::AppState;
use crate::teams;
use crate::transcripts::store;

pub const MAX_BULK_IDS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkAction {
    Delete,
    MarkPrivate,
    Relinquish,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub action: BulkAction,
    pub meeting_ids: Vec<String>,
    #[serde(default)]
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub success: Vec<String>,
    pub failed: Vec<BulkFailure>,
}

/// Side effects of each bulk action. Backed by Postgres + S3 in production.
#[async_trait]
pub trait BulkExecutor: Send + Sync {
    async fn delete(&self, row: &TranscriptRow) -> anyhow::Result<()>;
    async fn mark_private(&self, row: &TranscriptRow) -> anyhow::Result<()>;
    async fn relinquish(&self, row: &TranscriptRow, team_id: &str, members: &[String]) -> anyhow::Result<()>;
}

pub struct StoreExecutor<'a> {
    pub state: &'a AppState,
    pub requester: &'a str,
}

#[async_trait]
impl BulkExecutor for StoreExecutor<'_> {
    async fn delete(&self, row: &TranscriptRow) -> anyhow::Result<()> {
        delete_with_side_effects(self.state, row).await
    }

    async fn mark_private(&self, row: &TranscriptRow) -> anyhow::Result<()> {
        store::mark_private(&self.state.db, &row.meeting_id).await
    }

    async fn relinquish(&self, row: &TranscriptRow, team_id: &str, members: &[String]) -> anyhow::Result<()> {
        store::relinquish(&self.state.db, &row.meeting_id, self.requester, team_id, members).await
    }
}

/// Storage steps of a transcript delete.
#[async_trait]
pub trait DeleteSteps: Send + Sync {
    async fn delete_row(&self, meeting_id: &str) -> anyhow::Result<()>;
    async fn delete_blob(&self, s3_key: &str) -> anyhow::Result<()>;
    async fn delete_vectors(&self, meeting_id: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl DeleteSteps for AppState {
    async fn delete_row(&self, meeting_id: &str) -> anyhow::Result<()> {
        store::delete(&self.db, meeting_id).await?;
        Ok(())
    }

    async fn delete_blob(&self, s3_key: &str) -> anyhow::Result<()> {
        self.blobs.delete(s3_key).await
    }

    async fn delete_vectors(&self, meeting_id: &str) -> anyhow::Result<()> {
        crate::search::vectors::delete_for_meeting(&self.db, meeting_id).await?;
        Ok(())
    }
}

/// Deletes the index row, then best-effort removes the blob and vector chunks.
/// A failed row delete leaves the blob in place.
pub async fn delete_with_side_effects(
    steps: &dyn DeleteSteps,
    row: &TranscriptRow,
) -> anyhow::Result<()> {
    steps.delete_row(&row.meeting_id).await?;
    if let Err(e) = steps.delete_blob(&row.s3_key).await {
        warn!("Blob cleanup failed for {}: {e}", row.meeting_id);
    }
    if let Err(e) = steps.delete_vectors(&row.meeting_id).await {
        warn!("Vector cleanup failed for {}: {e}", row.meeting_id);
    }
    Ok(())
}

/// Owners may act on their records. A record without an owner belongs to a
/// team and only the members it is shared with may act on it.
pub fn can_modify(row: &TranscriptRow, requester: &str) -> bool {
    match &row.user_id {
        Some(owner) => owner == requester,
        None => row.is_visible_to(requester),
    }
}

pub fn validate_ids(ids: &[String]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation("meetingIds must not be empty".into()));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(AppError::Validation(format!(
            "At most {MAX_BULK_IDS} meetings can be processed at once"
        )));
    }
    Ok(())
}

/// Gate for single-record actions. Team records the requester is not part of
/// are reported as missing.
pub fn check_single(row: &TranscriptRow, requester: &str) -> Result<(), AppError> {
    if can_modify(row, requester) {
        return Ok(());
    }
    match row.user_id {
        None => Err(AppError::NotFound(format!("Transcript {} not found", row.meeting_id))),
        Some(_) => Err(AppError::Forbidden("You do not own this meeting".into())),
    }
}

/// Ids of fetched records `requester` may not act on, in request order.
pub fn unauthorized_ids(
    ids: &[String],
    records: &HashMap<String, TranscriptRow>,
    requester: &str,
) -> Vec<String> {
    let mut out: Vec<String> = ids
        .iter()
        .filter(|id| records.get(*id).is_some_and(|r| !can_modify(r, requester)))
        .cloned()
        .collect();
    out.dedup();
    out
}

/// Applies `action` to each id independently. `records` must already be
/// ownership-checked.
pub async fn apply(
    executor: &dyn BulkExecutor,
    action: BulkAction,
    ids: &[String],
    records: &HashMap<String, TranscriptRow>,
    team: Option<(&str, &[String])>,
) -> BulkResult {
    let mut result = BulkResult::default();

    for id in ids {
        let Some(row) = records.get(id) else {
            result.failed.push(BulkFailure {
                id: id.clone(),
                error: "Not found".into(),
            });
            continue;
        };

        let outcome = match action {
            BulkAction::Delete => executor.delete(row).await,
            BulkAction::MarkPrivate if row.is_private => Ok(()),
            BulkAction::MarkPrivate => executor.mark_private(row).await,
            BulkAction::Relinquish => match team {
                Some((team_id, members)) => executor.relinquish(row, team_id, members).await,
                None => Err(anyhow::anyhow!("teamId is required")),
            },
        };

        match outcome {
            Ok(()) => result.success.push(id.clone()),
            Err(e) => {
                warn!("Bulk {:?} failed for {}: {e}", action, id);
                result.failed.push(BulkFailure {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    result
}

/// Rejects the whole batch before any action runs if one record is off limits.
pub async fn run_checked(
    executor: &dyn BulkExecutor,
    requester: &str,
    action: BulkAction,
    ids: &[String],
    records: &HashMap<String, TranscriptRow>,
    team: Option<(&str, &[String])>,
) -> Result<BulkResult, AppError> {
    let offenders = unauthorized_ids(ids, records, requester);
    if !offenders.is_empty() {
        warn!("Bulk request by {} touches {} foreign record(s)", requester, offenders.len());
        return Err(AppError::ForbiddenIds(offenders));
    }
    Ok(apply(executor, action, ids, records, team).await)
}

/// POST /api/transcripts/bulk pipeline.
pub async fn execute(state: &AppState, requester: &str, req: BulkRequest) -> Result<BulkResult, AppError> {
    validate_ids(&req.meeting_ids)?;

    let team = match req.action {
        BulkAction::Relinquish => {
            let team_id = req
                .team_id
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| AppError::Validation("teamId is required for relinquish".into()))?;
            let members = teams::store::member_ids(&state.db, team_id).await?;
            if !members.iter().any(|m| m == requester) {
                return Err(AppError::Forbidden("You are not a member of this team".into()));
            }
            Some((team_id.to_string(), members))
        }
        _ => None,
    };

    let records: HashMap<String, TranscriptRow> = store::batch_get(&state.db, &req.meeting_ids)
        .await?
        .into_iter()
        .map(|r| (r.meeting_id.clone(), r))
        .collect();

    let executor = StoreExecutor { state, requester };
    let team_ref = team.as_ref().map(|(t, m)| (t.as_str(), m.as_slice()));
    let result = run_checked(
        &executor,
        requester,
        req.action,
        &req.meeting_ids,
        &records,
        team_ref,
    )
    .await?;

    info!(
        "Bulk {:?} by {}: {} ok, {} failed",
        req.action,
        requester,
        result.success.len(),
        result.failed.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl Recorder {
        fn record(&self, what: &str, row: &TranscriptRow) -> anyhow::Result<()> {
            if self.fail_on.as_deref() == Some(row.meeting_id.as_str()) {
                anyhow::bail!("boom");
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("{what}:{}", row.meeting_id));
            Ok(())
        }
    }

    #[async_trait]
    impl BulkExecutor for Recorder {
        async fn delete(&self, row: &TranscriptRow) -> anyhow::Result<()> {
            self.record("delete", row)
        }
        async fn mark_private(&self, row: &TranscriptRow) -> anyhow::Result<()> {
            self.record("private", row)
        }
        async fn relinquish(&self, row: &TranscriptRow, team_id: &str, _: &[String]) -> anyhow::Result<()> {
            self.record(&format!("relinquish[{team_id}]"), row)
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn records(rows: Vec<TranscriptRow>) -> HashMap<String, TranscriptRow> {
        rows.into_iter().map(|r| (r.meeting_id.clone(), r)).collect()
    }

    #[test]
    fn test_validate_ids_bounds() {
        assert!(validate_ids(&[]).is_err());
        assert!(validate_ids(&ids(&["a"])).is_ok());
        let many: Vec<String> = (0..51).map(|i| i.to_string()).collect();
        assert!(matches!(validate_ids(&many), Err(AppError::Validation(_))));
        assert!(validate_ids(&many[..50]).is_ok());
    }

    #[test]
    fn test_unauthorized_ids_flags_foreign_and_unshared_records() {
        let recs = records(vec![
            TranscriptRow::fixture("m1", Some("me"), &[]),
            TranscriptRow::fixture("m2", Some("other"), &[]),
            TranscriptRow::fixture("m3", None, &[]),
        ]);
        let bad = unauthorized_ids(&ids(&["m1", "m2", "m3", "missing"]), &recs, "me");
        assert_eq!(bad, vec!["m2", "m3"]);
    }

    #[test]
    fn test_team_records_only_open_to_members() {
        let mut row = TranscriptRow::fixture("m1", None, &[]);
        row.shared_with = ids(&["alice", "carol"]);
        assert!(can_modify(&row, "alice"));
        assert!(!can_modify(&row, "mallory"));

        let recs = records(vec![row]);
        assert_eq!(unauthorized_ids(&ids(&["m1"]), &recs, "mallory"), vec!["m1"]);
        assert!(unauthorized_ids(&ids(&["m1"]), &recs, "carol").is_empty());
    }

    #[derive(Default)]
    struct DeleteLog {
        steps: Mutex<Vec<&'static str>>,
        fail: Option<&'static str>,
    }

    impl DeleteLog {
        fn step(&self, name: &'static str) -> anyhow::Result<()> {
            self.steps.lock().unwrap().push(name);
            if self.fail == Some(name) {
                anyhow::bail!("{name} failed");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeleteSteps for DeleteLog {
        async fn delete_row(&self, _: &str) -> anyhow::Result<()> {
            self.step("row")
        }
        async fn delete_blob(&self, _: &str) -> anyhow::Result<()> {
            self.step("blob")
        }
        async fn delete_vectors(&self, _: &str) -> anyhow::Result<()> {
            self.step("vectors")
        }
    }

    #[tokio::test]
    async fn test_delete_removes_row_before_blob() {
        let row = TranscriptRow::fixture("m1", Some("me"), &[]);

        let ok = DeleteLog::default();
        delete_with_side_effects(&ok, &row).await.unwrap();
        assert_eq!(*ok.steps.lock().unwrap(), vec!["row", "blob", "vectors"]);

        let row_fails = DeleteLog {
            fail: Some("row"),
            ..Default::default()
        };
        assert!(delete_with_side_effects(&row_fails, &row).await.is_err());
        assert_eq!(*row_fails.steps.lock().unwrap(), vec!["row"]);

        let blob_fails = DeleteLog {
            fail: Some("blob"),
            ..Default::default()
        };
        assert!(delete_with_side_effects(&blob_fails, &row).await.is_ok());
        assert_eq!(*blob_fails.steps.lock().unwrap(), vec!["row", "blob", "vectors"]);
    }

    #[test]
    fn test_single_delete_gate() {
        let mine = TranscriptRow::fixture("m1", Some("me"), &[]);
        assert!(check_single(&mine, "me").is_ok());
        assert!(matches!(check_single(&mine, "other"), Err(AppError::Forbidden(_))));

        let mut team = TranscriptRow::fixture("m2", None, &[]);
        team.shared_with = ids(&["alice"]);
        assert!(check_single(&team, "alice").is_ok());
        assert!(matches!(check_single(&team, "mallory"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_forbidden_batch_mutates_nothing() {
        let recs = records(vec![
            TranscriptRow::fixture("m1", Some("me"), &[]),
            TranscriptRow::fixture("m2", Some("other"), &[]),
        ]);
        let exec = Recorder::default();

        let res = run_checked(&exec, "me", BulkAction::Delete, &ids(&["m1", "m2"]), &recs, None).await;
        match res {
            Err(AppError::ForbiddenIds(bad)) => assert_eq!(bad, vec!["m2"]),
            other => panic!("expected ForbiddenIds, got {:?}", other.map(|r| r.success)),
        }
        assert!(exec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checked_batch_applies_when_all_owned() {
        let recs = records(vec![TranscriptRow::fixture("m1", Some("me"), &[])]);
        let exec = Recorder::default();

        let res = run_checked(&exec, "me", BulkAction::MarkPrivate, &ids(&["m1"]), &recs, None)
            .await
            .unwrap();
        assert_eq!(res.success, vec!["m1"]);
        assert_eq!(*exec.calls.lock().unwrap(), vec!["private:m1"]);
    }

    #[tokio::test]
    async fn test_mark_private_skips_already_private() {
        let mut row = TranscriptRow::fixture("m1", Some("me"), &[]);
        row.is_private = true;
        let recs = records(vec![row]);
        let exec = Recorder::default();

        let res = apply(&exec, BulkAction::MarkPrivate, &ids(&["m1"]), &recs, None).await;
        assert_eq!(res.success, vec!["m1"]);
        assert!(res.failed.is_empty());
        assert!(exec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_every_id_lands_in_success_or_failed() {
        let recs = records(vec![
            TranscriptRow::fixture("m1", Some("me"), &[]),
            TranscriptRow::fixture("m2", Some("me"), &[]),
        ]);
        let exec = Recorder {
            fail_on: Some("m2".into()),
            ..Default::default()
        };
        let req = ids(&["m1", "m2", "ghost"]);

        let res = apply(&exec, BulkAction::Delete, &req, &recs, None).await;
        assert_eq!(res.success.len() + res.failed.len(), req.len());
        assert_eq!(res.success, vec!["m1"]);
        assert_eq!(res.failed[0].id, "m2");
        assert_eq!(res.failed[1], BulkFailure { id: "ghost".into(), error: "Not found".into() });
    }

    #[tokio::test]
    async fn test_relinquish_passes_team() {
        let recs = records(vec![TranscriptRow::fixture("m1", Some("me"), &[])]);
        let exec = Recorder::default();
        let members = ids(&["me", "teammate"]);

        let res = apply(
            &exec,
            BulkAction::Relinquish,
            &ids(&["m1"]),
            &recs,
            Some(("t1", members.as_slice())),
        )
        .await;
        assert_eq!(res.success, vec!["m1"]);
        assert_eq!(*exec.calls.lock().unwrap(), vec!["relinquish[t1]:m1"]);
    }

    #[test]
    fn test_request_parses_camel_case_actions() {
        let req: BulkRequest =
            serde_json::from_str(r#"{"action":"markPrivate","meetingIds":["m1"]}"#).unwrap();
        assert_eq!(req.action, BulkAction::MarkPrivate);
        assert!(req.team_id.is_none());
    }
}
