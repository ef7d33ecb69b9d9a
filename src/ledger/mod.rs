//! Attendance ledger: one punch per employee per day, self or admin
//! verification, and the admin decision workflow.

use crate::assessment::{AssessmentOutcome, AssessmentRequest, AttireAssessor, ImagePayload};
use crate::error::LedgerError;
use crate::model::attendance::{
    AttendancePunch, DailyPunch, NewPunch, PunchStatus, SELF_VERIFIER, VerifyAction, VerifyType,
};
use crate::repo::{Decision, PunchRepository, StoreError};
use crate::storage::{FULL_BODY_FOLDER, ObjectStorage, UPPER_BODY_FOLDER};
use crate::utils::employee_directory::EmployeeDirectory;
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// A punch as submitted by the client, before validation.
#[derive(Debug, Clone, Default)]
pub struct PunchSubmission {
    pub employee_id: String,
    pub employee_name: String,
    pub location_text: String,
    pub upper_body: Option<ImagePayload>,
    pub full_body: Option<ImagePayload>,
    pub verify_type: VerifyType,
}

impl PunchSubmission {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let blank_image =
            |img: &Option<ImagePayload>| img.as_ref().is_none_or(|i| i.bytes.is_empty());

        if blank_image(&self.upper_body) {
            missing.push("upper_body");
        }
        if blank_image(&self.full_body) {
            missing.push("full_body");
        }
        if self.employee_name.trim().is_empty() {
            missing.push("employee_name");
        }
        if self.employee_id.trim().is_empty() {
            missing.push("employee_id");
        }
        if self.location_text.trim().is_empty() {
            missing.push("location");
        }
        missing
    }
}

pub struct Ledger {
    repo: Arc<dyn PunchRepository>,
    directory: EmployeeDirectory,
    storage: Arc<dyn ObjectStorage>,
    assessor: Arc<dyn AttireAssessor>,
    assessment_timeout: Duration,
}

impl Ledger {
    pub fn new(
        repo: Arc<dyn PunchRepository>,
        storage: Arc<dyn ObjectStorage>,
        assessor: Arc<dyn AttireAssessor>,
        assessment_timeout: Duration,
    ) -> Self {
        Self {
            directory: EmployeeDirectory::new(repo.clone()),
            repo,
            storage,
            assessor,
            assessment_timeout,
        }
    }

    pub fn directory(&self) -> &EmployeeDirectory {
        &self.directory
    }

    /// Validates, uploads both photos, records the punch and, for
    /// self-verification, folds the attire assessment into the record.
    #[instrument(
        name = "record_punch",
        skip_all,
        fields(employee_id = %submission.employee_id, verify_type = ?submission.verify_type)
    )]
    pub async fn record_punch(
        &self,
        submission: PunchSubmission,
    ) -> Result<AttendancePunch, LedgerError> {
        let missing = submission.missing_fields();
        if !missing.is_empty() {
            return Err(LedgerError::validation(missing));
        }

        let PunchSubmission {
            employee_id,
            employee_name,
            location_text,
            upper_body,
            full_body,
            verify_type,
        } = submission;
        let (Some(upper), Some(full)) = (upper_body, full_body) else {
            return Err(LedgerError::validation(["upper_body", "full_body"]));
        };
        let employee_id = employee_id.trim().to_string();
        let employee_name = employee_name.trim().to_string();

        // Both uploads must land before any row is written.
        let (upper_url, full_url) = futures::try_join!(
            self.storage
                .put(UPPER_BODY_FOLDER, &upper.bytes, &upper.content_type),
            self.storage
                .put(FULL_BODY_FOLDER, &full.bytes, &full.content_type),
        )
        .map_err(|e| {
            error!(error = %e, "Photo upload failed; punch not recorded");
            LedgerError::Storage(e)
        })?;

        let employee = self.directory.resolve(&employee_id, &employee_name).await?;

        let now = Utc::now();
        let date = now.with_timezone(&Local).date_naive();
        let status = verify_type.initial_status();
        let self_check = verify_type == VerifyType::SelfCheck;

        let punch = self
            .repo
            .insert_punch(NewPunch {
                employee_pk: employee.id,
                date,
                punch_time: now,
                upper_body_image_url: upper_url,
                full_body_image_url: full_url,
                location_text: location_text.trim().to_string(),
                status,
                verified_by: self_check.then(|| SELF_VERIFIER.to_string()),
                verified_at: self_check.then_some(now),
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicatePunch => LedgerError::DuplicatePunch {
                    employee_id: employee.employee_id.clone(),
                    date,
                },
                other => other.into(),
            })?;

        info!(punch_id = punch.id, status = %punch.status, "punch recorded");

        if !self_check {
            return Ok(punch);
        }

        let outcome = self
            .assess(AssessmentRequest {
                frames: vec![upper, full],
                candidate_name: Some(employee.name.clone()),
                candidate_id: Some(employee.employee_id.clone()),
            })
            .await;
        if outcome.opinion().is_none() {
            warn!(
                punch_id = punch.id,
                outcome = outcome.status(),
                "assessment did not produce an opinion"
            );
        }

        let punch = self
            .repo
            .complete_self_verification(punch.id, outcome.to_payload(), SELF_VERIFIER, Utc::now())
            .await?;
        Ok(punch)
    }

    /// Runs the assessment gateway under the configured deadline.
    pub async fn assess(&self, request: AssessmentRequest) -> AssessmentOutcome {
        let frames = request.frames.len();
        match tokio::time::timeout(self.assessment_timeout, self.assessor.assess(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?self.assessment_timeout, "assessment timed out");
                AssessmentOutcome::transport_error(
                    format!(
                        "Analysis failed: timed out after {}s",
                        self.assessment_timeout.as_secs()
                    ),
                    frames,
                )
            }
        }
    }

    /// Approves or rejects a punch that is still pending admin review.
    #[instrument(name = "decide_verification", skip(self))]
    pub async fn decide_verification(
        &self,
        punch_id: u64,
        action: VerifyAction,
        admin_name: &str,
    ) -> Result<PunchStatus, LedgerError> {
        let admin_name = admin_name.trim();
        if admin_name.is_empty() {
            return Err(LedgerError::validation(["admin_name"]));
        }

        let target = action.target_status();
        match self.repo.decide(punch_id, target, admin_name, Utc::now()).await? {
            Decision::Applied => {
                info!(punch_id, status = %target, admin = admin_name, "verification decided");
                Ok(target)
            }
            Decision::NotFound => Err(LedgerError::NotFound(punch_id)),
            Decision::AlreadyDecided(status) => {
                Err(LedgerError::AlreadyVerified { punch_id, status })
            }
        }
    }

    pub async fn find_punch(&self, punch_id: u64) -> Result<AttendancePunch, LedgerError> {
        self.repo
            .find_punch(punch_id)
            .await?
            .ok_or(LedgerError::NotFound(punch_id))
    }

    pub async fn list_pending(&self) -> Result<Vec<AttendancePunch>, LedgerError> {
        Ok(self.repo.list_by_status(&[PunchStatus::PendingAdmin]).await?)
    }

    pub async fn list_verified(&self) -> Result<Vec<AttendancePunch>, LedgerError> {
        Ok(self.repo.list_by_status(&PunchStatus::VERIFIED).await?)
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<DailyPunch>, LedgerError> {
        let punches = self.repo.list_by_date(date).await?;
        Ok(punches.iter().map(DailyPunch::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::AttireOpinion;
    use crate::repo::memory::InMemoryPunchRepository;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeStorage {
        fail_folder: Option<&'static str>,
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStorage for FakeStorage {
        async fn put(
            &self,
            folder: &str,
            _bytes: &[u8],
            _ct: &str,
        ) -> Result<String, StorageError> {
            if self.fail_folder == Some(folder) {
                return Err(StorageError("bucket unavailable".into()));
            }
            let mut stored = self.stored.lock().unwrap();
            let url = format!("https://bucket.test/{folder}/{}.jpg", stored.len());
            stored.push(url.clone());
            Ok(url)
        }
    }

    struct FakeAssessor {
        outcome: AssessmentOutcome,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FakeAssessor {
        fn returning(outcome: AssessmentOutcome) -> Self {
            Self { outcome, delay: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl AttireAssessor for FakeAssessor {
        async fn assess(&self, request: AssessmentRequest) -> AssessmentOutcome {
            assert_eq!(request.frames.len(), 2);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }

    fn success() -> AssessmentOutcome {
        AssessmentOutcome::Success {
            opinion: AttireOpinion::from_object(
                json!({
                    "overall_summary": "Formal and tidy.",
                    "attire_recommendation": "proper_interview_attire"
                })
                .as_object()
                .cloned()
                .unwrap(),
            ),
            frames_analyzed: 2,
            analysis_type: "visual_gpt".into(),
            candidate_name: Some("Alice".into()),
        }
    }

    struct Harness {
        repo: Arc<InMemoryPunchRepository>,
        storage: Arc<FakeStorage>,
        assessor: Arc<FakeAssessor>,
        ledger: Ledger,
    }

    fn harness_with(storage: FakeStorage, assessor: FakeAssessor) -> Harness {
        let repo = Arc::new(InMemoryPunchRepository::default());
        let storage = Arc::new(storage);
        let assessor = Arc::new(assessor);
        let ledger = Ledger::new(
            repo.clone(),
            storage.clone(),
            assessor.clone(),
            Duration::from_millis(200),
        );
        Harness { repo, storage, assessor, ledger }
    }

    fn harness() -> Harness {
        harness_with(FakeStorage::default(), FakeAssessor::returning(success()))
    }

    fn image(tag: u8) -> Option<ImagePayload> {
        Some(ImagePayload { bytes: vec![tag; 32], content_type: "image/jpeg".into() })
    }

    fn submission(name: &str, verify_type: VerifyType) -> PunchSubmission {
        PunchSubmission {
            employee_id: "E1".into(),
            employee_name: name.into(),
            location_text: "HQ-Lobby".into(),
            upper_body: image(1),
            full_body: image(2),
            verify_type,
        }
    }

    #[actix_web::test]
    async fn self_punch_is_verified_and_listed() {
        let h = harness();

        let punch = h

            .ledger

            .record_punch(submission("Alice", VerifyType::SelfCheck))

            .await

            .unwrap();

        assert_eq!(punch.status, PunchStatus::SelfVerified);
        assert_eq!(punch.verified_by.as_deref(), Some("SELF"));
        assert!(punch.verified_at.is_some());
        assert_eq!(punch.assessment.as_ref().unwrap()["status"], "success");
        assert_eq!(punch.location_text, "HQ-Lobby");
        assert!(punch.upper_body_image_url.contains("attendance/upper"));
        assert!(punch.full_body_image_url.contains("attendance/full"));

        let verified = h.ledger.list_verified().await.unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].id, punch.id);
        assert_eq!(h.assessor.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn admin_punch_waits_and_duplicate_is_refused() {
        let h = harness();

        let first = h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap();
        assert_eq!(first.status, PunchStatus::PendingAdmin);
        assert!(first.verified_by.is_none());
        assert!(first.verified_at.is_none());
        assert!(first.assessment.is_none());
        assert_eq!(h.assessor.calls.load(Ordering::SeqCst), 0);

        let err = h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicatePunch { ref employee_id, .. } if employee_id == "E1"
        ));
        assert_eq!(h.repo.punch_count(), 1);

        let err = h

            .ledger

            .record_punch(submission("Alice", VerifyType::SelfCheck))

            .await

            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePunch { .. }));
        assert_eq!(h.repo.punch_count(), 1);
    }

    #[actix_web::test]
    async fn approve_once_then_already_verified() {
        let h = harness();
        let punch = h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap();

        let status = h
            .ledger
            .decide_verification(punch.id, VerifyAction::Approve, "Mgr1")
            .await
            .unwrap();
        assert_eq!(status, PunchStatus::AdminVerified);

        let decided = h.ledger.find_punch(punch.id).await.unwrap();
        assert_eq!(decided.verified_by.as_deref(), Some("Mgr1"));
        let stamp = decided.verified_at;

        let err = h
            .ledger
            .decide_verification(punch.id, VerifyAction::Reject, "Mgr2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyVerified { status: PunchStatus::AdminVerified, .. }
        ));

        let after = h.ledger.find_punch(punch.id).await.unwrap();
        assert_eq!(after.status, PunchStatus::AdminVerified);
        assert_eq!(after.verified_by.as_deref(), Some("Mgr1"));
        assert_eq!(after.verified_at, stamp);
        assert_eq!(h.assessor.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn concurrent_punches_record_exactly_one() {
        let h = harness();

        let (first, second) = futures::join!(
            h.ledger.record_punch(submission("Alice", VerifyType::SelfCheck)),
            h.ledger.record_punch(submission("Alice", VerifyType::Admin)),
        );

        let (ok, dup): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
        assert_eq!(ok.len(), 1);
        assert!(matches!(dup[0], Err(LedgerError::DuplicatePunch { .. })));
        assert_eq!(h.repo.punch_count(), 1);
        assert_eq!(h.repo.employee_count(), 1);
    }

    #[actix_web::test]
    async fn concurrent_decisions_apply_exactly_one() {
        let h = harness();
        let punch = h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap();

        let (approve, reject) = futures::join!(
            h.ledger.decide_verification(punch.id, VerifyAction::Approve, "Mgr1"),
            h.ledger.decide_verification(punch.id, VerifyAction::Reject, "Mgr2"),
        );

        let applied = match (approve, reject) {
            (Ok(status), Err(LedgerError::AlreadyVerified { status: seen, .. }))
            | (Err(LedgerError::AlreadyVerified { status: seen, .. }), Ok(status)) => {
                assert_eq!(seen, status);
                status
            }
            other => panic!("expected one decision to win, got {other:?}"),
        };

        let stored = h.ledger.find_punch(punch.id).await.unwrap();
        assert_eq!(stored.status, applied);
        let winner = if applied == PunchStatus::AdminVerified { "Mgr1" } else { "Mgr2" };
        assert_eq!(stored.verified_by.as_deref(), Some(winner));
    }

    #[actix_web::test]
    async fn rejected_and_self_verified_punches_cannot_be_decided() {
        let h = harness();
        let pending = h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap();
        h.ledger
            .decide_verification(pending.id, VerifyAction::Reject, "Mgr1")
            .await
            .unwrap();
        let err = h
            .ledger
            .decide_verification(pending.id, VerifyAction::Approve, "Mgr1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyVerified { status: PunchStatus::Rejected, .. }));

        let mut other = submission("Bob", VerifyType::SelfCheck);
        other.employee_id = "E2".into();
        let self_verified = h.ledger.record_punch(other).await.unwrap();
        let err = h
            .ledger
            .decide_verification(self_verified.id, VerifyAction::Approve, "Mgr1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AlreadyVerified { status: PunchStatus::SelfVerified, .. }
        ));
    }

    #[actix_web::test]
    async fn unknown_punch_and_blank_admin() {
        let h = harness();
        assert!(matches!(
            h.ledger.decide_verification(99, VerifyAction::Approve, "Mgr1").await,
            Err(LedgerError::NotFound(99))
        ));
        assert!(matches!(
            h.ledger.decide_verification(99, VerifyAction::Approve, "  ").await,
            Err(LedgerError::Validation { .. })
        ));
        assert!(matches!(h.ledger.find_punch(7).await, Err(LedgerError::NotFound(7))));
    }

    #[actix_web::test]
    async fn employee_is_created_once_with_first_name() {
        let h = harness();
        h.ledger.record_punch(submission("Alice", VerifyType::Admin)).await.unwrap();
        let second = h.ledger.record_punch(submission("Alicia", VerifyType::Admin)).await;

        assert!(second.is_err());
        assert_eq!(h.repo.employee_count(), 1);
        let pending = h.ledger.list_pending().await.unwrap();
        assert_eq!(pending[0].employee_name, "Alice");
    }

    #[actix_web::test]
    async fn missing_fields_fail_before_any_upload() {
        let h = harness();
        let bad = PunchSubmission {
            employee_id: " ".into(),
            upper_body: Some(ImagePayload { bytes: vec![], content_type: "image/jpeg".into() }),
            ..submission("Alice", VerifyType::SelfCheck)
        };
        let bad = PunchSubmission { location_text: String::new(), full_body: None, ..bad };

        match h.ledger.record_punch(bad).await.unwrap_err() {
            LedgerError::Validation { fields } => {
                assert_eq!(fields, vec!["upper_body", "full_body", "employee_id", "location"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(h.storage.stored.lock().unwrap().is_empty());
        assert_eq!(h.repo.employee_count(), 0);
    }

    #[actix_web::test]
    async fn storage_failure_writes_no_row() {
        for folder in [UPPER_BODY_FOLDER, FULL_BODY_FOLDER] {
            let h = harness_with(
                FakeStorage { fail_folder: Some(folder), ..Default::default() },
                FakeAssessor::returning(success()),
            );
            let err = h
                .ledger
                .record_punch(submission("Alice", VerifyType::SelfCheck))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Storage(_)));
            assert_eq!(h.repo.punch_count(), 0);
            assert_eq!(h.assessor.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[actix_web::test]
    async fn gateway_failure_still_self_verifies() {
        let h = harness_with(
            FakeStorage::default(),
            FakeAssessor::returning(AssessmentOutcome::transport_error("connection reset", 2)),
        );
        let punch = h
            .ledger
            .record_punch(submission("Alice", VerifyType::SelfCheck))
            .await
            .unwrap();

        assert_eq!(punch.status, PunchStatus::SelfVerified);
        assert_eq!(punch.verified_by.as_deref(), Some("SELF"));
        assert!(punch.verified_at.is_some());
        assert_eq!(punch.assessment.unwrap()["status"], "transport_error");
    }

    #[actix_web::test]
    async fn slow_gateway_times_out_into_transport_error() {
        let h = harness_with(
            FakeStorage::default(),
            FakeAssessor {
                delay: Some(Duration::from_secs(5)),
                ..FakeAssessor::returning(success())
            },
        );
        let punch = h
            .ledger
            .record_punch(submission("Alice", VerifyType::SelfCheck))
            .await
            .unwrap();

        let assessment = punch.assessment.unwrap();
        assert_eq!(assessment["status"], "transport_error");
        assert!(assessment["message"].as_str().unwrap().contains("timed out"));
        assert_eq!(punch.status, PunchStatus::SelfVerified);
    }

    #[actix_web::test]
    async fn daily_listing_projects_minimal_fields() {
        let h = harness();
        let a = h.ledger.record_punch(submission("Alice", VerifyType::SelfCheck)).await.unwrap();
        let mut bob = submission("Bob", VerifyType::Admin);
        bob.employee_id = "E2".into();
        let b = h.ledger.record_punch(bob).await.unwrap();

        let daily = h.ledger.list_by_date(a.date).await.unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].employee_id, "E2");
        assert_eq!(daily[0].status, PunchStatus::PendingAdmin);
        assert_eq!(daily[1].employee_name, "Alice");
        assert_eq!(daily[1].punch_time, a.punch_time);
        assert!(b.punch_time >= a.punch_time);

        let other_day = a.date.pred_opt().unwrap();
        assert!(h.ledger.list_by_date(other_day).await.unwrap().is_empty());

        let pending = h.ledger.list_pending().await.unwrap();
        assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id]);
    }
}
