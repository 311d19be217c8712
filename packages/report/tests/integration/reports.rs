use chrono::{DateTime, Duration, Utc};
use common::code_quality_score;
use common::events::{LintIssue, MetricsCalculated, Severity};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use report::consumers::metrics_calculated::materialize_report;
use report::entity::report_metric;

use crate::common::{TestApp, routes};

fn metrics_event(
    submission_id: Uuid,
    errors: i32,
    warnings: i32,
    calculated_at: DateTime<Utc>,
    issues: Vec<LintIssue>,
) -> MetricsCalculated {
    MetricsCalculated {
        submission_id,
        language: "python".to_string(),
        error_count: errors,
        warning_count: warnings,
        info_count: 0,
        issue_count: issues.len() as i32,
        file_count: 1,
        code_quality_score: code_quality_score(errors, warnings),
        calculated_at_utc: calculated_at,
        results: issues,
    }
}

fn issue(code: &str, line: i32, severity: Severity) -> LintIssue {
    LintIssue {
        code: code.to_string(),
        message: format!("{code} triggered"),
        line,
        column: 1,
        severity,
    }
}

mod materialization {
    use super::*;

    #[tokio::test]
    async fn replayed_event_converges_to_one_row_with_last_issue_set() {
        let app = TestApp::spawn().await;
        let submission_id = Uuid::new_v4();

        let first = metrics_event(
            submission_id,
            2,
            0,
            Utc::now(),
            vec![
                issue("E101", 3, Severity::Error),
                issue("E102", 7, Severity::Error),
            ],
        );
        let second = metrics_event(
            submission_id,
            0,
            1,
            Utc::now(),
            vec![issue("W291", 12, Severity::Warning)],
        );

        materialize_report(&app.db, &first).await.unwrap();
        materialize_report(&app.db, &second).await.unwrap();
        // Redelivery of the same event must also be a no-op in effect.
        materialize_report(&app.db, &second).await.unwrap();

        let rows = report_metric::Entity::find()
            .filter(report_metric::Column::SubmissionId.eq(submission_id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let res = app.get(&routes::report(&submission_id.to_string())).await;
        assert_eq!(res.status, 200, "body: {}", res.text);

        let issues = res.body["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0]["code"], "W291");
        assert_eq!(issues[0]["severity"], "warning");
        assert_eq!(res.body["summary"]["codeQuality"], "98/100");
    }

    #[tokio::test]
    async fn detail_includes_grade_evaluation_and_issues() {
        let app = TestApp::spawn().await;
        let submission_id = Uuid::new_v4();

        // 1 error + 1 warning => 100 - 5 - 2 = 93 => A+ / Excellent.
        let event = metrics_event(
            submission_id,
            1,
            1,
            Utc::now(),
            vec![
                issue("F821", 4, Severity::Error),
                issue("E501", 12, Severity::Warning),
            ],
        );
        materialize_report(&app.db, &event).await.unwrap();

        let res = app.get(&routes::report(&submission_id.to_string())).await;
        assert_eq!(res.status, 200, "body: {}", res.text);

        assert_eq!(res.body["submissionId"], submission_id.to_string());
        assert_eq!(res.body["language"], "python");
        assert_eq!(res.body["summary"]["errors"], 1);
        assert_eq!(res.body["summary"]["warnings"], 1);
        assert_eq!(res.body["summary"]["totalIssues"], 2);
        assert_eq!(res.body["summary"]["codeQuality"], "93/100");
        assert_eq!(res.body["summary"]["grade"], "A+");
        assert_eq!(res.body["summary"]["evaluation"], "Excellent");

        // Issues come back in insertion order.
        let issues = res.body["issues"].as_array().unwrap();
        assert_eq!(issues[0]["code"], "F821");
        assert_eq!(issues[1]["code"], "E501");
        assert_eq!(issues[1]["line"], 12);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn reports_are_ordered_most_recently_calculated_first() {
        let app = TestApp::spawn().await;
        let now = Utc::now();

        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        let s3 = Uuid::new_v4();

        materialize_report(&app.db, &metrics_event(s1, 0, 0, now - Duration::hours(2), vec![]))
            .await
            .unwrap();
        materialize_report(&app.db, &metrics_event(s2, 0, 0, now - Duration::hours(1), vec![]))
            .await
            .unwrap();
        materialize_report(&app.db, &metrics_event(s3, 0, 0, now, vec![]))
            .await
            .unwrap();

        let res = app.get(routes::REPORTS).await;
        assert_eq!(res.status, 200, "body: {}", res.text);

        let data = res.body.as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["submissionId"], s3.to_string());
        assert_eq!(data[1]["submissionId"], s2.to_string());
        assert_eq!(data[2]["submissionId"], s1.to_string());

        // Clean submission gets the top grade in the summary row.
        assert_eq!(data[0]["codeQualityScore"], 100);
        assert_eq!(data[0]["grade"], "A+");
    }

    #[tokio::test]
    async fn unknown_submission_returns_404_with_message() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::report(&Uuid::new_v4().to_string())).await;
        assert_eq!(res.status, 404, "body: {}", res.text);
        assert_eq!(res.body["code"], "NOT_FOUND");
        assert!(
            !res.body["message"].as_str().unwrap_or_default().is_empty(),
            "404 body must carry a non-empty message"
        );
    }
}
