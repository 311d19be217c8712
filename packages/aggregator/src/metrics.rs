use chrono::Utc;
use common::events::{LintingFinished, MetricsCalculated};
use common::score::code_quality_score;

/// Build the outbound aggregate from a linting result.
///
/// Counts come from the event (absent fields already defaulted to 0 at
/// deserialization); the score is recomputed here from the canonical
/// formula, and the raw per-issue list is embedded even when empty so the
/// report service never re-queries the linter.
pub fn build_metrics_calculated(event: &LintingFinished) -> MetricsCalculated {
    MetricsCalculated {
        submission_id: event.submission_id,
        language: event.language.clone(),
        error_count: event.error_count,
        warning_count: event.warning_count,
        info_count: event.info_count,
        issue_count: event.issue_count,
        file_count: event.file_count,
        code_quality_score: code_quality_score(event.error_count, event.warning_count),
        calculated_at_utc: Utc::now(),
        results: event.results.clone(),
    }
}
