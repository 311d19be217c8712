/// Canonical quality-score formula for the whole pipeline.
///
/// `max(0, 100 - errors*5 - warnings*2)`, integer arithmetic with a floor
/// at zero. Every component that needs a score derives it from here; grade
/// and evaluation are derived from the score at read time, never persisted.
pub fn code_quality_score(error_count: i32, warning_count: i32) -> i32 {
    (100 - error_count * 5 - warning_count * 2).max(0)
}

/// Letter bucket for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 90 => Self::APlus,
            s if s >= 80 => Self::A,
            s if s >= 70 => Self::BPlus,
            s if s >= 60 => Self::B,
            s if s >= 50 => Self::C,
            s if s >= 40 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }

    /// Human label shown next to the grade.
    pub fn evaluation(&self) -> &'static str {
        match self {
            Self::APlus => "Excellent",
            Self::A => "Very good",
            Self::BPlus => "Good",
            Self::B => "Satisfactory",
            Self::C => "Needs improvement",
            Self::D => "Poor",
            Self::F => "Critical",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_deterministic() {
        // 3 errors, 2 warnings: 100 - 15 - 4 = 81
        assert_eq!(code_quality_score(3, 2), 81);
        assert_eq!(Grade::from_score(81), Grade::A);
    }

    #[test]
    fn score_clamps_at_zero() {
        // 30 errors: 100 - 150 would be negative
        assert_eq!(code_quality_score(30, 0), 0);
        assert_eq!(Grade::from_score(0), Grade::F);
    }

    #[test]
    fn clean_submission_scores_full_marks() {
        assert_eq!(code_quality_score(0, 0), 100);
        assert_eq!(Grade::from_score(100), Grade::APlus);
    }

    #[test]
    fn grade_bucket_boundaries() {
        assert_eq!(Grade::from_score(90), Grade::APlus);
        assert_eq!(Grade::from_score(89), Grade::A);
        assert_eq!(Grade::from_score(80), Grade::A);
        assert_eq!(Grade::from_score(79), Grade::BPlus);
        assert_eq!(Grade::from_score(70), Grade::BPlus);
        assert_eq!(Grade::from_score(60), Grade::B);
        assert_eq!(Grade::from_score(50), Grade::C);
        assert_eq!(Grade::from_score(40), Grade::D);
        assert_eq!(Grade::from_score(39), Grade::F);
    }

    #[test]
    fn evaluation_labels_match_grades() {
        assert_eq!(Grade::from_score(93).evaluation(), "Excellent");
        assert_eq!(Grade::from_score(81).evaluation(), "Very good");
        assert_eq!(Grade::from_score(75).evaluation(), "Good");
        assert_eq!(Grade::from_score(65).evaluation(), "Satisfactory");
        assert_eq!(Grade::from_score(55).evaluation(), "Needs improvement");
        assert_eq!(Grade::from_score(45).evaluation(), "Poor");
        assert_eq!(Grade::from_score(10).evaluation(), "Critical");
    }
}
