//! Step progress and enrollment advancement, plus the small vocabulary enums the learning
//! modules share.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{DomainError, DomainResult};

crate::string_enum! {
    pub enum Difficulty {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
    }
}

crate::string_enum! {
    pub enum StepKind {
        Lesson => "lesson",
        Quiz => "quiz",
        Project => "project",
        Assignment => "assignment",
    }
}

crate::string_enum! {
    pub enum Proficiency {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
}

crate::string_enum! {
    pub enum AchievementDifficulty {
        Easy => "easy",
        Medium => "medium",
        Hard => "hard",
    }
}

crate::string_enum! {
    pub enum StepStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

crate::string_enum! {
    pub enum EnrollmentStatus {
        Enrolled => "enrolled",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        StepStatus::NotStarted
    }
}

/// `floor(completed * 100 / total)`, capped at 100. A path with no steps sits at zero.
pub fn path_percentage(completed_steps: i64, total_steps: i64) -> i64 {
    if total_steps <= 0 {
        return 0;
    }

    (completed_steps.max(0) * 100 / total_steps).min(100)
}

/// The mutable part of a step progress record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepState {
    pub status: StepStatus,
    pub progress_percentage: i64,
    pub time_spent_minutes: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepUpdate {
    pub status: Option<String>,
    pub progress_percentage: Option<i64>,
    pub time_spent_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub state: StepState,
    /// True exactly once per record: the first time it reaches `completed`.
    pub first_completion: bool,
}

impl StepState {
    pub fn apply(&self, update: &StepUpdate, now: DateTime<Utc>) -> DomainResult<StepOutcome> {
        let mut next = self.clone();
        let mut first_completion = false;

        if let Some(raw) = update.status.as_deref() {
            let status: StepStatus = raw
                .parse()
                .map_err(|_| DomainError::validation("Invalid status."))?;

            match status {
                StepStatus::InProgress if next.started_at.is_none() => {
                    next.started_at = Some(now);
                }
                StepStatus::Completed if next.completed_at.is_none() => {
                    next.completed_at = Some(now);
                    next.started_at.get_or_insert(now);
                    next.progress_percentage = 100;
                    first_completion = true;
                }
                _ => (),
            }

            next.status = status;
        }

        if let Some(pct) = update.progress_percentage {
            next.progress_percentage = pct.clamp(0, 100);
        }

        if let Some(minutes) = update.time_spent_minutes.filter(|m| *m > 0) {
            next.time_spent_minutes = next.time_spent_minutes.saturating_add(minutes);
        }

        Ok(StepOutcome {
            state: next,
            first_completion,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentAdvance {
    pub status: EnrollmentStatus,
    pub progress_percentage: i64,
    /// Set when this update is the one that finished the path; the path reward is paid then.
    pub completed_now: bool,
}

pub fn advance_enrollment(current: EnrollmentStatus, percentage: i64) -> EnrollmentAdvance {
    let progress_percentage = percentage.clamp(0, 100);

    match current {
        EnrollmentStatus::Completed => EnrollmentAdvance {
            status: EnrollmentStatus::Completed,
            progress_percentage,
            completed_now: false,
        },
        _ if progress_percentage == 100 => EnrollmentAdvance {
            status: EnrollmentStatus::Completed,
            progress_percentage,
            completed_now: true,
        },
        _ => EnrollmentAdvance {
            status: EnrollmentStatus::InProgress,
            progress_percentage,
            completed_now: false,
        },
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn status(s: &str) -> StepUpdate {
        StepUpdate {
            status: Some(s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_path_percentage() {
        assert_eq!(path_percentage(0, 0), 0);
        assert_eq!(path_percentage(1, 3), 33);
        assert_eq!(path_percentage(2, 3), 66);
        assert_eq!(path_percentage(3, 3), 100);
        assert_eq!(path_percentage(5, 3), 100);
    }

    #[test]
    fn test_started_at_is_set_once() {
        let first = StepState::default().apply(&status("in_progress"), at(1)).unwrap();
        assert_eq!(first.state.started_at, Some(at(1)));
        assert!(!first.first_completion);

        let again = first.state.apply(&status("in_progress"), at(2)).unwrap();
        assert_eq!(again.state.started_at, Some(at(1)));
    }

    #[test]
    fn test_first_completion_only_rewards_once() {
        let done = StepState::default().apply(&status("completed"), at(3)).unwrap();
        assert!(done.first_completion);
        assert_eq!(done.state.completed_at, Some(at(3)));
        assert_eq!(done.state.progress_percentage, 100);

        let redo = done.state.apply(&status("completed"), at(4)).unwrap();
        assert!(!redo.first_completion);
        assert_eq!(redo.state.completed_at, Some(at(3)));
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let err = StepState::default().apply(&status("finished"), at(1)).unwrap_err();
        assert_eq!(err, DomainError::validation("Invalid status."));
    }

    #[test]
    fn test_percentage_clamped_and_minutes_accumulate() {
        let update = StepUpdate {
            status: None,
            progress_percentage: Some(140),
            time_spent_minutes: Some(25),
        };

        let once = StepState::default().apply(&update, at(1)).unwrap().state;
        assert_eq!(once.progress_percentage, 100);
        assert_eq!(once.time_spent_minutes, 25);

        let negative = StepUpdate {
            status: None,
            progress_percentage: Some(-5),
            time_spent_minutes: Some(-10),
        };
        let twice = once.apply(&negative, at(2)).unwrap().state;
        assert_eq!(twice.progress_percentage, 0);
        assert_eq!(twice.time_spent_minutes, 25);
    }

    #[test]
    fn test_enrollment_completes_once() {
        let halfway = advance_enrollment(EnrollmentStatus::Enrolled, 50);
        assert_eq!(halfway.status, EnrollmentStatus::InProgress);
        assert!(!halfway.completed_now);

        let done = advance_enrollment(EnrollmentStatus::InProgress, 100);
        assert_eq!(done.status, EnrollmentStatus::Completed);
        assert!(done.completed_now);

        let after = advance_enrollment(EnrollmentStatus::Completed, 100);
        assert_eq!(after.status, EnrollmentStatus::Completed);
        assert!(!after.completed_now);
    }
}
