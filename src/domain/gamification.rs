//! XP accrual, level derivation and achievement/badge unlocking.
//!
//! Every XP-awarding event in the platform funnels through [`Progression::award`] (or its SQL
//! twin in `GamificationRepository`), so the level invariant
//! `level == max(1, xp_points / 1000 + 1)` holds after every award.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::models::{AchievementId, BadgeId, SkillId};
use crate::domain::{DomainError, DomainResult};

pub const XP_PER_LEVEL: i64 = 1000;

/// Awarded to a post author when the topic author marks the post as the solution.
pub const SOLUTION_XP: i64 = 50;

pub const RESOURCE_XP_CAP: i64 = 50;
pub const RESOURCE_MINUTES_PER_XP: i64 = 5;

#[inline]
pub const fn level_for(xp_points: i64) -> i64 {
    let level = xp_points / XP_PER_LEVEL + 1;
    if level < 1 { 1 } else { level }
}

/// Percentage of the way from the start of `level` to the next one, clamped to `0..=100`.
pub fn level_progress(xp_points: i64, level: i64) -> i64 {
    let floor = XP_PER_LEVEL * (level - 1);
    ((xp_points - floor) * 100 / XP_PER_LEVEL).clamp(0, 100)
}

pub fn resource_completion_xp(duration_minutes: i64) -> i64 {
    (duration_minutes / RESOURCE_MINUTES_PER_XP).clamp(0, RESOURCE_XP_CAP)
}

/// A non-negative amount of XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct XpDelta(i64);

impl XpDelta {
    pub fn new(points: i64) -> DomainResult<Self> {
        if points < 0 {
            return Err(DomainError::validation("XP awards cannot be negative."));
        }

        Ok(Self(points))
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

crate::string_enum! {
    /// What earned the XP; carried into logs.
    pub enum XpSource {
        StepCompleted => "step_completed",
        PathCompleted => "path_completed",
        ResourceCompleted => "resource_completed",
        SolutionMarked => "solution_marked",
        AchievementUnlocked => "achievement_unlocked",
        BadgeUnlocked => "badge_unlocked",
        StaffGrant => "staff_grant",
    }
}

/// The persisted pair of gamification fields on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progression {
    pub xp_points: i64,
    pub level: i64,
}

impl Progression {
    pub const fn from_xp(xp_points: i64) -> Self {
        Self {
            xp_points,
            level: level_for(xp_points),
        }
    }

    pub fn award(self, delta: XpDelta) -> XpAward {
        let next = Self::from_xp(self.xp_points.saturating_add(delta.get()));
        XpAward {
            delta: delta.get(),
            xp_points: next.xp_points,
            level: next.level,
            previous_level: self.level,
            leveled_up: next.level > self.level,
        }
    }
}

impl Default for Progression {
    fn default() -> Self {
        Self::from_xp(0)
    }
}

/// Outcome of a single XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct XpAward {
    pub delta: i64,
    pub xp_points: i64,
    pub level: i64,
    pub previous_level: i64,
    pub leveled_up: bool,
}

impl XpAward {
    pub const fn progression(&self) -> Progression {
        Progression {
            xp_points: self.xp_points,
            level: self.level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementRule {
    pub id: AchievementId,
    pub xp_reward: i64,
    pub required_paths_completed: i64,
    pub required_skills: Vec<SkillId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeRule {
    pub id: BadgeId,
    pub xp_reward: i64,
    pub required_level: i64,
    pub required_courses: i64,
}

/// What the unlock rules get to see about an account.
#[derive(Debug, Clone, Default)]
pub struct UnlockSnapshot {
    pub level: i64,
    pub completed_paths: i64,
    pub skills: HashSet<SkillId>,
    pub earned_achievements: HashSet<AchievementId>,
    pub earned_badges: HashSet<BadgeId>,
}

impl AchievementRule {
    pub fn is_met_by(&self, snapshot: &UnlockSnapshot) -> bool {
        snapshot.completed_paths >= self.required_paths_completed
            && self
                .required_skills
                .iter()
                .all(|skill| snapshot.skills.contains(skill))
    }
}

impl BadgeRule {
    pub fn is_met_by(&self, snapshot: &UnlockSnapshot) -> bool {
        snapshot.level >= self.required_level && snapshot.completed_paths >= self.required_courses
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlock {
    Achievement { id: AchievementId, xp_reward: i64 },
    Badge { id: BadgeId, xp_reward: i64 },
}

impl Unlock {
    pub const fn xp_reward(&self) -> i64 {
        match self {
            Unlock::Achievement { xp_reward, .. } | Unlock::Badge { xp_reward, .. } => *xp_reward,
        }
    }
}

/// Runs unlock evaluation to a fixed point.
///
/// Rewards granted by one unlock raise XP, which may raise the level, which may satisfy a
/// level-gated badge; evaluation repeats until a pass unlocks nothing. Each definition unlocks at
/// most once, so the loop is bounded by the number of rules.
pub fn resolve_unlocks(
    achievements: &[AchievementRule],
    badges: &[BadgeRule],
    progression: Progression,
    mut snapshot: UnlockSnapshot,
) -> (Vec<Unlock>, Progression) {
    let mut unlocked = Vec::new();
    let mut progression = progression;
    snapshot.level = progression.level;

    loop {
        let mut pass = Vec::new();

        for rule in achievements {
            if !snapshot.earned_achievements.contains(&rule.id) && rule.is_met_by(&snapshot) {
                snapshot.earned_achievements.insert(rule.id);
                pass.push(Unlock::Achievement {
                    id: rule.id,
                    xp_reward: rule.xp_reward,
                });
            }
        }

        for rule in badges {
            if !snapshot.earned_badges.contains(&rule.id) && rule.is_met_by(&snapshot) {
                snapshot.earned_badges.insert(rule.id);
                pass.push(Unlock::Badge {
                    id: rule.id,
                    xp_reward: rule.xp_reward,
                });
            }
        }

        if pass.is_empty() {
            break;
        }

        for unlock in &pass {
            let delta = XpDelta(unlock.xp_reward().max(0));
            progression = progression.award(delta).progression();
        }
        snapshot.level = progression.level;
        unlocked.extend(pass);
    }

    (unlocked, progression)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_level_formula() {
        assert_eq!(level_for(0), 1);
        assert_eq!(level_for(999), 1);
        assert_eq!(level_for(1000), 2);
        assert_eq!(level_for(1050), 2);
        assert_eq!(level_for(12_345), 13);
    }

    #[test]
    fn test_award_crosses_level_boundary() {
        let award = Progression::from_xp(950).award(XpDelta::new(100).unwrap());

        assert_eq!(award.xp_points, 1050);
        assert_eq!(award.level, 2);
        assert_eq!(award.previous_level, 1);
        assert!(award.leveled_up);
    }

    #[test]
    fn test_level_invariant_holds_after_any_award_sequence() {
        let deltas = [0, 10, 990, 1, 50, 4_000, 0, 999, 1, 25_000, 7];
        let mut progression = Progression::default();

        for points in deltas {
            let award = progression.award(XpDelta::new(points).unwrap());
            assert!(award.xp_points >= progression.xp_points);
            progression = award.progression();
            assert_eq!(progression.level, (progression.xp_points / 1000 + 1).max(1));
        }

        assert_eq!(progression.xp_points, deltas.iter().sum::<i64>());
    }

    #[test]
    fn test_negative_delta_rejected() {
        assert!(matches!(XpDelta::new(-1), Err(DomainError::Validation(_))));
        assert!(XpDelta::new(0).unwrap().is_zero());
    }

    #[test]
    fn test_level_progress() {
        assert_eq!(level_progress(0, 1), 0);
        assert_eq!(level_progress(500, 1), 50);
        assert_eq!(level_progress(1050, 2), 5);
        assert_eq!(level_progress(1999, 2), 99);
        // stale level field never reports outside the bar
        assert_eq!(level_progress(5000, 2), 100);
    }

    #[test]
    fn test_resource_completion_xp_is_capped() {
        assert_eq!(resource_completion_xp(0), 0);
        assert_eq!(resource_completion_xp(4), 0);
        assert_eq!(resource_completion_xp(45), 9);
        assert_eq!(resource_completion_xp(250), 50);
        assert_eq!(resource_completion_xp(10_000), 50);
    }

    fn skills(ids: &[i64]) -> HashSet<SkillId> {
        ids.iter().copied().map(SkillId).collect()
    }

    #[test]
    fn test_achievement_requires_paths_and_every_skill() {
        let rule = AchievementRule {
            id: AchievementId(1),
            xp_reward: 200,
            required_paths_completed: 2,
            required_skills: vec![SkillId(1), SkillId(2)],
        };

        let mut snapshot = UnlockSnapshot {
            completed_paths: 2,
            skills: skills(&[1]),
            ..Default::default()
        };
        assert!(!rule.is_met_by(&snapshot));

        snapshot.skills = skills(&[1, 2, 3]);
        assert!(rule.is_met_by(&snapshot));

        snapshot.completed_paths = 1;
        assert!(!rule.is_met_by(&snapshot));
    }

    #[test]
    fn test_unlocks_cascade_through_level_gated_badges() {
        let achievements = vec![AchievementRule {
            id: AchievementId(1),
            xp_reward: 600,
            required_paths_completed: 1,
            required_skills: vec![],
        }];
        let badges = vec![
            BadgeRule {
                id: BadgeId(10),
                xp_reward: 0,
                required_level: 2,
                required_courses: 0,
            },
            BadgeRule {
                id: BadgeId(11),
                xp_reward: 0,
                required_level: 5,
                required_courses: 0,
            },
        ];

        let snapshot = UnlockSnapshot {
            completed_paths: 1,
            ..Default::default()
        };

        let (unlocked, progression) =
            resolve_unlocks(&achievements, &badges, Progression::from_xp(500), snapshot);

        assert_eq!(
            unlocked,
            vec![
                Unlock::Achievement {
                    id: AchievementId(1),
                    xp_reward: 600
                },
                Unlock::Badge {
                    id: BadgeId(10),
                    xp_reward: 0
                },
            ]
        );
        assert_eq!(progression, Progression::from_xp(1100));
    }

    #[test]
    fn test_earned_definitions_never_unlock_twice() {
        let achievements = vec![AchievementRule {
            id: AchievementId(3),
            xp_reward: 100,
            required_paths_completed: 0,
            required_skills: vec![],
        }];

        let snapshot = UnlockSnapshot {
            earned_achievements: [AchievementId(3)].into_iter().collect(),
            ..Default::default()
        };

        let (unlocked, progression) =
            resolve_unlocks(&achievements, &[], Progression::default(), snapshot);

        assert!(unlocked.is_empty());
        assert_eq!(progression, Progression::default());
    }
}
