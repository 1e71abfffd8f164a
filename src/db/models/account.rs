use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{AccountId, BadgeId};
use crate::domain::gamification::level_progress;

/// Base account table model
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: AccountId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub education_level: String,
    pub field_of_study: String,
    pub career_goals: String,
    pub xp_points: i64,
    pub level: i64,
    pub is_mentor: bool,
    pub is_mentee: bool,
    pub receive_notifications: bool,
    pub public_profile: bool,
    pub is_staff: bool,
    pub linkedin_profile: String,
    pub github_profile: String,
    pub personal_website: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    pub fn into_profile(self) -> AccountProfile {
        AccountProfile {
            full_name: self.full_name(),
            level_progress: level_progress(self.xp_points, self.level),
            id: self.id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            avatar: self.avatar,
            xp_points: self.xp_points,
            level: self.level,
            is_mentor: self.is_mentor,
            linkedin_profile: self.linkedin_profile,
            github_profile: self.github_profile,
            personal_website: self.personal_website,
        }
    }

    pub fn into_detail(self) -> AccountDetail {
        AccountDetail {
            full_name: self.full_name(),
            level_progress: level_progress(self.xp_points, self.level),
            id: self.id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            avatar: self.avatar,
            date_of_birth: self.date_of_birth,
            education_level: self.education_level,
            field_of_study: self.field_of_study,
            career_goals: self.career_goals,
            xp_points: self.xp_points,
            level: self.level,
            is_mentor: self.is_mentor,
            is_mentee: self.is_mentee,
            receive_notifications: self.receive_notifications,
            public_profile: self.public_profile,
            is_staff: self.is_staff,
            linkedin_profile: self.linkedin_profile,
            github_profile: self.github_profile,
            personal_website: self.personal_website,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public view of someone else's account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountProfile {
    pub id: AccountId,
    pub username: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub xp_points: i64,
    pub level: i64,
    pub level_progress: i64,
    pub is_mentor: bool,
    pub linkedin_profile: String,
    pub github_profile: String,
    pub personal_website: String,
}

/// The caller's own account, everything except the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetail {
    pub id: AccountId,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub education_level: String,
    pub field_of_study: String,
    pub career_goals: String,
    pub xp_points: i64,
    pub level: i64,
    pub level_progress: i64,
    pub is_mentor: bool,
    pub is_mentee: bool,
    pub receive_notifications: bool,
    pub public_profile: bool,
    pub is_staff: bool,
    pub linkedin_profile: String,
    pub github_profile: String,
    pub personal_website: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Self-service profile edit. XP, level and email are not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccount {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub education_level: Option<String>,
    pub field_of_study: Option<String>,
    pub career_goals: Option<String>,
    pub is_mentor: Option<bool>,
    pub is_mentee: Option<bool>,
    pub receive_notifications: Option<bool>,
    pub public_profile: Option<bool>,
    pub linkedin_profile: Option<String>,
    pub github_profile: Option<String>,
    pub personal_website: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Badge {
    pub id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub xp_reward: i64,
    pub required_level: i64,
    pub required_courses: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EarnedBadge {
    pub badge_id: BadgeId,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub xp_reward: i64,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: AccountId,
    pub username: String,
    pub avatar: Option<String>,
    pub xp_points: i64,
    pub level: i64,
    pub ranking: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    fn row() -> AccountRow {
        AccountRow {
            id: AccountId(3),
            email: "grace@example.com".into(),
            username: "grace".into(),
            password_hash: "$argon2id$secret".into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            avatar: None,
            date_of_birth: None,
            education_level: String::new(),
            field_of_study: String::new(),
            career_goals: String::new(),
            xp_points: 1_500,
            level: 2,
            is_mentor: false,
            is_mentee: true,
            receive_notifications: true,
            public_profile: true,
            is_staff: false,
            linkedin_profile: String::new(),
            github_profile: String::new(),
            personal_website: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut account = row();
        assert_eq!(account.full_name(), "grace");

        account.first_name = "Grace".into();
        account.last_name = "Hopper".into();
        assert_eq!(account.full_name(), "Grace Hopper");
    }

    #[test]
    fn test_detail_never_carries_password_hash() {
        let detail = serde_json::to_value(row().into_detail()).unwrap();

        assert!(detail.get("password_hash").is_none());
        assert_eq!(detail["level_progress"], 50);
        assert_eq!(detail["email"], "grace@example.com");
    }

    #[test]
    fn test_profile_hides_private_fields() {
        let profile = serde_json::to_value(row().into_profile()).unwrap();

        assert!(profile.get("email").is_none());
        assert!(profile.get("is_staff").is_none());
        assert_eq!(profile["full_name"], "grace");
    }
}
