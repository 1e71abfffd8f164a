use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{
    AccountId, ForumCategoryId, GroupMemberId, GroupMessageId, LearningPathId, PostId,
    StudyGroupId, TopicId,
};
use crate::domain::study_group::{GroupSnapshot, MemberRole};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ForumCategory {
    pub id: ForumCategoryId,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub topic_count: i64,
    pub post_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub content: String,
    pub category_id: ForumCategoryId,
    pub author_id: AccountId,
    pub author_username: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub learning_path_id: Option<LearningPathId>,
    pub skill_ids: Vec<i64>,
    pub view_count: i64,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub topic_id: TopicId,
    pub author_id: AccountId,
    pub author_username: String,
    pub is_solution: bool,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudyGroup {
    pub id: StudyGroupId,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub max_members: i64,
    pub learning_path_id: Option<LearningPathId>,
    pub creator_id: AccountId,
    pub skill_ids: Vec<i64>,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyGroup {
    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            creator_id: self.creator_id,
            is_private: self.is_private,
            max_members: self.max_members,
            member_count: self.member_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupMember {
    pub id: GroupMemberId,
    pub study_group_id: StudyGroupId,
    pub account_id: AccountId,
    pub username: String,
    #[sqlx(try_from = "String")]
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupMessage {
    pub id: GroupMessageId,
    pub study_group_id: StudyGroupId,
    pub sender_id: AccountId,
    pub sender_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicFilter {
    pub category: Option<i64>,
    pub learning_path: Option<i64>,
    pub skill: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTopic {
    pub title: String,
    pub content: String,
    pub category_id: ForumCategoryId,
    pub learning_path_id: Option<LearningPathId>,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTopic {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
    pub is_locked: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudyGroupFilter {
    pub learning_path: Option<i64>,
    pub skill: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStudyGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default = "default_max_members")]
    pub max_members: i64,
    pub learning_path_id: Option<LearningPathId>,
    #[serde(default)]
    pub skill_ids: Vec<i64>,
}

fn default_max_members() -> i64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStudyGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
    pub max_members: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleChange {
    pub role: MemberRole,
}

/// `POST /topics/{id}/posts/{post_id}/mark-solution` result.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionResult {
    pub post: Post,
    pub xp_awarded: i64,
}
