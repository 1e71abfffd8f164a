use serde::{Deserialize, Serialize};

pub mod account;
pub mod forum;
pub mod job;
pub mod learning_path;
pub mod mentorship;
pub mod progress;
pub mod resource;

pub const MAX_PAGE_SIZE: i64 = 100;

#[inline]
const fn default_offset() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    50
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_offset")]
    pub page: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            page: default_offset(),
        }
    }
}

impl Pagination {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page(&self) -> i64 {
        self.page.max(0)
    }

    pub fn offset(&self) -> i64 {
        self.page().saturating_mul(self.limit())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    #[serde(default = "default_limit")]
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = (total_items as f64 / page_size as f64).ceil() as i64;
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            total_items: self.total_items,
            total_pages: self.total_pages,
            page_size: self.page_size,
        }
    }
}

/// Declares `BIGSERIAL` primary-key newtypes.
macro_rules! id_type {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
                Serialize, Deserialize, sqlx::Type,
            )]
            #[sqlx(transparent)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl From<i64> for $name {
                fn from(value: i64) -> Self {
                    Self(value)
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

id_type! {
    AccountId,
    BadgeId,
    SkillId,
    CategoryId,
    LearningPathId,
    StepId,
    EnrollmentId,
    UserSkillId,
    StepProgressId,
    AchievementId,
    ResourceTypeId,
    ResourceProviderId,
    ResourceId,
    RecommendationId,
    MentorId,
    MentorshipRequestId,
    MentorshipId,
    MentorReviewId,
    MentorshipMessageId,
    CompanyId,
    JobListingId,
    JobApplicationId,
    SavedJobId,
    ForumCategoryId,
    TopicId,
    PostId,
    StudyGroupId,
    GroupMemberId,
    GroupMessageId,
}

/// Converts an id list coming out of an `ARRAY(SELECT ...)` column.
pub fn ids<T: From<i64>>(raw: Vec<i64>) -> Vec<T> {
    raw.into_iter().map(T::from).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination {
            limit: 1_000,
            page: -2,
        };
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = Pagination { limit: 20, page: 3 };
        assert_eq!(p.offset(), 60);
    }

    #[test]
    fn test_pagination_huge_page_saturates() {
        let p = Pagination {
            limit: 50,
            page: i64::MAX,
        };
        assert_eq!(p.offset(), i64::MAX);
    }

    #[test]
    fn test_paginated_response_pages() {
        let res = PaginatedResponse::new(vec![1, 2, 3], 41, 20, 0);
        assert_eq!(res.total_pages, 3);

        let mapped = res.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.total_items, 41);
    }

    #[test]
    fn test_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&AccountId(7)).unwrap(), "7");
        let parsed: SkillId = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, SkillId(12));
    }
}
