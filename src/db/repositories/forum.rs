use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::{replace_skills, sql_fragment};
use crate::db::models::forum::{
    CreatePost, CreateStudyGroup, CreateTopic, ForumCategory, GroupMember, GroupMessage, Post,
    RoleChange, SolutionResult, StudyGroup, StudyGroupFilter, Topic, TopicFilter,
    UpdateStudyGroup, UpdateTopic,
};
use crate::db::models::mentorship::CreateMessage;
use crate::db::models::{AccountId, GroupMemberId, Pagination, PostId, StudyGroupId, TopicId};
use crate::db::repositories::{Repository, Tx};
use crate::db::{PgError, PgResult};
use crate::domain::DomainError;
use crate::domain::forum::{check_can_post, mark_solution};
use crate::domain::gamification::{SOLUTION_XP, XpDelta, XpSource};
use crate::domain::study_group::MemberRole;

#[derive(Debug)]
pub struct ForumRepository {
    pool: &'static Pool<Postgres>,
}

const TOPIC_FILTER: &str = r#"
    ($1::BIGINT IS NULL OR category_id = $1)
    AND ($2::BIGINT IS NULL OR learning_path_id = $2)
    AND ($3::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM forum_topic_skill fts
        WHERE fts.topic_id = forum_topic.id AND fts.skill_id = $3
    ))
"#;

#[async_trait::async_trait]
impl Repository for ForumRepository {
    type Ident = TopicId;
    type Output = Topic;

    const BASE_FIELDS: &'static str = sql_fragment::TOPIC_FIELDS;
    const TABLE_NAME: &'static str = "forum_topic";
    const ENTITY: &'static str = "Topic";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl ForumRepository {
    #[instrument(skip(self))]
    pub async fn categories(&self) -> SqlxResult<Vec<ForumCategory>> {
        sqlx::query_as::<_, ForumCategory>(&format!(
            "SELECT {} FROM forum_category ORDER BY name",
            sql_fragment::FORUM_CATEGORY_FIELDS
        ))
        .fetch_all(self.pool)
        .await
    }

    /// Pinned topics first, then by latest activity.
    #[instrument(skip(self))]
    pub async fn topics(
        &self,
        filter: &TopicFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<Topic>, i64)> {
        let topics = sqlx::query_as::<_, Topic>(&format!(
            r#"
            SELECT {}
            FROM forum_topic
            WHERE {TOPIC_FILTER}
            ORDER BY is_pinned DESC, last_activity DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            Self::BASE_FIELDS
        ))
        .bind(filter.category)
        .bind(filter.learning_path)
        .bind(filter.skill)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM forum_topic WHERE {TOPIC_FILTER}"
        ))
        .bind(filter.category)
        .bind(filter.learning_path)
        .bind(filter.skill)
        .fetch_one(self.pool)
        .await?;

        Ok((topics, total))
    }

    async fn fetch_topic(tx: &mut Tx, id: TopicId) -> SqlxResult<Topic> {
        sqlx::query_as::<_, Topic>(&format!(
            "SELECT {} FROM forum_topic WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    /// Opens a topic and counts it, and its opening post, on the category.
    #[instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create_topic(&self, caller: AccountId, req: &CreateTopic) -> PgResult<Topic> {
        if req.title.trim().is_empty() || req.content.trim().is_empty() {
            return Err(DomainError::validation("Title and content are required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let bumped = sqlx::query(
            r#"
            UPDATE forum_category
            SET topic_count = topic_count + 1, post_count = post_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(req.category_id)
        .execute(tx.conn()?)
        .await?
        .rows_affected();

        if bumped == 0 {
            return Err(DomainError::not_found(format!(
                "Forum category {} not found.",
                req.category_id
            ))
            .into());
        }

        let id = sqlx::query_scalar::<_, TopicId>(
            r#"
            INSERT INTO forum_topic (title, content, category_id, author_id, learning_path_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(req.title.trim())
        .bind(&req.content)
        .bind(req.category_id)
        .bind(caller)
        .bind(req.learning_path_id)
        .fetch_one(tx.conn()?)
        .await?;

        replace_skills(tx.conn()?, "forum_topic_skill", "topic_id", id.0, &req.skill_ids).await?;
        let topic = Self::fetch_topic(&mut tx, id).await?;

        tx.commit().await?;
        tracing::info!(topic = %id, author = %caller, "topic created");

        Ok(topic)
    }

    /// Fetches a topic and counts the view.
    #[instrument(skip(self))]
    pub async fn view_topic(&self, id: TopicId) -> PgResult<Topic> {
        sqlx::query_as::<_, Topic>(&format!(
            "UPDATE forum_topic SET view_count = view_count + 1 WHERE id = $1 RETURNING {}",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Topic {id} not found.")).into())
    }

    /// Authors edit their topics; staff can also pin and lock them.
    async fn lock_editable(
        tx: &mut Tx,
        caller: AccountId,
        is_staff: bool,
        id: TopicId,
    ) -> PgResult<()> {
        let author = sqlx::query_scalar::<_, AccountId>(
            "SELECT author_id FROM forum_topic WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Topic {id} not found.")))?;

        if author != caller && !is_staff {
            return Err(DomainError::forbidden(
                "You do not have permission to modify this topic.",
            )
            .into());
        }

        Ok(())
    }

    #[instrument(skip(self, req))]
    pub async fn update_topic(
        &self,
        caller: AccountId,
        is_staff: bool,
        id: TopicId,
        req: &UpdateTopic,
    ) -> PgResult<Topic> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_editable(&mut tx, caller, is_staff, id).await?;

        let topic = sqlx::query_as::<_, Topic>(&format!(
            r#"
            UPDATE forum_topic SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                is_pinned = COALESCE($4, is_pinned),
                is_locked = COALESCE($5, is_locked),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.is_pinned)
        .bind(req.is_locked)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(topic)
    }

    /// Removes a topic and takes it, with its posts, off the category counters.
    #[instrument(skip(self))]
    pub async fn delete_topic(&self, caller: AccountId, is_staff: bool, id: TopicId) -> PgResult<()> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_editable(&mut tx, caller, is_staff, id).await?;

        let (category, replies) = sqlx::query_as::<_, (i64, i64)>(
            "DELETE FROM forum_topic WHERE id = $1 RETURNING category_id, reply_count",
        )
        .bind(id)
        .fetch_one(tx.conn()?)
        .await?;

        sqlx::query(
            r#"
            UPDATE forum_category SET
                topic_count = GREATEST(0, topic_count - 1),
                post_count = GREATEST(0, post_count - 1 - $2),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(category)
        .bind(replies)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn posts(
        &self,
        topic: TopicId,
        pagination: &Pagination,
    ) -> PgResult<(Vec<Post>, i64)> {
        if !self.exists(topic).await? {
            return Err(DomainError::not_found(format!("Topic {topic} not found.")).into());
        }

        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {} FROM forum_post
            WHERE topic_id = $1
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            "#,
            sql_fragment::POST_FIELDS
        ))
        .bind(topic)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forum_post WHERE topic_id = $1")
            .bind(topic)
            .fetch_one(self.pool)
            .await?;

        Ok((posts, total))
    }

    /// Replies to an unlocked topic and updates topic and category activity.
    #[instrument(skip(self, req))]
    pub async fn create_post(
        &self,
        caller: AccountId,
        topic: TopicId,
        req: &CreatePost,
    ) -> PgResult<Post> {
        if req.content.trim().is_empty() {
            return Err(DomainError::validation("Post content is required.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let (category, is_locked) = sqlx::query_as::<_, (i64, bool)>(
            "SELECT category_id, is_locked FROM forum_topic WHERE id = $1 FOR UPDATE",
        )
        .bind(topic)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Topic {topic} not found.")))?;

        check_can_post(is_locked)?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO forum_post (content, topic_id, author_id)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::POST_FIELDS
        ))
        .bind(&req.content)
        .bind(topic)
        .bind(caller)
        .fetch_one(tx.conn()?)
        .await?;

        sqlx::query(
            r#"
            UPDATE forum_topic
            SET reply_count = reply_count + 1, last_activity = NOW()
            WHERE id = $1
            "#,
        )
        .bind(topic)
        .execute(tx.conn()?)
        .await?;

        sqlx::query(
            "UPDATE forum_category SET post_count = post_count + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(category)
        .execute(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    async fn lock_post(tx: &mut Tx, topic: TopicId, post: PostId) -> PgResult<Post> {
        Ok(sqlx::query_as::<_, Post>(&format!(
            "SELECT {} FROM forum_post WHERE id = $1 AND topic_id = $2 FOR UPDATE",
            sql_fragment::POST_FIELDS
        ))
        .bind(post)
        .bind(topic)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Post {post} not found.")))?)
    }

    #[instrument(skip(self))]
    pub async fn like(&self, caller: AccountId, topic: TopicId, post: PostId) -> PgResult<Post> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_post(&mut tx, topic, post).await?;

        let result = sqlx::query("INSERT INTO post_like (post_id, account_id) VALUES ($1, $2)")
            .bind(post)
            .bind(caller)
            .execute(tx.conn()?)
            .await
            .map_err(PgError::from);

        match result {
            Ok(_) => (),
            Err(e) if e.is_unique_violation() => {
                return Err(DomainError::conflict("Post already liked.").into());
            }
            Err(e) => return Err(e),
        }

        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE forum_post SET like_count = like_count + 1 WHERE id = $1 RETURNING {}",
            sql_fragment::POST_FIELDS
        ))
        .bind(post)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn unlike(&self, caller: AccountId, topic: TopicId, post: PostId) -> PgResult<Post> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_post(&mut tx, topic, post).await?;

        let removed = sqlx::query("DELETE FROM post_like WHERE post_id = $1 AND account_id = $2")
            .bind(post)
            .bind(caller)
            .execute(tx.conn()?)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(DomainError::validation("Post not liked.").into());
        }

        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE forum_post SET like_count = GREATEST(0, like_count - 1) WHERE id = $1 RETURNING {}",
            sql_fragment::POST_FIELDS
        ))
        .bind(post)
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    /// Marks a post as the topic's solution. The post author is paid the first time only.
    #[instrument(skip(self))]
    pub async fn mark_solution(
        &self,
        caller: AccountId,
        topic: TopicId,
        post: PostId,
    ) -> PgResult<SolutionResult> {
        let mut tx = Tx::begin(self.pool).await?;

        let topic_author = sqlx::query_scalar::<_, AccountId>(
            "SELECT author_id FROM forum_topic WHERE id = $1",
        )
        .bind(topic)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Topic {topic} not found.")))?;

        let current = Self::lock_post(&mut tx, topic, post).await?;
        let pay = mark_solution(topic_author, caller, current.is_solution)?;

        let post = sqlx::query_as::<_, Post>(&format!(
            "UPDATE forum_post SET is_solution = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            sql_fragment::POST_FIELDS
        ))
        .bind(post)
        .fetch_one(tx.conn()?)
        .await?;

        let xp_awarded = if pay {
            let reward = tx
                .reward(post.author_id, XpDelta::new(SOLUTION_XP)?, XpSource::SolutionMarked)
                .await?;
            reward.award.delta
        } else {
            0
        };

        tx.commit().await?;
        Ok(SolutionResult { post, xp_awarded })
    }
}

#[derive(Debug)]
pub struct StudyGroupRepository {
    pool: &'static Pool<Postgres>,
}

/// Public groups plus the private ones the caller belongs to.
const GROUP_FILTER: &str = r#"
    (NOT is_private OR EXISTS (
        SELECT 1 FROM study_group_member m
        WHERE m.study_group_id = study_group.id AND m.account_id = $1
    ))
    AND ($2::BIGINT IS NULL OR learning_path_id = $2)
    AND ($3::BIGINT IS NULL OR EXISTS (
        SELECT 1 FROM study_group_skill sgs
        WHERE sgs.study_group_id = study_group.id AND sgs.skill_id = $3
    ))
"#;

#[async_trait::async_trait]
impl Repository for StudyGroupRepository {
    type Ident = StudyGroupId;
    type Output = StudyGroup;

    const BASE_FIELDS: &'static str = sql_fragment::STUDY_GROUP_FIELDS;
    const TABLE_NAME: &'static str = "study_group";
    const ENTITY: &'static str = "Study group";

    #[instrument(skip(pool))]
    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl StudyGroupRepository {
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        caller: AccountId,
        filter: &StudyGroupFilter,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<StudyGroup>, i64)> {
        let groups = sqlx::query_as::<_, StudyGroup>(&format!(
            r#"
            SELECT {}
            FROM study_group
            WHERE {GROUP_FILTER}
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            Self::BASE_FIELDS
        ))
        .bind(caller)
        .bind(filter.learning_path)
        .bind(filter.skill)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM study_group WHERE {GROUP_FILTER}"
        ))
        .bind(caller)
        .bind(filter.learning_path)
        .bind(filter.skill)
        .fetch_one(self.pool)
        .await?;

        Ok((groups, total))
    }

    async fn fetch(tx: &mut Tx, id: StudyGroupId) -> SqlxResult<StudyGroup> {
        sqlx::query_as::<_, StudyGroup>(&format!(
            "SELECT {} FROM study_group WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_one(tx.conn()?)
        .await
    }

    /// Private groups read as missing to non-members.
    #[instrument(skip(self))]
    pub async fn get_visible(&self, caller: AccountId, id: StudyGroupId) -> PgResult<StudyGroup> {
        let group = self.require(id).await?;
        if group.is_private && self.role_of(id, caller).await?.is_none() {
            return Err(DomainError::not_found(format!("Study group {id} not found.")).into());
        }

        Ok(group)
    }

    /// The caller's role in the group, `None` when not a member.
    async fn role_of(&self, id: StudyGroupId, account: AccountId) -> SqlxResult<Option<MemberRole>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM study_group_member WHERE study_group_id = $1 AND account_id = $2",
        )
        .bind(id)
        .bind(account)
        .fetch_optional(self.pool)
        .await?;

        Ok(role.and_then(|r| r.parse().ok()))
    }

    /// Creates the group with the creator as its first admin.
    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create(&self, caller: AccountId, req: &CreateStudyGroup) -> PgResult<StudyGroup> {
        if req.name.trim().is_empty() {
            return Err(DomainError::validation("Name is required.").into());
        }
        if req.max_members < 1 {
            return Err(DomainError::validation("A group needs room for at least one member.").into());
        }

        let mut tx = Tx::begin(self.pool).await?;

        let id = sqlx::query_scalar::<_, StudyGroupId>(
            r#"
            INSERT INTO study_group (
                name, description, is_private, max_members, learning_path_id, creator_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.is_private)
        .bind(req.max_members)
        .bind(req.learning_path_id)
        .bind(caller)
        .fetch_one(tx.conn()?)
        .await?;

        sqlx::query(
            "INSERT INTO study_group_member (study_group_id, account_id, role) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(caller)
        .bind(MemberRole::Admin.as_str())
        .execute(tx.conn()?)
        .await?;

        replace_skills(tx.conn()?, "study_group_skill", "study_group_id", id.0, &req.skill_ids)
            .await?;

        let group = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(group = %id, creator = %caller, "study group created");
        Ok(group)
    }

    /// Locks the group row; every membership change goes through this. Unlike reads, a
    /// private group is not hidden here, so a non-member joining it is refused outright.
    async fn lock_group(tx: &mut Tx, id: StudyGroupId) -> PgResult<StudyGroup> {
        sqlx::query("SELECT id FROM study_group WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(tx.conn()?)
            .await?;

        Ok(sqlx::query_as::<_, StudyGroup>(&format!(
            "SELECT {} FROM study_group WHERE id = $1",
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Study group {id} not found.")))?)
    }

    async fn lock_owned(tx: &mut Tx, caller: AccountId, id: StudyGroupId) -> PgResult<StudyGroup> {
        let group = Self::lock_group(tx, id).await?;
        if group.creator_id != caller {
            return Err(DomainError::forbidden(
                "Only the group creator can modify this group.",
            )
            .into());
        }

        Ok(group)
    }

    #[instrument(skip(self, req))]
    pub async fn update(
        &self,
        caller: AccountId,
        id: StudyGroupId,
        req: &UpdateStudyGroup,
    ) -> PgResult<StudyGroup> {
        let mut tx = Tx::begin(self.pool).await?;
        let group = Self::lock_owned(&mut tx, caller, id).await?;

        if let Some(max) = req.max_members {
            if max < group.member_count.max(1) {
                return Err(DomainError::validation(
                    "The group already has more members than that.",
                )
                .into());
            }
        }

        sqlx::query(
            r#"
            UPDATE study_group SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                is_private = COALESCE($4, is_private),
                max_members = COALESCE($5, max_members),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.is_private)
        .bind(req.max_members)
        .execute(tx.conn()?)
        .await?;

        let group = Self::fetch(&mut tx, id).await?;
        tx.commit().await?;

        Ok(group)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, caller: AccountId, id: StudyGroupId) -> PgResult<()> {
        let mut tx = Tx::begin(self.pool).await?;
        Self::lock_owned(&mut tx, caller, id).await?;

        sqlx::query("DELETE FROM study_group WHERE id = $1")
            .bind(id)
            .execute(tx.conn()?)
            .await?;

        tx.commit().await?;
        tracing::info!(group = %id, "study group deleted");

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn join(&self, caller: AccountId, id: StudyGroupId) -> PgResult<GroupMember> {
        let mut tx = Tx::begin(self.pool).await?;
        let group = Self::lock_group(&mut tx, id).await?;

        let already_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM study_group_member WHERE study_group_id = $1 AND account_id = $2
            )
            "#,
        )
        .bind(id)
        .bind(caller)
        .fetch_one(tx.conn()?)
        .await?;

        group.snapshot().check_join(already_member)?;

        let member = sqlx::query_as::<_, GroupMember>(&format!(
            r#"
            INSERT INTO study_group_member (study_group_id, account_id, role)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::MEMBER_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .bind(MemberRole::Member.as_str())
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        tracing::info!(group = %id, account = %caller, "joined study group");

        Ok(member)
    }

    #[instrument(skip(self))]
    pub async fn leave(&self, caller: AccountId, id: StudyGroupId) -> PgResult<()> {
        let mut tx = Tx::begin(self.pool).await?;
        let group = Self::lock_group(&mut tx, id).await?;

        group.snapshot().check_leave(caller)?;

        let removed = sqlx::query(
            "DELETE FROM study_group_member WHERE study_group_id = $1 AND account_id = $2",
        )
        .bind(id)
        .bind(caller)
        .execute(tx.conn()?)
        .await?
        .rows_affected();

        if removed == 0 {
            return Err(DomainError::validation("Not a member of this group.").into());
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn members(&self, caller: AccountId, id: StudyGroupId) -> PgResult<Vec<GroupMember>> {
        self.get_visible(caller, id).await?;

        Ok(sqlx::query_as::<_, GroupMember>(&format!(
            "SELECT {} FROM study_group_member WHERE study_group_id = $1 ORDER BY joined_at, id",
            sql_fragment::MEMBER_FIELDS
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?)
    }

    /// Changes a member's role. Only admins may do this and the creator always stays admin.
    #[instrument(skip(self))]
    pub async fn change_role(
        &self,
        caller: AccountId,
        id: StudyGroupId,
        member: GroupMemberId,
        change: &RoleChange,
    ) -> PgResult<GroupMember> {
        let mut tx = Tx::begin(self.pool).await?;
        let group = Self::lock_group(&mut tx, id).await?;

        let actor_role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM study_group_member WHERE study_group_id = $1 AND account_id = $2",
        )
        .bind(id)
        .bind(caller)
        .fetch_optional(tx.conn()?)
        .await?
        .map(MemberRole::try_from)
        .transpose()?;

        let target = sqlx::query_scalar::<_, AccountId>(
            "SELECT account_id FROM study_group_member WHERE id = $1 AND study_group_id = $2",
        )
        .bind(member)
        .bind(id)
        .fetch_optional(tx.conn()?)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("Member {member} not found.")))?;

        group
            .snapshot()
            .check_role_change(actor_role, target, change.role)?;

        let member = sqlx::query_as::<_, GroupMember>(&format!(
            "UPDATE study_group_member SET role = $2 WHERE id = $1 RETURNING {}",
            sql_fragment::MEMBER_FIELDS
        ))
        .bind(member)
        .bind(change.role.as_str())
        .fetch_one(tx.conn()?)
        .await?;

        tx.commit().await?;
        Ok(member)
    }

    async fn require_member(&self, caller: AccountId, id: StudyGroupId) -> PgResult<()> {
        if !self.exists(id).await? {
            return Err(DomainError::not_found(format!("Study group {id} not found.")).into());
        }
        if self.role_of(id, caller).await?.is_none() {
            return Err(DomainError::forbidden("You are not a member of this group.").into());
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn messages(&self, caller: AccountId, id: StudyGroupId) -> PgResult<Vec<GroupMessage>> {
        self.require_member(caller, id).await?;

        Ok(sqlx::query_as::<_, GroupMessage>(&format!(
            "SELECT {} FROM study_group_message WHERE study_group_id = $1 ORDER BY created_at, id",
            sql_fragment::GROUP_MESSAGE_FIELDS
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?)
    }

    #[instrument(skip(self, req))]
    pub async fn send_message(
        &self,
        caller: AccountId,
        id: StudyGroupId,
        req: &CreateMessage,
    ) -> PgResult<GroupMessage> {
        if req.content.trim().is_empty() {
            return Err(DomainError::validation("Message content is required.").into());
        }
        self.require_member(caller, id).await?;

        Ok(sqlx::query_as::<_, GroupMessage>(&format!(
            r#"
            INSERT INTO study_group_message (study_group_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            sql_fragment::GROUP_MESSAGE_FIELDS
        ))
        .bind(id)
        .bind(caller)
        .bind(&req.content)
        .fetch_one(self.pool)
        .await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::models::LearningPathId;
    use crate::db::test_util::{create_account, test_pool};

    fn new_group(max_members: i64, is_private: bool) -> CreateStudyGroup {
        CreateStudyGroup {
            name: String::from("Borrow checker support group"),
            description: String::new(),
            is_private,
            max_members,
            learning_path_id: None,
            skill_ids: Vec::new(),
        }
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_join_at_capacity_conflicts() {
        let pool = test_pool().await;
        let repo = StudyGroupRepository::new(pool);
        let creator = create_account(pool).await;
        let group = repo.create(creator, &new_group(2, false)).await.unwrap();
        assert_eq!(group.member_count, 1);

        let second = create_account(pool).await;
        let member = repo.join(second, group.id).await.unwrap();
        assert_eq!(member.role, MemberRole::Member);

        let again = repo.join(second, group.id).await.unwrap_err();
        assert!(matches!(again, PgError::Domain(DomainError::Conflict(_))));

        let third = create_account(pool).await;
        let full = repo.join(third, group.id).await.unwrap_err();
        assert!(matches!(full, PgError::Domain(DomainError::Conflict(_))));

        let group = repo.get_visible(creator, group.id).await.unwrap();
        assert_eq!(group.member_count, 2);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_creator_cannot_leave() {
        let pool = test_pool().await;
        let repo = StudyGroupRepository::new(pool);
        let creator = create_account(pool).await;
        let group = repo.create(creator, &new_group(5, false)).await.unwrap();

        let err = repo.leave(creator, group.id).await.unwrap_err();
        assert!(matches!(err, PgError::Domain(DomainError::Conflict(_))));

        let members = repo.members(creator, group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, MemberRole::Admin);
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_private_group_hidden_and_closed() {
        let pool = test_pool().await;
        let repo = StudyGroupRepository::new(pool);
        let creator = create_account(pool).await;
        let outsider = create_account(pool).await;
        let group = repo.create(creator, &new_group(5, true)).await.unwrap();

        let read = repo.get_visible(outsider, group.id).await.unwrap_err();
        assert!(matches!(read, PgError::Domain(DomainError::NotFound(_))));

        let join = repo.join(outsider, group.id).await.unwrap_err();
        assert!(matches!(join, PgError::Domain(DomainError::Forbidden(_))));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_unknown_learning_path_is_a_bad_reference() {
        let pool = test_pool().await;
        let creator = create_account(pool).await;

        let err = StudyGroupRepository::new(pool)
            .create(
                creator,
                &CreateStudyGroup {
                    learning_path_id: Some(LearningPathId(i64::MAX)),
                    ..new_group(5, false)
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_foreign_key_violation());
    }
}
