use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use crate::db::models::account::{Badge, EarnedBadge, LeaderboardEntry};
use crate::db::models::{AccountId, BadgeId, Pagination};
use crate::db::repositories::{Reward, Tx};
use crate::domain::gamification::{XpDelta, XpSource};

/// XP, levels, badges and the leaderboard.
#[derive(Debug)]
pub struct GamificationRepository {
    pool: &'static Pool<Postgres>,
}

impl GamificationRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Awards XP in a transaction of its own, then evaluates unlocks.
    ///
    /// Operations that already hold a [`Tx`] call [`Tx::reward`] directly so the award commits
    /// with the state change that earned it.
    #[instrument(skip(self))]
    pub async fn award_xp(
        &self,
        account: AccountId,
        delta: XpDelta,
        source: XpSource,
    ) -> SqlxResult<Reward> {
        let mut tx = Tx::begin(self.pool).await?;
        let reward = tx.reward(account, delta, source).await?;
        tx.commit().await?;

        Ok(reward)
    }

    #[instrument(skip(self))]
    pub async fn badges(&self) -> SqlxResult<Vec<Badge>> {
        sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon, xp_reward, required_level, required_courses, created_at
            FROM badge
            ORDER BY required_level, id
            "#,
        )
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn badge(&self, id: BadgeId) -> SqlxResult<Option<Badge>> {
        sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon, xp_reward, required_level, required_courses, created_at
            FROM badge
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn earned_badges(&self, account: AccountId) -> SqlxResult<Vec<EarnedBadge>> {
        sqlx::query_as::<_, EarnedBadge>(
            r#"
            SELECT
                b.id AS badge_id,
                b.name,
                b.description,
                b.icon,
                b.xp_reward,
                ub.earned_at
            FROM user_badge ub
            JOIN badge b ON b.id = ub.badge_id
            WHERE ub.account_id = $1
            ORDER BY ub.earned_at DESC
            "#,
        )
        .bind(account)
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn leaderboard(
        &self,
        pagination: &Pagination,
    ) -> SqlxResult<(Vec<LeaderboardEntry>, i64)> {
        let entries = match sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT id, username, avatar, xp_points, level, ranking
            FROM account_leaderboard
            ORDER BY ranking, created_at, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = ?e, "failed to fetch leaderboard page");
                return Err(e);
            }
        };

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM account_leaderboard")
            .fetch_one(self.pool)
            .await?;

        Ok((entries, total))
    }
}

#[cfg(test)]
mod test {
    use futures::future::join_all;

    use super::*;
    use crate::db::repositories::Repository;
    use crate::db::repositories::account::AccountRepository;
    use crate::db::test_util::{create_account, test_pool};

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_award_crosses_level_boundary() {
        let pool = test_pool().await;
        let account = create_account(pool).await;
        let repo = GamificationRepository::new(pool);

        repo.award_xp(account, XpDelta::new(950).unwrap(), XpSource::StaffGrant)
            .await
            .unwrap();
        let reward = repo
            .award_xp(account, XpDelta::new(100).unwrap(), XpSource::StaffGrant)
            .await
            .unwrap();

        assert_eq!(reward.award.xp_points, 1050);
        assert_eq!(reward.award.level, 2);
        assert_eq!(reward.award.previous_level, 1);
        assert!(reward.award.leveled_up);

        let row = AccountRepository::new(pool).require(account).await.unwrap();
        assert_eq!((row.xp_points, row.level), (1050, 2));
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn test_concurrent_awards_are_not_lost() {
        let pool = test_pool().await;
        let account = create_account(pool).await;

        let handles = (0..25).map(|_| {
            tokio::spawn(async move {
                GamificationRepository::new(pool)
                    .award_xp(account, XpDelta::new(100).unwrap(), XpSource::StaffGrant)
                    .await
            })
        });

        for result in join_all(handles).await {
            result.unwrap().unwrap();
        }

        let row = AccountRepository::new(pool).require(account).await.unwrap();
        assert_eq!(row.xp_points, 2500);
        assert_eq!(row.level, 3);
    }
}
