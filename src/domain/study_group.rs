use crate::db::models::AccountId;
use crate::domain::{DomainError, DomainResult};

crate::string_enum! {
    pub enum MemberRole {
        Member => "member",
        Moderator => "moderator",
        Admin => "admin",
    }
}

/// Membership facts about one group, loaded under a row lock before a membership change.
#[derive(Debug, Clone, Copy)]
pub struct GroupSnapshot {
    pub creator_id: AccountId,
    pub is_private: bool,
    pub max_members: i64,
    pub member_count: i64,
}

impl GroupSnapshot {
    pub fn check_join(&self, already_member: bool) -> DomainResult<()> {
        if already_member {
            return Err(DomainError::conflict("You are already a member of this group."));
        }

        if self.is_private {
            return Err(DomainError::forbidden(
                "This is a private group. You need an invitation to join.",
            ));
        }

        if self.member_count >= self.max_members {
            return Err(DomainError::conflict("This group has reached its maximum capacity."));
        }

        Ok(())
    }

    pub fn check_leave(&self, account: AccountId) -> DomainResult<()> {
        if account == self.creator_id {
            return Err(DomainError::conflict(
                "As the creator, you cannot leave the group. You can delete it instead.",
            ));
        }

        Ok(())
    }

    /// `actor_role` is `None` when the caller is not a member at all.
    pub fn check_role_change(
        &self,
        actor_role: Option<MemberRole>,
        target: AccountId,
        new_role: MemberRole,
    ) -> DomainResult<()> {
        if actor_role != Some(MemberRole::Admin) {
            return Err(DomainError::forbidden("Only admins can change member roles."));
        }

        if target == self.creator_id && new_role != MemberRole::Admin {
            return Err(DomainError::conflict("Cannot change the role of the group creator."));
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn group(member_count: i64) -> GroupSnapshot {
        GroupSnapshot {
            creator_id: AccountId(1),
            is_private: false,
            max_members: 3,
            member_count,
        }
    }

    #[test]
    fn test_join_rules() {
        assert!(group(2).check_join(false).is_ok());
        assert!(matches!(group(3).check_join(false), Err(DomainError::Conflict(_))));
        assert!(matches!(group(1).check_join(true), Err(DomainError::Conflict(_))));

        let private = GroupSnapshot {
            is_private: true,
            ..group(1)
        };
        assert!(matches!(private.check_join(false), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn test_creator_cannot_leave() {
        assert!(matches!(
            group(2).check_leave(AccountId(1)),
            Err(DomainError::Conflict(_))
        ));
        assert!(group(2).check_leave(AccountId(2)).is_ok());
    }

    #[test]
    fn test_role_changes_need_admin() {
        let g = group(2);

        assert!(matches!(
            g.check_role_change(Some(MemberRole::Moderator), AccountId(2), MemberRole::Admin),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            g.check_role_change(None, AccountId(2), MemberRole::Member),
            Err(DomainError::Forbidden(_))
        ));
        assert!(g
            .check_role_change(Some(MemberRole::Admin), AccountId(2), MemberRole::Moderator)
            .is_ok());
    }

    #[test]
    fn test_creator_stays_admin() {
        let g = group(2);

        assert!(matches!(
            g.check_role_change(Some(MemberRole::Admin), AccountId(1), MemberRole::Member),
            Err(DomainError::Conflict(_))
        ));
        assert!(g
            .check_role_change(Some(MemberRole::Admin), AccountId(1), MemberRole::Admin)
            .is_ok());
    }
}
