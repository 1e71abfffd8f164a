use crate::db::models::AccountId;
use crate::domain::{DomainError, DomainResult};

pub fn check_can_post(is_locked: bool) -> DomainResult<()> {
    if is_locked {
        return Err(DomainError::conflict(
            "This topic is locked and does not accept new posts.",
        ));
    }

    Ok(())
}

/// Returns whether marking pays the post author; repeated marking is accepted but pays nothing.
pub fn mark_solution(
    topic_author: AccountId,
    caller: AccountId,
    already_solution: bool,
) -> DomainResult<bool> {
    if topic_author != caller {
        return Err(DomainError::forbidden(
            "Only the topic author can mark a solution.",
        ));
    }

    Ok(!already_solution)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_locked_topic_refuses_posts() {
        assert!(check_can_post(false).is_ok());
        assert!(matches!(check_can_post(true), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn test_solution_rewarded_once() {
        assert_eq!(mark_solution(AccountId(1), AccountId(1), false), Ok(true));
        assert_eq!(mark_solution(AccountId(1), AccountId(1), true), Ok(false));
        assert!(matches!(
            mark_solution(AccountId(1), AccountId(2), false),
            Err(DomainError::Forbidden(_))
        ));
    }
}
