//! Mentorship request and mentorship status rules.

use crate::domain::{DomainError, DomainResult};

crate::string_enum! {
    pub enum RequestStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

crate::string_enum! {
    pub enum RequestAction {
        Accept => "accept",
        Reject => "reject",
        Cancel => "cancel",
    }
}

crate::string_enum! {
    pub enum MentorshipStatus {
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Terminated => "terminated",
    }
}

/// Which side of a request the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Mentor,
    Mentee,
    Outsider,
}

impl RequestStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Applies `action` on behalf of `party`.
    ///
    /// Terminal states are checked before authorization: a processed request reports a
    /// conflict to whoever touches it.
    pub fn transition(self, action: RequestAction, party: Party) -> DomainResult<RequestStatus> {
        if self.is_terminal() {
            return Err(DomainError::conflict("This request has already been processed."));
        }

        match (action, party) {
            (RequestAction::Accept, Party::Mentor) => Ok(RequestStatus::Accepted),
            (RequestAction::Reject, Party::Mentor) => Ok(RequestStatus::Rejected),
            (RequestAction::Cancel, Party::Mentee) => Ok(RequestStatus::Cancelled),
            (RequestAction::Accept | RequestAction::Reject, _) => Err(DomainError::forbidden(
                "Only the requested mentor can respond to this request.",
            )),
            (RequestAction::Cancel, _) => Err(DomainError::forbidden(
                "Only the mentee can cancel this request.",
            )),
        }
    }
}

impl MentorshipStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, MentorshipStatus::Completed | MentorshipStatus::Terminated)
    }

    /// `active <-> paused`, and either of those into `completed` or `terminated`.
    pub fn transition(self, next: MentorshipStatus) -> DomainResult<MentorshipStatus> {
        use MentorshipStatus::*;

        if self.is_terminal() {
            return Err(DomainError::conflict(format!(
                "A {self} mentorship cannot change status."
            )));
        }

        match (self, next) {
            (Active, Paused) | (Paused, Active) => Ok(next),
            (Active | Paused, Completed | Terminated) => Ok(next),
            _ => Err(DomainError::validation(format!(
                "Cannot move a mentorship from {self} to {next}."
            ))),
        }
    }
}

/// Refuses a new mentee once the mentor is at `max_mentees` active mentorships.
pub fn check_capacity(active_mentorships: i64, max_mentees: i64) -> DomainResult<()> {
    if active_mentorships >= max_mentees {
        return Err(DomainError::conflict(
            "This mentor is not accepting additional mentees.",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pending_request_transitions() {
        assert_eq!(
            RequestStatus::Pending.transition(RequestAction::Accept, Party::Mentor),
            Ok(RequestStatus::Accepted)
        );
        assert_eq!(
            RequestStatus::Pending.transition(RequestAction::Reject, Party::Mentor),
            Ok(RequestStatus::Rejected)
        );
        assert_eq!(
            RequestStatus::Pending.transition(RequestAction::Cancel, Party::Mentee),
            Ok(RequestStatus::Cancelled)
        );
    }

    #[test]
    fn test_terminal_requests_reject_every_transition() {
        let terminal = [
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ];
        let parties = [Party::Mentor, Party::Mentee, Party::Outsider];

        for status in terminal {
            for action in RequestAction::ALL {
                for party in parties {
                    assert_eq!(
                        status.transition(*action, party),
                        Err(DomainError::conflict(
                            "This request has already been processed."
                        ))
                    );
                }
            }
        }
    }

    #[test]
    fn test_wrong_party_is_forbidden() {
        assert!(matches!(
            RequestStatus::Pending.transition(RequestAction::Accept, Party::Mentee),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            RequestStatus::Pending.transition(RequestAction::Reject, Party::Outsider),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            RequestStatus::Pending.transition(RequestAction::Cancel, Party::Mentor),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn test_mentorship_status_graph() {
        use MentorshipStatus::*;

        assert_eq!(Active.transition(Paused), Ok(Paused));
        assert_eq!(Paused.transition(Active), Ok(Active));
        assert_eq!(Paused.transition(Completed), Ok(Completed));
        assert_eq!(Active.transition(Terminated), Ok(Terminated));

        assert!(matches!(Active.transition(Active), Err(DomainError::Validation(_))));
        assert!(matches!(Completed.transition(Active), Err(DomainError::Conflict(_))));
        assert!(matches!(Terminated.transition(Paused), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn test_capacity() {
        assert!(check_capacity(4, 5).is_ok());
        assert!(matches!(check_capacity(5, 5), Err(DomainError::Conflict(_))));
    }
}
