use crate::domain::{DomainError, DomainResult};

crate::string_enum! {
    pub enum CompanySize {
        Tiny => "1-10",
        Small => "11-50",
        Medium => "51-200",
        Large => "201-500",
        Huge => "501-1000",
        Enterprise => "1001+",
    }
}

crate::string_enum! {
    pub enum JobType {
        FullTime => "full_time",
        PartTime => "part_time",
        Contract => "contract",
        Internship => "internship",
        Remote => "remote",
    }
}

crate::string_enum! {
    pub enum ExperienceLevel {
        Entry => "entry",
        Mid => "mid",
        Senior => "senior",
        Executive => "executive",
    }
}

crate::string_enum! {
    pub enum EducationLevel {
        HighSchool => "high_school",
        Associate => "associate",
        Bachelor => "bachelor",
        Master => "master",
        Phd => "phd",
        NoRequirement => "none",
    }
}

crate::string_enum! {
    pub enum ApplicationStatus {
        Applied => "applied",
        UnderReview => "under_review",
        Interview => "interview",
        Offer => "offer",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

impl ApplicationStatus {
    pub fn withdraw(self) -> DomainResult<ApplicationStatus> {
        match self {
            ApplicationStatus::Rejected | ApplicationStatus::Withdrawn => Err(
                DomainError::conflict(format!("Cannot withdraw an application that is {self}.")),
            ),
            _ => Ok(ApplicationStatus::Withdrawn),
        }
    }
}

/// Both fields are required and must carry more than whitespace.
pub fn check_application(cover_letter: &str, resume: &str) -> DomainResult<()> {
    if cover_letter.trim().is_empty() {
        return Err(DomainError::validation("A cover letter is required."));
    }

    if resume.trim().is_empty() {
        return Err(DomainError::validation("A resume is required."));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_withdraw() {
        for open in [
            ApplicationStatus::Applied,
            ApplicationStatus::UnderReview,
            ApplicationStatus::Interview,
            ApplicationStatus::Offer,
        ] {
            assert_eq!(open.withdraw(), Ok(ApplicationStatus::Withdrawn));
        }

        assert!(matches!(
            ApplicationStatus::Rejected.withdraw(),
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            ApplicationStatus::Withdrawn.withdraw(),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn test_application_fields_required() {
        assert!(check_application("hello", "https://files/cv.pdf").is_ok());
        assert!(matches!(
            check_application("  ", "cv"),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            check_application("hello", ""),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_company_size_text() {
        assert_eq!("1001+".parse::<CompanySize>().unwrap(), CompanySize::Enterprise);
        assert_eq!(CompanySize::Tiny.as_str(), "1-10");
    }
}
