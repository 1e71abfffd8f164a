//! Business rules shared by every module, kept free of I/O so the repositories can load state,
//! ask these functions what should happen, and persist the answer.

use thiserror::Error;

pub mod forum;
pub mod gamification;
pub mod jobs;
pub mod mentorship;
pub mod progress;
pub mod rating;
pub mod study_group;

pub type DomainResult<T> = core::result::Result<T, DomainError>;

/// Rule violations, each of which maps onto one HTTP status family.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Declares a closed set of states stored as lowercase text.
///
/// Rows decode these through `#[sqlx(try_from = "String")]` and queries bind `as_str()`, so the
/// database never sees a value outside the listed set.
#[macro_export]
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::domain::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::domain::DomainError::Validation(format!(
                        "invalid {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::domain::DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    crate::string_enum! {
        enum Light {
            Red => "red",
            Green => "green",
        }
    }

    #[test]
    fn test_string_enum_parses_listed_values_only() {
        assert_eq!("red".parse::<Light>().unwrap(), Light::Red);
        assert_eq!(Light::try_from(String::from("green")).unwrap(), Light::Green);
        assert!(matches!(
            "blue".parse::<Light>(),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(Light::ALL.len(), 2);
    }

    #[test]
    fn test_string_enum_serializes_as_text() {
        assert_eq!(serde_json::to_string(&Light::Green).unwrap(), "\"green\"");
        let parsed: Light = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(parsed, Light::Red);
    }
}
