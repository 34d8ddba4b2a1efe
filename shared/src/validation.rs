use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FormConfig;
use crate::model::{FormField, FormState};

pub const DOB_FORMAT: &str = "%Y-%m-%d";

/// How the minimum-age rule compares birth date and today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgePolicy {
    /// Year difference, with month and day compared independently on the boundary year.
    /// A birth date on the 31st can be rejected on the 30th of a later month.
    #[default]
    ComponentWise,
    /// Completed calendar years.
    Calendar,
}

impl AgePolicy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "component_wise" | "componentwise" => Some(Self::ComponentWise),
            "calendar" => Some(Self::Calendar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{} is required", .0.label())]
    RequiredField(FormField),

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("dob too young or missing")]
    DobTooYoungOrMissing { minimum_age_years: u32 },
}

impl ValidationError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::RequiredField(field) => format!("{} is required.", field.label()),
            Self::InvalidEmail => "Please enter a valid e-mail address.".into(),
            Self::DobTooYoungOrMissing { minimum_age_years } => {
                format!("Date of birth must be at least {minimum_age_years} years ago.")
            }
        }
    }

    #[must_use]
    pub const fn field(&self) -> FormField {
        match self {
            Self::RequiredField(field) => *field,
            Self::InvalidEmail => FormField::Email,
            Self::DobTooYoungOrMissing { .. } => FormField::Dob,
        }
    }
}

#[must_use]
pub fn parse_dob(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DOB_FORMAT).ok()
}

/// Completed years between `dob` and `today`; negative for dates in the future.
#[must_use]
pub fn calendar_age(dob: NaiveDate, today: NaiveDate) -> i32 {
    let years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years - 1
    } else {
        years
    }
}

#[must_use]
pub fn meets_minimum_age(dob: NaiveDate, today: NaiveDate, minimum_years: u32, policy: AgePolicy) -> bool {
    let Ok(minimum) = i32::try_from(minimum_years) else {
        return false;
    };
    match policy {
        AgePolicy::ComponentWise => {
            let diff = today.year() - dob.year();
            diff > minimum
                || (diff == minimum && today.month() >= dob.month() && today.day() >= dob.day())
        }
        AgePolicy::Calendar => calendar_age(dob, today) >= minimum,
    }
}

/// Loose structural check in the spirit of an `<input type="email">`.
#[must_use]
pub fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn required_fields(form: &FormState) -> impl Iterator<Item = FormField> + '_ {
    FormField::ALL.into_iter().filter(move |field| match field {
        FormField::Dob => false,
        FormField::PermanentAddress1 | FormField::PermanentAddress2 => !form.same_as_residential(),
        _ => true,
    })
}

/// Runs every pre-submit check; the first failure wins.
pub fn validate_for_submit(form: &FormState, today: NaiveDate, config: &FormConfig) -> Result<(), ValidationError> {
    if config.enforce_required_fields {
        if let Some(missing) = required_fields(form).find(|f| form.field(*f).trim().is_empty()) {
            return Err(ValidationError::RequiredField(missing));
        }
    }

    let email = form.field(FormField::Email);
    if !email.is_empty() && !is_plausible_email(email) {
        return Err(ValidationError::InvalidEmail);
    }

    let old_enough = parse_dob(form.field(FormField::Dob)).is_some_and(|dob| {
        meets_minimum_age(dob, today, config.minimum_age_years, config.age_policy)
    });
    if !old_enough {
        return Err(ValidationError::DobTooYoungOrMissing {
            minimum_age_years: config.minimum_age_years,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn complete_form(dob: &str) -> FormState {
        FormState::default()
            .set_field(FormField::FirstName, "Ada")
            .set_field(FormField::LastName, "Lovelace")
            .set_field(FormField::Email, "ada@example.com")
            .set_field(FormField::Dob, dob)
            .set_field(FormField::ResidentialAddress1, "12 St James's Sq")
            .set_field(FormField::ResidentialAddress2, "London")
            .set_same_as_residential(true)
    }

    mod age_tests {
        use super::*;

        const TODAY: (i32, u32, u32) = (2024, 6, 15);

        fn today() -> NaiveDate {
            date(TODAY.0, TODAY.1, TODAY.2)
        }

        #[test]
        fn test_exact_birthday_is_accepted() {
            for policy in [AgePolicy::ComponentWise, AgePolicy::Calendar] {
                assert!(meets_minimum_age(date(2006, 6, 15), today(), 18, policy));
            }
        }

        #[test]
        fn test_one_day_short_is_rejected() {
            for policy in [AgePolicy::ComponentWise, AgePolicy::Calendar] {
                assert!(!meets_minimum_age(date(2006, 6, 16), today(), 18, policy));
            }
        }

        #[test]
        fn test_one_day_over_is_accepted() {
            for policy in [AgePolicy::ComponentWise, AgePolicy::Calendar] {
                assert!(meets_minimum_age(date(2006, 6, 14), today(), 18, policy));
            }
        }

        #[test]
        fn test_component_wise_boundary_quirk() {
            // Born 31 May, checked on 30 June of the 18th year: a calendar says 18.
            let dob = date(2006, 5, 31);
            let today = date(2024, 6, 30);

            assert!(!meets_minimum_age(dob, today, 18, AgePolicy::ComponentWise));
            assert!(meets_minimum_age(dob, today, 18, AgePolicy::Calendar));
        }

        #[test]
        fn test_future_dob_is_rejected() {
            assert!(!meets_minimum_age(date(2030, 1, 1), today(), 18, AgePolicy::ComponentWise));
            assert_eq!(calendar_age(date(2030, 1, 1), today()), -6);
        }

        #[test]
        fn test_parse_dob() {
            assert_eq!(parse_dob("2006-06-15"), Some(date(2006, 6, 15)));
            assert_eq!(parse_dob(""), None);
            assert_eq!(parse_dob("15/06/2006"), None);
            assert_eq!(parse_dob("2006-02-30"), None);
        }

        #[test]
        fn test_policy_parse() {
            assert_eq!(AgePolicy::parse("Calendar"), Some(AgePolicy::Calendar));
            assert_eq!(AgePolicy::parse("component_wise"), Some(AgePolicy::ComponentWise));
            assert_eq!(AgePolicy::parse("lunar"), None);
        }
    }

    mod email_tests {
        use super::*;

        #[test]
        fn test_plausible_addresses() {
            assert!(is_plausible_email("ada@example.com"));
            assert!(is_plausible_email("a.b+c@mail-1.example.org"));
            assert!(is_plausible_email("root@localhost"));
        }

        #[test]
        fn test_implausible_addresses() {
            assert!(!is_plausible_email("ada"));
            assert!(!is_plausible_email("@example.com"));
            assert!(!is_plausible_email("ada@"));
            assert!(!is_plausible_email("ada@@example.com"));
            assert!(!is_plausible_email("ada@exa mple.com"));
            assert!(!is_plausible_email("ada@example..com"));
        }
    }

    mod submit_check_tests {
        use super::*;

        fn today() -> NaiveDate {
            date(2024, 6, 15)
        }

        #[test]
        fn test_complete_form_passes() {
            let form = complete_form("2000-01-01");
            assert_eq!(validate_for_submit(&form, today(), &FormConfig::default()), Ok(()));
        }

        #[test]
        fn test_missing_dob_fails_age_check() {
            let form = complete_form("");
            let err = validate_for_submit(&form, today(), &FormConfig::default()).unwrap_err();

            assert_eq!(err, ValidationError::DobTooYoungOrMissing { minimum_age_years: 18 });
            assert_eq!(err.user_message(), "Date of birth must be at least 18 years ago.");
        }

        #[test]
        fn test_missing_first_name_reported_first() {
            let form = complete_form("2010-01-01").set_field(FormField::FirstName, "  ");
            let err = validate_for_submit(&form, today(), &FormConfig::default()).unwrap_err();

            assert_eq!(err, ValidationError::RequiredField(FormField::FirstName));
        }

        #[test]
        fn test_permanent_required_only_when_unlinked() {
            let form = complete_form("2000-01-01").set_same_as_residential(false);
            let err = validate_for_submit(&form, today(), &FormConfig::default()).unwrap_err();

            assert_eq!(err, ValidationError::RequiredField(FormField::PermanentAddress1));
        }

        #[test]
        fn test_required_checks_can_be_disabled() {
            let config = FormConfig {
                enforce_required_fields: false,
                ..FormConfig::default()
            };
            let form = FormState::default().set_field(FormField::Dob, "2000-01-01");

            assert_eq!(validate_for_submit(&form, today(), &config), Ok(()));
        }

        #[test]
        fn test_bad_email_rejected() {
            let form = complete_form("2000-01-01").set_field(FormField::Email, "not-an-email");
            let err = validate_for_submit(&form, today(), &FormConfig::default()).unwrap_err();

            assert_eq!(err, ValidationError::InvalidEmail);
            assert_eq!(err.field(), FormField::Email);
        }

        #[test]
        fn test_configured_minimum_age_flows_into_message() {
            let config = FormConfig {
                minimum_age_years: 21,
                ..FormConfig::default()
            };
            let form = complete_form("2004-01-01");
            let err = validate_for_submit(&form, today(), &config).unwrap_err();

            assert_eq!(err.user_message(), "Date of birth must be at least 21 years ago.");
        }
    }
}
