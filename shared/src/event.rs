use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::FormConfig;
use crate::model::{FileKind, FormField, SelectedFile};

/// Identifies one submission attempt so a late response can be matched or dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Event {
    Configure(FormConfig),

    FieldChanged {
        field: FormField,
        value: String,
    },
    SameAsResidentialToggled {
        checked: bool,
    },
    FileSelected {
        index: usize,
        file: Option<SelectedFile>,
    },
    FileKindChanged {
        index: usize,
        kind: FileKind,
    },
    FileEntryAdded,
    FileEntryRemoved {
        index: usize,
    },

    /// `today` is supplied by the shell so the age rule has a single, explicit clock.
    SubmitRequested {
        today: NaiveDate,
    },
    ToastDismissed,

    #[serde(skip)]
    SubmitResponse {
        submission: SubmissionId,
        result: Box<crux_http::Result<crux_http::Response<Vec<u8>>>>,
    },
}

impl Event {
    #[must_use]
    pub fn submit_now() -> Self {
        Self::SubmitRequested {
            today: chrono::Local::now().date_naive(),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::FieldChanged { .. } => "field_changed",
            Self::SameAsResidentialToggled { .. } => "same_as_residential_toggled",
            Self::FileSelected { .. } => "file_selected",
            Self::FileKindChanged { .. } => "file_kind_changed",
            Self::FileEntryAdded => "file_entry_added",
            Self::FileEntryRemoved { .. } => "file_entry_removed",
            Self::SubmitRequested { .. } => "submit_requested",
            Self::ToastDismissed => "toast_dismissed",
            Self::SubmitResponse { .. } => "submit_response",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(self, Self::Configure(_) | Self::SubmitResponse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_events_deserialize_with_wire_names() {
        let event: Event =
            serde_json::from_str(r#"{"FieldChanged":{"field":"residentialAddress1","value":"1 Main St"}}"#)
                .unwrap();

        assert!(matches!(
            event,
            Event::FieldChanged { field: FormField::ResidentialAddress1, ref value } if value == "1 Main St"
        ));
    }

    #[test]
    fn test_submit_date_deserializes() {
        let event: Event = serde_json::from_str(r#"{"SubmitRequested":{"today":"2024-06-15"}}"#).unwrap();
        assert!(matches!(
            event,
            Event::SubmitRequested { today } if today == NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        ));
    }

    #[test]
    fn test_unknown_field_name_rejected() {
        let result = serde_json::from_str::<Event>(r#"{"FieldChanged":{"field":"sameAsResidential","value":"x"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_event_names_and_origin() {
        assert_eq!(Event::FileEntryAdded.name(), "file_entry_added");
        assert!(Event::ToastDismissed.is_user_initiated());
        assert!(!Event::Configure(FormConfig::default()).is_user_initiated());
    }
}
