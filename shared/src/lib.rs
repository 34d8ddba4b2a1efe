//! Headless core of the registration form.
//!
//! The shell forwards user input as [`Event`]s; the core owns the [`FormState`], validates and
//! serializes it on submit, and asks the shell to perform the single HTTP request.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod multipart;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::SubmitFailure;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ConfigError, FormConfig};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::{Event, SubmissionId};
pub use model::{FileEntry, FileKind, FormError, FormField, FormState, SelectedFile};
pub use validation::{AgePolicy, ValidationError};

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Form submitted successfully!";
pub const SUBMIT_FAILURE_MESSAGE: &str = "Error submitting form.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    IndexOutOfRange,
    Transport,
    ServerRejection,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            Self::Transport => "TRANSPORT_FAILURE",
            Self::ServerRejection => "SERVER_REJECTION",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Transport | Self::ServerRejection => ErrorSeverity::Transient,
            Self::Validation => ErrorSeverity::Permanent,
            Self::IndexOutOfRange | Self::Configuration => ErrorSeverity::Fatal,
        }
    }

    /// Whether the user can usefully press submit again without changing anything.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::ServerRejection)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Validation | ErrorKind::ServerRejection => self.message.clone(),
            ErrorKind::Transport => SUBMIT_FAILURE_MESSAGE.into(),
            ErrorKind::Configuration => {
                "Registration is not available right now. Please try again later.".into()
            }
            ErrorKind::IndexOutOfRange => "Something went wrong with the document list.".into(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.user_message())
            .with_internal(e.to_string())
            .with_context("field", e.field().wire_name())
    }
}

impl From<FormError> for AppError {
    fn from(e: FormError) -> Self {
        let error = AppError::new(ErrorKind::IndexOutOfRange, e.to_string());
        match e {
            FormError::IndexOutOfRange { index, len } => error
                .with_context("index", index.to_string())
                .with_context("len", len.to_string()),
            FormError::ProtectedEntry => error.with_context("index", "0"),
        }
    }
}

impl From<SubmitFailure> for AppError {
    fn from(e: SubmitFailure) -> Self {
        match e {
            SubmitFailure::TransportFailure { reason } => {
                AppError::new(ErrorKind::Transport, SUBMIT_FAILURE_MESSAGE).with_internal(reason)
            }
            SubmitFailure::ServerRejection { status, message } => AppError::new(
                ErrorKind::ServerRejection,
                message.unwrap_or_else(|| SUBMIT_FAILURE_MESSAGE.into()),
            )
            .with_context("http_status", status.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string()).with_context("source", e.source_name())
    }
}

/// A notification the shell shows until it expires or the user dismisses it.
///
/// Carries no timestamp: the shell owns the clock and runs `duration_ms` from when it renders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Success => 2000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub form: FormState,
    pub revision: u64,
    pub config: FormConfig,
    pub in_flight: Option<SubmissionId>,
    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Model {
    /// Installs the result of a transition as the current form.
    pub fn replace_form(&mut self, next: FormState) {
        self.form = next;
        self.revision += 1;
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    #[must_use]
    pub const fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
    pub field: Option<String>,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
            field: e.context.get("field").cloned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntryView {
    pub index: usize,
    pub name: String,
    pub kind: FileKind,
    pub has_file: bool,
    pub size_bytes: usize,
    pub removable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub dob: String,
    pub residential_address1: String,
    pub residential_address2: String,
    pub same_as_residential: bool,
    pub permanent_address_editable: bool,
    pub permanent_address1: String,
    pub permanent_address2: String,
    pub files: Vec<FileEntryView>,
    pub can_add_file: bool,
    pub is_submitting: bool,
    pub toast: Option<ToastView>,
    pub error: Option<UserFacingError>,
    pub revision: u64,
}

pub mod app {
    use super::*;
    use crate::capabilities::{interpret_response, Capabilities, ContentType};
    use crate::validation::validate_for_submit;
    use chrono::NaiveDate;
    use tracing::{debug, error, info, warn};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn commit(model: &mut Model, next: FormState, caps: &Capabilities) {
            model.replace_form(next);
            caps.render.render();
        }

        fn commit_file_op(
            model: &mut Model,
            op: &'static str,
            result: Result<FormState, FormError>,
            caps: &Capabilities,
        ) {
            match result {
                Ok(next) => Self::commit(model, next, caps),
                Err(FormError::ProtectedEntry) => {
                    debug!(op, "first file entry is protected, ignoring");
                }
                Err(FormError::IndexOutOfRange { index, len }) => {
                    warn!(op, index, len, "file index out of range, ignoring");
                }
            }
        }

        fn start_submission(model: &mut Model, today: NaiveDate, caps: &Capabilities) {
            if let Some(in_flight) = model.in_flight {
                warn!(submission = %in_flight, "submission already in flight, ignoring");
                return;
            }

            if let Err(rejection) = validate_for_submit(&model.form, today, &model.config) {
                info!(field = %rejection.field(), reason = %rejection, "submission rejected locally");
                model.show_toast(rejection.user_message(), ToastKind::Error);
                model.set_error(rejection.into());
                caps.render.render();
                return;
            }

            let endpoint = match model.config.endpoint() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    error!(error = %e, "registration endpoint is not usable");
                    model.show_toast(SUBMIT_FAILURE_MESSAGE, ToastKind::Error);
                    model.set_error(e.into());
                    caps.render.render();
                    return;
                }
            };

            let form = model.form.to_multipart();
            let body = form.encode();
            let submission = SubmissionId::generate();

            info!(
                submission = %submission,
                host = endpoint.host(),
                files = model.form.files().len(),
                body_bytes = body.len(),
                "sending registration"
            );

            caps.http
                .post(endpoint.as_str())
                .header("Accept", ContentType::Json.as_str())
                .body_bytes(body)
                .header("Content-Type", form.content_type())
                .send(move |result| Event::SubmitResponse {
                    submission,
                    result: Box::new(result),
                });

            model.in_flight = Some(submission);
            model.clear_error();
            caps.render.render();
        }

        fn finish_submission(
            model: &mut Model,
            submission: SubmissionId,
            result: &crux_http::Result<crux_http::Response<Vec<u8>>>,
            caps: &Capabilities,
        ) {
            if model.in_flight != Some(submission) {
                warn!(submission = %submission, "response for a submission that is not in flight, dropping");
                return;
            }
            model.in_flight = None;

            match interpret_response(result) {
                Ok(status) => {
                    info!(submission = %submission, status, "registration accepted");
                    model.replace_form(FormState::default());
                    model.clear_error();
                    model.show_toast(SUBMIT_SUCCESS_MESSAGE, ToastKind::Success);
                }
                Err(failure) => {
                    warn!(
                        submission = %submission,
                        status = ?failure.status(),
                        error = %failure,
                        "registration failed"
                    );
                    let message = failure
                        .server_message()
                        .unwrap_or(SUBMIT_FAILURE_MESSAGE)
                        .to_string();
                    model.show_toast(message, ToastKind::Error);
                    model.set_error(failure.into());
                }
            }

            caps.render.render();
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            if event.is_user_initiated() {
                debug!(event = event.name(), revision = model.revision, "user action");
            }

            match event {
                Event::Configure(config) => {
                    if let Err(e) = config.validate() {
                        error!(error = %e, "rejected configuration, keeping previous");
                        model.set_error(e.into());
                    } else {
                        info!(
                            age_policy = ?config.age_policy,
                            minimum_age_years = config.minimum_age_years,
                            "configuration applied"
                        );
                        model.config = config;
                    }
                    caps.render.render();
                }

                Event::FieldChanged { field, value } => {
                    if model.form.is_locked(field) {
                        debug!(field = %field, "permanent address is linked, ignoring edit");
                        return;
                    }
                    let next = model.form.set_field(field, value);
                    let clears_error = model
                        .active_error
                        .as_ref()
                        .and_then(|e| e.context.get("field"))
                        .is_some_and(|f| f.as_str() == field.wire_name());
                    if clears_error {
                        model.clear_error();
                    }
                    Self::commit(model, next, caps);
                }

                Event::SameAsResidentialToggled { checked } => {
                    let next = model.form.set_same_as_residential(checked);
                    Self::commit(model, next, caps);
                }

                Event::FileSelected { index, file } => {
                    let result = model.form.select_file(index, file);
                    Self::commit_file_op(model, "select_file", result, caps);
                }

                Event::FileKindChanged { index, kind } => {
                    let result = model.form.set_file_kind(index, kind);
                    Self::commit_file_op(model, "set_file_kind", result, caps);
                }

                Event::FileEntryAdded => {
                    let next = model.form.add_file_entry();
                    Self::commit(model, next, caps);
                }

                Event::FileEntryRemoved { index } => {
                    let result = model.form.remove_file_entry(index);
                    Self::commit_file_op(model, "remove_file_entry", result, caps);
                }

                Event::SubmitRequested { today } => Self::start_submission(model, today, caps),

                Event::ToastDismissed => {
                    model.clear_toast();
                    caps.render.render();
                }

                Event::SubmitResponse { submission, result } => {
                    Self::finish_submission(model, submission, &result, caps);
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let form = &model.form;
            let files = form
                .files()
                .iter()
                .enumerate()
                .map(|(index, entry)| FileEntryView {
                    index,
                    name: entry.name.clone(),
                    kind: entry.kind,
                    has_file: entry.has_file(),
                    size_bytes: entry.file.as_ref().map_or(0, SelectedFile::len),
                    removable: form.is_removable(index),
                })
                .collect();

            ViewModel {
                first_name: form.field(FormField::FirstName).to_string(),
                last_name: form.field(FormField::LastName).to_string(),
                email: form.field(FormField::Email).to_string(),
                dob: form.field(FormField::Dob).to_string(),
                residential_address1: form.field(FormField::ResidentialAddress1).to_string(),
                residential_address2: form.field(FormField::ResidentialAddress2).to_string(),
                same_as_residential: form.same_as_residential(),
                permanent_address_editable: !form.same_as_residential(),
                permanent_address1: form.field(FormField::PermanentAddress1).to_string(),
                permanent_address2: form.field(FormField::PermanentAddress2).to_string(),
                files,
                can_add_file: true,
                is_submitting: model.is_submitting(),
                toast: model.active_toast.as_ref().map(ToastView::from),
                error: model.active_error.as_ref().map(UserFacingError::from),
                revision: model.revision,
            }
        }
    }
}
