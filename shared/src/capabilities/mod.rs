pub mod http;

pub use self::http::{
    interpret_response, server_error_message, ContentType, EndpointError, HostPolicy,
    SubmitFailure, ValidatedUrl,
};

pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
