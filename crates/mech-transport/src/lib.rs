//! Request/response abstraction for mech
//!
//! Components never perform I/O themselves. They push [`Request`]s into an
//! [`Outbox`], each tagged with a [`RequestContext`] recording who asked and
//! on behalf of which provider. The runtime executes the requests through a
//! [`Transport`] and hands back a [`Completion`] carrying the same context,
//! which is all a component uses to decide whether the answer still matters.

mod error;
mod http;
mod request;

pub use error::{TransportError, TransportResult};
pub use http::{execute, HttpTransport, SharedTransport, Transport};
pub use request::{Completion, Outbox, Request, RequestContext, Response};

pub use reqwest::Url;
