//! Requests, their context and their completions

use crate::error::{TransportError, TransportResult};
use mech_core::StreamKind;
use reqwest::Url;
use std::fmt;
use tracing::{trace, warn};

/// What a request was issued for, captured at send time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContext {
    /// Status scan of a control provider
    Discovery { provider: String },
    /// Start or cancel of a control point
    Actuation { point: String, provider: String },
    /// "Latest id" snapshot of a history stream
    Probe { stream: StreamKind, provider: String },
    /// Incremental fetch of a history stream
    Fetch { stream: StreamKind, provider: String },
}

impl RequestContext {
    /// Provider the request was sent to
    pub fn provider(&self) -> &str {
        match self {
            RequestContext::Discovery { provider }
            | RequestContext::Actuation { provider, .. }
            | RequestContext::Probe { provider, .. }
            | RequestContext::Fetch { provider, .. } => provider,
        }
    }

    /// History stream of a probe or fetch
    pub fn stream(&self) -> Option<StreamKind> {
        match self {
            RequestContext::Probe { stream, .. } | RequestContext::Fetch { stream, .. } => {
                Some(*stream)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestContext::Discovery { provider } => write!(f, "discovery of {}", provider),
            RequestContext::Actuation { point, provider } => {
                write!(f, "actuation of {} on {}", point, provider)
            }
            RequestContext::Probe { stream, provider } => {
                write!(f, "{} probe of {}", stream, provider)
            }
            RequestContext::Fetch { stream, provider } => {
                write!(f, "{} fetch from {}", stream, provider)
            }
        }
    }
}

/// An outgoing GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub context: RequestContext,
}

/// A received HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// A 200 response with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// A response with an arbitrary status and an empty body
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    /// Only 200 counts as success for provider endpoints
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// The outcome of a request, delivered back with its original context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub context: RequestContext,
    pub outcome: TransportResult<Response>,
}

impl Completion {
    /// A completion carrying a response
    pub fn response(context: RequestContext, response: Response) -> Self {
        Self {
            context,
            outcome: Ok(response),
        }
    }

    /// A completion carrying a failure
    pub fn failed(context: RequestContext, error: TransportError) -> Self {
        Self {
            context,
            outcome: Err(error),
        }
    }
}

/// Requests issued but not yet handed to the transport
///
/// Submitting never blocks. A URL that cannot be built is rejected right
/// away and nothing is queued: the caller logs it and tries again on a
/// later cycle.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Vec<Request>,
}

impl Outbox {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a GET of `url`
    pub fn submit(&mut self, url: &str, context: RequestContext) -> TransportResult<()> {
        let parsed = Url::parse(url).map_err(|e| {
            warn!(url, %context, error = %e, "Cannot create request");
            TransportError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.submit_url(parsed, context);
        Ok(())
    }

    /// Queue a GET of an already built URL
    pub fn submit_url(&mut self, url: Url, context: RequestContext) {
        trace!(%url, %context, "Queued request");
        self.pending.push(Request { url, context });
    }

    /// Take every queued request
    pub fn drain(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.pending)
    }

    /// Requests currently queued
    pub fn pending(&self) -> &[Request] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
