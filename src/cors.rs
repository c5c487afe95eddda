use std::collections::HashSet;

use rocket::{
    Request, Response,
    fairing::{Fairing, Info, Kind},
    http::{Header, Status},
};
use tracing::debug;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Adds CORS headers for requests whose `Origin` is in the allowed set.
pub struct CorsFairing {
    allowed_origins: HashSet<String>,
}

impl CorsFairing {
    pub fn new<I, S>(allowed_origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: allowed_origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }
}

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let Some(origin) = request.headers().get_one("Origin") else {
            return;
        };

        if !self.is_allowed(origin) {
            debug!(origin = %origin, "Origin not allowed for CORS");
            return;
        }

        let allowed_headers = request
            .headers()
            .get_one("Access-Control-Request-Headers")
            .unwrap_or(DEFAULT_ALLOWED_HEADERS)
            .to_string();

        response.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        response.set_header(Header::new("Access-Control-Allow-Methods", ALLOWED_METHODS));
        response.set_header(Header::new("Access-Control-Allow-Headers", allowed_headers));
        response.set_header(Header::new("Vary", "Origin"));
    }
}

/// Answers preflight requests; the fairing attaches the CORS headers.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
