//
// dcos-jenkins-demo - Jenkins on DC/OS demonstration driver
//
// Copyright (C) 2026 dcos-jenkins-demo contributors
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation; either version 2 of the License, or (at your option)
// any later version.
//
// error.rs - the failure kinds the demo distinguishes between
//

use std::time::Duration;

use thiserror::Error;

/// Failures that callers need to tell apart.  Everything else travels as a
/// plain `anyhow::Error` with context attached.
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("`{command}` exited with {status}")]
    CommandError { command: String, status: String },

    #[error("request to {url} was rejected with HTTP {status}: {body}")]
    RemoteRejected {
        url: String,
        status: u16,
        body: String,
    },

    #[error("{what} was not ready after {}s", .after.as_secs())]
    TimedOut { what: String, after: Duration },

    #[error("DC/OS authentication failed; {0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Usage(String),
}

const BODY_LIMIT: usize = 200;

/// First non-empty line of a response body, cut to `BODY_LIMIT` characters.
/// Error pages are often whole HTML documents; diagnostics stay on one line.
fn summarize_body(body: &str) -> String {
    let line = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    if line.chars().count() > BODY_LIMIT {
        let mut cut: String = line.chars().take(BODY_LIMIT).collect();
        cut.push_str("...");
        cut
    } else {
        line.to_string()
    }
}

impl DemoError {
    /// True for a rejection that just means the thing isn't there.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DemoError::RemoteRejected { status: 404, .. })
    }
}

/// Passes 2xx responses through and turns anything else into `RemoteRejected`.
pub fn expect_success(resp: ureq::Response) -> anyhow::Result<ureq::Response> {
    let status = resp.status();
    if (200..300).contains(&status) {
        return Ok(resp);
    }

    let url = resp.get_url().to_string();
    let body = summarize_body(&resp.into_string().unwrap_or_default());
    Err(DemoError::RemoteRejected { url, status, body }.into())
}

/// Looks through an `anyhow` chain for one of our kinds.
pub fn kind_of(err: &anyhow::Error) -> Option<&DemoError> {
    err.chain().find_map(|e| e.downcast_ref::<DemoError>())
}
