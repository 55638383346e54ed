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
// dcos.rs - DC/OS cluster HTTP API: login, secrets, marathon tasks
//

use anyhow::{Context, Error, Result};
use log::{debug, info, trace};
use serde::Deserialize;
use serde_json::json;
use ureq::{Agent, OrAnyStatus, Request};
use url::Url;

use crate::error::{expect_success, DemoError};

/// A DC/OS cluster, plus the ACS token once we have one.
#[derive(Clone)]
pub struct Cluster {
    url: Url,
    agent: Agent,
    token: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct AppTasks {
    tasks: Vec<serde_json::Value>,
}

impl Cluster {
    /// `url` must end in a slash, everything else is resolved against it.
    pub fn new(url: Url, agent: Agent) -> Cluster {
        Cluster {
            url,
            agent,
            token: None,
        }
    }

    pub fn with_token(&self, token: &str) -> Cluster {
        Cluster {
            token: Some(token.to_string()),
            ..self.clone()
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Where the admin router exposes a service, e.g. `{dcos}service/jenkins/`.
    pub fn service_url(&self, name: &str) -> Result<Url> {
        self.endpoint(&["service", name, ""])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::msg("DC/OS URL can't have paths"))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: &str, url: &Url) -> Request {
        let req = self.agent.request_url(method, url);
        match self.token {
            Some(ref token) => req.set("Authorization", &format!("token={}", token)),
            None => req,
        }
    }

    /// Something only an authenticated client can read.
    pub fn is_authorized(&self) -> bool {
        let url = match self.endpoint(&["mesos", "master", "state-summary"]) {
            Ok(url) => url,
            Err(_) => return false,
        };

        match self.request("GET", &url).call() {
            Ok(resp) => resp.status() == 200,
            Err(e) => {
                debug!("Token check failed: {}", e);
                false
            }
        }
    }

    /// Exchanges a login body (uid/password or an OAuth token) for an ACS token.
    pub fn login(&self, body: serde_json::Value) -> Result<String> {
        let url = self.endpoint(&["acs", "api", "v1", "auth", "login"])?;

        let resp = self
            .agent
            .request_url("POST", &url)
            .send_json(body)
            .or_any_status()
            .with_context(|| format!("Couldn't reach {}", url))?;

        if resp.status() != 200 {
            return Err(DemoError::AuthenticationFailed(format!(
                "login returned HTTP {}",
                resp.status()
            ))
            .into());
        }

        let login: LoginResponse = resp.into_json().context("Couldn't parse login response")?;
        Ok(login.token)
    }

    fn secret_url(&self, name: &str) -> Result<Url> {
        self.endpoint(&["secrets", "v1", "secret", "default", name])
    }

    pub fn secret_exists(&self, name: &str) -> bool {
        match self.secret_url(name) {
            Ok(url) => match self.request("GET", &url).call() {
                Ok(resp) => resp.status() == 200,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    pub fn put_secret(&self, name: &str, value: &str) -> Result<()> {
        let url = self.secret_url(name)?;

        debug!("Storing secret {}", name);
        let resp = self
            .request("PUT", &url)
            .set("Content-Type", "application/json")
            .send_string(&json!({ "value": value }).to_string())
            .or_any_status()
            .with_context(|| format!("Couldn't reach {}", url))?;

        expect_success(resp)?;
        Ok(())
    }

    pub fn delete_secret(&self, name: &str) -> Result<()> {
        let url = self.secret_url(name)?;

        debug!("Deleting secret {}", name);
        let resp = self
            .request("DELETE", &url)
            .call()
            .or_any_status()
            .with_context(|| format!("Couldn't reach {}", url))?;

        expect_success(resp)?;
        Ok(())
    }

    /// Whether Marathon has launched at least one task for `app_id`.
    pub fn app_has_tasks(&self, app_id: &str) -> bool {
        let url = match self.endpoint(&["service", "marathon", "v2", "apps", app_id, "tasks"]) {
            Ok(url) => url,
            Err(_) => return false,
        };

        let resp = match self.request("GET", &url).call() {
            Ok(resp) => resp,
            Err(e) => {
                trace!("No tasks for {} yet: {}", app_id, e);
                return false;
            }
        };

        match resp.into_json::<AppTasks>() {
            Ok(tasks) => !tasks.tasks.is_empty(),
            Err(_) => false,
        }
    }
}

/// Ways of getting an ACS token, tried in order by `authenticate`.
pub enum AuthStrategy {
    /// A token the dcos CLI already holds.
    ExistingToken(String),
    /// Login with a cluster username and password (Enterprise DC/OS).
    Credentials { uid: String, password: String },
    /// Login with an OAuth token (open DC/OS).
    OAuth(String),
}

impl AuthStrategy {
    pub fn describe(&self) -> &'static str {
        match self {
            AuthStrategy::ExistingToken(_) => "existing CLI token",
            AuthStrategy::Credentials { .. } => "username and password",
            AuthStrategy::OAuth(_) => "OAuth token",
        }
    }

    pub fn attempt(&self, cluster: &Cluster) -> Result<String> {
        match self {
            AuthStrategy::ExistingToken(token) => {
                if cluster.with_token(token).is_authorized() {
                    Ok(token.clone())
                } else {
                    Err(DemoError::AuthenticationFailed("stored token was rejected".to_string())
                        .into())
                }
            }
            AuthStrategy::Credentials { uid, password } => {
                cluster.login(json!({ "uid": uid, "password": password }))
            }
            AuthStrategy::OAuth(token) => cluster.login(json!({ "token": token })),
        }
    }
}

/// First strategy to produce a token wins.
pub fn authenticate(cluster: &Cluster, strategies: &[AuthStrategy]) -> Result<String> {
    for strategy in strategies {
        match strategy.attempt(cluster) {
            Ok(token) => {
                info!("Authenticated with {}", strategy.describe());
                return Ok(token);
            }
            Err(e) => debug!("Authentication with {} failed: {:#}", strategy.describe(), e),
        }
    }

    Err(DemoError::AuthenticationFailed(
        "did you provide --dcos-username and --dcos-password or --dcos-oauth-token?".to_string(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind_of;
    use crate::testing::{blocking, init, test_get_agent};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cluster_for(server: &MockServer) -> Cluster {
        Cluster::new(
            Url::parse(&format!("{}/", server.uri())).unwrap(),
            test_get_agent(),
        )
    }

    #[test]
    fn service_url_has_trailing_slash() {
        let cluster = Cluster::new(
            Url::parse("https://dcos.example.com/").unwrap(),
            test_get_agent(),
        );

        assert_eq!(
            cluster.service_url("jenkins").unwrap().as_str(),
            "https://dcos.example.com/service/jenkins/"
        );
    }

    #[tokio::test]
    async fn falls_through_to_oauth() {
        init();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mesos/master/state-summary"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acs/api/v1/auth/login"))
            .and(body_json(json!({ "uid": "bootstrapuser", "password": "deleteme" })))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acs/api/v1/auth/login"))
            .and(body_json(json!({ "token": "oauth" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "acs" })))
            .expect(1)
            .mount(&server)
            .await;
        let cluster = cluster_for(&server);

        let token = blocking(move || {
            authenticate(
                &cluster,
                &[
                    AuthStrategy::ExistingToken("stale".to_string()),
                    AuthStrategy::Credentials {
                        uid: "bootstrapuser".to_string(),
                        password: "deleteme".to_string(),
                    },
                    AuthStrategy::OAuth("oauth".to_string()),
                ],
            )
        })
        .await
        .unwrap();

        assert_eq!(token, "acs");
    }

    #[tokio::test]
    async fn existing_token_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mesos/master/state-summary"))
            .and(header("Authorization", "token=good"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/acs/api/v1/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "new" })))
            .expect(0)
            .mount(&server)
            .await;
        let cluster = cluster_for(&server);

        let token = blocking(move || {
            authenticate(
                &cluster,
                &[
                    AuthStrategy::ExistingToken("good".to_string()),
                    AuthStrategy::OAuth("oauth".to_string()),
                ],
            )
        })
        .await
        .unwrap();

        assert_eq!(token, "good");
    }

    #[tokio::test]
    async fn all_strategies_failing_is_authentication_failed() {
        let server = MockServer::start().await;
        let cluster = cluster_for(&server);

        let err = blocking(move || {
            authenticate(
                &cluster,
                &[AuthStrategy::Credentials {
                    uid: "u".to_string(),
                    password: "p".to_string(),
                }],
            )
        })
        .await
        .unwrap_err();

        assert!(matches!(
            kind_of(&err),
            Some(DemoError::AuthenticationFailed(_))
        ));
    }

    #[tokio::test]
    async fn secret_round_trip_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/secrets/v1/secret/default/marathon-lb"))
            .and(header("Authorization", "token=acs"))
            .and(body_json(json!({ "value": "{\"login\": \"sa\"}" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/secrets/v1/secret/default/marathon-lb"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let cluster = cluster_for(&server).with_token("acs");

        blocking(move || -> Result<()> {
            assert!(!cluster.secret_exists("marathon-lb"));
            cluster.put_secret("marathon-lb", "{\"login\": \"sa\"}")?;
            cluster.delete_secret("marathon-lb")
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn app_tasks_need_at_least_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/marathon/v2/apps/saread/tasks"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "tasks": [{ "id": "saread.1" }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/service/marathon/v2/apps/other/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": [] })))
            .mount(&server)
            .await;
        let cluster = cluster_for(&server);

        let (running, idle) =
            blocking(move || (cluster.app_has_tasks("saread"), cluster.app_has_tasks("other"))).await;

        assert!(running);
        assert!(!idle);
    }
}
