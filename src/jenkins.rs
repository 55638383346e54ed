//
// dcos-jenkins-demo - Jenkins on DC/OS demonstration driver
//
// Copyright (C) 2016 IBM Corporation
// Copyright (C) 2026 dcos-jenkins-demo contributors
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation; either version 2 of the License, or (at your option)
// any later version.
//
// jenkins.rs - interface to Jenkins REST API
//

use anyhow::{Context, Error, Result};
use log::{debug, trace};
use serde_json::json;
use ureq::{Agent, OrAnyStatus, Request, Response};
use url::Url;

use crate::error::expect_success;

const CREDENTIAL_STORE: &[&str] = &["credentials", "store", "system", "domain", "_"];

#[derive(Clone)]
pub enum CredentialSpec {
    UsernamePassword {
        id: String,
        username: String,
        password: String,
    },
    SecretText {
        id: String,
        secret: String,
    },
}

impl CredentialSpec {
    pub fn id(&self) -> &str {
        match self {
            CredentialSpec::UsernamePassword { id, .. } => id,
            CredentialSpec::SecretText { id, .. } => id,
        }
    }

    /// The JSON the credentials plugin expects in the `json` form field.
    fn descriptor(&self) -> serde_json::Value {
        let credentials = match self {
            CredentialSpec::UsernamePassword {
                id,
                username,
                password,
            } => json!({
                "scope": "GLOBAL",
                "id": id,
                "username": username,
                "password": password,
                "description": id,
                "$class": "com.cloudbees.plugins.credentials.impl.UsernamePasswordCredentialsImpl",
            }),
            CredentialSpec::SecretText { id, secret } => json!({
                "scope": "GLOBAL",
                "id": id,
                "secret": secret,
                "description": id,
                "$class": "org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl",
            }),
        };

        json!({ "": "0", "credentials": credentials })
    }
}

#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub config_xml: String,
}

#[derive(Clone)]
pub struct ViewSpec {
    pub name: String,
    pub config_xml: String,
}

/// One Jenkins master, reached through the DC/OS admin router.
///
/// Every call is a single request with no retrying; anything other than a
/// 2xx comes back as `DemoError::RemoteRejected`.
#[derive(Clone)]
pub struct JenkinsClient {
    base: Url,
    agent: Agent,
    token: Option<String>,
}

impl JenkinsClient {
    pub fn new(base: Url, agent: Agent, token: Option<String>) -> JenkinsClient {
        JenkinsClient { base, agent, token }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::msg("Jenkins URL can't have paths"))?
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

    fn post(&self, url: &Url) -> Result<Response> {
        trace!("POST {}", url);
        let resp = self
            .request("POST", url)
            .call()
            .or_any_status()
            .with_context(|| format!("Couldn't reach Jenkins at {}", url))?;

        expect_success(resp)
    }

    fn post_xml(&self, url: &Url, xml: &str) -> Result<Response> {
        trace!("POST {} ({} bytes of XML)", url, xml.len());
        let resp = self
            .request("POST", url)
            .set("Content-Type", "application/xml")
            .send_string(xml)
            .or_any_status()
            .with_context(|| format!("Couldn't reach Jenkins at {}", url))?;

        expect_success(resp)
    }

    /// The `X-Jenkins` version header, if Jenkins is up and answering.
    pub fn version(&self) -> Option<String> {
        match self.request("GET", &self.base).call() {
            Ok(resp) if resp.status() == 200 => resp.header("X-Jenkins").map(|v| v.to_string()),
            Ok(_) => None,
            Err(e) => {
                trace!("Jenkins not answering at {}: {}", self.base, e);
                None
            }
        }
    }

    fn exists(&self, segments: &[&str]) -> bool {
        let mut segments = segments.to_vec();
        segments.push("api");
        segments.push("json");

        match self.endpoint(&segments) {
            Ok(url) => match self.request("GET", &url).call() {
                Ok(resp) => resp.status() == 200,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    pub fn job_exists(&self, name: &str) -> bool {
        self.exists(&["job", name])
    }

    pub fn view_exists(&self, name: &str) -> bool {
        self.exists(&["view", name])
    }

    pub fn credential_exists(&self, id: &str) -> bool {
        let mut segments = CREDENTIAL_STORE.to_vec();
        segments.push("credential");
        segments.push(id);
        self.exists(&segments)
    }

    pub fn create_job(&self, job: JobSpec) -> Result<()> {
        let mut url = self.endpoint(&["createItem"])?;
        url.query_pairs_mut().append_pair("name", &job.name);

        debug!("Creating job {}", job.name);
        self.post_xml(&url, &job.config_xml)?;
        Ok(())
    }

    pub fn delete_job(&self, name: &str) -> Result<()> {
        debug!("Deleting job {}", name);
        self.post(&self.endpoint(&["job", name, "doDelete"])?)?;
        Ok(())
    }

    pub fn create_credential(&self, credential: CredentialSpec) -> Result<()> {
        let mut segments = CREDENTIAL_STORE.to_vec();
        segments.push("createCredentials");
        let url = self.endpoint(&segments)?;
        let descriptor = credential.descriptor().to_string();

        debug!("Creating credential {}", credential.id());
        let resp = self
            .request("POST", &url)
            .send_form(&[("json", descriptor.as_str())])
            .or_any_status()
            .with_context(|| format!("Couldn't reach Jenkins at {}", url))?;

        expect_success(resp)?;
        Ok(())
    }

    pub fn delete_credential(&self, id: &str) -> Result<()> {
        let mut segments = CREDENTIAL_STORE.to_vec();
        segments.push("credential");
        segments.push(id);
        segments.push("doDelete");

        debug!("Deleting credential {}", id);
        self.post(&self.endpoint(&segments)?)?;
        Ok(())
    }

    pub fn create_view(&self, view: ViewSpec) -> Result<()> {
        let mut url = self.endpoint(&["createView"])?;
        url.query_pairs_mut().append_pair("name", &view.name);

        debug!("Creating view {}", view.name);
        self.post_xml(&url, &view.config_xml)?;
        Ok(())
    }

    pub fn delete_view(&self, name: &str) -> Result<()> {
        debug!("Deleting view {}", name);
        self.post(&self.endpoint(&["view", name, "doDelete"])?)?;
        Ok(())
    }

    /// Queue a build.  With parameters this goes to `buildWithParameters`
    /// and the pairs are form-encoded into the query string.
    pub fn trigger_build(&self, name: &str, params: &[(String, String)]) -> Result<()> {
        let url = if params.is_empty() {
            self.endpoint(&["job", name, "build"])?
        } else {
            let mut url = self.endpoint(&["job", name, "buildWithParameters"])?;
            url.query_pairs_mut().extend_pairs(params);
            url
        };

        debug!("Triggering build of {}", name);
        self.post(&url)?;
        Ok(())
    }
}
