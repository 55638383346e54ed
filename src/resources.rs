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
// resources.rs - the concrete things the demo creates and removes
//

use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use ureq::Agent;
use url::Url;

use crate::command::DcosCli;
use crate::dcos::Cluster;
use crate::error::{kind_of, DemoError};
use crate::jenkins::{CredentialSpec, JenkinsClient, JobSpec, ViewSpec};
use crate::lifecycle::Lifecycle;
use crate::poller::{await_ready, PollPolicy, Readiness};
use crate::scenario::say;
use crate::template::{self, render, transient_file};

/// Deleting something that isn't there is fine.
fn tolerate_missing(result: Result<()>, what: &str) -> Result<()> {
    match result {
        Err(e) if kind_of(&e).map_or(false, DemoError::is_not_found) => {
            debug!("{} was already gone", what);
            Ok(())
        }
        other => other,
    }
}

/// The Jenkins package, as one named marathon app.
pub struct JenkinsPackage {
    pub cli: DcosCli,
    pub jenkins: JenkinsClient,
    pub name: String,
    /// how long to wait for it to disappear after an uninstall
    pub gone: PollPolicy,
}

impl Lifecycle for JenkinsPackage {
    fn create(&mut self) -> Result<()> {
        say(&format!(
            "couldn't find Jenkins running at '{}'",
            self.jenkins.base_url()
        ));
        say(&format!("installing Jenkins with name '{}'", self.name));

        let options = render(template::JENKINS_OPTIONS, &[("JENKINS_NAME", self.name.as_str())]);
        // removed again when this goes out of scope
        let options = transient_file(&options, ".json")?;

        self.cli
            .package_install("jenkins", Some(self.name.as_str()), Some(options.path()))
            .context("package failed to install")?;

        say(&format!(
            "waiting for Jenkins service to come up at '{}'",
            self.jenkins.base_url()
        ));
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        say(&format!("uninstalling Jenkins with name '{}'", self.name));
        self.cli.package_uninstall("jenkins", Some(self.name.as_str()))?;

        let jenkins = &self.jenkins;
        match await_ready(|| jenkins.version().is_none(), &self.gone) {
            Readiness::Ready => {
                say("Jenkins has been uninstalled");
                Ok(())
            }
            Readiness::TimedOut => Err(DemoError::TimedOut {
                what: format!("removal of Jenkins '{}'", self.name),
                after: self.gone.timeout,
            }
            .into()),
        }
    }

    fn probe(&mut self) -> Option<bool> {
        match self.jenkins.version() {
            Some(version) => {
                say(&format!(
                    "service is up and running, got Jenkins version '{}'",
                    version
                ));
                Some(true)
            }
            None => Some(false),
        }
    }
}

/// marathon-lb, the edge load balancer the pipeline deploys behind.
pub struct MarathonLbPackage {
    pub cli: DcosCli,
    pub agent: Agent,
    pub url: Url,
    /// Enterprise clusters need options pointing at the service account
    /// secret; open DC/OS installs with defaults.
    pub options: Option<String>,
}

impl Lifecycle for MarathonLbPackage {
    fn create(&mut self) -> Result<()> {
        say(&format!("couldn't find marathon-lb running at '{}'", self.url));
        say("installing marathon-lb");

        match self.options {
            Some(ref options) => {
                let options = transient_file(options, ".json")?;
                self.cli
                    .package_install("marathon-lb", None, Some(options.path()))
            }
            None => self.cli.package_install("marathon-lb", None, None),
        }
    }

    fn delete(&mut self) -> Result<()> {
        self.cli.package_uninstall("marathon-lb", None)
    }

    fn probe(&mut self) -> Option<bool> {
        let up = match self.agent.request_url("GET", &self.url).call() {
            Ok(resp) => resp.status() == 200 && !resp.into_string().unwrap_or_default().is_empty(),
            Err(_) => false,
        };
        if up {
            say("marathon-lb is up and running");
        }
        Some(up)
    }
}

/// The cluster's service account credentials, stored as a secret so
/// marathon-lb can talk to Marathon on a strict-mode cluster.
///
/// Getting hold of them means running a throwaway app on a master that
/// prints the account file, then reading its log.
pub struct ServiceAccountSecret {
    pub cli: DcosCli,
    pub cluster: Cluster,
    pub name: String,
    pub reader_app: String,
    pub task_policy: PollPolicy,
    /// the reader's log isn't complete the moment its task shows up
    pub settle: Duration,
}

impl ServiceAccountSecret {
    fn read_service_account(&self) -> Result<String> {
        let cluster = &self.cluster;
        let app = self.reader_app.as_str();
        if await_ready(|| cluster.app_has_tasks(app), &self.task_policy) == Readiness::TimedOut {
            return Err(DemoError::TimedOut {
                what: format!("task '{}'", app),
                after: self.task_policy.timeout,
            }
            .into());
        }

        say("retrieving service account JSON");
        sleep(self.settle);

        let log = self.cli.task_log(app, 1)?;
        log.lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .context("service account reader printed nothing")
    }
}

impl Lifecycle for ServiceAccountSecret {
    fn create(&mut self) -> Result<()> {
        let reader = transient_file(template::SERVICE_ACCOUNT_READER, ".json")?;
        self.cli.marathon_app_add(reader.path())?;

        let account = self.read_service_account();
        if let Err(e) = self.cli.marathon_app_remove(&self.reader_app) {
            warn!("Couldn't remove {}: {:#}", self.reader_app, e);
        }
        let account = account?;

        if self.cluster.secret_exists(&self.name) {
            say(&format!("removing old {} secret key", self.name));
            self.cluster.delete_secret(&self.name)?;
        }

        self.cluster.put_secret(&self.name, &account)
    }

    fn delete(&mut self) -> Result<()> {
        let result = self.cluster.delete_secret(&self.name);
        tolerate_missing(result, &self.name)
    }
}

pub struct JenkinsJob {
    pub jenkins: JenkinsClient,
    pub name: String,
    pub config_xml: String,
}

impl Lifecycle for JenkinsJob {
    fn create(&mut self) -> Result<()> {
        say(&format!("creating job '{}'", self.name));
        self.jenkins.create_job(JobSpec {
            name: self.name.clone(),
            config_xml: self.config_xml.clone(),
        })
    }

    fn delete(&mut self) -> Result<()> {
        say(&format!("deleting job '{}'", self.name));
        let result = self.jenkins.delete_job(&self.name);
        tolerate_missing(result, &self.name)
    }

    fn probe(&mut self) -> Option<bool> {
        Some(self.jenkins.job_exists(&self.name))
    }
}

pub struct JenkinsCredential {
    pub jenkins: JenkinsClient,
    pub spec: CredentialSpec,
}

impl Lifecycle for JenkinsCredential {
    fn create(&mut self) -> Result<()> {
        say(&format!("creating credentials '{}'", self.spec.id()));
        self.jenkins.create_credential(self.spec.clone())
    }

    fn delete(&mut self) -> Result<()> {
        say(&format!("deleting credentials '{}'", self.spec.id()));
        let result = self.jenkins.delete_credential(self.spec.id());
        tolerate_missing(result, self.spec.id())
    }

    fn probe(&mut self) -> Option<bool> {
        Some(self.jenkins.credential_exists(self.spec.id()))
    }
}

pub struct JenkinsView {
    pub jenkins: JenkinsClient,
    pub name: String,
    pub config_xml: String,
}

impl Lifecycle for JenkinsView {
    fn create(&mut self) -> Result<()> {
        say(&format!("creating view '{}'", self.name));
        self.jenkins.create_view(ViewSpec {
            name: self.name.clone(),
            config_xml: self.config_xml.clone(),
        })
    }

    fn delete(&mut self) -> Result<()> {
        say(&format!("deleting view '{}'", self.name));
        let result = self.jenkins.delete_view(&self.name);
        tolerate_missing(result, &self.name)
    }

    fn probe(&mut self) -> Option<bool> {
        Some(self.jenkins.view_exists(&self.name))
    }
}
