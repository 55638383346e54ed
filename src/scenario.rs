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
// scenario.rs - the demos themselves, in the order they touch things
//

use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{debug, warn};
use rand::Rng;
use ureq::Agent;
use url::Url;

use crate::command::{CommandRunner, DcosCli};
use crate::config::DemoConfig;
use crate::dcos::{authenticate, AuthStrategy, Cluster};
use crate::error::DemoError;
use crate::git;
use crate::jenkins::{CredentialSpec, JenkinsClient};
use crate::lifecycle::{LifecycleManager, ManagedResource, ResourceKind};
use crate::resources::{
    JenkinsCredential, JenkinsJob, JenkinsPackage, JenkinsView, MarathonLbPackage,
    ServiceAccountSecret,
};
use crate::template::{self, render};

const PIPELINE_JOB: &str = "pipeline-demo";
const DOCKER_CREDENTIALS: &str = "docker-hub-credentials";
const DCOS_TOKEN_CREDENTIALS: &str = "dcos-token";
const DEMO_JOB_PREFIX: &str = "demo-job-";
const DEMO_VIEW: &str = "dynamic-slaves";
const MARATHON_LB: &str = "marathon-lb";
const MARATHON_LB_SECRET: &str = "marathon-lb-secret";
const SERVICE_ACCOUNT_READER: &str = "saread";
const PROTECTED_BRANCH: &str = "master";

pub const MIN_DURATION: u32 = 120;
pub const MAX_DURATION: u32 = 240;

/// Prints a progress line for the person running the demo.
pub fn say(message: &str) {
    debug!("{}", message);
    println!("[demo]: {}", message);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Install,
    Pipeline,
    DynamicSlaves,
    Cleanup,
    Uninstall,
}

impl Scenario {
    pub fn from_name(name: &str) -> Option<Scenario> {
        match name {
            "install" => Some(Scenario::Install),
            "pipeline" => Some(Scenario::Pipeline),
            "dynamic-slaves" => Some(Scenario::DynamicSlaves),
            "cleanup" => Some(Scenario::Cleanup),
            "uninstall" => Some(Scenario::Uninstall),
            _ => None,
        }
    }
}

/// Everything a scenario talks to, already authenticated.
pub struct Demo {
    pub config: DemoConfig,
    pub runner: Rc<dyn CommandRunner>,
    pub cli: DcosCli,
    pub cluster: Cluster,
    pub jenkins: JenkinsClient,
}

impl Demo {
    pub fn new(config: &DemoConfig, runner: Rc<dyn CommandRunner>, cluster: Cluster) -> Result<Demo> {
        let jenkins = JenkinsClient::new(
            cluster.service_url(&config.name)?,
            cluster.agent().clone(),
            cluster.token().map(str::to_string),
        );

        Ok(Demo {
            config: config.clone(),
            cli: DcosCli::new(runner.clone(), &config.dcos_cli),
            runner,
            cluster,
            jenkins,
        })
    }
}

/// Width wide enough for every index, never narrower than two digits.
fn index_width(builds: usize) -> usize {
    let largest = builds.saturating_sub(1);
    largest.to_string().len().max(2)
}

pub fn job_names(builds: usize) -> Vec<String> {
    let width = index_width(builds);
    (0..builds)
        .map(|i| format!("{}{:0width$}", DEMO_JOB_PREFIX, i, width = width))
        .collect()
}

/// DURATION and RESULT for one demo job run.
pub fn job_parameters<R: Rng>(rng: &mut R) -> Vec<(String, String)> {
    let duration: u32 = rng.gen_range(MIN_DURATION..=MAX_DURATION);
    let result: u32 = rng.gen_range(0..=1);

    vec![
        ("DURATION".to_string(), duration.to_string()),
        ("RESULT".to_string(), result.to_string()),
    ]
}

/// The pipeline job is parameterized, so Jenkins only accepts a trigger
/// that submits its parameters.
fn pipeline_parameters(org: &str) -> Vec<(String, String)> {
    vec![("DOCKER_ORG".to_string(), org.to_string())]
}

pub fn ensure_branch_allowed(branch: &str) -> Result<()> {
    if branch == PROTECTED_BRANCH {
        return Err(DemoError::PreconditionFailed(format!(
            "cannot run demo against the {} branch.",
            PROTECTED_BRANCH
        ))
        .into());
    }
    Ok(())
}

/// `host[:port]` of the load balancer, which marathon-lb routes on.
fn elb_hostname(elb_url: &Url) -> Result<String> {
    let host = elb_url.host_str().context("ELB URL has no host")?;
    Ok(match elb_url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn auth_strategies(config: &DemoConfig, cli: &DcosCli) -> Vec<AuthStrategy> {
    let mut strategies = vec![];

    if let Some(token) = cli.config_show("core.dcos_acs_token") {
        strategies.push(AuthStrategy::ExistingToken(token));
    }
    if let (Some(uid), Some(password)) = (&config.dcos_username, &config.dcos_password) {
        strategies.push(AuthStrategy::Credentials {
            uid: uid.clone(),
            password: password.clone(),
        });
    }
    if let Some(ref token) = config.dcos_oauth_token {
        strategies.push(AuthStrategy::OAuth(token.clone()));
    }

    strategies
}

/// Points the dcos CLI at the cluster and gets us a token both it and our
/// own HTTP calls can use.
fn connect(config: &DemoConfig, runner: Rc<dyn CommandRunner>, agent: Agent) -> Result<Demo> {
    let cli = DcosCli::new(runner.clone(), &config.dcos_cli);
    cli.config_set("core.dcos_url", config.dcos_url.as_str())?;
    cli.config_set("core.ssl_verify", "False")?;

    let cluster = Cluster::new(config.dcos_url.clone(), agent);
    let token = authenticate(&cluster, &auth_strategies(config, &cli))?;
    cli.config_set("core.dcos_acs_token", &token)?;

    Demo::new(config, runner, cluster.with_token(&token))
}

/// Entry point for `main`: checks what can be checked locally, connects,
/// then runs the scenario.
pub fn run(
    scenario: Scenario,
    config: &DemoConfig,
    runner: Rc<dyn CommandRunner>,
    agent: Agent,
) -> Result<()> {
    // nothing remote is touched before this
    let branch = if scenario == Scenario::Pipeline {
        let repo = git::open(&config.repo)?;
        let branch = git::current_branch(&repo)?;
        ensure_branch_allowed(&branch)?;
        Some(branch)
    } else {
        None
    };

    let demo = connect(config, runner, agent)?;

    match scenario {
        Scenario::Install => install(&demo),
        Scenario::Pipeline => pipeline(&demo, branch.as_deref().unwrap_or_default()),
        Scenario::DynamicSlaves => dynamic_slaves(&demo),
        Scenario::Cleanup => cleanup(&demo),
        Scenario::Uninstall => uninstall(&demo),
    }
}

fn jenkins_package(demo: &Demo) -> ManagedResource {
    ManagedResource::new(
        &demo.config.name,
        ResourceKind::Package,
        demo.config.policies.jenkins,
        JenkinsPackage {
            cli: demo.cli.clone(),
            jenkins: demo.jenkins.clone(),
            name: demo.config.name.clone(),
            gone: demo.config.policies.uninstall,
        },
    )
}

pub fn install(demo: &Demo) -> Result<()> {
    let mut manager = LifecycleManager::new();
    manager.register(jenkins_package(demo))?;
    manager.create_all()
}

fn marathon_lb(demo: &Demo, manager: &mut LifecycleManager, elb_url: &Url) -> Result<()> {
    let mut lb = ManagedResource::new(
        MARATHON_LB,
        ResourceKind::HttpService,
        demo.config.policies.marathon_lb,
        MarathonLbPackage {
            cli: demo.cli.clone(),
            agent: demo.cluster.agent().clone(),
            url: elb_url.clone(),
            options: if demo.config.is_enterprise() {
                Some(template::MARATHON_LB_OPTIONS.to_string())
            } else {
                None
            },
        },
    );

    if demo.config.is_enterprise() {
        manager.register(ManagedResource::new(
            MARATHON_LB_SECRET,
            ResourceKind::Secret,
            demo.config.policies.service_account_task,
            ServiceAccountSecret {
                cli: demo.cli.clone(),
                cluster: demo.cluster.clone(),
                name: MARATHON_LB.to_string(),
                reader_app: SERVICE_ACCOUNT_READER.to_string(),
                task_policy: demo.config.policies.service_account_task,
                settle: demo.config.secret_settle,
            },
        ))?;
        lb = lb.depends_on(MARATHON_LB_SECRET);
    }

    manager.register(lb)
}

/// Credentials and the pipeline job.  Shared by the pipeline demo and
/// cleanup so both agree on what exists.
fn pipeline_items(demo: &Demo, manager: &mut LifecycleManager, branch: &str) -> Result<()> {
    let policy = demo.config.policies.jenkins_items;

    manager.register(ManagedResource::new(
        DOCKER_CREDENTIALS,
        ResourceKind::Credential,
        policy,
        JenkinsCredential {
            jenkins: demo.jenkins.clone(),
            spec: CredentialSpec::UsernamePassword {
                id: DOCKER_CREDENTIALS.to_string(),
                username: demo.config.docker_username.clone(),
                password: demo.config.docker_password.clone().unwrap_or_default(),
            },
        },
    ))?;
    manager.register(ManagedResource::new(
        DCOS_TOKEN_CREDENTIALS,
        ResourceKind::Credential,
        policy,
        JenkinsCredential {
            jenkins: demo.jenkins.clone(),
            spec: CredentialSpec::SecretText {
                id: DCOS_TOKEN_CREDENTIALS.to_string(),
                secret: demo.cluster.token().unwrap_or_default().to_string(),
            },
        },
    ))?;

    let job = render(
        template::PIPELINE_JOB,
        &[
            ("GIT_BRANCH", branch),
            ("DOCKER_HUB_ORG", demo.config.org.as_str()),
        ],
    );
    manager.register(
        ManagedResource::new(
            PIPELINE_JOB,
            ResourceKind::Job,
            policy,
            JenkinsJob {
                jenkins: demo.jenkins.clone(),
                name: PIPELINE_JOB.to_string(),
                config_xml: job,
            },
        )
        .depends_on(DOCKER_CREDENTIALS)
        .depends_on(DCOS_TOKEN_CREDENTIALS),
    )
}

/// The demo jobs plus a view that collects them.
fn dynamic_slave_items(demo: &Demo, manager: &mut LifecycleManager) -> Result<Vec<String>> {
    let policy = demo.config.policies.jenkins_items;
    let names = job_names(demo.config.builds);

    for name in &names {
        manager.register(ManagedResource::new(
            name,
            ResourceKind::Job,
            policy,
            JenkinsJob {
                jenkins: demo.jenkins.clone(),
                name: name.clone(),
                config_xml: template::DEMO_JOB.to_string(),
            },
        ))?;
    }

    let pattern = format!("{}.*", DEMO_JOB_PREFIX);
    manager.register(ManagedResource::new(
        DEMO_VIEW,
        ResourceKind::View,
        policy,
        JenkinsView {
            jenkins: demo.jenkins.clone(),
            name: DEMO_VIEW.to_string(),
            config_xml: render(
                template::LIST_VIEW,
                &[("VIEW_NAME", DEMO_VIEW), ("JOB_PATTERN", pattern.as_str())],
            ),
        },
    ))?;

    Ok(names)
}

/// Writes `marathon.json` for the ELB host and pushes it, which is what the
/// pipeline job deploys from.
fn update_and_push_marathon_json(demo: &Demo, elb_url: &Url, branch: &str) -> Result<()> {
    let hostname = elb_hostname(elb_url)?;
    let repo = git::open(&demo.config.repo)?;
    let workdir = repo
        .workdir()
        .context("bare repositories aren't supported")?
        .to_path_buf();

    let app = render(
        template::CD_DEMO_APP,
        &[
            ("ELB_HOSTNAME", hostname.as_str()),
            ("DOCKER_HUB_ORG", demo.config.org.as_str()),
        ],
    );
    fs::write(workdir.join("marathon.json"), app).context("Couldn't write marathon.json")?;

    git::commit_file(
        &repo,
        Path::new("marathon.json"),
        "Update marathon.json with ELB hostname",
    )?;
    git::push(demo.runner.as_ref(), &workdir, "origin", branch)?;

    say(&format!(
        "updated marathon.json with ELB hostname '{}'",
        hostname
    ));
    Ok(())
}

pub fn pipeline(demo: &Demo, branch: &str) -> Result<()> {
    ensure_branch_allowed(branch)?;
    let elb_url = demo
        .config
        .elb_url
        .clone()
        .context("pipeline needs an ELB URL")?;

    let mut manager = LifecycleManager::new();
    marathon_lb(demo, &mut manager, &elb_url)?;
    pipeline_items(demo, &mut manager, branch)?;

    manager.create(MARATHON_LB)?;
    update_and_push_marathon_json(demo, &elb_url, branch)?;

    say("creating demo pipeline (workflow)");
    manager.create(PIPELINE_JOB)?;
    say(&format!("triggering build '{}'", PIPELINE_JOB));
    demo.jenkins
        .trigger_build(PIPELINE_JOB, &pipeline_parameters(&demo.config.org))?;

    say("demo pipeline (workflow) created");
    say(&format!(
        "once deployed, your application should be available at:\n\t{}",
        elb_url
    ));
    Ok(())
}

pub fn dynamic_slaves(demo: &Demo) -> Result<()> {
    say(&format!(
        "creating {} freestyle Jenkins jobs",
        demo.config.builds
    ));

    let mut manager = LifecycleManager::new();
    let names = dynamic_slave_items(demo, &mut manager)?;
    manager.create_all()?;

    let mut rng = rand::thread_rng();
    for name in &names {
        say(&format!("triggering build '{}'", name));
        demo.jenkins.trigger_build(name, &job_parameters(&mut rng))?;
    }

    say(&format!("created {} freestyle Jenkins jobs", names.len()));
    Ok(())
}

/// Best effort: every item is attempted, failures are only logged.
pub fn cleanup(demo: &Demo) -> Result<()> {
    say("cleaning up demo pipeline");
    let mut manager = LifecycleManager::new();
    pipeline_items(demo, &mut manager, "")?;
    say(&format!("cleaning up {} builds", demo.config.builds));
    dynamic_slave_items(demo, &mut manager)?;

    let failed = manager.delete_all();
    if failed > 0 {
        warn!("{} item(s) couldn't be deleted", failed);
        say(&format!("!! {} item(s) couldn't be deleted", failed));
    }
    Ok(())
}

pub fn uninstall(demo: &Demo) -> Result<()> {
    cleanup(demo)?;

    let mut manager = LifecycleManager::new();
    manager.register(jenkins_package(demo))?;
    if !manager.delete(&demo.config.name)? {
        say(&format!(
            "!! Jenkins '{}' may not have been uninstalled",
            demo.config.name
        ));
    }
    Ok(())
}
