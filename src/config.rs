//
// dcos-jenkins-demo - Jenkins on DC/OS demonstration driver
//
// Copyright (C) 2021 IBM Corporation
// Copyright (C) 2026 dcos-jenkins-demo contributors
//
// This program is free software; you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation; either version 2 of the License, or (at your option)
// any later version.
//
// config.rs - command line and RON settings, merged into one typed config
//

// standard library
use std::{fs::File, path::PathBuf, time::Duration};

// third party dependencies
use anyhow::{Context, Result};
use clap::{crate_version, value_parser, Arg, ArgMatches, Command};
use log::debug;
use ron::de::from_reader;
use serde::Deserialize;
use url::Url;

// our stuff
use crate::error::DemoError;
use crate::poller::PollPolicy;
use crate::scenario::Scenario;

/// Optional settings file.  Every field can be left out; command line
/// options win over anything in here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub name: Option<String>,
    pub org: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub dcos_username: Option<String>,
    pub dcos_password: Option<String>,
    pub dcos_oauth_token: Option<String>,
    pub builds: Option<usize>,
    /// Which `dcos` binary to run.  Defaults to whatever is on `$PATH`.
    pub dcos_cli: Option<String>,
    /// Git checkout the pipeline demo commits `marathon.json` into.
    pub repo: Option<PathBuf>,
    pub policies: Policies,
    /// Seconds to let the service account reader finish writing its log.
    pub secret_settle: Option<u64>,
}

/// How long to wait for each kind of thing, and how often to look.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Policies {
    pub jenkins: PollPolicy,
    pub marathon_lb: PollPolicy,
    pub jenkins_items: PollPolicy,
    pub service_account_task: PollPolicy,
    pub uninstall: PollPolicy,
}

impl Default for Policies {
    fn default() -> Policies {
        Policies {
            jenkins: PollPolicy::secs(1, 60),
            marathon_lb: PollPolicy::secs(1, 300),
            jenkins_items: PollPolicy::secs(1, 30),
            service_account_task: PollPolicy::secs(1, 300),
            uninstall: PollPolicy::secs(5, 300),
        }
    }
}

impl Policies {
    fn named(&self) -> [(&'static str, PollPolicy); 5] {
        [
            ("jenkins", self.jenkins),
            ("marathon_lb", self.marathon_lb),
            ("jenkins_items", self.jenkins_items),
            ("service_account_task", self.service_account_task),
            ("uninstall", self.uninstall),
        ]
    }
}

/// Everything a scenario needs, checked once up front.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Always ends in a slash.
    pub dcos_url: Url,
    pub elb_url: Option<Url>,
    /// Jenkins instance name, lowercased.
    pub name: String,
    pub org: String,
    pub docker_username: String,
    pub docker_password: Option<String>,
    pub dcos_username: Option<String>,
    pub dcos_password: Option<String>,
    pub dcos_oauth_token: Option<String>,
    pub builds: usize,
    pub dcos_cli: String,
    pub repo: PathBuf,
    pub policies: Policies,
    pub secret_settle: Duration,
}

impl DemoConfig {
    /// Open DC/OS logs in with OAuth; Enterprise with a username and password.
    pub fn is_enterprise(&self) -> bool {
        self.dcos_oauth_token.is_none()
    }
}

fn option(name: &'static str, value: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name(value)
        .help(help)
        .global(true)
}

fn dcos_url_arg() -> Arg {
    Arg::new("dcos_url")
        .value_name("DCOS_URL")
        .help("Base URL of the DC/OS cluster")
        .required(true)
}

pub fn cli() -> Command {
    Command::new("dcos-jenkins-demo")
        .version(crate_version!())
        .about("Demonstrates Jenkins on DC/OS: installs it, builds pipelines and cleans up")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(option("config", "FILE", "RON settings file"))
        .arg(option("name", "NAME", "Jenkins instance name to use [default: jenkins]"))
        .arg(option("org", "ORG", "Docker Hub organisation [default: mesosphere]"))
        .arg(option("username", "USER", "Docker Hub username [default: cddemo]"))
        .arg(option("password", "PASS", "Docker Hub password"))
        .arg(option(
            "dcos-username",
            "USER",
            "DC/OS auth username [default: bootstrapuser]",
        ))
        .arg(option(
            "dcos-password",
            "PASS",
            "DC/OS auth password [default: deleteme]",
        ))
        .arg(option(
            "dcos-oauth-token",
            "TOKEN",
            "DC/OS OAuth token (required for open DC/OS)",
        ))
        .arg(
            option("builds", "N", "Number of builds to create [default: 50]")
                .value_parser(value_parser!(usize)),
        )
        .subcommand(
            Command::new("install")
                .about("Install Jenkins unless it is already running")
                .arg(dcos_url_arg()),
        )
        .subcommand(
            Command::new("pipeline")
                .about("Create the continuous delivery pipeline demo")
                .arg(
                    Arg::new("elb_url")
                        .value_name("ELB_URL")
                        .help("Public URL marathon-lb answers on")
                        .required(true),
                )
                .arg(dcos_url_arg()),
        )
        .subcommand(
            Command::new("dynamic-slaves")
                .about("Create lots of freestyle jobs that pass or fail at random")
                .arg(dcos_url_arg()),
        )
        .subcommand(
            Command::new("cleanup")
                .about("Remove the demo jobs, credentials and views")
                .arg(dcos_url_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Clean up, then uninstall Jenkins")
                .arg(dcos_url_arg()),
        )
}

/// A command line parse failure as a one-line error.  Help and version
/// requests aren't failures and are left to clap.
pub fn usage_error(err: clap::Error) -> anyhow::Error {
    let text = err.to_string();
    let message = text
        .lines()
        .map(str::trim)
        .take_while(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let message = message.trim_start_matches("error:").trim();

    DemoError::Usage(message.to_string()).into()
}

fn parse_base_url(raw: &str, what: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid {} '{}'", what, raw))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(DemoError::PreconditionFailed(format!(
            "{} must be http or https, got '{}'",
            what, raw
        ))
        .into());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn string_arg(matches: &ArgMatches, name: &str) -> Option<String> {
    matches.get_one::<String>(name).cloned()
}

fn default_settings_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("dcos-jenkins-demo");
    path.push("config.ron");
    Some(path)
}

/// An explicit path has to exist; the default one is optional.
pub fn load_settings(path: Option<&str>) -> Result<Settings> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => match default_settings_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Settings::default()),
        },
    };

    let file = File::open(&path)
        .with_context(|| format!("Failed to open settings file at {}", path.display()))?;
    let settings: Settings = from_reader(file)
        .with_context(|| format!("Failed to parse settings file {}", path.display()))?;

    debug!("Settings from {}: {:?}", path.display(), settings);

    Ok(settings)
}

/// Builds the config for one scenario from its subcommand matches and the
/// settings file.
pub fn parse_config(
    scenario: Scenario,
    matches: &ArgMatches,
    settings: Settings,
) -> Result<DemoConfig> {
    let dcos_url = matches
        .get_one::<String>("dcos_url")
        .context("DC/OS URL is required")?;
    let dcos_url = parse_base_url(dcos_url, "DC/OS URL")?;

    let elb_url = match matches.try_get_one::<String>("elb_url") {
        Ok(Some(raw)) => Some(parse_base_url(raw, "ELB URL")?),
        _ => None,
    };

    let name = string_arg(matches, "name")
        .or(settings.name)
        .unwrap_or_else(|| "jenkins".to_string())
        .to_lowercase();

    let config = DemoConfig {
        dcos_url,
        elb_url,
        name,
        org: string_arg(matches, "org")
            .or(settings.org)
            .unwrap_or_else(|| "mesosphere".to_string()),
        docker_username: string_arg(matches, "username")
            .or(settings.username)
            .unwrap_or_else(|| "cddemo".to_string()),
        docker_password: string_arg(matches, "password").or(settings.password),
        dcos_username: string_arg(matches, "dcos-username")
            .or(settings.dcos_username)
            .or_else(|| Some("bootstrapuser".to_string())),
        dcos_password: string_arg(matches, "dcos-password")
            .or(settings.dcos_password)
            .or_else(|| Some("deleteme".to_string())),
        dcos_oauth_token: string_arg(matches, "dcos-oauth-token").or(settings.dcos_oauth_token),
        builds: matches
            .get_one::<usize>("builds")
            .copied()
            .or(settings.builds)
            .unwrap_or(50),
        dcos_cli: settings.dcos_cli.unwrap_or_else(|| "dcos".to_string()),
        repo: settings.repo.unwrap_or_else(|| PathBuf::from(".")),
        policies: settings.policies,
        secret_settle: Duration::from_secs(settings.secret_settle.unwrap_or(30)),
    };

    validate_config(scenario, &config)?;

    Ok(config)
}

fn validate_config(scenario: Scenario, config: &DemoConfig) -> Result<()> {
    if config.name.is_empty() {
        return Err(DemoError::PreconditionFailed("--name can't be empty".to_string()).into());
    }

    // a zero interval would probe the cluster in a tight loop
    for (name, policy) in config.policies.named().iter() {
        if policy.interval.as_secs() == 0 {
            return Err(DemoError::PreconditionFailed(format!(
                "policies.{}.interval must be at least 1 second",
                name
            ))
            .into());
        }
    }

    if scenario == Scenario::Pipeline {
        if config.elb_url.is_none() {
            return Err(
                DemoError::PreconditionFailed("pipeline needs an ELB URL".to_string()).into(),
            );
        }
        if config.docker_password.is_none() {
            return Err(DemoError::PreconditionFailed(
                "pipeline needs --password for Docker Hub".to_string(),
            )
            .into());
        }
    }

    Ok(())
}
