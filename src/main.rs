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
// main.rs - dcos-jenkins-demo main program
//

use std::process;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use ureq::{Agent, AgentBuilder};

mod command;
mod config;
mod dcos;
mod error;
mod git;
mod jenkins;
mod lifecycle;
mod poller;
mod resources;
mod scenario;
mod signals;
mod template;

#[cfg(test)]
mod testing;

use command::SystemRunner;
use scenario::Scenario;

fn run() -> Result<()> {
    let matches = match config::cli().try_get_matches() {
        Ok(matches) => matches,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => return Err(config::usage_error(e)),
    };

    let (name, sub_matches) = matches.subcommand().context("no scenario given")?;
    let scenario = Scenario::from_name(name).context("unknown scenario")?;

    let settings = config::load_settings(
        sub_matches
            .get_one::<String>("config")
            .map(String::as_str),
    )?;
    let config = config::parse_config(scenario, sub_matches, settings)?;
    debug!("Running {:?} against {}", scenario, config.dcos_url);

    // create the ureq Agent.  this should only be done once.
    let agent: Agent = AgentBuilder::new()
        .timeout_read(Duration::from_secs(10))
        .timeout_write(Duration::from_secs(10))
        .build();

    scenario::run(scenario, &config, Rc::new(SystemRunner), agent)
}

fn main() {
    env_logger::init();

    if let Err(e) = signals::setup_signal_handlers().and_then(|_| run()) {
        eprintln!("[demo]: !! {:#}", e);
        process::exit(1);
    }
}
