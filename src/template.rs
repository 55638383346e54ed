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
// template.rs - bundled payloads and placeholder substitution
//

use std::io::Write;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

// Package options for `dcos package install`
pub const JENKINS_OPTIONS: &str = include_str!("../templates/jenkins.json");
pub const MARATHON_LB_OPTIONS: &str = include_str!("../templates/marathon-lb.json");

// Marathon app definitions
pub const SERVICE_ACCOUNT_READER: &str = include_str!("../templates/get_sa.json");
pub const CD_DEMO_APP: &str = include_str!("../templates/cd-demo-app.json");

// Jenkins item configs
pub const PIPELINE_JOB: &str = include_str!("../templates/pipeline-demo.xml");
pub const DEMO_JOB: &str = include_str!("../templates/demo-job.xml");
pub const LIST_VIEW: &str = include_str!("../templates/dynamic-slaves-view.xml");

/// Swaps every occurrence of each placeholder for its value, in order.
pub fn render(template: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |text, &(placeholder, value)| {
            text.replace(placeholder, value)
        })
}

/// Writes `contents` to a temp file that is removed when the handle drops.
pub fn transient_file(contents: &str, suffix: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("dcos-jenkins-demo-")
        .suffix(suffix)
        .tempfile()
        .context("Couldn't create temporary file")?;

    file.write_all(contents.as_bytes())
        .and_then(|_| file.flush())
        .context("Couldn't write temporary file")?;

    Ok(file)
}
