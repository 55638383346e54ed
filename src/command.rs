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
// command.rs - run external commands, mostly the dcos CLI
//

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::rc::Rc;

use anyhow::{Context, Result};
use log::debug;

use crate::error::DemoError;

/// Anything that can run a program for us.  The real one shells out, tests
/// swap in a recorder.
pub trait CommandRunner {
    /// Runs to completion with stdout/stderr going straight to the user.
    fn run(&self, program: &str, args: &[String]) -> Result<ExitStatus>;
    /// Runs to completion and hands back stdout.
    fn capture(&self, program: &str, args: &[String]) -> Result<String>;
}

fn describe(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

fn check(program: &str, args: &[String], status: ExitStatus) -> Result<ExitStatus> {
    if status.success() {
        Ok(status)
    } else {
        Err(DemoError::CommandError {
            command: describe(program, args),
            status: status.to_string(),
        }
        .into())
    }
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
        debug!("Running: {}", describe(program, args));

        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Couldn't start {}", program))?;

        check(program, args, status)
    }

    fn capture(&self, program: &str, args: &[String]) -> Result<String> {
        debug!("Capturing: {}", describe(program, args));

        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Couldn't start {}", program))?;

        check(program, args, output.status)?;

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// The `dcos` CLI, which owns package management and the CLI's own config.
#[derive(Clone)]
pub struct DcosCli {
    runner: Rc<dyn CommandRunner>,
    program: String,
}

impl DcosCli {
    pub fn new(runner: Rc<dyn CommandRunner>, program: &str) -> DcosCli {
        DcosCli {
            runner,
            program: program.to_string(),
        }
    }

    fn run(&self, args: Vec<String>) -> Result<()> {
        self.runner.run(&self.program, &args)?;
        Ok(())
    }

    fn capture(&self, args: Vec<String>) -> Result<String> {
        self.runner.capture(&self.program, &args)
    }

    pub fn package_install(
        &self,
        package: &str,
        app_id: Option<&str>,
        options: Option<&Path>,
    ) -> Result<()> {
        let mut args = vec!["package".to_string(), "install".to_string(), "--yes".to_string()];
        if let Some(options) = options {
            args.push(format!("--options={}", options.display()));
        }
        if let Some(app_id) = app_id {
            args.push(format!("--app-id={}", app_id));
        }
        args.push(package.to_string());

        self.run(args)
    }

    pub fn package_uninstall(&self, package: &str, app_id: Option<&str>) -> Result<()> {
        let mut args = vec![
            "package".to_string(),
            "uninstall".to_string(),
            "--yes".to_string(),
        ];
        if let Some(app_id) = app_id {
            args.push(format!("--app-id={}", app_id));
        }
        args.push(package.to_string());

        self.run(args)
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.run(vec![
            "config".to_string(),
            "set".to_string(),
            key.to_string(),
            value.to_string(),
        ])
    }

    /// `None` when the key isn't set; the CLI exits non-zero in that case.
    pub fn config_show(&self, key: &str) -> Option<String> {
        match self.capture(vec!["config".to_string(), "show".to_string(), key.to_string()]) {
            Ok(value) => {
                let value = value.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            Err(e) => {
                debug!("{} is not set: {}", key, e);
                None
            }
        }
    }

    pub fn marathon_app_add(&self, definition: &Path) -> Result<()> {
        self.run(vec![
            "marathon".to_string(),
            "app".to_string(),
            "add".to_string(),
            definition.display().to_string(),
        ])
    }

    pub fn marathon_app_remove(&self, app_id: &str) -> Result<()> {
        self.run(vec![
            "marathon".to_string(),
            "app".to_string(),
            "remove".to_string(),
            app_id.to_string(),
        ])
    }

    /// Last `lines` lines of a task's stdout.
    pub fn task_log(&self, task: &str, lines: u32) -> Result<String> {
        self.capture(vec![
            "task".to_string(),
            "log".to_string(),
            format!("--lines={}", lines),
            task.to_string(),
        ])
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::os::unix::process::ExitStatusExt;

    /// Remembers every command line and pretends it worked, unless the
    /// command line starts with one of the registered failures.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<String>>,
        pub failures: Vec<String>,
        pub outputs: HashMap<String, String>,
    }

    impl RecordingRunner {
        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, program: &str, args: &[String]) -> Result<String> {
            let line = describe(program, args);
            self.calls.borrow_mut().push(line.clone());
            if self.failures.iter().any(|f| line.starts_with(f.as_str())) {
                return Err(DemoError::CommandError {
                    command: line,
                    status: "exit status: 1".to_string(),
                }
                .into());
            }
            Ok(line)
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<ExitStatus> {
            self.record(program, args)?;
            Ok(ExitStatus::from_raw(0))
        }

        fn capture(&self, program: &str, args: &[String]) -> Result<String> {
            let line = self.record(program, args)?;
            Ok(self.outputs.get(&line).cloned().unwrap_or_default())
        }
    }
}
