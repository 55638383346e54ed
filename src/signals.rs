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
// signals.rs - interrupting a demo is a normal way to stop it
//

use anyhow::{Context, Result};
use log::debug;
use nix::libc;
use nix::sys::signal::{signal, SigHandler, Signal};

/// Ctrl-C ends the process quietly with status 0.
pub fn setup_signal_handlers() -> Result<()> {
    debug!("Installing SIGINT handler");

    unsafe { signal(Signal::SIGINT, SigHandler::Handler(handle_sigint)) }
        .context("Couldn't install SIGINT handler")?;

    Ok(())
}

extern "C" fn handle_sigint(_: libc::c_int) {
    // only async-signal-safe calls in here, so no logging and no unwinding
    unsafe { libc::_exit(0) }
}
