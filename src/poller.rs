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
// poller.rs - wait for slow services to come up
//

use std::thread::sleep;
use std::time::{Duration, Instant};

use log::trace;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    #[serde(with = "secs")]
    pub interval: Duration,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> PollPolicy {
        PollPolicy { interval, timeout }
    }

    pub fn secs(interval: u64, timeout: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }
}

// RON files give policies in whole seconds
mod secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(de: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(de)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// Calls `probe` until it returns true or `policy.timeout` runs out.
///
/// The first probe happens straight away.  After that we sleep for
/// `policy.interval` between probes, cut short so we never sleep past the
/// deadline.  A timeout is not an error here, the caller decides what it means.
pub fn await_ready<F>(mut probe: F, policy: &PollPolicy) -> Readiness
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if probe() {
            trace!("ready after {} probe(s)", attempts);
            return Readiness::Ready;
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            trace!("gave up after {} probe(s)", attempts);
            return Readiness::TimedOut;
        }

        sleep(policy.interval.min(policy.timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(5), Duration::from_millis(60))
    }

    #[test]
    fn first_probe_is_immediate() {
        let policy = PollPolicy::new(Duration::from_secs(30), Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(await_ready(|| true, &policy), Readiness::Ready);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn ready_after_a_few_attempts() {
        let mut calls = 0;
        let readiness = await_ready(
            || {
                calls += 1;
                calls == 3
            },
            &quick(),
        );

        assert_eq!(readiness, Readiness::Ready);
        assert_eq!(calls, 3);
    }

    #[test]
    fn times_out_once_deadline_passes() {
        let policy = quick();
        let start = Instant::now();
        let mut calls = 0;

        let readiness = await_ready(
            || {
                calls += 1;
                false
            },
            &policy,
        );

        let elapsed = start.elapsed();
        assert_eq!(readiness, Readiness::TimedOut);
        assert!(elapsed >= policy.timeout);
        // one interval of slack for the scheduler, not a runaway loop
        assert!(elapsed < policy.timeout + Duration::from_millis(500));
        assert!(calls >= 2);
    }

    #[test]
    fn zero_timeout_probes_once() {
        let mut calls = 0;
        let readiness = await_ready(
            || {
                calls += 1;
                false
            },
            &PollPolicy::new(Duration::from_secs(1), Duration::from_secs(0)),
        );

        assert_eq!(readiness, Readiness::TimedOut);
        assert_eq!(calls, 1);
    }

    #[test]
    fn policy_from_ron_seconds() {
        let policy: PollPolicy = ron::de::from_str("(interval: 2, timeout: 90)").unwrap();

        assert_eq!(policy, PollPolicy::secs(2, 90));
    }
}
