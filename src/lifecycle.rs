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
// lifecycle.rs - create, wait for, and tear down remote resources
//

use std::fmt;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::error::DemoError;
use crate::poller::{await_ready, PollPolicy, Readiness};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Package,
    HttpService,
    Job,
    Credential,
    View,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ResourceKind::Package => "package",
            ResourceKind::HttpService => "service",
            ResourceKind::Job => "job",
            ResourceKind::Credential => "credentials",
            ResourceKind::View => "view",
            ResourceKind::Secret => "secret",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Creating,
    WaitingReady,
    Ready,
    Failed,
    Deleting,
    Deleted,
}

/// What a concrete resource knows how to do against the remote side.
/// Ordering, waiting and failure policy live in `LifecycleManager`.
pub trait Lifecycle {
    fn create(&mut self) -> Result<()>;
    fn delete(&mut self) -> Result<()>;
    /// `None` means there is nothing to probe; such a resource is ready
    /// as soon as `create` succeeds.
    fn probe(&mut self) -> Option<bool> {
        None
    }
}

pub struct ManagedResource {
    pub name: String,
    pub kind: ResourceKind,
    pub dependencies: Vec<String>,
    pub policy: PollPolicy,
    actions: Box<dyn Lifecycle>,
}

impl ManagedResource {
    pub fn new<L>(name: &str, kind: ResourceKind, policy: PollPolicy, actions: L) -> ManagedResource
    where
        L: Lifecycle + 'static,
    {
        ManagedResource {
            name: name.to_string(),
            kind,
            dependencies: vec![],
            policy,
            actions: Box::new(actions),
        }
    }

    pub fn depends_on(mut self, name: &str) -> ManagedResource {
        self.dependencies.push(name.to_string());
        self
    }
}

struct Entry {
    resource: ManagedResource,
    state: LifecycleState,
}

/// Drives each registered resource through
/// Pending -> Creating -> WaitingReady -> Ready (or Failed),
/// and later Deleting -> Deleted.
#[derive(Default)]
pub struct LifecycleManager {
    entries: Vec<Entry>,
}

impl LifecycleManager {
    pub fn new() -> LifecycleManager {
        LifecycleManager::default()
    }

    pub fn register(&mut self, resource: ManagedResource) -> Result<()> {
        if self.find(&resource.name).is_some() {
            return Err(DemoError::PreconditionFailed(format!(
                "resource '{}' registered twice",
                resource.name
            ))
            .into());
        }

        debug!("Registered {} '{}'", resource.kind, resource.name);
        self.entries.push(Entry {
            resource,
            state: LifecycleState::Pending,
        });
        Ok(())
    }

    #[cfg(test)]
    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.find(name).map(|i| self.entries[i].state)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.resource.name.clone()).collect()
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.resource.name == name)
    }

    fn index(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or_else(|| {
            DemoError::PreconditionFailed(format!("no resource named '{}'", name)).into()
        })
    }

    /// Creates every resource in registration order, stopping at the
    /// first one that fails.
    pub fn create_all(&mut self) -> Result<()> {
        for name in self.names() {
            self.create(&name)?;
        }
        Ok(())
    }

    /// Brings `name` to Ready, creating its dependencies first.
    pub fn create(&mut self, name: &str) -> Result<()> {
        let mut visiting = vec![];
        self.create_inner(name, &mut visiting)
    }

    fn create_inner(&mut self, name: &str, visiting: &mut Vec<String>) -> Result<()> {
        let idx = self.index(name)?;

        match self.entries[idx].state {
            LifecycleState::Ready => return Ok(()),
            LifecycleState::Failed => {
                return Err(DemoError::PreconditionFailed(format!(
                    "'{}' already failed in this run",
                    name
                ))
                .into())
            }
            _ => {}
        }

        if visiting.iter().any(|v| v == name) {
            return Err(DemoError::PreconditionFailed(format!(
                "dependency cycle through '{}'",
                name
            ))
            .into());
        }
        visiting.push(name.to_string());

        // already up from an earlier run, so its dependencies must be too
        if let Some(true) = self.entries[idx].resource.actions.probe() {
            let entry = &self.entries[idx].resource;
            info!("{} '{}' is already up", entry.kind, entry.name);
            self.set_state(idx, LifecycleState::Ready);
            visiting.pop();
            return Ok(());
        }

        for dep in self.entries[idx].resource.dependencies.clone() {
            self.create_inner(&dep, visiting)
                .with_context(|| format!("dependency '{}' of '{}' isn't ready", dep, name))?;
        }

        visiting.pop();
        self.bring_up(idx)
    }

    fn set_state(&mut self, idx: usize, state: LifecycleState) {
        let entry = &mut self.entries[idx];
        debug!("{} '{}': {:?} -> {:?}", entry.resource.kind, entry.resource.name, entry.state, state);
        entry.state = state;
    }

    fn bring_up(&mut self, idx: usize) -> Result<()> {
        let name = self.entries[idx].resource.name.clone();
        let kind = self.entries[idx].resource.kind;

        self.set_state(idx, LifecycleState::Creating);
        if let Err(e) = self.entries[idx].resource.actions.create() {
            self.set_state(idx, LifecycleState::Failed);
            return Err(e.context(format!("failed to create {} '{}'", kind, name)));
        }

        self.set_state(idx, LifecycleState::WaitingReady);
        let entry = &mut self.entries[idx];
        let policy = entry.resource.policy;
        let actions = &mut entry.resource.actions;
        match await_ready(|| actions.probe().unwrap_or(true), &policy) {
            Readiness::Ready => {
                self.set_state(idx, LifecycleState::Ready);
                Ok(())
            }
            Readiness::TimedOut => {
                self.set_state(idx, LifecycleState::Failed);
                Err(DemoError::TimedOut {
                    what: format!("{} '{}'", kind, name),
                    after: policy.timeout,
                }
                .into())
            }
        }
    }

    /// Best effort: a failing delete is logged and the resource is still
    /// considered gone.  Returns false if the remote call failed.
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let idx = self.index(name)?;
        if self.entries[idx].state == LifecycleState::Deleted {
            return Ok(true);
        }

        let kind = self.entries[idx].resource.kind;
        self.set_state(idx, LifecycleState::Deleting);
        let deleted = match self.entries[idx].resource.actions.delete() {
            Ok(()) => true,
            Err(e) => {
                warn!("Couldn't delete {} '{}': {:#}", kind, name, e);
                false
            }
        };
        self.set_state(idx, LifecycleState::Deleted);

        Ok(deleted)
    }

    /// Deletes everything, dependents first, and keeps going past failures.
    /// Returns how many deletes failed.
    pub fn delete_all(&mut self) -> usize {
        let mut failed = 0;
        for name in self.names().iter().rev() {
            match self.delete(name) {
                Ok(true) => {}
                _ => failed += 1,
            }
        }
        failed
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeResource, Journal};
    use super::*;
    use crate::error::kind_of;
    use std::time::Duration;

    fn quick() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(50))
    }

    fn managed(fake: FakeResource) -> ManagedResource {
        let name = fake.name.clone();
        ManagedResource::new(&name, ResourceKind::Job, quick(), fake)
    }

    fn journal() -> Journal {
        Journal::default()
    }

    #[test]
    fn create_waits_for_ready() {
        let log = journal();
        let mut fake = FakeResource::new("jenkins", &log);
        fake.warmup = 3;
        let mut manager = LifecycleManager::new();
        manager.register(managed(fake)).unwrap();

        manager.create("jenkins").unwrap();

        assert_eq!(manager.state("jenkins"), Some(LifecycleState::Ready));
        assert_eq!(*log.borrow(), vec!["create jenkins"]);
    }

    #[test]
    fn create_skipped_when_already_ready() {
        let log = journal();
        let mut fake = FakeResource::new("jenkins", &log);
        fake.up = true;
        let mut manager = LifecycleManager::new();
        manager.register(managed(fake)).unwrap();

        manager.create_all().unwrap();

        assert_eq!(manager.state("jenkins"), Some(LifecycleState::Ready));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn idempotent_across_many_resources() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        for i in 0..5 {
            let mut fake = FakeResource::new(&format!("r{}", i), &log);
            // odd ones exist already
            fake.up = i % 2 == 1;
            manager.register(managed(fake)).unwrap();
        }

        manager.create_all().unwrap();

        assert_eq!(*log.borrow(), vec!["create r0", "create r2", "create r4"]);
        for name in manager.names() {
            assert_eq!(manager.state(&name), Some(LifecycleState::Ready));
        }
    }

    #[test]
    fn no_probe_means_ready_after_create() {
        let log = journal();
        let mut fake = FakeResource::new("creds", &log);
        fake.has_probe = false;
        let mut manager = LifecycleManager::new();
        manager.register(managed(fake)).unwrap();

        manager.create("creds").unwrap();

        assert_eq!(manager.state("creds"), Some(LifecycleState::Ready));
        assert_eq!(*log.borrow(), vec!["create creds"]);
    }

    #[test]
    fn dependencies_come_first() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager
            .register(managed(FakeResource::new("marathon-lb", &log)).depends_on("secret"))
            .unwrap();
        manager
            .register(managed(FakeResource::new("secret", &log)))
            .unwrap();

        manager.create_all().unwrap();

        assert_eq!(*log.borrow(), vec!["create secret", "create marathon-lb"]);
    }

    #[test]
    fn ready_dependent_skips_dependencies() {
        let log = journal();
        let mut lb = FakeResource::new("marathon-lb", &log);
        lb.up = true;
        let mut manager = LifecycleManager::new();
        manager
            .register(managed(FakeResource::new("secret", &log)))
            .unwrap();
        manager.register(managed(lb).depends_on("secret")).unwrap();

        manager.create("marathon-lb").unwrap();

        assert_eq!(manager.state("marathon-lb"), Some(LifecycleState::Ready));
        assert_eq!(manager.state("secret"), Some(LifecycleState::Pending));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn failed_dependency_blocks_dependent() {
        let log = journal();
        let mut secret = FakeResource::new("secret", &log);
        secret.fail_create = true;
        let mut manager = LifecycleManager::new();
        manager.register(managed(secret)).unwrap();
        manager
            .register(managed(FakeResource::new("marathon-lb", &log)).depends_on("secret"))
            .unwrap();

        assert!(manager.create("marathon-lb").is_err());

        assert_eq!(manager.state("secret"), Some(LifecycleState::Failed));
        assert_eq!(manager.state("marathon-lb"), Some(LifecycleState::Pending));
        assert_eq!(*log.borrow(), vec!["create secret"]);
    }

    #[test]
    fn create_all_stops_at_first_failure() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        let mut bad = FakeResource::new("a", &log);
        bad.fail_create = true;
        manager.register(managed(bad)).unwrap();
        manager.register(managed(FakeResource::new("b", &log))).unwrap();

        assert!(manager.create_all().is_err());
        assert_eq!(manager.state("b"), Some(LifecycleState::Pending));
        assert_eq!(*log.borrow(), vec!["create a"]);
    }

    #[test]
    fn never_ready_times_out() {
        let log = journal();
        let mut fake = FakeResource::new("jenkins", &log);
        fake.never_ready = true;
        let mut manager = LifecycleManager::new();
        manager.register(managed(fake)).unwrap();

        let err = manager.create("jenkins").unwrap_err();

        assert!(matches!(kind_of(&err), Some(DemoError::TimedOut { .. })));
        assert_eq!(manager.state("jenkins"), Some(LifecycleState::Failed));
    }

    #[test]
    fn cycles_are_refused() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager
            .register(managed(FakeResource::new("a", &log)).depends_on("b"))
            .unwrap();
        manager
            .register(managed(FakeResource::new("b", &log)).depends_on("a"))
            .unwrap();

        let err = manager.create("a").unwrap_err();

        assert!(matches!(kind_of(&err), Some(DemoError::PreconditionFailed(_))));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn unknown_dependency_is_refused() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager
            .register(managed(FakeResource::new("a", &log)).depends_on("ghost"))
            .unwrap();

        assert!(manager.create("a").is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn duplicate_names_rejected() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager.register(managed(FakeResource::new("a", &log))).unwrap();

        assert!(manager.register(managed(FakeResource::new("a", &log))).is_err());
    }

    #[test]
    fn failed_delete_does_not_stop_cleanup() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager.register(managed(FakeResource::new("a", &log))).unwrap();
        let mut stuck = FakeResource::new("b", &log);
        stuck.fail_delete = true;
        manager.register(managed(stuck)).unwrap();
        manager.register(managed(FakeResource::new("c", &log))).unwrap();

        let failed = manager.delete_all();

        assert_eq!(failed, 1);
        assert_eq!(*log.borrow(), vec!["delete c", "delete b", "delete a"]);
        for name in &["a", "b", "c"] {
            assert_eq!(manager.state(name), Some(LifecycleState::Deleted));
        }
    }

    #[test]
    fn deleting_twice_is_a_no_op() {
        let log = journal();
        let mut manager = LifecycleManager::new();
        manager.register(managed(FakeResource::new("a", &log))).unwrap();
        manager.create("a").unwrap();

        assert!(manager.delete("a").unwrap());
        assert!(manager.delete("a").unwrap());
        assert_eq!(*log.borrow(), vec!["create a", "delete a"]);
    }
}
