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
// git.rs - the bits of git the pipeline demo needs
//

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Oid, Repository};
use log::debug;

use crate::command::CommandRunner;

pub fn open(path: &Path) -> Result<Repository> {
    Repository::discover(path)
        .with_context(|| format!("{} isn't inside a git repository", path.display()))
}

/// Short name of the checked out branch, e.g. `master`.
pub fn current_branch(repo: &Repository) -> Result<String> {
    let head = repo.head().context("Couldn't read HEAD")?;
    let branch = head
        .shorthand()
        .context("HEAD isn't valid UTF-8")?
        .to_string();

    debug!("Current branch is {}", branch);
    Ok(branch)
}

/// Stages and commits a single file, path relative to the work tree.
pub fn commit_file(repo: &Repository, file: &Path, message: &str) -> Result<Oid> {
    let mut index = repo.index()?;
    index
        .add_path(file)
        .with_context(|| format!("failed to add {} to git repo", file.display()))?;
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = repo.signature().context("git user.name/user.email not set")?;
    let parent = repo.head()?.peel_to_commit()?;

    let oid = repo
        .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
        .with_context(|| format!("failed to commit updated {}", file.display()))?;

    debug!("Committed {} as {}", file.display(), oid);
    Ok(oid)
}

// Pushes with the git binary so the user's own remote credentials apply.
pub fn push(runner: &dyn CommandRunner, workdir: &Path, remote: &str, branch: &str) -> Result<()> {
    runner
        .run(
            "git",
            &[
                "-C".to_string(),
                workdir.display().to_string(),
                "push".to_string(),
                remote.to_string(),
                branch.to_string(),
            ],
        )
        .with_context(|| format!("failed to push to {} {}", remote, branch))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use git2::{RepositoryInitOptions, Signature};
    use std::fs;

    fn scratch_repo(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(dir, &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Demo Tester").unwrap();
            config.set_str("user.email", "demo@example.com").unwrap();

            let sig = Signature::now("Demo Tester", "demo@example.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn reads_branch_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo = scratch_repo(dir.path());

        assert_eq!(current_branch(&repo).unwrap(), "master");
    }

    #[test]
    fn discovers_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        scratch_repo(dir.path());
        let sub = dir.path().join("conf");
        fs::create_dir(&sub).unwrap();

        let repo = open(&sub).unwrap();
        assert_eq!(current_branch(&repo).unwrap(), "master");
    }

    #[test]
    fn commits_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = scratch_repo(dir.path());
        fs::write(dir.path().join("marathon.json"), "{}").unwrap();

        let oid = commit_file(&repo, Path::new("marathon.json"), "Update marathon.json").unwrap();

        let commit = repo.find_commit(oid).unwrap();
        assert_eq!(commit.message(), Some("Update marathon.json"));
        assert_eq!(commit.parent_count(), 1);
        assert!(commit.tree().unwrap().get_name("marathon.json").is_some());
    }

    #[test]
    fn push_runs_git() {
        let runner = RecordingRunner::default();

        push(&runner, Path::new("/src/demo"), "origin", "my-demo").unwrap();

        assert_eq!(runner.calls(), vec!["git -C /src/demo push origin my-demo"]);
    }
}
