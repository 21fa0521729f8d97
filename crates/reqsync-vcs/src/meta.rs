//! Per-project metadata records kept on a driver as JSON.
//!
//! Layout under `projects/<project id>/`:
//! - `meta.json` -- the bound backend project
//! - `head.json` -- the current branch name
//! - `branches/<name>.json` -- one record per branch

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use reqsync_store::Driver;
use reqsync_types::BackendProject;

use crate::branch::Branch;
use crate::error::VcsResult;

#[derive(Serialize, Deserialize)]
struct HeadRecord {
    branch: String,
}

/// JSON records for one project.
#[derive(Clone)]
pub struct ProjectMeta {
    driver: Arc<dyn Driver>,
    project_id: String,
}

impl ProjectMeta {
    pub fn new(driver: Arc<dyn Driver>, project_id: impl Into<String>) -> Self {
        Self {
            driver,
            project_id: project_id.into(),
        }
    }

    fn key(&self, rest: &str) -> String {
        format!("projects/{}/{rest}", self.project_id)
    }

    fn branch_prefix(&self) -> String {
        self.key("branches/")
    }

    pub fn load_project(&self) -> VcsResult<Option<BackendProject>> {
        read_json(self.driver.as_ref(), &self.key("meta.json"))
    }

    pub fn save_project(&self, project: &BackendProject) -> VcsResult<()> {
        write_json(self.driver.as_ref(), &self.key("meta.json"), project)
    }

    pub fn current_branch(&self) -> VcsResult<Option<String>> {
        let head: Option<HeadRecord> = read_json(self.driver.as_ref(), &self.key("head.json"))?;
        Ok(head.map(|h| h.branch))
    }

    pub fn set_current_branch(&self, name: &str) -> VcsResult<()> {
        let record = HeadRecord {
            branch: name.to_string(),
        };
        write_json(self.driver.as_ref(), &self.key("head.json"), &record)
    }

    pub fn branch(&self, name: &str) -> VcsResult<Option<Branch>> {
        read_json(
            self.driver.as_ref(),
            &format!("{}{name}.json", self.branch_prefix()),
        )
    }

    pub fn save_branch(&self, branch: &Branch) -> VcsResult<()> {
        write_json(
            self.driver.as_ref(),
            &format!("{}{}.json", self.branch_prefix(), branch.name),
            branch,
        )
    }

    pub fn delete_branch(&self, name: &str) -> VcsResult<bool> {
        Ok(self
            .driver
            .delete(&format!("{}{name}.json", self.branch_prefix()))?)
    }

    /// Names of every local branch, sorted.
    pub fn branch_names(&self) -> VcsResult<Vec<String>> {
        let prefix = self.branch_prefix();
        let mut names: Vec<String> = self
            .driver
            .list(&prefix)?
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Ids of every project with stored metadata.
pub fn known_projects(driver: &dyn Driver) -> VcsResult<Vec<String>> {
    let mut ids: Vec<String> = driver
        .list("projects/")?
        .into_iter()
        .filter_map(|key| {
            key.strip_prefix("projects/")
                .and_then(|rest| rest.strip_suffix("/meta.json"))
                .filter(|id| !id.contains('/'))
                .map(str::to_string)
        })
        .collect();
    ids.sort();
    Ok(ids)
}

pub(crate) fn read_json<T: DeserializeOwned>(driver: &dyn Driver, key: &str) -> VcsResult<Option<T>> {
    match driver.read(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn write_json<T: Serialize>(driver: &dyn Driver, key: &str, value: &T) -> VcsResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    driver.write(key, &bytes)?;
    Ok(())
}
