//! # Project Registry
//!
//! The catalog of carbon projects that credits can be issued against.
//! Projects get sequential ids starting at 1, are owned by the registering
//! identity, and carry a cumulative issuance counter that only successful
//! mints advance. Deactivation is one-way: a deactivated project stays in
//! the catalog for provenance but can never receive another mint.
//!
//! The catalog is append-only. Ids are never reused and entries are never
//! deleted, so the registry doubles as the audit basis for every credit's
//! origin.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_TITLE_LEN;
use crate::ledger::Address;

/// Sequential project identifier, starting at 1.
pub type ProjectId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The referenced project id has never been assigned.
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    /// The project exists but has been deactivated.
    #[error("project {0} is inactive")]
    ProjectInactive(ProjectId),

    /// Project names must be non-empty and within the length cap.
    #[error("invalid project name")]
    InvalidName,

    /// The cumulative issuance counter would overflow.
    #[error("issuance overflow on project {0}")]
    IssuanceOverflow(ProjectId),
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// Metadata and issuance state for one registered project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    /// Sequential id, assigned at registration.
    pub id: ProjectId,
    /// Human-readable project name.
    pub name: String,
    /// Identity of the registering owner.
    pub owner: Address,
    /// Credits the assessment pipeline estimated for this project.
    pub estimated_credits: u64,
    /// Cumulative credits minted against this project. Never decremented.
    pub total_issued: u64,
    /// Whether new credits may still be minted against this project.
    pub active: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ProjectRegistry
// ---------------------------------------------------------------------------

/// Append-only project catalog with a per-owner discovery index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    projects: BTreeMap<ProjectId, Project>,
    by_owner: HashMap<Address, Vec<ProjectId>>,
    next_id: ProjectId,
}

impl ProjectRegistry {
    /// Creates an empty registry. The first registered project gets id 1.
    pub fn new() -> Self {
        Self {
            projects: BTreeMap::new(),
            by_owner: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a new project and returns its id.
    ///
    /// The project starts active with a zero issuance counter.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] if the name is empty or longer
    /// than the title cap.
    pub fn register(
        &mut self,
        name: &str,
        owner: &str,
        estimated_credits: u64,
        now: DateTime<Utc>,
    ) -> Result<ProjectId, RegistryError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_TITLE_LEN {
            return Err(RegistryError::InvalidName);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.projects.insert(
            id,
            Project {
                id,
                name: name.to_string(),
                owner: owner.to_string(),
                estimated_credits,
                total_issued: 0,
                active: true,
                created_at: now,
            },
        );
        self.by_owner.entry(owner.to_string()).or_default().push(id);
        Ok(id)
    }

    /// Deactivates a project. One-way; there is no reactivation path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ProjectNotFound`] for an unknown id and
    /// [`RegistryError::ProjectInactive`] if the project was already
    /// deactivated.
    pub fn deactivate(&mut self, id: ProjectId) -> Result<(), RegistryError> {
        let project = self
            .projects
            .get_mut(&id)
            .ok_or(RegistryError::ProjectNotFound(id))?;
        if !project.active {
            return Err(RegistryError::ProjectInactive(id));
        }
        project.active = false;
        Ok(())
    }

    /// Returns the project if it exists and is active.
    pub fn require_active(&self, id: ProjectId) -> Result<&Project, RegistryError> {
        let project = self
            .projects
            .get(&id)
            .ok_or(RegistryError::ProjectNotFound(id))?;
        if !project.active {
            return Err(RegistryError::ProjectInactive(id));
        }
        Ok(project)
    }

    /// Advances the cumulative issuance counter after a successful mint.
    pub fn record_issuance(&mut self, id: ProjectId, amount: u64) -> Result<(), RegistryError> {
        let project = self
            .projects
            .get_mut(&id)
            .ok_or(RegistryError::ProjectNotFound(id))?;
        project.total_issued = project
            .total_issued
            .checked_add(amount)
            .ok_or(RegistryError::IssuanceOverflow(id))?;
        Ok(())
    }

    /// Looks up a project by id.
    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Ids of every project registered by `owner`, in registration order.
    pub fn projects_of(&self, owner: &str) -> &[ProjectId] {
        self.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of registered projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Iterates all projects in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }
}
