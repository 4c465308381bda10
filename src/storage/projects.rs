use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::error::RegistryError;
use super::models::{ProjectFlag, ProjectRecord, ProjectStatus};
use super::tables::*;

/// Sort order for project listings. Newest first matches the default
/// ordering of the upstream clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProjectOrder {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
    UpdatedAsc,
    NameAsc,
    NameDesc,
}

impl ProjectOrder {
    /// Parse an ordering query value ("created_at", "-updated_at", "name", ...)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created_at" => Some(ProjectOrder::CreatedAsc),
            "-created_at" => Some(ProjectOrder::CreatedDesc),
            "updated_at" => Some(ProjectOrder::UpdatedAsc),
            "-updated_at" => Some(ProjectOrder::UpdatedDesc),
            "name" => Some(ProjectOrder::NameAsc),
            "-name" => Some(ProjectOrder::NameDesc),
            _ => None,
        }
    }
}

/// Listing facets for an owner's projects. Soft-deleted rows are always
/// excluded before any facet applies.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    /// Substring match on the name, case-insensitive.
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub is_archived: Option<bool>,
    pub is_pinned: Option<bool>,
    pub is_favorite: Option<bool>,
    pub is_shared: Option<bool>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub updated_before: Option<DateTime<Utc>>,
    /// Case-insensitive search over name and description.
    pub search: Option<String>,
    pub order: ProjectOrder,
}

/// Build the records for a bulk create. With count > 1 each name gets a
/// `_1`.. suffix and each slug an extra entropy token, so identical base
/// names never collide within or across batches.
pub fn build_project_batch(
    owner_id: &str,
    base_name: &str,
    description: Option<&str>,
    status: ProjectStatus,
    count: u32,
) -> Vec<ProjectRecord> {
    let now = Utc::now();

    let mut projects = Vec::with_capacity(count as usize);
    for i in 1..=count {
        let id = uuid::Uuid::new_v4().to_string();
        let (name, slug) = if count > 1 {
            let name = format!("{base_name}_{i}");
            let slug = format!(
                "{}-{}",
                crate::slug::slug_for(&name, &id),
                crate::slug::random_suffix()
            );
            (name, slug)
        } else {
            (
                base_name.to_string(),
                crate::slug::slug_for(base_name, &id),
            )
        };

        projects.push(ProjectRecord {
            id,
            owner_id: owner_id.to_string(),
            slug,
            name,
            description: description.map(|d| d.to_string()),
            status,
            is_deleted: false,
            is_archived: false,
            is_pinned: false,
            is_favorite: false,
            is_shared: false,
            created_at: now,
            updated_at: now,
        });
    }
    projects
}

impl Database {
    // ========================================================================
    // Project operations
    // ========================================================================

    /// Store a project record and update the slug and owner indexes
    pub fn put_project(&self, project: &ProjectRecord) -> Result<(), RegistryError> {
        debug_assert!(!project.id.is_empty(), "project id must not be empty");
        debug_assert!(!project.slug.is_empty(), "project slug must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut slug_table = write_txn.open_table(PROJECT_SLUGS)?;
            if let Some(existing) = slug_table.get(project.slug.as_str())? {
                if existing.value() != project.id.as_str() {
                    return Err(RegistryError::Validation(format!(
                        "slug '{}' is already in use",
                        project.slug
                    )));
                }
            }
            slug_table.insert(project.slug.as_str(), project.id.as_str())?;

            let mut table = write_txn.open_table(PROJECTS)?;
            let data = rmp_serde::to_vec_named(project)?;
            table.insert(project.id.as_str(), data.as_slice())?;

            // Maintain owner index
            let mut owner_table = write_txn.open_table(OWNER_PROJECTS)?;
            let mut project_ids: Vec<String> = owner_table
                .get(project.owner_id.as_str())?
                .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                .unwrap_or_default();

            if !project_ids.contains(&project.id) {
                project_ids.push(project.id.clone());
                let index_data = rmp_serde::to_vec_named(&project_ids)?;
                owner_table.insert(project.owner_id.as_str(), index_data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Insert a batch of projects in one transaction. Used by bulk create;
    /// callers guarantee the records share an owner.
    pub fn bulk_insert_projects(&self, projects: &[ProjectRecord]) -> Result<(), RegistryError> {
        let write_txn = self.begin_write()?;
        {
            let mut slug_table = write_txn.open_table(PROJECT_SLUGS)?;
            let mut table = write_txn.open_table(PROJECTS)?;
            let mut owner_table = write_txn.open_table(OWNER_PROJECTS)?;

            for project in projects {
                if let Some(existing) = slug_table.get(project.slug.as_str())? {
                    if existing.value() != project.id.as_str() {
                        return Err(RegistryError::Validation(format!(
                            "slug '{}' is already in use",
                            project.slug
                        )));
                    }
                }
                slug_table.insert(project.slug.as_str(), project.id.as_str())?;

                let data = rmp_serde::to_vec_named(project)?;
                table.insert(project.id.as_str(), data.as_slice())?;

                let mut project_ids: Vec<String> = owner_table
                    .get(project.owner_id.as_str())?
                    .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
                    .unwrap_or_default();
                if !project_ids.contains(&project.id) {
                    project_ids.push(project.id.clone());
                    let index_data = rmp_serde::to_vec_named(&project_ids)?;
                    owner_table.insert(project.owner_id.as_str(), index_data.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a project by its UUID, regardless of owner or deletion flag
    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PROJECTS)?;

        match table.get(id)? {
            Some(data) => {
                let project: ProjectRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(project))
            }
            None => Ok(None),
        }
    }

    /// Resolve a project the caller may act on. Missing rows, rows owned by
    /// someone else, and soft-deleted rows are all the same "not found" --
    /// ownership is never leaked through the error.
    pub fn get_project_owned(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<ProjectRecord, RegistryError> {
        match self.get_project(id)? {
            Some(p) if p.owner_id == owner_id && !p.is_deleted => Ok(p),
            _ => Err(RegistryError::NotFound("project not found".to_string())),
        }
    }

    fn projects_by_owner(&self, owner_id: &str) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_PROJECTS)?;
        let projects_table = read_txn.open_table(PROJECTS)?;

        let project_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut projects = Vec::new();
        for project_id in project_ids {
            if let Some(data) = projects_table.get(project_id.as_str())? {
                let project: ProjectRecord = rmp_serde::from_slice(data.value())?;
                projects.push(project);
            }
        }

        Ok(projects)
    }

    /// List an owner's projects with filtering, search, and ordering.
    /// Soft-deleted projects never appear.
    pub fn list_projects(
        &self,
        owner_id: &str,
        query: &ProjectQuery,
    ) -> Result<Vec<ProjectRecord>, DatabaseError> {
        let mut projects: Vec<ProjectRecord> = self
            .projects_by_owner(owner_id)?
            .into_iter()
            .filter(|p| !p.is_deleted)
            .collect();

        if let Some(ref name) = query.name {
            let needle = name.to_lowercase();
            projects.retain(|p| p.name.to_lowercase().contains(&needle));
        }
        if let Some(status) = query.status {
            projects.retain(|p| p.status == status);
        }
        if let Some(v) = query.is_archived {
            projects.retain(|p| p.is_archived == v);
        }
        if let Some(v) = query.is_pinned {
            projects.retain(|p| p.is_pinned == v);
        }
        if let Some(v) = query.is_favorite {
            projects.retain(|p| p.is_favorite == v);
        }
        if let Some(v) = query.is_shared {
            projects.retain(|p| p.is_shared == v);
        }
        if let Some(t) = query.created_after {
            projects.retain(|p| p.created_at >= t);
        }
        if let Some(t) = query.created_before {
            projects.retain(|p| p.created_at <= t);
        }
        if let Some(t) = query.updated_after {
            projects.retain(|p| p.updated_at >= t);
        }
        if let Some(t) = query.updated_before {
            projects.retain(|p| p.updated_at <= t);
        }
        if let Some(ref term) = query.search {
            let needle = term.to_lowercase();
            projects.retain(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            });
        }

        match query.order {
            ProjectOrder::CreatedDesc => projects.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProjectOrder::CreatedAsc => projects.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            ProjectOrder::UpdatedDesc => projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            ProjectOrder::UpdatedAsc => projects.sort_by(|a, b| a.updated_at.cmp(&b.updated_at)),
            ProjectOrder::NameAsc => projects.sort_by(|a, b| a.name.cmp(&b.name)),
            ProjectOrder::NameDesc => projects.sort_by(|a, b| b.name.cmp(&a.name)),
        }

        Ok(projects)
    }

    /// Partial update of a project's name and description. A `Some(None)`
    /// description clears it; `None` leaves it unchanged.
    pub fn update_project(
        &self,
        id: &str,
        owner_id: &str,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<ProjectRecord, RegistryError> {
        if let Some(name) = name {
            if name.is_empty() {
                return Err(RegistryError::Validation(
                    "project name must not be empty".to_string(),
                ));
            }
            if name.len() > 255 {
                return Err(RegistryError::Validation(
                    "project name must be at most 255 characters".to_string(),
                ));
            }
        }

        let mut project = self.get_project_owned(id, owner_id)?;
        if let Some(name) = name {
            project.name = name.to_string();
        }
        if let Some(description) = description {
            project.description = description.map(|d| d.to_string());
        }
        project.updated_at = Utc::now();

        self.write_project(&project)?;
        Ok(project)
    }

    /// Flip one boolean flag. Two toggles cancel each other out.
    pub fn toggle_project_flag(
        &self,
        id: &str,
        owner_id: &str,
        flag: ProjectFlag,
    ) -> Result<ProjectRecord, RegistryError> {
        let mut project = self.get_project_owned(id, owner_id)?;
        let value = !flag.get(&project);
        flag.apply(&mut project, value);
        project.updated_at = Utc::now();

        self.write_project(&project)?;
        Ok(project)
    }

    /// Move a project along its status machine. Illegal targets are
    /// rejected naming the current and requested status.
    pub fn set_project_status(
        &self,
        id: &str,
        owner_id: &str,
        next: ProjectStatus,
    ) -> Result<ProjectRecord, RegistryError> {
        let mut project = self.get_project_owned(id, owner_id)?;
        if !project.status.can_transition_to(next) {
            return Err(RegistryError::Validation(format!(
                "project status cannot change from '{}' to '{}'",
                project.status.as_str(),
                next.as_str()
            )));
        }

        project.status = next;
        project.updated_at = Utc::now();

        self.write_project(&project)?;
        Ok(project)
    }

    /// Archive or unarchive: the status transition plus the `is_archived`
    /// flag, kept in step.
    pub fn set_project_archived(
        &self,
        id: &str,
        owner_id: &str,
        archived: bool,
    ) -> Result<ProjectRecord, RegistryError> {
        let target = if archived {
            ProjectStatus::Archived
        } else {
            ProjectStatus::Draft
        };

        let mut project = self.get_project_owned(id, owner_id)?;
        if !project.status.can_transition_to(target) {
            return Err(RegistryError::Validation(format!(
                "project status cannot change from '{}' to '{}'",
                project.status.as_str(),
                target.as_str()
            )));
        }

        project.status = target;
        project.is_archived = archived;
        project.updated_at = Utc::now();

        self.write_project(&project)?;
        Ok(project)
    }

    /// Soft-delete one project. The row stays; every owner-scoped read path
    /// filters it out from here on.
    pub fn soft_delete_project(&self, id: &str, owner_id: &str) -> Result<(), RegistryError> {
        let mut project = self.get_project_owned(id, owner_id)?;
        project.is_deleted = true;
        project.updated_at = Utc::now();
        self.write_project(&project)?;
        Ok(())
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Set one boolean flag on every listed project the caller owns, in one
    /// batched write. Ids the caller does not own are dropped from the
    /// batch; an entirely unowned batch is "not found".
    pub fn bulk_set_project_flag(
        &self,
        owner_id: &str,
        ids: &[String],
        flag: ProjectFlag,
        value: bool,
    ) -> Result<u64, RegistryError> {
        let owned = self.resolve_owned_projects(owner_id, ids)?;
        if owned.is_empty() {
            return Err(RegistryError::NotFound(
                "no matching projects found".to_string(),
            ));
        }

        let now = Utc::now();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(PROJECTS)?;
            for mut project in owned.iter().cloned() {
                flag.apply(&mut project, value);
                project.updated_at = now;
                let serialized = rmp_serde::to_vec_named(&project)?;
                table.insert(project.id.as_str(), serialized.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(owned.len() as u64)
    }

    /// Set one status on every listed project the caller owns. The target
    /// only has to be a member of the status enum; the transition table is
    /// not applied on the bulk path.
    pub fn bulk_set_project_status(
        &self,
        owner_id: &str,
        ids: &[String],
        status: ProjectStatus,
    ) -> Result<u64, RegistryError> {
        let owned = self.resolve_owned_projects(owner_id, ids)?;
        if owned.is_empty() {
            return Err(RegistryError::NotFound(
                "no matching projects found".to_string(),
            ));
        }

        let now = Utc::now();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(PROJECTS)?;
            for mut project in owned.iter().cloned() {
                project.status = status;
                project.updated_at = now;
                let serialized = rmp_serde::to_vec_named(&project)?;
                table.insert(project.id.as_str(), serialized.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(owned.len() as u64)
    }

    /// Soft-delete every listed project the caller owns, in one batch.
    pub fn bulk_soft_delete_projects(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<u64, RegistryError> {
        self.bulk_set_project_flag(owner_id, ids, ProjectFlag::Deleted, true)
    }

    /// Read phase shared by the bulk mutations: resolve ids to live rows
    /// owned by the caller. No locks are held between this read and the
    /// following write.
    fn resolve_owned_projects(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> Result<Vec<ProjectRecord>, RegistryError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PROJECTS)?;

        let mut owned = Vec::new();
        for id in ids {
            if let Some(data) = table.get(id.as_str())? {
                let project: ProjectRecord = rmp_serde::from_slice(data.value())?;
                if project.owner_id == owner_id && !project.is_deleted {
                    owned.push(project);
                }
            }
        }
        Ok(owned)
    }

    fn write_project(&self, project: &ProjectRecord) -> Result<(), RegistryError> {
        let write_txn = self.begin_write()?;
        {
            let serialized = rmp_serde::to_vec_named(project)?;
            let mut table = write_txn.open_table(PROJECTS)?;
            table.insert(project.id.as_str(), serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Check if a slug is already in use
    pub fn project_slug_exists(&self, slug: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PROJECT_SLUGS)?;
        Ok(table.get(slug)?.is_some())
    }
}
