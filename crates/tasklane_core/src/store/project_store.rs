//! Project collection.

use crate::backend::{RemoteBackend, Table};
use crate::error::SyncResult;
use crate::model::project::{NewProject, Project, ProjectPatch};
use crate::store::{Entity, EntityStore};
use uuid::Uuid;

pub type ProjectStore<B> = EntityStore<Project, B>;

impl Entity for Project {
    type Draft = NewProject;
    type Patch = ProjectPatch;

    const TABLE: Table = Table::Projects;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl<B: RemoteBackend + ?Sized> EntityStore<Project, B> {
    /// Creates a project; a missing or blank color falls back to the default.
    pub async fn create_project(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        color: Option<String>,
    ) -> SyncResult<Project> {
        let draft = NewProject::new(name)
            .with_description(description)
            .with_color(color);
        self.create(draft).await
    }
}
