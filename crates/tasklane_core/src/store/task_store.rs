//! Task collection.
//!
//! Every read and write re-selects the linked project, so cached tasks carry a
//! fresh project snapshot as of their last round-trip.

use crate::backend::{Embed, RemoteBackend, Table};
use crate::error::SyncResult;
use crate::model::project::ProjectId;
use crate::model::task::{NewTask, Priority, Task, TaskId, TaskPatch};
use crate::store::{Entity, EntityStore};
use chrono::NaiveDate;
use log::debug;
use uuid::Uuid;

pub type TaskStore<B> = EntityStore<Task, B>;

impl Entity for Task {
    type Draft = NewTask;
    type Patch = TaskPatch;

    const TABLE: Table = Table::Tasks;
    // Why: writes replace the cached entry wholesale, so they must come back
    // with the project attached or a toggle would drop it.
    const EMBED: Option<Embed> = Some(Embed::PROJECT);

    fn id(&self) -> Uuid {
        self.id
    }
}

impl<B: RemoteBackend + ?Sized> EntityStore<Task, B> {
    /// Creates an incomplete task; `priority` defaults to medium.
    pub async fn create_task(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        priority: Option<Priority>,
        project_id: Option<ProjectId>,
        due_date: Option<NaiveDate>,
    ) -> SyncResult<Task> {
        let draft = NewTask::new(title)
            .with_description(description)
            .with_priority(priority.unwrap_or_default())
            .with_project(project_id)
            .with_due_date(due_date);
        self.create(draft).await
    }

    /// Flips `completed` on a cached task.
    ///
    /// Returns `Ok(None)` without contacting the backend when `id` is not
    /// cached.
    pub async fn toggle(&self, id: TaskId) -> SyncResult<Option<Task>> {
        let Some(completed) = self.get(id).map(|task| task.completed) else {
            debug!("event=store_toggle module=store status=skipped table=tasks id={id} reason=not_cached");
            return Ok(None);
        };
        self.update(id, TaskPatch::completed(!completed))
            .await
            .map(Some)
    }
}
