//! A client-side copy of one user's task list. Mutations go to the authoritative store first,
//! except completion toggles which are applied locally right away and reconciled on failure.

use crate::domain::task_view::{self, TaskQuery};
use crate::domain::todo::driven_ports::{TaskReader, TaskWriter};
use crate::domain::todo::driving_ports::{TaskError, TaskPort};
use crate::domain::todo::{NewTask, TodoTask, UpdateTask};
use crate::external_connections::ExternalConnectivity;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// The authoritative store as seen from a list view, already bound to the acting user
#[allow(async_fn_in_trait)]
pub trait TaskSync {
    async fn fetch_all(&mut self) -> Result<Vec<TodoTask>, TaskError>;
    async fn create(&mut self, task: &NewTask) -> Result<Uuid, TaskError>;
    async fn update(&mut self, task_id: Uuid, update: &UpdateTask) -> Result<(), TaskError>;
    async fn set_completed(&mut self, task_id: Uuid, completed: bool) -> Result<(), TaskError>;
    async fn delete(&mut self, task_id: Uuid) -> Result<(), TaskError>;
}

/// [TaskSync] backed directly by a [TaskPort] and its driven ports
pub struct ServiceTaskSync<'deps, Service, Cxn, Store> {
    pub owner: Uuid,
    pub task_service: &'deps Service,
    pub ext_cxn: &'deps mut Cxn,
    pub store: &'deps Store,
}

impl<Service, Cxn, Store> TaskSync for ServiceTaskSync<'_, Service, Cxn, Store>
where
    Service: TaskPort,
    Cxn: ExternalConnectivity,
    Store: TaskReader + TaskWriter,
{
    async fn fetch_all(&mut self) -> Result<Vec<TodoTask>, TaskError> {
        self.task_service
            .tasks_for_user(self.owner, &mut *self.ext_cxn, self.store)
            .await
    }

    async fn create(&mut self, task: &NewTask) -> Result<Uuid, TaskError> {
        self.task_service
            .create_task_for_user(self.owner, task, &mut *self.ext_cxn, self.store)
            .await
    }

    async fn update(&mut self, task_id: Uuid, update: &UpdateTask) -> Result<(), TaskError> {
        self.task_service
            .update_task(self.owner, task_id, update, &mut *self.ext_cxn, self.store)
            .await
    }

    async fn set_completed(&mut self, task_id: Uuid, completed: bool) -> Result<(), TaskError> {
        self.task_service
            .set_completed(self.owner, task_id, completed, &mut *self.ext_cxn, self.store)
            .await
    }

    async fn delete(&mut self, task_id: Uuid) -> Result<(), TaskError> {
        self.task_service
            .delete_task(self.owner, task_id, &mut *self.ext_cxn, self.store)
            .await
    }
}

#[derive(Debug, Error)]
pub enum TaskListError {
    #[error("task {0} is not in the list")]
    NotInList(Uuid),
    #[error(transparent)]
    Remote(#[from] TaskError),
}

#[derive(Debug, Default)]
pub struct TaskListState {
    tasks: Vec<TodoTask>,
}

impl TaskListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[TodoTask] {
        &self.tasks
    }

    /// The list as it should be rendered right now
    pub fn view(&self, query: &TaskQuery, now: DateTime<Utc>) -> Vec<&TodoTask> {
        task_view::apply_query(&self.tasks, query, now)
    }

    /// Replaces the local list wholesale with the authoritative one
    pub async fn refresh(&mut self, remote: &mut impl TaskSync) -> Result<(), TaskListError> {
        self.tasks = remote.fetch_all().await?;
        Ok(())
    }

    pub async fn create(
        &mut self,
        task: &NewTask,
        remote: &mut impl TaskSync,
    ) -> Result<Uuid, TaskListError> {
        let task_id = remote.create(task).await?;
        self.refresh(remote).await?;
        Ok(task_id)
    }

    pub async fn update(
        &mut self,
        task_id: Uuid,
        update: &UpdateTask,
        remote: &mut impl TaskSync,
    ) -> Result<(), TaskListError> {
        remote.update(task_id, update).await?;
        self.refresh(remote).await
    }

    pub async fn delete(
        &mut self,
        task_id: Uuid,
        remote: &mut impl TaskSync,
    ) -> Result<(), TaskListError> {
        remote.delete(task_id).await?;
        self.refresh(remote).await
    }

    /// Flips completion locally before telling the store. If the store rejects the change the
    /// list is re-fetched; if even that fails the local flip is undone. Returns the new
    /// completion state on success.
    pub async fn toggle_completion(
        &mut self,
        task_id: Uuid,
        remote: &mut impl TaskSync,
    ) -> Result<bool, TaskListError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(TaskListError::NotInList(task_id))?;
        task.completed = !task.completed;
        let completed = task.completed;

        let Err(sync_err) = remote.set_completed(task_id, completed).await else {
            return Ok(completed);
        };

        warn!("Completion change for task {task_id} was rejected, re-fetching: {sync_err}");
        if let Err(refresh_err) = self.refresh(remote).await {
            error!("Could not re-fetch tasks after a failed toggle: {refresh_err}");
            if let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) {
                task.completed = !completed;
            }
        }

        Err(sync_err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task_view::{StatusFilter, TaskStatus};
    use crate::domain::test_util::Connectivity;
    use crate::domain::todo::TaskService;
    use crate::domain::todo::test_util::*;
    use crate::external_connections;
    use chrono::{Duration, TimeZone};
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    /// A store holding one overdue task for owner 1 and one task for owner 2
    fn store() -> RwLock<InMemoryUserTaskPersistence> {
        let mut overdue = task_fixture(1, owner(1), "Overdue");
        overdue.due_at = Some(now() - Duration::days(1));

        RwLock::new(InMemoryUserTaskPersistence::new_with_tasks(&[
            overdue,
            task_fixture(2, owner(2), "Someone else's"),
        ]))
    }

    /// Remote whose writes always fail, and whose reads fail once `reads_fail` is set
    struct FailingRemote {
        tasks: Vec<TodoTask>,
        reads_fail: bool,
    }

    impl TaskSync for FailingRemote {
        async fn fetch_all(&mut self) -> Result<Vec<TodoTask>, TaskError> {
            if self.reads_fail {
                Err(TaskError::PortError(anyhow::anyhow!("offline")))
            } else {
                Ok(self.tasks.clone())
            }
        }

        async fn create(&mut self, _task: &NewTask) -> Result<Uuid, TaskError> {
            Err(TaskError::PortError(anyhow::anyhow!("offline")))
        }

        async fn update(&mut self, _task_id: Uuid, _update: &UpdateTask) -> Result<(), TaskError> {
            Err(TaskError::PortError(anyhow::anyhow!("offline")))
        }

        async fn set_completed(&mut self, _task_id: Uuid, _completed: bool) -> Result<(), TaskError> {
            Err(TaskError::PortError(anyhow::anyhow!("offline")))
        }

        async fn delete(&mut self, _task_id: Uuid) -> Result<(), TaskError> {
            Err(TaskError::PortError(anyhow::anyhow!("offline")))
        }
    }

    mod refresh {
        use super::*;

        #[tokio::test]
        async fn loads_only_owned_tasks() {
            let store = store();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut remote = ServiceTaskSync {
                owner: owner(1),
                task_service: &TaskService {},
                ext_cxn: &mut ext_cxn,
                store: &store,
            };
            let mut list = TaskListState::new();

            assert_that!(list.refresh(&mut remote).await).is_ok();
            assert!(matches!(list.tasks(), [TodoTask { title, .. }] if title == "Overdue"));
        }
    }

    mod toggle_completion {
        use super::*;

        #[tokio::test]
        async fn moves_overdue_task_to_completed() {
            let store = store();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut remote = ServiceTaskSync {
                owner: owner(1),
                task_service: &TaskService {},
                ext_cxn: &mut ext_cxn,
                store: &store,
            };
            let mut list = TaskListState::new();
            list.refresh(&mut remote).await.expect("initial fetch failed");
            let overdue = TaskQuery {
                status: StatusFilter::Only(TaskStatus::Overdue),
                ..TaskQuery::default()
            };
            let completed = TaskQuery {
                status: StatusFilter::Only(TaskStatus::Completed),
                ..TaskQuery::default()
            };
            assert_eq!(1, list.view(&overdue, now()).len());

            let toggle_result = list.toggle_completion(task_id(1), &mut remote).await;

            assert_that!(toggle_result).is_ok_containing(true);
            assert!(list.view(&overdue, now()).is_empty());
            assert_eq!(1, list.view(&completed, now()).len());
            let locked_store = store.read().expect("task persist rw lock poisoned");
            assert!(locked_store.tasks[0].completed);
        }

        #[tokio::test]
        async fn failed_toggle_is_reconciled_from_the_store() {
            let store = store();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut list = TaskListState::new();
            {
                let mut remote = ServiceTaskSync {
                    owner: owner(1),
                    task_service: &TaskService {},
                    ext_cxn: &mut ext_cxn,
                    store: &store,
                };
                list.refresh(&mut remote).await.expect("initial fetch failed");
            }
            let mut remote = FailingRemote {
                tasks: list.tasks().to_vec(),
                reads_fail: false,
            };

            let toggle_result = list.toggle_completion(task_id(1), &mut remote).await;

            assert!(matches!(toggle_result, Err(TaskListError::Remote(_))));
            assert!(!list.tasks()[0].completed);
        }

        #[tokio::test]
        async fn reverts_locally_when_refetch_also_fails() {
            let mut list = TaskListState::new();
            let mut remote = FailingRemote {
                tasks: vec![task_fixture(1, owner(1), "Local")],
                reads_fail: false,
            };
            list.refresh(&mut remote).await.expect("initial fetch failed");
            remote.reads_fail = true;

            let toggle_result = list.toggle_completion(task_id(1), &mut remote).await;

            assert!(toggle_result.is_err());
            assert!(!list.tasks()[0].completed);
        }

        #[tokio::test]
        async fn unknown_task_is_rejected() {
            let mut list = TaskListState::new();
            let mut remote = FailingRemote {
                tasks: Vec::new(),
                reads_fail: false,
            };

            let toggle_result = list.toggle_completion(task_id(7), &mut remote).await;
            assert!(matches!(toggle_result, Err(TaskListError::NotInList(id)) if id == task_id(7)));
        }
    }

    mod mutations {
        use super::*;

        #[tokio::test]
        async fn create_then_delete_resyncs_the_list() {
            let store = store();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut remote = ServiceTaskSync {
                owner: owner(1),
                task_service: &TaskService {},
                ext_cxn: &mut ext_cxn,
                store: &store,
            };
            let mut list = TaskListState::new();

            let created_id = list
                .create(&new_task_fixture("Fresh"), &mut remote)
                .await
                .expect("create failed");
            assert_eq!(2, list.tasks().len());

            assert_that!(list.delete(created_id, &mut remote).await).is_ok();
            assert_eq!(1, list.tasks().len());
        }

        #[tokio::test]
        async fn failed_update_leaves_list_untouched() {
            let store = store();
            {
                let mut locked_store = store.write().expect("task persist rw lock poisoned");
                locked_store.connected = Connectivity::Disconnected;
            }
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut remote = ServiceTaskSync {
                owner: owner(1),
                task_service: &TaskService {},
                ext_cxn: &mut ext_cxn,
                store: &store,
            };
            let mut list = TaskListState::new();
            let update = UpdateTask {
                title: "New".to_owned(),
                description: None,
                due_at: None,
                priority: Default::default(),
                category: Default::default(),
            };

            let update_result = list.update(task_id(1), &update, &mut remote).await;
            assert!(matches!(update_result, Err(TaskListError::Remote(TaskError::PortError(_)))));
            assert!(list.tasks().is_empty());
        }
    }
}
