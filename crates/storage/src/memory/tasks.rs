// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task rows.

use super::MemoryStore;
use crate::error::StoreError;
use crate::store::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dalston_core::plan::dependencies_acyclic;
use dalston_core::{JobId, Task, TaskId, TaskStatus};
use std::collections::HashMap;

impl MemoryStore {
    fn with_task<T>(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut Task) -> T,
    ) -> Result<T, StoreError> {
        let mut inner = self.lock();
        let task = inner.tasks.get_mut(&id).ok_or_else(|| StoreError::not_found("task", id))?;
        Ok(f(task))
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_tasks(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let mut inner = self.lock();

        // Dependencies may only reference tasks of the same job, and the
        // resulting per-job graph must stay acyclic.
        for task in &tasks {
            for dep in &task.dependencies {
                let in_batch = tasks.iter().any(|t| t.id == *dep && t.job_id == task.job_id);
                let in_store =
                    inner.tasks.get(dep).is_some_and(|t| t.job_id == task.job_id);
                if !in_batch && !in_store {
                    return Err(StoreError::Conflict(format!(
                        "task {} depends on {} outside job {}",
                        task.id, dep, task.job_id
                    )));
                }
            }
        }

        for job_id in tasks.iter().map(|t| t.job_id).collect::<std::collections::HashSet<_>>() {
            let mut edges: HashMap<TaskId, Vec<TaskId>> = inner
                .job_tasks
                .get(&job_id)
                .into_iter()
                .flatten()
                .filter_map(|id| inner.tasks.get(id))
                .map(|t| (t.id, t.dependencies.clone()))
                .collect();
            for task in tasks.iter().filter(|t| t.job_id == job_id) {
                edges.insert(task.id, task.dependencies.clone());
            }
            if !dependencies_acyclic(&edges) {
                return Err(StoreError::Conflict(format!(
                    "dependency cycle in job {job_id}"
                )));
            }
        }

        for task in tasks {
            inner.job_tasks.entry(task.job_id).or_default().push(task.id);
            inner.tasks.insert(task.id, task);
        }
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.lock().tasks.get(&id).cloned())
    }

    async fn tasks_for_job(&self, job_id: JobId) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .job_tasks
            .get(&job_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.tasks.get(id))
            .cloned()
            .collect())
    }

    async fn transition_task(
        &self,
        id: TaskId,
        from: &[TaskStatus],
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with_task(id, |task| {
            if !from.contains(&task.status) {
                return false;
            }
            task.status = to;
            if to == TaskStatus::Running && task.started_at.is_none() {
                task.started_at = Some(at);
            }
            if to.is_terminal() && task.completed_at.is_none() {
                task.completed_at = Some(at);
            }
            true
        })
    }

    async fn set_task_error(&self, id: TaskId, error: Option<String>) -> Result<(), StoreError> {
        self.with_task(id, |task| task.error = error)
    }

    async fn set_task_input_uri(&self, id: TaskId, uri: String) -> Result<(), StoreError> {
        self.with_task(id, |task| task.input_uri = Some(uri))
    }

    async fn set_task_output_uri(&self, id: TaskId, uri: String) -> Result<(), StoreError> {
        self.with_task(id, |task| task.output_uri = Some(uri))
    }

    async fn begin_task_retry(&self, id: TaskId, _at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_task(id, |task| {
            if task.status != TaskStatus::Failed || !task.can_retry() {
                return false;
            }
            task.status = TaskStatus::Ready;
            task.retries += 1;
            // A retried task runs again; its previous completion stamp no
            // longer describes the current attempt.
            task.completed_at = None;
            true
        })
    }
}
