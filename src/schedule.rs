//! Deadline generation and recalculation.
//!
//! One engine serves every category. Given an owner's reference date (song
//! release date, video premiere, event date, ...) it creates the owner's
//! deadline tasks from the catalog, each due `offset` days before the
//! reference date. When the reference date moves, the same offset lookup
//! re-derives the dates of tasks that are neither overridden nor done, so a
//! recalculated untouched task always matches a freshly generated one.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::catalog::TaskCatalog;
use crate::fields::Category;
use crate::offsets::{OffsetTable, UserOffsets};
use crate::task::{generated_task_id, Task, TaskOwner};

/// Offset tables, task catalog and user overrides for one scheduling pass.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler<'a> {
    offsets: &'a OffsetTable,
    catalog: &'a TaskCatalog,
    user_offsets: &'a UserOffsets,
}

impl<'a> Scheduler<'a> {
    /// Scheduler over the built-in tables.
    pub fn new(user_offsets: &'a UserOffsets) -> Self {
        Scheduler {
            offsets: OffsetTable::builtin(),
            catalog: TaskCatalog::builtin(),
            user_offsets,
        }
    }

    pub fn with_tables(
        offsets: &'a OffsetTable,
        catalog: &'a TaskCatalog,
        user_offsets: &'a UserOffsets,
    ) -> Self {
        Scheduler { offsets, catalog, user_offsets }
    }

    pub fn offset(&self, task_type: &str, category: Category, subtype: Option<&str>) -> i64 {
        self.offsets.offset(task_type, category, self.user_offsets, subtype)
    }

    /// `reference - offset`. Out-of-range arithmetic keeps the reference date.
    pub fn due_date(
        &self,
        reference: NaiveDate,
        task_type: &str,
        category: Category,
        subtype: Option<&str>,
    ) -> NaiveDate {
        let days = self.offset(task_type, category, subtype);
        Duration::try_days(days)
            .and_then(|d| reference.checked_sub_signed(d))
            .unwrap_or(reference)
    }

    /// Fresh deadline set for an owner, ascending by date. Empty when there
    /// is no reference date.
    pub fn generate(
        &self,
        reference: Option<NaiveDate>,
        owner: &TaskOwner,
        category: Category,
        subtype: Option<&str>,
    ) -> Vec<Task> {
        let Some(reference) = reference else {
            return Vec::new();
        };
        let mut tasks: Vec<Task> = self
            .catalog
            .definitions_for(category, subtype)
            .map(|def| {
                let mut task = Task::new(
                    generated_task_id(owner, category, &def.task_type),
                    def.task_type.clone(),
                    category.as_str(),
                )
                .owned_by(owner);
                task.date = Some(self.due_date(reference, &def.task_type, category, subtype));
                task
            })
            .collect();
        tasks.sort_by_key(|t| t.date);
        debug!(owner = %owner.parent_id, ?category, count = tasks.len(), "generated deadlines");
        tasks
    }

    /// Re-derive dates after the reference date changed.
    ///
    /// Only `date` changes, and only on tasks that are not overridden and
    /// not done. A missing reference date leaves the tasks as they are; an
    /// empty task set is generated from scratch.
    pub fn recalculate(
        &self,
        mut tasks: Vec<Task>,
        reference: Option<NaiveDate>,
        owner: &TaskOwner,
        category: Category,
        subtype: Option<&str>,
    ) -> Vec<Task> {
        let Some(reference) = reference else {
            return tasks;
        };
        if tasks.is_empty() {
            return self.generate(Some(reference), owner, category, subtype);
        }
        for task in tasks.iter_mut() {
            if task.is_locked() {
                debug!(task = %task.id, overridden = task.is_overridden, "keeping locked date");
                continue;
            }
            task.date = Some(self.due_date(reference, &task.task_type, category, subtype));
        }
        tasks
    }
}

/// Generate deadlines against the built-in tables.
pub fn generate(
    reference: Option<NaiveDate>,
    owner: &TaskOwner,
    category: Category,
    subtype: Option<&str>,
    user_offsets: &UserOffsets,
) -> Vec<Task> {
    Scheduler::new(user_offsets).generate(reference, owner, category, subtype)
}

/// Recalculate deadlines against the built-in tables.
pub fn recalculate(
    tasks: Vec<Task>,
    reference: Option<NaiveDate>,
    owner: &TaskOwner,
    category: Category,
    subtype: Option<&str>,
    user_offsets: &UserOffsets,
) -> Vec<Task> {
    Scheduler::new(user_offsets).recalculate(tasks, reference, owner, category, subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ParentType, Status};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn song_owner() -> TaskOwner {
        TaskOwner::new(ParentType::Song, "song-1")
    }

    #[test]
    fn test_generate_song_deadlines() {
        let none = UserOffsets::default();
        let tasks = generate(Some(d(2024, 6, 1)), &song_owner(), Category::Song, None, &none);
        assert_eq!(tasks.len(), 9);

        let mix = tasks.iter().find(|t| t.task_type == "Mix").unwrap();
        assert_eq!(mix.date, Some(d(2024, 4, 20)));
        assert_eq!(mix.id, "song-1:mix");
        assert_eq!(mix.parent_type, Some(ParentType::Song));
        assert_eq!(mix.parent_id.as_deref(), Some("song-1"));
        assert_eq!(mix.status, Status::NotStarted);
        assert!(!mix.is_overridden);
        assert!(mix.meta.is_empty());
        assert!(mix.cost.is_empty());

        let dates: Vec<_> = tasks.iter().map(|t| t.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(tasks.last().unwrap().task_type, "Release");
    }

    #[test]
    fn test_generate_without_date_is_empty() {
        let none = UserOffsets::default();
        assert!(generate(None, &song_owner(), Category::Song, None, &none).is_empty());
    }

    #[test]
    fn test_negative_offset_lands_after_release() {
        let none = UserOffsets::default();
        let owner = TaskOwner::new(ParentType::Release, "rel");
        let tasks = generate(Some(d(2024, 6, 1)), &owner, Category::Release, Some("Single"), &none);
        assert_eq!(tasks.last().unwrap().task_type, "Post-Release Promo");
        assert_eq!(tasks.last().unwrap().date, Some(d(2024, 6, 8)));
    }

    #[test]
    fn test_recalculate_release_task() {
        let none = UserOffsets::default();
        let owner = TaskOwner::new(ParentType::Release, "rel");
        let mut task = Task::new("t", "Release", "release");
        task.date = Some(d(2024, 1, 1));

        let june = Some(d(2024, 6, 1));
        let out = recalculate(vec![task.clone()], june, &owner, Category::Release, None, &none);
        assert_eq!(out[0].date, Some(d(2024, 6, 1)));

        task.status = Status::Done;
        let out = recalculate(vec![task], june, &owner, Category::Release, None, &none);
        assert_eq!(out[0].date, Some(d(2024, 1, 1)));
    }

    #[test]
    fn test_recalculate_without_date_is_noop() {
        let none = UserOffsets::default();
        let mut task = Task::new("t", "Mix", "song");
        task.date = Some(d(2024, 1, 1));
        let out = recalculate(vec![task.clone()], None, &song_owner(), Category::Song, None, &none);
        assert_eq!(out, vec![task]);
    }

    #[test]
    fn test_recalculate_unknown_type_uses_reference() {
        let none = UserOffsets::default();
        let task = Task::new("custom", "Photo Shoot", "song");
        let june = Some(d(2024, 6, 1));
        let out = recalculate(vec![task], june, &song_owner(), Category::Song, None, &none);
        assert_eq!(out[0].date, june);
    }

    #[test]
    fn test_recalculate_keeps_identity_and_order() {
        let none = UserOffsets::default();
        let tasks = generate(Some(d(2024, 6, 1)), &song_owner(), Category::Song, None, &none);
        let ids: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
        let sept = Some(d(2024, 9, 1));
        let out = recalculate(tasks, sept, &song_owner(), Category::Song, None, &none);
        assert_eq!(out.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_user_offsets_flow_through() {
        let mut user = UserOffsets::default();
        user.set_project_type("Album", "Mix", 50);
        let sched = Scheduler::new(&user);
        let mix = |subtype| sched.due_date(d(2024, 6, 1), "Mix", Category::Song, subtype);
        assert_eq!(mix(Some("Album")), d(2024, 4, 12));
        assert_eq!(mix(None), d(2024, 4, 20));
    }

    #[test]
    fn test_custom_tables() {
        use crate::catalog::TaskDefinition;
        use std::collections::BTreeMap;

        let mut song = BTreeMap::new();
        song.insert("Teaser".to_string(), 3);
        let offsets = OffsetTable::new([(Category::Song, song)].into(), BTreeMap::new());
        let catalog = TaskCatalog::new(vec![TaskDefinition::new(Category::Song, "Teaser", &[])]);
        let user = UserOffsets::default();
        let sched = Scheduler::with_tables(&offsets, &catalog, &user);
        let tasks = sched.generate(Some(d(2024, 6, 10)), &song_owner(), Category::Song, None);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].date, Some(d(2024, 6, 7)));
    }
}
