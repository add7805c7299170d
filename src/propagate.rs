//! Era, stage and tag inheritance from a song to everything under it.
//!
//! A song's metadata flows one level down: to its own tasks, to its versions
//! and videos, and to the tasks owned by those versions and videos. Children
//! that are overridden or done keep whatever they have. Everything else gets
//! each empty dimension filled from the song; non-empty dimensions are never
//! replaced, which makes the pass idempotent.

use tracing::trace;

use crate::entities::Song;
use crate::task::{Metadata, Task};

/// Return a copy of `song` with inherited metadata filled in.
pub fn propagate(song: &Song) -> Song {
    let mut out = song.clone();
    propagate_in_place(&mut out);
    out
}

/// In-place variant of [`propagate`].
pub fn propagate_in_place(song: &mut Song) {
    let ancestor = song.meta.clone();

    fill_tasks(song.deadlines.iter_mut().chain(song.custom_tasks.iter_mut()), &ancestor);

    for version in song.versions.iter_mut() {
        if !version.is_locked() {
            version.meta.fill_from(&ancestor);
        }
        fill_tasks(
            version.deadlines.iter_mut().chain(version.custom_tasks.iter_mut()),
            &ancestor,
        );
    }

    for video in song.videos.iter_mut() {
        if !video.is_locked() {
            video.meta.fill_from(&ancestor);
        }
        fill_tasks(video.deadlines.iter_mut().chain(video.custom_tasks.iter_mut()), &ancestor);
    }
}

fn fill_tasks<'a>(tasks: impl Iterator<Item = &'a mut Task>, ancestor: &Metadata) {
    for task in tasks {
        if task.is_locked() {
            trace!(task = %task.id, "task metadata is independent, not inheriting");
            continue;
        }
        task.meta.fill_from(ancestor);
    }
}
