//! Application-level orchestration.
//!
//! This module owns the task lifecycle (submit, poll, finish) and the submission path
//! that feeds it. UI/CLI layers send commands in and receive `TaskEvent`s back.

mod controller;
mod submission;

pub(crate) use controller::{TaskController, UiCommand};
pub(crate) use submission::{submit, Submission};
