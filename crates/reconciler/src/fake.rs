//! Scripted [`ExternalClient`] for tests and dry runs.

use crate::client::{ExternalClient, Observation, Progress};
use crate::error::Result;
use crate::resource::Terraformed;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Client call recorded by [`FakeClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeCall {
    Observe,
    Apply,
    Destroy,
}

#[derive(Debug, Default)]
struct Script {
    observations: VecDeque<Result<Observation>>,
    applies: VecDeque<Result<Progress>>,
    destroys: VecDeque<Result<bool>>,
    calls: Vec<(FakeCall, String)>,
}

/// Client that replays queued outcomes.
///
/// With nothing queued: observe reports [`Observation::Absent`], apply
/// completes without a snapshot and destroy completes.
#[derive(Debug, Default)]
pub struct FakeClient {
    script: Mutex<Script>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_observation(&self, observation: Observation) {
        self.lock().observations.push_back(Ok(observation));
    }

    pub fn push_observe_error(&self, error: crate::Error) {
        self.lock().observations.push_back(Err(error));
    }

    pub fn push_apply(&self, progress: Progress) {
        self.lock().applies.push_back(Ok(progress));
    }

    pub fn push_apply_error(&self, error: crate::Error) {
        self.lock().applies.push_back(Err(error));
    }

    pub fn push_destroy(&self, completed: bool) {
        self.lock().destroys.push_back(Ok(completed));
    }

    pub fn push_destroy_error(&self, error: crate::Error) {
        self.lock().destroys.push_back(Err(error));
    }

    /// Calls seen so far with the uid of the resource.
    pub fn calls(&self) -> Vec<(FakeCall, String)> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record<R: Terraformed + ?Sized>(&self, call: FakeCall, resource: &R) -> MutexGuard<'_, Script> {
        let mut script = self.lock();
        script.calls.push((call, resource.uid().to_string()));
        script
    }
}

impl ExternalClient for FakeClient {
    fn observe<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Observation> {
        self.record(FakeCall::Observe, resource)
            .observations
            .pop_front()
            .unwrap_or(Ok(Observation::Absent))
    }

    fn apply<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<Progress> {
        self.record(FakeCall::Apply, resource)
            .applies
            .pop_front()
            .unwrap_or(Ok(Progress::Done(None)))
    }

    fn destroy<R: Terraformed + ?Sized>(&self, resource: &R) -> Result<bool> {
        self.record(FakeCall::Destroy, resource)
            .destroys
            .pop_front()
            .unwrap_or(Ok(true))
    }
}
