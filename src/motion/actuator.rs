//! Actuator interface and the in-process simulator

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::PlaybackError;
use crate::joints::JointSubset;

/// A snapshot of the actuator's joints.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    pub positions: Vec<f64>,
    pub velocities: Option<Vec<f64>>,
    /// Seconds, in the actuator's own time base.
    pub timestamp: f64,
}

/// The command sink the playback core drives.
///
/// `send_command` takes a full-width pose and must leave every joint outside
/// `joints` untouched. Gains and transport are the implementor's concern.
pub trait Actuator: Send + Sync {
    /// Current state, or `None` when no state has been received.
    fn get_pose(&self) -> Option<JointState>;

    fn send_command(&self, positions: &[f64], joints: &JointSubset) -> Result<(), PlaybackError>;

    /// Whether commands for disjoint joint subsets may be issued from several
    /// threads at once. When false, chord playback serialises its writes.
    fn supports_concurrent_writes(&self) -> bool {
        true
    }
}

/// Wraps an actuator so that commands are dispatched one at a time.
pub struct SerializedActuator<'a> {
    inner: &'a dyn Actuator,
    lock: Mutex<()>,
}

impl<'a> SerializedActuator<'a> {
    pub fn new(inner: &'a dyn Actuator) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }
}

impl Actuator for SerializedActuator<'_> {
    fn get_pose(&self) -> Option<JointState> {
        self.inner.get_pose()
    }

    fn send_command(&self, positions: &[f64], joints: &JointSubset) -> Result<(), PlaybackError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.inner.send_command(positions, joints)
    }

    fn supports_concurrent_writes(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct SimState {
    positions: Vec<f64>,
    online: bool,
    commands: u64,
    rejected: HashSet<usize>,
    /// Per joint: sequence numbers of the first and last command touching it.
    windows: HashMap<usize, (u64, u64)>,
    time: f64,
}

/// An actuator that applies commands to an in-memory pose.
///
/// Used by the binary in place of a hardware transport and by the tests.
#[derive(Debug)]
pub struct SimulatedActuator {
    state: Mutex<SimState>,
    concurrent_writes: bool,
    writers: AtomicUsize,
    peak_writers: AtomicUsize,
}

impl SimulatedActuator {
    /// A simulator holding `positions` as its current pose.
    pub fn new(positions: Vec<f64>) -> Self {
        Self {
            state: Mutex::new(SimState {
                positions,
                online: true,
                commands: 0,
                rejected: HashSet::new(),
                windows: HashMap::new(),
                time: 0.0,
            }),
            concurrent_writes: true,
            writers: AtomicUsize::new(0),
            peak_writers: AtomicUsize::new(0),
        }
    }

    /// All `joints` at zero.
    pub fn zeroed(joints: usize) -> Self {
        Self::new(vec![0.0; joints])
    }

    /// Declare the sink unsafe for concurrent partial writes.
    pub fn exclusive(mut self) -> Self {
        self.concurrent_writes = false;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline, `get_pose` returns `None`.
    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    /// Fail every command that addresses `joint`.
    pub fn reject_joint(&self, joint: usize) {
        self.state().rejected.insert(joint);
    }

    pub fn positions(&self) -> Vec<f64> {
        self.state().positions.clone()
    }

    pub fn command_count(&self) -> u64 {
        self.state().commands
    }

    /// Sequence numbers (1-based, counted over all joints) of the first and
    /// last command that moved `joint`.
    pub fn command_window(&self, joint: usize) -> Option<(u64, u64)> {
        self.state().windows.get(&joint).copied()
    }

    /// Most commands observed in flight at the same time.
    pub fn peak_writers(&self) -> usize {
        self.peak_writers.load(Ordering::SeqCst)
    }
}

impl Actuator for SimulatedActuator {
    fn get_pose(&self) -> Option<JointState> {
        let state = self.state();
        state.online.then(|| JointState {
            positions: state.positions.clone(),
            velocities: None,
            timestamp: state.time,
        })
    }

    fn send_command(&self, positions: &[f64], joints: &JointSubset) -> Result<(), PlaybackError> {
        let active = self.writers.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_writers.fetch_max(active, Ordering::SeqCst);

        let result = {
            let mut state = self.state();
            if let Some(joint) = joints.indices().iter().find(|j| state.rejected.contains(j)) {
                Err(PlaybackError::Actuator(format!("joint {} rejected the command", joint)))
            } else if positions.len() != state.positions.len() {
                Err(PlaybackError::DimensionMismatch {
                    expected: state.positions.len(),
                    actual: positions.len(),
                })
            } else {
                for &joint in joints.indices() {
                    if let Some(slot) = state.positions.get_mut(joint) {
                        *slot = positions[joint];
                    }
                }
                state.commands += 1;
                let seq = state.commands;
                for &joint in joints.indices() {
                    state
                        .windows
                        .entry(joint)
                        .and_modify(|w| w.1 = seq)
                        .or_insert((seq, seq));
                }
                state.time += 0.002;
                Ok(())
            }
        };

        self.writers.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn supports_concurrent_writes(&self) -> bool {
        self.concurrent_writes
    }
}
