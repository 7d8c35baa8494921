//! Thread-safe engine facade.
//!
//! Composes the value networks, replay store, exploration policy, and safety
//! controller behind one lock. The engine is a monitor: every public
//! operation runs its critical section under the same mutex, so `select`,
//! `learn`, and safety transitions are strictly serialized and an emergency
//! stop is observable by the next call on any thread. The engine spawns no
//! threads of its own and no operation waits on anything but the lock
//! (save/load hold it for the duration to produce a consistent snapshot).

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gate::{PermissiveGate, PolicyGate, Severity, OP_REINFORCEMENT_LEARNING};
use crate::network::ValueNetwork;
use crate::persistence::{self, ModelSnapshot, SNAPSHOT_VERSION};
use crate::policy::EpsilonGreedy;
use crate::replay::ReplayBuffer;
use crate::safety::{ControlState, SafetyController};
use crate::types::{Action, State, Transition};
use crate::{generate_id, Id};

/// What a `learn` call did.
///
/// Everything except an internal fault is an `Ok` value: skipping a cycle
/// for insufficient data, a pause, or a gate denial is backpressure, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    /// A batch was sampled and one gradient step applied.
    Trained { batch_size: usize, loss: f64 },
    /// Fewer transitions stored than one batch; nothing changed.
    InsufficientData,
    /// The engine is paused; nothing changed.
    Paused,
    /// The policy gate denied the learning step; the engine backs off.
    GateDenied,
    /// A previous denial or fault is still being backed off.
    BackingOff { cycles_remaining: u32 },
    /// The cycle faulted internally; reported to the gate, engine intact.
    Faulted,
}

/// The reinforcement-learning engine.
///
/// Construction is deterministic given a seed: two engines built with the
/// same configuration and seed produce identical weights and identical
/// action sequences for identical inputs.
///
/// # Lifecycle
///
/// 1. Build with [`LearningEngine::new`] (or [`with_gate`](Self::with_gate)).
/// 2. Per decision step: [`select`](Self::select), execute the action, then
///    [`store_experience`](Self::store_experience) with the observed reward.
/// 3. Call [`learn`](Self::learn) as often as desired; it is a no-op until
///    a full batch is stored.
/// 4. Safety transitions ([`pause`](Self::pause), [`resume`](Self::resume),
///    [`emergency_stop`](Self::emergency_stop), [`reset`](Self::reset)) may
///    arrive from any thread at any time.
pub struct LearningEngine {
    id: Id,
    gate: Arc<dyn PolicyGate>,
    inner: Mutex<EngineCore>,
}

struct EngineCore {
    config: EngineConfig,
    live: ValueNetwork,
    target: ValueNetwork,
    replay: ReplayBuffer,
    policy: EpsilonGreedy,
    safety: SafetyController,
    total_steps: u64,
    total_episodes: u64,
    steps_since_sync: u64,
    backoff_remaining: u32,
    rng: StdRng,
}

impl LearningEngine {
    /// Creates an engine with a [`PermissiveGate`].
    pub fn new(config: EngineConfig, seed: u64) -> Self {
        Self::with_gate(config, seed, Arc::new(PermissiveGate))
    }

    /// Creates an engine consulting `gate` before every learning step.
    ///
    /// # Arguments
    ///
    /// * `config` - Network, training, exploration, and replay parameters
    /// * `seed` - Seed for weight initialization and all stochastic choices
    /// * `gate` - Admission check and violation sink
    pub fn with_gate(config: EngineConfig, seed: u64, gate: Arc<dyn PolicyGate>) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let live = ValueNetwork::new(
            config.state_dim,
            config.hidden_dim,
            config.action_dim,
            config.learning_rate,
            &mut rng,
        );
        // The target starts as a copy of the live network and is only ever
        // refreshed from it, never trained directly.
        let target = live.clone();
        let replay = ReplayBuffer::new(config.replay_capacity);
        let policy = EpsilonGreedy::new(&config);

        Self {
            id: generate_id(),
            gate,
            inner: Mutex::new(EngineCore {
                config,
                live,
                target,
                replay,
                policy,
                safety: SafetyController::new(),
                total_steps: 0,
                total_episodes: 0,
                steps_since_sync: 0,
                backoff_remaining: 0,
                rng,
            }),
        }
    }

    /// Opaque identifier used as the source of violation reports.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Selects an action for `state` under the current exploration rate.
    ///
    /// Every invocation consumes one step of the budget, random or greedy
    /// alike. Permitted while paused (the policy is frozen at the current
    /// epsilon); blocked once stopped.
    pub fn select(&self, state: &State) -> Result<Action, EngineError> {
        let mut core = self.inner.lock();
        core.safety.check_not_stopped()?;
        core.total_steps += 1;
        match core.select_action(state) {
            Ok(action) => Ok(action),
            Err(e) => {
                self.gate.report_violation(
                    &self.id,
                    "decision_cycle_fault",
                    Severity::High,
                    &e.to_string(),
                );
                Err(e)
            }
        }
    }

    /// Appends a transition to the replay store, evicting the oldest entry
    /// if the store is at capacity.
    pub fn store_experience(
        &self,
        state: State,
        action: Action,
        reward: f64,
        next_state: State,
        done: bool,
    ) -> Result<(), EngineError> {
        let mut core = self.inner.lock();
        core.safety.check_not_stopped()?;
        core.replay
            .push(Transition::new(state, action, reward, next_state, done));
        Ok(())
    }

    /// Runs one learn cycle: sample a batch, train the live network against
    /// targets from the frozen target network, refresh the target every
    /// `target_sync_interval` cycles, then decay epsilon.
    ///
    /// Skips (without error) when paused, when the gate denies the step,
    /// during backoff, or when fewer transitions than one batch are stored.
    /// Internal faults are reported to the gate as `High` violations and
    /// absorbed into [`LearnOutcome::Faulted`] rather than propagated.
    pub fn learn(&self) -> Result<LearnOutcome, EngineError> {
        let mut core = self.inner.lock();
        let core = &mut *core;
        core.safety.check_not_stopped()?;
        if core.safety.state() == ControlState::Paused {
            return Ok(LearnOutcome::Paused);
        }
        if core.backoff_remaining > 0 {
            core.backoff_remaining -= 1;
            return Ok(LearnOutcome::BackingOff {
                cycles_remaining: core.backoff_remaining,
            });
        }
        if !self.gate.may_execute(OP_REINFORCEMENT_LEARNING) {
            core.backoff_remaining = core.config.gate_backoff_cycles;
            warn!(
                backoff_cycles = core.backoff_remaining,
                "policy gate denied learning step"
            );
            return Ok(LearnOutcome::GateDenied);
        }
        if core.replay.len() < core.config.batch_size {
            return Ok(LearnOutcome::InsufficientData);
        }

        match core.train_batch() {
            Ok(loss) => {
                core.steps_since_sync += 1;
                if core.steps_since_sync >= core.config.target_sync_interval {
                    core.target.sync_from(&core.live);
                    core.steps_since_sync = 0;
                    debug!("target network refreshed from live weights");
                }
                core.policy.decay_after_learn();
                trace!(loss, epsilon = core.policy.epsilon(), "learn cycle complete");
                Ok(LearnOutcome::Trained {
                    batch_size: core.config.batch_size,
                    loss,
                })
            }
            Err(e) => {
                core.backoff_remaining = core.config.gate_backoff_cycles;
                self.gate.report_violation(
                    &self.id,
                    "learn_cycle_fault",
                    Severity::High,
                    &e.to_string(),
                );
                Ok(LearnOutcome::Faulted)
            }
        }
    }

    /// Predicts one value per action from the live network. Read-only.
    pub fn predict(&self, state: &State) -> Result<Vec<f64>, EngineError> {
        self.inner.lock().live.predict(&state.features)
    }

    /// Marks the start of a new episode and returns its ordinal.
    pub fn start_episode(&self) -> Result<u64, EngineError> {
        let mut core = self.inner.lock();
        core.safety.check_not_stopped()?;
        core.total_episodes += 1;
        debug!(episode = core.total_episodes, "episode started");
        Ok(core.total_episodes)
    }

    /// Marks the end of the current episode.
    pub fn end_episode(&self, total_reward: f64) -> Result<(), EngineError> {
        let core = self.inner.lock();
        core.safety.check_not_stopped()?;
        debug!(
            episode = core.total_episodes,
            total_reward, "episode finished"
        );
        Ok(())
    }

    // --- Safety transitions ---

    /// `Running -> Paused`: learning becomes a no-op, selection continues.
    pub fn pause(&self) -> Result<(), EngineError> {
        let mut core = self.inner.lock();
        core.safety.pause()?;
        debug!("learning paused");
        Ok(())
    }

    /// `Paused -> Running`.
    pub fn resume(&self) -> Result<(), EngineError> {
        let mut core = self.inner.lock();
        core.safety.resume()?;
        debug!("learning resumed");
        Ok(())
    }

    /// Stops the engine from any state: clears the replay store, forces the
    /// exploration rate to 1.0, and blocks all guarded operations until
    /// [`reset`](Self::reset). Weights are left untouched.
    pub fn emergency_stop(&self) {
        let mut core = self.inner.lock();
        core.safety.emergency_stop();
        core.replay.clear();
        core.policy.reset();
        core.backoff_remaining = 0;
        warn!("emergency stop: replay store cleared, exploration reset to 1.0");
    }

    /// Returns the engine to `Running` with a cleared store, zeroed
    /// counters, and full exploration. Weights are retained: they are not
    /// considered unsafe, only the policy's confidence in them.
    pub fn reset(&self) {
        let mut core = self.inner.lock();
        core.safety.reset();
        core.replay.clear();
        core.total_steps = 0;
        core.total_episodes = 0;
        core.steps_since_sync = 0;
        core.backoff_remaining = 0;
        core.policy.reset();
        debug!("engine reset: counters cleared, weights retained");
    }

    /// Clears the store and counters and leaves the engine stopped.
    /// Weights are released when the engine is dropped.
    pub fn shutdown(&self) {
        let mut core = self.inner.lock();
        core.replay.clear();
        core.total_steps = 0;
        core.total_episodes = 0;
        core.steps_since_sync = 0;
        core.safety.emergency_stop();
        debug!("engine shut down");
    }

    // --- Monitoring ---

    /// Current safety state.
    pub fn control_state(&self) -> ControlState {
        self.inner.lock().safety.state()
    }

    /// Unweighted mean reward over stored transitions, `0.0` if none.
    pub fn average_reward(&self) -> f64 {
        self.inner.lock().replay.average_reward()
    }

    /// Total `select` invocations since construction or last reset.
    pub fn total_steps(&self) -> u64 {
        self.inner.lock().total_steps
    }

    /// Total episodes started since construction or last reset.
    pub fn total_episodes(&self) -> u64 {
        self.inner.lock().total_episodes
    }

    /// Learn cycles since the target network was last refreshed.
    pub fn steps_since_sync(&self) -> u64 {
        self.inner.lock().steps_since_sync
    }

    /// Current exploration rate.
    pub fn current_exploration_rate(&self) -> f64 {
        self.inner.lock().policy.epsilon()
    }

    /// Overrides the exploration rate, clamped to `[0, 1]`.
    pub fn set_exploration_rate(&self, epsilon: f64) -> Result<(), EngineError> {
        let mut core = self.inner.lock();
        core.safety.check_not_stopped()?;
        core.policy.set_epsilon(epsilon);
        debug!(epsilon = core.policy.epsilon(), "exploration rate set");
        Ok(())
    }

    /// Number of stored transitions.
    pub fn replay_len(&self) -> usize {
        self.inner.lock().replay.len()
    }

    // --- Persistence ---

    /// Writes a model snapshot to `path`.
    ///
    /// Holds the engine lock for the duration so the snapshot is consistent.
    /// Failure leaves both the file's previous contents and the engine
    /// state's meaning unchanged.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let core = self.inner.lock();
        let snapshot = ModelSnapshot {
            version: SNAPSHOT_VERSION,
            live: core.live.clone(),
            target: core.target.clone(),
            epsilon: core.policy.epsilon(),
        };
        persistence::write_snapshot(path.as_ref(), &snapshot)?;
        debug!(path = %path.as_ref().display(), "model saved");
        Ok(())
    }

    /// Restores a model snapshot from `path`.
    ///
    /// Validates dimensions against the engine configuration before touching
    /// any state; on failure the engine is unchanged.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let mut core = self.inner.lock();
        let snapshot = persistence::read_snapshot(path.as_ref())?;
        if snapshot.live.input_dim() != core.config.state_dim
            || snapshot.live.output_dim() != core.config.action_dim
        {
            return Err(EngineError::Persistence(format!(
                "snapshot is {}x{} but the engine is configured {}x{}",
                snapshot.live.input_dim(),
                snapshot.live.output_dim(),
                core.config.state_dim,
                core.config.action_dim
            )));
        }
        core.live = snapshot.live;
        core.target = snapshot.target;
        core.policy.set_epsilon(snapshot.epsilon);
        debug!(path = %path.as_ref().display(), "model loaded");
        Ok(())
    }
}

impl EngineCore {
    fn select_action(&mut self, state: &State) -> Result<Action, EngineError> {
        self.policy.select(&self.live, state, &mut self.rng)
    }

    /// Trains the live network on one sampled batch and returns the mean
    /// pre-update loss.
    fn train_batch(&mut self) -> Result<f64, EngineError> {
        let indices = self
            .replay
            .sample_indices(self.config.batch_size, &mut self.rng)?;

        let mut total_loss = 0.0;
        let mut trained = 0usize;
        for idx in indices {
            let transition = match self.replay.get(idx) {
                Some(t) => t,
                None => continue,
            };

            // Q-learning target: reward, plus discounted best next value
            // from the frozen target network for non-terminal transitions.
            let mut target_value = transition.reward;
            if !transition.done {
                let next_values = self.target.predict(&transition.next_state.features)?;
                let max_next = next_values
                    .iter()
                    .cloned()
                    .fold(f64::NEG_INFINITY, f64::max);
                target_value += self.config.gamma * max_next;
            }

            // Blend into the live prediction so the gradient step only
            // moves the taken action's value estimate.
            let features = &transition.state.features;
            let mut targets = self.live.predict(features)?;
            if transition.action.index < targets.len() {
                targets[transition.action.index] = target_value;
            }

            total_loss += self.live.train_step(features, &targets)?;
            trained += 1;
        }

        Ok(if trained > 0 {
            total_loss / trained as f64
        } else {
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            state_dim: 4,
            action_dim: 2,
            hidden_dim: 8,
            batch_size: 4,
            replay_capacity: 50,
            target_sync_interval: 3,
            epsilon_decay: 0.9,
            epsilon_min: 0.05,
            gate_backoff_cycles: 2,
            ..EngineConfig::default()
        }
    }

    fn state() -> State {
        State::new(vec![0.1, 0.4, 0.6, 0.9])
    }

    fn fill(engine: &LearningEngine, n: usize, reward: f64) {
        for i in 0..n {
            engine
                .store_experience(state(), Action::new(i % 2), reward, state(), false)
                .unwrap();
        }
    }

    /// Gate that can be toggled and records every violation it receives.
    struct TestGate {
        allow: AtomicBool,
        violations: parking_lot::Mutex<Vec<(String, Severity, String)>>,
    }

    impl TestGate {
        fn new(allow: bool) -> Self {
            Self {
                allow: AtomicBool::new(allow),
                violations: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl PolicyGate for TestGate {
        fn may_execute(&self, _operation: &str) -> bool {
            self.allow.load(Ordering::SeqCst)
        }

        fn report_violation(&self, _source: &str, kind: &str, severity: Severity, message: &str) {
            self.violations
                .lock()
                .push((kind.to_string(), severity, message.to_string()));
        }
    }

    #[test]
    fn select_counts_every_invocation() {
        let engine = LearningEngine::new(config(), 1);
        for _ in 0..5 {
            let action = engine.select(&state()).unwrap();
            assert!(action.index < 2);
        }
        assert_eq!(engine.total_steps(), 5);
    }

    #[test]
    fn greedy_selection_is_deterministic_on_fixed_weights() {
        let engine = LearningEngine::new(config(), 2);
        engine.set_exploration_rate(0.0).unwrap();
        let s = state();
        let first = engine.select(&s).unwrap();
        assert!(first.expected_value.is_some());
        for _ in 0..1000 {
            assert_eq!(engine.select(&s).unwrap().index, first.index);
        }
    }

    #[test]
    fn engines_with_same_seed_act_identically() {
        let a = LearningEngine::new(config(), 77);
        let b = LearningEngine::new(config(), 77);
        let s = state();
        for _ in 0..50 {
            assert_eq!(a.select(&s).unwrap().index, b.select(&s).unwrap().index);
        }
    }

    #[test]
    fn learn_without_enough_data_changes_nothing() {
        let engine = LearningEngine::new(config(), 3);
        fill(&engine, 2, 1.0); // below batch_size = 4
        let before = engine.predict(&state()).unwrap();
        let epsilon = engine.current_exploration_rate();

        assert_eq!(engine.learn().unwrap(), LearnOutcome::InsufficientData);

        assert_eq!(engine.predict(&state()).unwrap(), before);
        assert_eq!(engine.current_exploration_rate(), epsilon);
        assert_eq!(engine.steps_since_sync(), 0);
    }

    #[test]
    fn learn_trains_and_decays_epsilon() {
        let engine = LearningEngine::new(config(), 4);
        fill(&engine, 10, 1.0);
        match engine.learn().unwrap() {
            LearnOutcome::Trained { batch_size, loss } => {
                assert_eq!(batch_size, 4);
                assert!(loss.is_finite());
            }
            other => panic!("expected Trained, got {other:?}"),
        }
        assert!((engine.current_exploration_rate() - 0.9).abs() < 1e-12);
        assert_eq!(engine.steps_since_sync(), 1);
    }

    #[test]
    fn epsilon_is_nonincreasing_down_to_the_floor() {
        let engine = LearningEngine::new(config(), 5);
        fill(&engine, 10, 0.5);
        let mut previous = engine.current_exploration_rate();
        for _ in 0..100 {
            engine.learn().unwrap();
            let epsilon = engine.current_exploration_rate();
            assert!(epsilon <= previous);
            assert!(epsilon >= 0.05);
            previous = epsilon;
        }
        assert_eq!(engine.current_exploration_rate(), 0.05);
    }

    #[test]
    fn target_sync_happens_on_schedule() {
        let engine = LearningEngine::new(config(), 6);
        fill(&engine, 10, 1.0);
        engine.learn().unwrap();
        engine.learn().unwrap();
        assert_eq!(engine.steps_since_sync(), 2);
        engine.learn().unwrap(); // third cycle triggers the refresh
        assert_eq!(engine.steps_since_sync(), 0);
    }

    #[test]
    fn constant_rewards_keep_average_at_one_while_learning() {
        let engine = LearningEngine::new(config(), 7);
        fill(&engine, 40, 1.0);
        for _ in 0..20 {
            engine.learn().unwrap();
            assert!((engine.average_reward() - 1.0).abs() < 1e-12);
        }
        assert!(engine.current_exploration_rate() < 1.0);
    }

    #[test]
    fn emergency_stop_clears_store_and_maximizes_exploration() {
        let engine = LearningEngine::new(config(), 8);
        fill(&engine, 20, 1.0);
        engine.learn().unwrap();

        engine.emergency_stop();

        assert_eq!(engine.control_state(), ControlState::Stopped);
        assert_eq!(engine.replay_len(), 0);
        assert_eq!(engine.current_exploration_rate(), 1.0);
        assert!(matches!(
            engine.learn().unwrap_err(),
            EngineError::SafetyBlocked(ControlState::Stopped)
        ));
        assert!(matches!(
            engine.select(&state()).unwrap_err(),
            EngineError::SafetyBlocked(ControlState::Stopped)
        ));
        assert!(matches!(
            engine
                .store_experience(state(), Action::new(0), 0.0, state(), false)
                .unwrap_err(),
            EngineError::SafetyBlocked(ControlState::Stopped)
        ));
    }

    #[test]
    fn emergency_stop_from_paused_state() {
        let engine = LearningEngine::new(config(), 9);
        engine.pause().unwrap();
        engine.emergency_stop();
        assert_eq!(engine.control_state(), ControlState::Stopped);
        assert_eq!(engine.current_exploration_rate(), 1.0);
    }

    #[test]
    fn reset_restores_running_with_zeroed_counters() {
        let engine = LearningEngine::new(config(), 10);
        fill(&engine, 10, 1.0);
        engine.select(&state()).unwrap();
        engine.start_episode().unwrap();
        engine.learn().unwrap();
        engine.emergency_stop();

        let before_weights = engine.predict(&state()).unwrap();
        engine.reset();

        assert_eq!(engine.control_state(), ControlState::Running);
        assert_eq!(engine.total_steps(), 0);
        assert_eq!(engine.total_episodes(), 0);
        assert_eq!(engine.steps_since_sync(), 0);
        assert_eq!(engine.replay_len(), 0);
        assert_eq!(engine.current_exploration_rate(), 1.0);
        // Weights survive a reset.
        assert_eq!(engine.predict(&state()).unwrap(), before_weights);
        engine.select(&state()).unwrap();
    }

    #[test]
    fn pause_freezes_learning_but_not_selection() {
        let engine = LearningEngine::new(config(), 11);
        fill(&engine, 10, 1.0);
        engine.pause().unwrap();

        let epsilon = engine.current_exploration_rate();
        assert_eq!(engine.learn().unwrap(), LearnOutcome::Paused);
        assert_eq!(engine.current_exploration_rate(), epsilon);
        engine.select(&state()).unwrap();

        engine.resume().unwrap();
        assert!(matches!(
            engine.learn().unwrap(),
            LearnOutcome::Trained { .. }
        ));
    }

    #[test]
    fn episode_counter_tracks_starts() {
        let engine = LearningEngine::new(config(), 12);
        assert_eq!(engine.start_episode().unwrap(), 1);
        assert_eq!(engine.start_episode().unwrap(), 2);
        engine.end_episode(3.5).unwrap();
        assert_eq!(engine.total_episodes(), 2);
    }

    #[test]
    fn shutdown_clears_state_and_stops() {
        let engine = LearningEngine::new(config(), 13);
        fill(&engine, 10, 1.0);
        engine.select(&state()).unwrap();
        engine.shutdown();
        assert_eq!(engine.control_state(), ControlState::Stopped);
        assert_eq!(engine.replay_len(), 0);
        assert_eq!(engine.total_steps(), 0);
    }

    #[test]
    fn gate_denial_skips_cycle_and_backs_off() {
        let gate = Arc::new(TestGate::new(false));
        let engine = LearningEngine::with_gate(config(), 14, gate.clone());
        fill(&engine, 10, 1.0);
        let before = engine.predict(&state()).unwrap();
        let epsilon = engine.current_exploration_rate();

        assert_eq!(engine.learn().unwrap(), LearnOutcome::GateDenied);
        assert_eq!(engine.predict(&state()).unwrap(), before);
        assert_eq!(engine.current_exploration_rate(), epsilon);

        gate.allow.store(true, Ordering::SeqCst);
        assert_eq!(
            engine.learn().unwrap(),
            LearnOutcome::BackingOff {
                cycles_remaining: 1
            }
        );
        assert_eq!(
            engine.learn().unwrap(),
            LearnOutcome::BackingOff {
                cycles_remaining: 0
            }
        );
        assert!(matches!(
            engine.learn().unwrap(),
            LearnOutcome::Trained { .. }
        ));
    }

    #[test]
    fn decision_faults_are_reported_to_the_gate() {
        let gate = Arc::new(TestGate::new(true));
        let engine = LearningEngine::with_gate(config(), 15, gate.clone());
        engine.set_exploration_rate(0.0).unwrap();

        let wrong_width = State::new(vec![0.0; 9]);
        let err = engine.select(&wrong_width).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));

        let violations = gate.violations.lock();
        assert_eq!(violations.len(), 1);
        let (kind, severity, message) = &violations[0];
        assert_eq!(kind, "decision_cycle_fault");
        assert_eq!(*severity, Severity::High);
        assert!(message.contains("features"));
    }

    #[test]
    fn save_load_round_trip_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let engine = LearningEngine::new(config(), 16);
        fill(&engine, 10, 1.0);
        for _ in 0..5 {
            engine.learn().unwrap();
        }
        engine.save(&path).unwrap();

        let other = LearningEngine::new(config(), 999);
        let s = state();
        assert_ne!(engine.predict(&s).unwrap(), other.predict(&s).unwrap());

        other.load(&path).unwrap();
        assert_eq!(engine.predict(&s).unwrap(), other.predict(&s).unwrap());
        assert_eq!(
            other.current_exploration_rate(),
            engine.current_exploration_rate()
        );
    }

    #[test]
    fn load_rejects_mismatched_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        LearningEngine::new(config(), 17).save(&path).unwrap();

        let wider = EngineConfig {
            state_dim: 6,
            ..config()
        };
        let engine = LearningEngine::new(wider, 18);
        let probe = State::new(vec![0.0; 6]);
        let before = engine.predict(&probe).unwrap();

        let err = engine.load(&path).unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert_eq!(engine.predict(&probe).unwrap(), before);
    }

    #[test]
    fn load_failure_leaves_engine_untouched() {
        let engine = LearningEngine::new(config(), 19);
        let before = engine.predict(&state()).unwrap();
        let err = engine.load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, EngineError::Persistence(_)));
        assert_eq!(engine.predict(&state()).unwrap(), before);
    }

    #[test]
    fn concurrent_callers_are_serialized() {
        let engine = Arc::new(LearningEngine::new(config(), 20));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let action = engine.select(&state()).unwrap();
                        engine
                            .store_experience(state(), action, 1.0, state(), false)
                            .unwrap();
                        engine.learn().unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(engine.total_steps(), 200);
        assert_eq!(engine.replay_len(), 50); // capacity bound held throughout
    }

    #[test]
    fn emergency_stop_is_observed_by_other_threads() {
        let engine = Arc::new(LearningEngine::new(config(), 21));
        let worker = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || loop {
                match engine.select(&state()) {
                    Ok(_) => {}
                    Err(EngineError::SafetyBlocked(_)) => return true,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        };
        engine.emergency_stop();
        assert!(worker.join().unwrap());
    }
}
