//! Unit tests for abm-sim.

#[cfg(test)]
mod fixtures {
    use std::sync::{Arc, Mutex};

    use abm_agent::{Agent, AgentError, AgentResult, Population, StepContext};
    use abm_core::{AgentRng, DataValue, Rank, RunConfig, SimRng, SimulationTime, Tick};
    use abm_data::{DataCollectorDescriptor, MemoryHandle, MemoryProcessor};

    use crate::{Engine, EngineBuilder, EngineControl, Model, SimCommand, SimError, SimResult};

    #[derive(Default)]
    pub struct Walker {
        pub steps:   u64,
        pub x:       f64,
        pub fail_at: Option<Tick>,
    }

    impl Agent for Walker {
        fn step(&mut self, ctx: &StepContext<'_, Self>, rng: &mut AgentRng) -> AgentResult<()> {
            self.steps += 1;
            self.x += rng.gen_range(-1.0..1.0);
            if self.fail_at == Some(ctx.tick()) {
                return Err(AgentError::step("tripped"));
            }
            Ok(())
        }

        fn position(&self) -> Option<[f64; 2]> {
            Some([self.x, 0.0])
        }
    }

    /// `size` walkers, a `speed` variable and scripted hook behaviour.
    pub struct Crowd {
        pub population:    Population<Walker>,
        pub size:          usize,
        pub speed:         i64,
        pub fail_begin_at: Option<Tick>,
        pub fail_agent_at: Option<Tick>,
        pub stop_end_at:   Option<Tick>,
        pub events:        Arc<Mutex<Vec<String>>>,
        pub imported:      Vec<(Rank, Vec<u64>)>,
    }

    impl Crowd {
        pub fn new(size: usize) -> Self {
            Self {
                population:    Population::new(0),
                size,
                speed:         1,
                fail_begin_at: None,
                fail_agent_at: None,
                stop_end_at:   None,
                events:        Arc::default(),
                imported:      Vec::new(),
            }
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Model for Crowd {
        type Agent = Walker;

        fn setup(&mut self, _rng: &mut SimRng) -> SimResult<()> {
            self.population.clear();
            for i in 0..self.size {
                let fail_at = if i == 0 { self.fail_agent_at } else { None };
                self.population.insert(Walker { fail_at, ..Walker::default() });
            }
            Ok(())
        }

        fn population(&self) -> &Population<Walker> {
            &self.population
        }

        fn population_mut(&mut self) -> &mut Population<Walker> {
            &mut self.population
        }

        fn begin(&mut self, time: &SimulationTime) -> SimResult<bool> {
            if self.fail_begin_at == Some(time.tick()) {
                return Err(SimError::model("begin tripped"));
            }
            Ok(false)
        }

        fn end(&mut self, time: &SimulationTime) -> SimResult<bool> {
            Ok(self.stop_end_at == Some(time.tick()))
        }

        fn variable(&self, name: &str) -> Option<DataValue> {
            match name {
                "count" => Some(DataValue::from(self.population.len())),
                "speed" => Some(DataValue::Int(self.speed)),
                _ => None,
            }
        }

        fn set_variable(&mut self, name: &str, value: DataValue) -> SimResult<()> {
            match (name, value.as_i64()) {
                ("speed", Some(v)) => {
                    self.speed = v;
                    Ok(())
                }
                ("speed", None) => Err(SimError::InvalidValue {
                    name:   name.into(),
                    reason: "not an integer".into(),
                }),
                _ => Err(SimError::UnknownVariable(name.into())),
            }
        }

        fn export_agents(&mut self) -> SimResult<Vec<u8>> {
            let ids: Vec<u64> = self.population.ids().iter().map(|id| id.0).collect();
            serde_json::to_vec(&ids).map_err(|e| SimError::model(e.to_string()))
        }

        fn import_agents(&mut self, from: Rank, payload: &[u8]) -> SimResult<()> {
            let ids = serde_json::from_slice(payload).map_err(|e| SimError::model(e.to_string()))?;
            self.imported.push((from, ids));
            Ok(())
        }
    }

    /// Appends its label to the model's event log.
    pub struct Record(pub &'static str);

    impl SimCommand<Crowd> for Record {
        fn name(&self) -> &'static str {
            "record"
        }

        fn execute(self: Box<Self>, model: &mut Crowd, control: &mut EngineControl) -> SimResult<()> {
            let paused = if control.is_paused() { "paused" } else { "running" };
            model.events.lock().unwrap().push(format!("{}:{paused}", self.0));
            Ok(())
        }
    }

    pub fn config(length: u64) -> RunConfig {
        RunConfig { length: Some(length), seed: 7, ..RunConfig::default() }
    }

    /// Engine with a `count` collector at interval 1 and an in-memory sink.
    pub fn engine(model: Crowd, config: RunConfig) -> (Engine<Crowd>, MemoryHandle) {
        let (sink, rows) = MemoryProcessor::new();
        let engine = EngineBuilder::new(model, config)
            .collector(DataCollectorDescriptor::variable("count", 1))
            .processor(sink)
            .build()
            .unwrap();
        (engine, rows)
    }
}

// ── Tick loop ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod engine_tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use abm_core::{ExecutionMode, Tick};
    use abm_data::{
        BackgroundProcessor, ChannelProcessor, DataCollectorDescriptor, DataKey, MemoryProcessor,
        StateFlags,
    };

    use super::fixtures::{config, engine, Crowd};
    use crate::{EngineBuilder, ExitReason, RunState};

    #[test]
    fn hundred_agents_ten_ticks_twelve_rows() {
        let (mut engine, rows) = engine(Crowd::new(100), config(10));
        let report = engine.run().unwrap();

        assert_eq!(report.exit, ExitReason::Completed);
        assert_eq!(report.ticks_completed, 10);
        assert_eq!(report.rows, 12);
        assert_eq!(engine.state(), RunState::Terminated);

        let rows = rows.rows();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].flags(), StateFlags::INITIAL_STATE);
        for (i, row) in rows[1..11].iter().enumerate() {
            assert_eq!(row.tick(), Tick(i as u64));
            assert!(!row.is_forced());
            assert_eq!(row.variable_i64("count"), Some(100));
        }
        let last = &rows[11];
        assert_eq!(last.flags(), StateFlags::FINAL_STATE);
        assert_eq!(last.tick(), Tick(10));

        engine.model().population.for_each(|_, w| assert_eq!(w.steps, 10));
    }

    #[test]
    fn processors_are_finalized_once_per_run() {
        let (mut engine, rows) = engine(Crowd::new(3), config(2));
        engine.run().unwrap();
        assert!(rows.is_finalized());
        assert_eq!(engine.control().data().collector_count(), 1);
    }

    #[test]
    fn bound_processors_receive_rows_from_every_run() {
        let (mem, background) = MemoryProcessor::new();
        let (chan, streamed) = ChannelProcessor::unbounded("stream");
        let mut engine = EngineBuilder::new(Crowd::new(2), config(2))
            .collector(DataCollectorDescriptor::variable("count", 1))
            .processor(BackgroundProcessor::spawn(mem).unwrap())
            .processor(chan)
            .build()
            .unwrap();

        let first = engine.run().unwrap();
        let second = engine.run().unwrap();
        assert_eq!((first.rows, second.rows), (4, 4));

        // Finalize waits for the worker, so every row has landed.
        assert_eq!(background.len(), 8);
        let rows: Vec<_> = streamed.try_iter().collect();
        assert_eq!(rows.len(), 8);
        let finals = rows.iter().filter(|r| r.flags().contains(StateFlags::FINAL_STATE)).count();
        assert_eq!(finals, 2);
        assert_eq!(rows[4].flags(), StateFlags::INITIAL_STATE);
    }

    #[test]
    fn delay_paces_every_tick() {
        let (mut engine, _rows) = engine(Crowd::new(10), config(10));
        engine.handle().set_delay(50).unwrap();
        let start = Instant::now();
        engine.run().unwrap();
        assert!(start.elapsed().as_millis() >= 500, "{:?}", start.elapsed());
    }

    #[test]
    fn frequency_throttles_every_tick() {
        let (mut engine, _rows) = engine(Crowd::new(10), config(10));
        engine.handle().set_frequency(Some(20.0)).unwrap();
        let start = Instant::now();
        engine.run().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500), "{:?}", start.elapsed());
    }

    #[test]
    fn delay_counts_toward_the_frequency_period() {
        let (mut engine, _rows) = engine(Crowd::new(10), config(10));
        let handle = engine.handle();
        handle.set_delay(40).unwrap();
        handle.set_frequency(Some(20.0)).unwrap();
        let start = Instant::now();
        engine.run().unwrap();
        let elapsed = start.elapsed();
        // About 50 ms per tick; stacking the two would take 900 ms.
        assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(850), "{elapsed:?}");
    }

    #[test]
    fn unrepresentable_frequency_is_rejected() {
        let (mut engine, _rows) = engine(Crowd::new(1), config(2));
        engine.handle().set_frequency(Some(1e-300)).unwrap();
        let report = engine.run().unwrap();
        assert_eq!(report.exit, ExitReason::Completed);
        assert_eq!(engine.control().frequency(), None);

        // Set directly, the rate simply yields no throttle.
        engine.control_mut().set_frequency(Some(1e-300));
        assert_eq!(engine.control().tick_period(), None);
        assert_eq!(engine.run().unwrap().ticks_completed, 2);
    }

    #[test]
    fn double_pause_resume_restores_state() {
        let (mut engine, rows) = engine(Crowd::new(1), config(3));
        let handle = engine.handle();
        handle.submit(super::fixtures::Record("a")).unwrap();
        handle.pause_resume().unwrap();
        handle.submit(super::fixtures::Record("b")).unwrap();
        handle.pause_resume().unwrap();
        handle.submit(super::fixtures::Record("c")).unwrap();

        let report = engine.run().unwrap();
        assert_eq!(engine.model().events(), ["a:running", "b:paused", "c:running"]);
        assert_eq!(report.ticks_completed, 3);
        assert!(rows.rows().iter().all(|r| !r.flags().contains(StateFlags::PAUSED)));
    }

    #[test]
    fn resume_from_another_thread_keeps_the_tick() {
        let (mut engine, rows) = engine(Crowd::new(2), config(3));
        let handle = engine.handle();
        handle.pause_resume().unwrap();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            handle.set_delay(0).unwrap();
            thread::sleep(Duration::from_millis(30));
            handle.pause_resume().unwrap();
        });

        let report = engine.run().unwrap();
        sender.join().unwrap();

        assert_eq!(report.exit, ExitReason::Completed);
        assert_eq!(report.ticks_completed, 3);
        let rows = rows.rows();
        let paused: Vec<_> = rows.iter().filter(|r| r.flags() == StateFlags::PAUSED).collect();
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].tick(), Tick(0));
        let regular: Vec<u64> =
            rows.iter().filter(|r| !r.is_forced()).map(|r| r.tick().0).collect();
        assert_eq!(regular, [0, 1, 2]);
        engine.model().population.for_each(|_, w| assert_eq!(w.steps, 3));
    }

    #[test]
    fn stop_while_paused_ends_the_run() {
        let mut cfg = config(100);
        cfg.start_paused = true;
        let (mut engine, rows) = engine(Crowd::new(5), cfg);
        let handle = engine.handle();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(30));
            handle.set_delay(0).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(30));
            handle.stop().unwrap();
        });

        let report = engine.run().unwrap();
        sender.join().unwrap();

        assert_eq!(report.exit, ExitReason::Stopped);
        assert_eq!(report.ticks_completed, 0);
        let rows = rows.rows();
        assert_eq!(rows[0].flags(), StateFlags::INITIAL_STATE | StateFlags::PAUSED);
        assert!(rows.iter().any(|r| r.flags() == StateFlags::PAUSED));
        let last = rows.last().unwrap();
        assert!(last.flags().contains(StateFlags::FINAL_STATE));
        assert!(last.flags().contains(StateFlags::TERMINATED));
        engine.model().population.for_each(|_, w| assert_eq!(w.steps, 0));
    }

    #[test]
    fn control_command_ends_the_batch() {
        let (mut engine, _rows) = engine(Crowd::new(1), config(5));
        let handle = engine.handle();
        handle.submit(super::fixtures::Record("a")).unwrap();
        handle.stop().unwrap();
        handle.submit(super::fixtures::Record("b")).unwrap();

        let report = engine.run().unwrap();
        assert_eq!(report.exit, ExitReason::Stopped);
        assert_eq!(engine.model().events(), ["a:running"]);
        assert_eq!(engine.mailbox().len(), 1);
    }

    #[test]
    fn commands_run_in_send_order() {
        let (mut engine, _rows) = engine(Crowd::new(1), config(1));
        let handle = engine.handle();
        for label in ["one", "two", "three", "four"] {
            handle.submit(super::fixtures::Record(label)).unwrap();
        }
        engine.run().unwrap();
        assert_eq!(
            engine.model().events(),
            ["one:running", "two:running", "three:running", "four:running"]
        );
    }

    #[test]
    fn failed_command_is_dropped() {
        let (mut engine, _rows) = engine(Crowd::new(1), config(1));
        let handle = engine.handle();
        handle.set_variable("speed", "fast".into()).unwrap();
        handle.set_variable("speed", 4i64.into()).unwrap();
        handle.set_frequency(Some(-1.0)).unwrap();
        handle.invoke_method("explode").unwrap();
        let report = engine.run().unwrap();
        assert_eq!(report.exit, ExitReason::Completed);
        assert_eq!(engine.model().speed, 4);
        assert_eq!(engine.control().frequency(), None);
    }

    #[test]
    fn collector_interval_and_forced_rows() {
        let (mut engine, rows) = engine(Crowd::new(2), config(12));
        engine
            .control_mut()
            .data_mut()
            .add_collector(DataCollectorDescriptor::variable("speed", 5));
        engine.run().unwrap();

        let speed = DataKey::variable("speed");
        let sampled: Vec<u64> = rows
            .rows()
            .iter()
            .filter(|r| !r.is_forced() && r.contains(&speed))
            .map(|r| r.tick().0)
            .collect();
        assert_eq!(sampled, [0, 5, 10]);
        let rows = rows.rows();
        assert!(rows.first().unwrap().contains(&speed));
        assert!(rows.last().unwrap().contains(&speed));
    }

    #[test]
    fn collector_added_by_command_samples_from_next_row() {
        let (mut engine, rows) = engine(Crowd::new(2), config(2));
        engine.handle().add_collector(DataCollectorDescriptor::variable("speed", 1)).unwrap();
        engine.run().unwrap();
        let speed = DataKey::variable("speed");
        let rows = rows.rows();
        assert!(!rows[0].contains(&speed));
        assert!(rows[1].contains(&speed));
    }

    #[test]
    fn end_hook_can_stop_the_run() {
        let mut model = Crowd::new(2);
        model.stop_end_at = Some(Tick(3));
        let (mut engine, rows) = engine(model, config(10));
        let report = engine.run().unwrap();
        assert_eq!(report.exit, ExitReason::HookRequested);
        assert_eq!(report.ticks_completed, 3);
        assert!(rows.rows().last().unwrap().flags().contains(StateFlags::TERMINATED));
    }

    #[test]
    fn same_seed_same_trajectory_in_every_mode() {
        let positions = |mode| {
            let mut cfg = config(5);
            cfg.mode = mode;
            cfg.worker_threads = Some(3);
            let (mut engine, _rows) = engine(Crowd::new(40), cfg);
            engine.run().unwrap();
            engine.model().population.positions()
        };
        let serial = positions(ExecutionMode::Serial);
        assert_eq!(serial, positions(ExecutionMode::Serial));
        assert_eq!(serial, positions(ExecutionMode::Concurrent));
        assert_eq!(serial, positions(ExecutionMode::Parallel));
    }

    #[test]
    fn set_seed_takes_effect_mid_run() {
        let (mut engine, rows) = engine(Crowd::new(4), config(2));
        engine.run().unwrap();
        engine.handle().set_seed(99, false).unwrap();
        engine.run().unwrap();
        assert_eq!(engine.control().seed(), 99);
        assert_eq!(rows.rows().last().unwrap().header().seed, 99);
    }
}

// ── Commands and agent fan-out ────────────────────────────────────────────────

#[cfg(test)]
mod fan_out_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use abm_agent::{Agent, AgentResult, Population, StepContext};
    use abm_core::{AgentRng, ExecutionMode, RunConfig, SimRng};

    use crate::{EngineBuilder, EngineControl, ExitReason, Model, SimCommand, SimResult};

    /// Marks itself as stepping for a short while.
    struct Busy {
        stepping: Arc<AtomicUsize>,
    }

    impl Agent for Busy {
        fn step(&mut self, _ctx: &StepContext<'_, Self>, _rng: &mut AgentRng) -> AgentResult<()> {
            self.stepping.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_micros(200));
            self.stepping.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Workshop {
        population: Population<Busy>,
        stepping:   Arc<AtomicUsize>,
        checked:    usize,
        overlaps:   usize,
    }

    impl Model for Workshop {
        type Agent = Busy;

        fn setup(&mut self, _rng: &mut SimRng) -> SimResult<()> {
            self.population.clear();
            for _ in 0..16 {
                self.population.insert(Busy { stepping: Arc::clone(&self.stepping) });
            }
            Ok(())
        }

        fn population(&self) -> &Population<Busy> {
            &self.population
        }

        fn population_mut(&mut self) -> &mut Population<Busy> {
            &mut self.population
        }
    }

    /// Counts how often it ran while an agent was mid-step.
    struct CheckIdle;

    impl SimCommand<Workshop> for CheckIdle {
        fn name(&self) -> &'static str {
            "check_idle"
        }

        fn execute(self: Box<Self>, model: &mut Workshop, _control: &mut EngineControl) -> SimResult<()> {
            model.checked += 1;
            if model.stepping.load(Ordering::SeqCst) != 0 {
                model.overlaps += 1;
            }
            Ok(())
        }
    }

    /// Returns how many checks ran and how many overlapped a step.
    fn run_flooded(mode: ExecutionMode) -> (usize, usize) {
        let model = Workshop {
            population: Population::new(0),
            stepping:   Arc::default(),
            checked:    0,
            overlaps:   0,
        };
        let config = RunConfig {
            length: Some(30),
            mode,
            worker_threads: Some(4),
            ..RunConfig::default()
        };
        let mut engine = EngineBuilder::new(model, config).build().unwrap();
        let handle = engine.handle();
        let sender = thread::spawn(move || {
            for _ in 0..500 {
                if handle.submit(CheckIdle).is_err() {
                    break;
                }
                thread::sleep(Duration::from_micros(50));
            }
        });
        thread::sleep(Duration::from_millis(2));

        let report = engine.run().unwrap();
        sender.join().unwrap();
        assert_eq!(report.exit, ExitReason::Completed);
        (engine.model().checked, engine.model().overlaps)
    }

    #[test]
    fn no_command_runs_during_concurrent_fan_out() {
        let (checked, overlaps) = run_flooded(ExecutionMode::Concurrent);
        assert!(checked > 0);
        assert_eq!(overlaps, 0);
    }

    #[test]
    fn no_command_runs_during_parallel_fan_out() {
        let (checked, overlaps) = run_flooded(ExecutionMode::Parallel);
        assert!(checked > 0);
        assert_eq!(overlaps, 0);
    }
}

// ── Hook error policy ─────────────────────────────────────────────────────────

#[cfg(test)]
mod hook_policy_tests {
    use abm_core::{HookErrorPolicy, Tick};
    use abm_data::StateFlags;

    use super::fixtures::{config, engine, Crowd};
    use crate::{ExitReason, SimError};

    fn with_policy(policy: HookErrorPolicy, model: Crowd) -> (crate::Engine<Crowd>, abm_data::MemoryHandle) {
        let mut cfg = config(5);
        cfg.hook_error_policy = policy;
        engine(model, cfg)
    }

    #[test]
    fn abort_run_returns_the_error_after_finalizing() {
        let mut model = Crowd::new(3);
        model.fail_begin_at = Some(Tick(2));
        let (mut engine, rows) = with_policy(HookErrorPolicy::AbortRun, model);

        let err = engine.run().unwrap_err();
        assert!(matches!(err, SimError::Hook { hook: "begin", tick: Tick(2), .. }), "{err}");
        assert!(rows.is_finalized());
        let last = rows.rows().last().cloned().unwrap();
        assert_eq!(last.flags(), StateFlags::FINAL_STATE | StateFlags::TERMINATED);
        assert_eq!(last.tick(), Tick(2));
    }

    #[test]
    fn abort_run_on_agent_failure() {
        let mut model = Crowd::new(3);
        model.fail_agent_at = Some(Tick(1));
        let (mut engine, _rows) = with_policy(HookErrorPolicy::AbortRun, model);
        let err = engine.run().unwrap_err();
        assert!(matches!(err, SimError::Hook { hook: "step", tick: Tick(1), .. }), "{err}");
    }

    #[test]
    fn abort_tick_skips_the_row_and_continues() {
        let mut model = Crowd::new(3);
        model.fail_begin_at = Some(Tick(2));
        let (mut engine, rows) = with_policy(HookErrorPolicy::AbortTick, model);

        let report = engine.run().unwrap();
        assert_eq!(report.exit, ExitReason::Completed);
        assert_eq!(report.ticks_completed, 5);
        let regular: Vec<u64> =
            rows.rows().iter().filter(|r| !r.is_forced()).map(|r| r.tick().0).collect();
        assert_eq!(regular, [0, 1, 3, 4]);
    }

    #[test]
    fn skip_agent_keeps_the_tick() {
        let mut model = Crowd::new(3);
        model.fail_agent_at = Some(Tick(1));
        let (mut engine, rows) = with_policy(HookErrorPolicy::SkipAgent, model);

        let report = engine.run().unwrap();
        assert_eq!(report.rows, 7);
        engine.model().population.for_each(|_, w| assert_eq!(w.steps, 5));
        assert_eq!(rows.len(), 7);
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod session_tests {
    use std::thread;
    use std::time::Duration;

    use abm_core::RunConfig;

    use super::fixtures::{engine, Crowd};
    use crate::{ExitReason, SessionEnd, SimulationSession, StartOptions};

    fn open() -> RunConfig {
        RunConfig { seed: 3, delay_ms: 1, ..RunConfig::default() }
    }

    #[test]
    fn idle_commands_then_exit_mid_run() {
        let (engine, _rows) = engine(Crowd::new(2), open());
        let mut session = SimulationSession::new(engine);
        let handle = session.handle();
        handle.stop().unwrap();
        handle.set_variable("speed", 4i64.into()).unwrap();
        handle.start(StartOptions { length: Some(2), ..StartOptions::default() }).unwrap();
        handle.exit().unwrap();

        let outcome = session.serve().unwrap();
        assert_eq!(outcome.end, SessionEnd::Exit);
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].exit, ExitReason::Exit);
        assert_eq!(outcome.reports[0].ticks_completed, 0);
        assert_eq!(session.engine().model().speed, 4);
    }

    #[test]
    fn start_during_a_run_restarts() {
        let (engine, _rows) = engine(Crowd::new(2), open());
        let (handle, join) = SimulationSession::new(engine).spawn().unwrap();

        handle.start(StartOptions::default()).unwrap();
        thread::sleep(Duration::from_millis(20));
        handle.start(StartOptions { length: Some(3), ..StartOptions::default() }).unwrap();
        thread::sleep(Duration::from_millis(200));
        handle.exit().unwrap();

        let outcome = join.join().unwrap().unwrap();
        assert_eq!(outcome.end, SessionEnd::Exit);
        assert_eq!(outcome.reports.len(), 2);
        assert!(matches!(outcome.reports[0].exit, ExitReason::Restart(_)));
        assert_eq!(outcome.reports[1].exit, ExitReason::Completed);
        assert_eq!(outcome.reports[1].ticks_completed, 3);
    }

    #[test]
    fn load_model_ends_the_session() {
        let (engine, _rows) = engine(Crowd::new(1), open());
        let mut session = SimulationSession::new(engine);
        session.handle().load_model("predators").unwrap();
        let outcome = session.serve().unwrap();
        assert_eq!(outcome.end, SessionEnd::LoadModel("predators".into()));
        assert!(outcome.reports.is_empty());
    }

    #[test]
    fn dropped_engine_closes_handles() {
        let (engine, _rows) = engine(Crowd::new(1), open());
        let handle = engine.handle();
        drop(engine);
        assert!(handle.is_closed());
        assert!(handle.stop().is_err());
    }
}

// ── Cluster ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod cluster_tests {
    use std::thread;

    use abm_cluster::{Action, LocalTransport};
    use abm_core::Rank;
    use abm_data::{DataCollectorDescriptor, MemoryProcessor, StateFlags};

    use super::fixtures::{config, Crowd};
    use crate::{EngineBuilder, EngineControl, ExitReason, SimCommand, SimResult};

    /// Queues a `CollectAgents` action for this tick.
    struct Collect;

    impl SimCommand<Crowd> for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }

        fn execute(self: Box<Self>, _model: &mut Crowd, control: &mut EngineControl) -> SimResult<()> {
            control.queue_cluster_action(Action::CollectAgents);
            Ok(())
        }
    }

    #[test]
    fn three_nodes_run_in_step_and_stop_together() {
        let handles: Vec<_> = LocalTransport::cluster(3)
            .into_iter()
            .map(|transport| {
                thread::spawn(move || {
                    let (sink, rows) = MemoryProcessor::new();
                    let mut engine = EngineBuilder::new(Crowd::new(2), config(5))
                        .collector(DataCollectorDescriptor::variable("count", 1))
                        .processor(sink)
                        .cluster(transport)
                        .build()
                        .unwrap();
                    if engine.cluster().unwrap().is_coordinator() {
                        engine.handle().submit(Collect).unwrap();
                    }
                    let report = engine.run().unwrap();
                    let imported = std::mem::take(&mut engine.model_mut().imported);
                    (report, rows.rows(), imported)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let (root, root_rows, imported) = &results[0];
        assert_eq!(root.exit, ExitReason::Completed);
        assert_eq!(root.ticks_completed, 5);
        assert_eq!(root_rows.len(), 7);
        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].0, Rank(1));
        assert_eq!(imported[1].0, Rank(2));
        assert_eq!(imported[0].1.len(), 2);

        for (peer, rows, imported) in &results[1..] {
            assert_eq!(peer.exit, ExitReason::ClusterTerminated);
            assert_eq!(peer.ticks_completed, 5);
            assert_eq!(rows.len(), 7);
            assert!(rows.last().unwrap().flags().contains(StateFlags::TERMINATED));
            assert!(imported.is_empty());
        }
    }
}
