//! Unit tests for abm-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, Rank};

    #[test]
    fn ordering() {
        assert!(AgentId(0) < AgentId(1));
        assert!(Rank(3) > Rank(2));
    }

    #[test]
    fn invalid_sentinels_are_max() {
        assert_eq!(AgentId::INVALID.0, u64::MAX);
        assert_eq!(Rank::INVALID.0, u32::MAX);
        assert_eq!(AgentId::default(), AgentId::INVALID);
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(7).to_string(), "AgentId(7)");
        assert_eq!(Rank(2).to_string(), "Rank(2)");
    }

    #[test]
    fn coordinator_is_rank_zero() {
        assert!(Rank(0).is_coordinator());
        assert!(!Rank(1).is_coordinator());
    }
}

#[cfg(test)]
mod rational {
    use crate::Rational;

    #[test]
    fn reduces_on_construction() {
        let r = Rational::new(6, 8).unwrap();
        assert_eq!((r.numer(), r.denom()), (3, 4));
    }

    #[test]
    fn zero_denominator_rejected() {
        assert!(Rational::new(1, 0).is_err());
    }

    #[test]
    fn times_is_exact() {
        // 1/3 * 3 must be exactly 1, not 0.999…
        let third = Rational::new(1, 3).unwrap();
        assert_eq!(third.times(3), Rational::ONE);
        assert_eq!(third.times(4), Rational::new(4, 3).unwrap());
        assert_eq!(third.times(0), Rational::ZERO);
    }

    #[test]
    fn ordering_cross_multiplies() {
        let a = Rational::new(1, 3).unwrap();
        let b = Rational::new(1, 2).unwrap();
        assert!(a < b);
    }

    #[test]
    fn display() {
        assert_eq!(Rational::integer(5).to_string(), "5");
        assert_eq!(Rational::new(2, 6).unwrap().to_string(), "1/3");
    }
}

#[cfg(test)]
mod time {
    use std::time::Duration;

    use crate::{Rational, SimulationTime, Tick};

    #[test]
    fn advance_is_monotonic() {
        let mut t = SimulationTime::default();
        assert_eq!(t.tick(), Tick(0));
        t.begin_tick();
        t.advance();
        t.begin_tick();
        t.advance();
        assert_eq!(t.tick(), Tick(2));
    }

    #[test]
    fn model_time_follows_step() {
        let mut t = SimulationTime::new(Rational::new(1, 4).unwrap());
        for _ in 0..6 {
            t.advance();
        }
        assert_eq!(t.model_time(), Rational::new(3, 2).unwrap());
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut t = SimulationTime::default();
        t.start_run();
        t.advance();
        t.reset();
        assert_eq!(t.tick(), Tick::ZERO);
        assert_eq!(t.run_elapsed(), Duration::ZERO);
        assert_eq!(t.run_started_unix_ms(), 0);
    }

    #[test]
    fn tick_elapsed_recorded_on_advance() {
        let mut t = SimulationTime::default();
        t.begin_tick();
        std::thread::sleep(Duration::from_millis(5));
        t.advance();
        assert!(t.last_tick_elapsed() >= Duration::from_millis(5));
        assert_eq!(t.time_in_tick(), Duration::ZERO);
    }

    #[test]
    fn tick_interval_boundaries() {
        assert!(Tick(10).is_multiple_of(5));
        assert!(!Tick(11).is_multiple_of(5));
        assert!(Tick(0).is_multiple_of(5));
        // Interval 0 degrades to "every tick".
        assert!(Tick(3).is_multiple_of(0));
    }
}

#[cfg(test)]
mod rng {
    use crate::{AgentId, AgentRng, SimRng};

    #[test]
    fn agent_rng_deterministic() {
        let mut a = AgentRng::new(42, AgentId(3));
        let mut b = AgentRng::new(42, AgentId(3));
        let xs: Vec<u64> = (0..8).map(|_| a.random()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn agents_get_distinct_streams() {
        let mut a = AgentRng::new(42, AgentId(0));
        let mut b = AgentRng::new(42, AgentId(1));
        assert_ne!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn reseed_restarts_stream() {
        let mut r = SimRng::new(9);
        let first: u64 = r.random();
        r.random::<u64>();
        r.reseed(9);
        assert_eq!(r.random::<u64>(), first);
        assert_eq!(r.seed(), 9);
    }
}

#[cfg(test)]
mod value {
    use crate::DataValue;

    #[test]
    fn numeric_views() {
        assert_eq!(DataValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(DataValue::Bool(true).as_i64(), Some(1));
        assert_eq!(DataValue::Text("x".into()).as_f64(), None);
        assert_eq!(DataValue::Text("x".into()).as_str(), Some("x"));
    }

    #[test]
    fn serde_is_tagged() {
        let json = serde_json::to_string(&DataValue::Float(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"float","value":1.5}"#);
        let back: DataValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DataValue::Float(1.5));
    }

    #[test]
    fn compound_values_are_not_scalar() {
        assert!(DataValue::Int(1).is_scalar());
        assert!(!DataValue::Points(vec![[0.0, 1.0]]).is_scalar());
        assert_eq!(DataValue::Points(vec![[0.0, 1.0]]).to_string(), "points[1]");
    }
}

#[cfg(test)]
mod config {
    use std::time::Duration;

    use crate::{ExecutionMode, HookErrorPolicy, Rational, RunConfig};

    #[test]
    fn defaults() {
        let c = RunConfig::default();
        assert_eq!(c.length, None);
        assert_eq!(c.mode, ExecutionMode::Serial);
        assert_eq!(c.pause_poll(), Duration::from_millis(1));
        assert_eq!(c.tick_period(), None);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let c = RunConfig::from_toml_str(
            r#"
            length = 25
            seed = 7
            mode = "parallel"
            frequency = 50.0
            hook_error_policy = "skip_agent"
            time_step = { numer = 1, denom = 10 }
            "#,
        )
        .unwrap();
        assert_eq!(c.length, Some(25));
        assert_eq!(c.seed, 7);
        assert_eq!(c.mode, ExecutionMode::Parallel);
        assert_eq!(c.hook_error_policy, HookErrorPolicy::SkipAgent);
        assert_eq!(c.tick_period(), Some(Duration::from_millis(20)));
        assert_eq!(c.time_step, Rational::new(1, 10).unwrap());
        // Untouched fields keep their defaults.
        assert_eq!(c.compaction_threshold, 0.1);
    }

    #[test]
    fn rejects_bad_frequency() {
        assert!(RunConfig::from_toml_str("frequency = 0.0").is_err());
        assert!(RunConfig::from_toml_str("frequency = -3.0").is_err());
        // The period would overflow a Duration.
        assert!(RunConfig::from_toml_str("frequency = 1e-300").is_err());
        assert_eq!(RunConfig::period_for(1e-300), None);
        assert_eq!(RunConfig::period_for(f64::NAN), None);
        assert_eq!(RunConfig::period_for(4.0), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_zero_workers_and_bad_threshold() {
        assert!(RunConfig::from_toml_str("worker_threads = 0").is_err());
        assert!(RunConfig::from_toml_str("compaction_threshold = 1.5").is_err());
    }

    #[test]
    fn rejects_zero_denominator_step() {
        assert!(RunConfig::from_toml_str("time_step = { numer = 1, denom = 0 }").is_err());
    }
}
