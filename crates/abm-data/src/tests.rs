//! Unit tests for abm-data.

#[cfg(test)]
mod helpers {
    use abm_core::{DataValue, Rational, SimulationTime, Tick};

    use crate::{CollectorKind, StateFlags, StateHeader};

    pub fn header(tick: u64, flags: StateFlags) -> StateHeader {
        StateHeader {
            tick:         Tick(tick),
            model_time:   Rational::integer(tick),
            wall_time_ms: 0,
            seed:         42,
            flags,
        }
    }

    pub fn time_at(tick: u64) -> SimulationTime {
        let mut t = SimulationTime::default();
        for _ in 0..tick {
            t.advance();
        }
        t
    }

    /// Knows `count` (the tick number) and `label`; nothing else.
    pub fn source(tick: u64) -> impl Fn(CollectorKind, &str) -> Option<DataValue> {
        move |kind, name| match (kind, name) {
            (CollectorKind::Variable, "count") => Some(DataValue::Int(tick as i64)),
            (CollectorKind::Variable, "label") => Some(DataValue::from("walkers")),
            _ => None,
        }
    }
}

// ── Descriptors and rows ──────────────────────────────────────────────────────

#[cfg(test)]
mod row_tests {
    use abm_core::DataValue;

    use super::helpers::header;
    use crate::{CollectorKind, DataCollectorDescriptor, DataKey, DataRowBuilder, StateFlags};

    #[test]
    fn descriptor_interval_is_at_least_one() {
        let d = DataCollectorDescriptor::variable("x", 0);
        assert_eq!(d.interval, 1);
        assert_eq!(d, DataCollectorDescriptor::variable("x", 1));
        assert_ne!(d, DataCollectorDescriptor::variable("x", 2));
    }

    #[test]
    fn deserialized_interval_is_at_least_one() {
        let d: DataCollectorDescriptor =
            serde_json::from_str(r#"{"kind":"variable","name":"x","interval":0}"#).unwrap();
        assert_eq!(d, DataCollectorDescriptor::variable("x", 1));
        assert!(d.is_due(abm_core::Tick(5)));

        let kept: DataCollectorDescriptor =
            serde_json::from_str(r#"{"kind":"data_layer","name":"g","interval":4}"#).unwrap();
        assert_eq!(kept, DataCollectorDescriptor::new(CollectorKind::DataLayer, "g", 4));
    }

    #[test]
    fn flags_are_independent() {
        let mut f = StateFlags::FINAL_STATE;
        f |= StateFlags::TERMINATED;
        assert!(f.contains(StateFlags::FINAL_STATE));
        assert!(f.contains(StateFlags::TERMINATED));
        assert!(!f.contains(StateFlags::PAUSED));
        assert_eq!(f.bits(), 0x4 | 0x8);
        assert_eq!(f.to_string(), "FINAL_STATE|TERMINATED");
        assert_eq!(StateFlags::NONE.to_string(), "-");
        assert_eq!(StateFlags::from_bits(0xFF).bits(), 0xF);
    }

    #[test]
    fn builder_never_overwrites() {
        let mut b = DataRowBuilder::new(header(3, StateFlags::NONE));
        assert!(b.insert(DataKey::variable("n"), DataValue::Int(1)));
        assert!(!b.insert(DataKey::variable("n"), DataValue::Int(2)));
        let row = b.build();
        assert_eq!(row.variable_i64("n"), Some(1));
        assert_eq!(row.len(), 1);
        assert!(!row.is_forced());
    }

    #[test]
    fn lookup_distinguishes_kinds() {
        let mut b = DataRowBuilder::new(header(0, StateFlags::INITIAL_STATE));
        b.insert(DataKey::variable("grid"), DataValue::Int(1));
        b.insert(
            DataKey::new(CollectorKind::DataLayer, "grid"),
            DataValue::Grid { width: 1, height: 1, cells: vec![0.5] },
        );
        let row = b.build();
        assert!(row.is_forced());
        assert_eq!(row.get(CollectorKind::Variable, "grid"), Some(&DataValue::Int(1)));
        assert!(matches!(
            row.get(CollectorKind::DataLayer, "grid"),
            Some(DataValue::Grid { width: 1, .. })
        ));
        assert!(row.get(CollectorKind::AgentPositions, "grid").is_none());
    }
}

// ── Collectors ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod collector_tests {
    use super::helpers::{header, source, time_at};
    use crate::{
        DataCollector, DataCollectorDescriptor, DataError, DataRowBuilder, SourceCollector,
        StateFlags,
    };

    #[test]
    fn samples_only_on_interval_unless_forced() {
        let mut c = SourceCollector::new(DataCollectorDescriptor::variable("count", 5));
        let mut sampled = Vec::new();
        for tick in 0..12 {
            let mut row = DataRowBuilder::new(header(tick, StateFlags::NONE));
            if c.collect(&source(tick), &mut row, &time_at(tick), false).unwrap() {
                sampled.push(tick);
            }
        }
        assert_eq!(sampled, [0, 5, 10]);

        let mut row = DataRowBuilder::new(header(7, StateFlags::PAUSED));
        assert!(c.collect(&source(7), &mut row, &time_at(7), true).unwrap());
        assert_eq!(c.samples(), 4);
        c.reset();
        assert_eq!(c.samples(), 0);
    }

    #[test]
    fn second_collect_into_same_row_is_noop() {
        let mut c = SourceCollector::new(DataCollectorDescriptor::variable("count", 1));
        let mut row = DataRowBuilder::new(header(0, StateFlags::NONE));
        let time = time_at(0);
        assert!(c.collect(&source(0), &mut row, &time, false).unwrap());
        assert!(!c.collect(&source(99), &mut row, &time, true).unwrap());
        assert_eq!(row.build().variable_i64("count"), Some(0));
    }

    #[test]
    fn missing_quantity_is_source_unavailable() {
        let mut c = SourceCollector::new(DataCollectorDescriptor::variable("gone", 1));
        let mut row = DataRowBuilder::new(header(0, StateFlags::NONE));
        let err = c.collect(&source(0), &mut row, &time_at(0), false).unwrap_err();
        assert!(matches!(err, DataError::SourceUnavailable { ref name, .. } if name == "gone"));
    }
}

// ── Filter ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod filter_tests {
    use std::sync::Arc;

    use abm_core::DataValue;

    use super::helpers::header;
    use crate::{
        DataFilter, DataKey, DataProcessor, DataRow, DataRowBuilder, IntervalMode,
        MemoryProcessor, StateFlags,
    };

    fn row(tick: u64, flags: StateFlags, with_count: bool) -> Arc<DataRow> {
        let mut b = DataRowBuilder::new(header(tick, flags));
        if with_count {
            b.insert(DataKey::variable("count"), DataValue::Int(tick as i64));
        }
        Arc::new(b.build())
    }

    fn delivered_ticks(rows: &[Arc<DataRow>]) -> Vec<u64> {
        rows.iter().map(|r| r.tick().0).collect()
    }

    #[test]
    fn required_keys_gate_every_row() {
        let (mem, handle) = MemoryProcessor::new();
        let mut f = DataFilter::new(mem).require(DataKey::variable("count"));
        f.process_data_row(&row(0, StateFlags::NONE, false)).unwrap();
        f.process_data_row(&row(1, StateFlags::FINAL_STATE, false)).unwrap();
        f.process_data_row(&row(2, StateFlags::NONE, true)).unwrap();
        assert_eq!(delivered_ticks(&handle.rows()), [2]);
    }

    #[test]
    fn strict_interval_drops_off_multiples_but_not_forced_rows() {
        let (mem, handle) = MemoryProcessor::new();
        let mut f = DataFilter::new(mem).interval(3, IntervalMode::Strict);
        for t in 0..7 {
            f.process_data_row(&row(t, StateFlags::NONE, true)).unwrap();
        }
        f.process_data_row(&row(7, StateFlags::PAUSED, true)).unwrap();
        assert_eq!(delivered_ticks(&handle.rows()), [0, 3, 6, 7]);
    }

    #[test]
    fn loose_interval_forwards_whatever_arrives() {
        let (mem, handle) = MemoryProcessor::new();
        let mut f = DataFilter::new(mem)
            .require(DataKey::variable("count"))
            .interval(3, IntervalMode::Loose);
        for t in [0, 2, 4, 5] {
            f.process_data_row(&row(t, StateFlags::NONE, true)).unwrap();
        }
        // The requirement gate still applies.
        f.process_data_row(&row(6, StateFlags::NONE, false)).unwrap();
        assert_eq!(delivered_ticks(&handle.rows()), [0, 2, 4, 5]);
    }

    #[test]
    fn latest_row_tracks_last_delivery() {
        let (mem, _handle) = MemoryProcessor::new();
        let mut f = DataFilter::new(mem).interval(2, IntervalMode::Strict);
        let latest = f.latest();
        assert!(latest.get().is_none());
        f.process_data_row(&row(2, StateFlags::NONE, true)).unwrap();
        f.process_data_row(&row(3, StateFlags::NONE, true)).unwrap();
        assert_eq!(latest.get().map(|r| r.tick().0), Some(2));
    }

    #[test]
    fn finalize_reaches_consumer() {
        let (mem, handle) = MemoryProcessor::new();
        let mut f = DataFilter::new(mem);
        f.finalize_processing().unwrap();
        assert!(handle.is_finalized());
    }
}

// ── Processors ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod processor_tests {
    use std::sync::Arc;
    use std::thread;

    use super::helpers::header;
    use crate::{
        BackgroundProcessor, ChannelProcessor, DataError, DataProcessor, DataResult, DataRow,
        DataRowBuilder, MemoryProcessor, StateFlags,
    };

    fn row(tick: u64) -> Arc<DataRow> {
        Arc::new(DataRowBuilder::new(header(tick, StateFlags::NONE)).build())
    }

    #[test]
    fn channel_stays_open_across_finalize() {
        let (mut p, rx) = ChannelProcessor::bounded("chan", 2);
        let consumer = thread::spawn(move || rx.iter().map(|r| r.tick().0).collect::<Vec<_>>());
        for t in 0..3 {
            p.process_data_row(&row(t)).unwrap();
        }
        p.finalize_processing().unwrap();
        for t in 0..2 {
            p.process_data_row(&row(t)).unwrap();
        }
        p.finalize_processing().unwrap();
        drop(p);
        assert_eq!(consumer.join().unwrap(), [0, 1, 2, 0, 1]);
    }

    #[test]
    fn channel_reports_dropped_consumer() {
        let (mut p, rx) = ChannelProcessor::unbounded("chan");
        drop(rx);
        assert!(matches!(p.process_data_row(&row(0)), Err(DataError::Disconnected(_))));
    }

    #[test]
    fn background_processor_delivers_in_order_and_finalizes() {
        let (mem, handle) = MemoryProcessor::new();
        let mut bg = BackgroundProcessor::spawn(mem).unwrap();
        for t in 0..50 {
            bg.process_data_row(&row(t)).unwrap();
        }
        bg.finalize_processing().unwrap();
        let ticks: Vec<u64> = handle.rows().iter().map(|r| r.tick().0).collect();
        assert_eq!(ticks, (0..50).collect::<Vec<_>>());
        assert!(handle.is_finalized());
    }

    #[test]
    fn background_processor_keeps_working_after_finalize() {
        let (mem, handle) = MemoryProcessor::new();
        let mut bg = BackgroundProcessor::spawn(mem).unwrap();
        for run in 0..3 {
            for t in 0..4 {
                bg.process_data_row(&row(t)).unwrap();
            }
            bg.finalize_processing().unwrap();
            assert_eq!(handle.len(), 4 * (run + 1));
        }
    }

    struct FailingFinalize;

    impl DataProcessor for FailingFinalize {
        fn process_data_row(&mut self, _row: &Arc<DataRow>) -> DataResult<()> {
            Ok(())
        }

        fn finalize_processing(&mut self) -> DataResult<()> {
            Err(DataError::processor("failing", "disk full"))
        }
    }

    #[test]
    fn background_processor_returns_inner_finalize_error() {
        let mut bg = BackgroundProcessor::spawn(FailingFinalize).unwrap();
        let err = bg.finalize_processing().unwrap_err();
        assert!(matches!(err, DataError::Processor { ref reason, .. } if reason == "disk full"));
    }
}

// ── DataSet ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dataset_tests {
    use std::sync::Arc;

    use super::helpers::{header, source, time_at};
    use crate::{
        DataCollectorDescriptor, DataError, DataProcessor, DataResult, DataRow, DataSet,
        MemoryProcessor, StateFlags,
    };

    #[test]
    fn add_collector_is_idempotent() {
        let mut ds = DataSet::new();
        assert!(ds.add_collector(DataCollectorDescriptor::variable("count", 1)));
        assert!(!ds.add_collector(DataCollectorDescriptor::variable("count", 1)));
        assert!(ds.add_collector(DataCollectorDescriptor::variable("count", 2)));
        assert_eq!(ds.collector_count(), 2);
        assert!(ds.remove_collector(&DataCollectorDescriptor::variable("count", 2)));
        assert!(!ds.remove_collector(&DataCollectorDescriptor::variable("count", 2)));
        assert_eq!(ds.collector_count(), 1);
    }

    #[test]
    fn unavailable_source_trips_circuit_breaker() {
        let mut ds = DataSet::new();
        let gone = DataCollectorDescriptor::variable("gone", 1);
        ds.add_collector(DataCollectorDescriptor::variable("count", 1));
        ds.add_collector(gone.clone());

        let row = ds.produce_row(&source(0), &time_at(0), header(0, StateFlags::NONE));
        assert_eq!(row.variable_i64("count"), Some(0));
        assert!(!ds.is_active(&gone));
        assert_eq!(ds.active_collectors().count(), 1);

        // Re-adding replaces the tripped collector.
        assert!(ds.add_collector(gone.clone()));
        assert!(ds.is_active(&gone));
    }

    #[test]
    fn forced_rows_sample_off_interval() {
        let mut ds = DataSet::new();
        ds.add_collector(DataCollectorDescriptor::variable("count", 5));
        let regular = ds.produce_row(&source(3), &time_at(3), header(3, StateFlags::NONE));
        assert!(regular.is_empty());
        let forced = ds.produce_row(&source(3), &time_at(3), header(3, StateFlags::FINAL_STATE));
        assert_eq!(forced.variable_i64("count"), Some(3));
    }

    struct AlwaysFails;

    impl DataProcessor for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }

        fn process_data_row(&mut self, _row: &Arc<DataRow>) -> DataResult<()> {
            Err(DataError::processor("always-fails", "nope"))
        }

        fn finalize_processing(&mut self) -> DataResult<()> {
            Err(DataError::processor("always-fails", "still nope"))
        }
    }

    #[test]
    fn failing_processor_does_not_block_others() {
        let mut ds = DataSet::new();
        ds.add_collector(DataCollectorDescriptor::variable("count", 1));
        ds.add_processor(AlwaysFails);
        let (mem, handle) = MemoryProcessor::new();
        ds.add_processor(mem);

        for t in 0..3 {
            ds.emit(&source(t), &time_at(t), header(t, StateFlags::NONE));
        }
        assert_eq!(handle.len(), 3);
        assert_eq!(ds.rows_emitted(), 3);

        // finish still finalizes the healthy processor, then reports the error.
        assert!(ds.finish().is_err());
        assert!(handle.is_finalized());
    }

    #[test]
    fn removed_processor_receives_nothing_more() {
        let mut ds = DataSet::new();
        let (mem, handle) = MemoryProcessor::new();
        let id = ds.add_processor(mem);
        ds.emit(&source(0), &time_at(0), header(0, StateFlags::NONE));
        assert!(ds.remove_processor(id).is_some());
        assert!(ds.remove_processor(id).is_none());
        ds.emit(&source(1), &time_at(1), header(1, StateFlags::NONE));
        assert_eq!(handle.len(), 1);
        ds.finish().unwrap();
        assert!(!handle.is_finalized());
    }

    #[test]
    fn finish_rearms_tripped_collectors() {
        let mut ds = DataSet::new();
        let gone = DataCollectorDescriptor::variable("gone", 1);
        ds.add_collector(gone.clone());
        ds.produce_row(&source(0), &time_at(0), header(0, StateFlags::NONE));
        assert!(!ds.is_active(&gone));
        ds.finish().unwrap();
        assert!(ds.is_active(&gone));
    }
}
