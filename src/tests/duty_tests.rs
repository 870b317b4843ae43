// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{Arc, Mutex};

use crate::duty::{DutyCycle, IdleConfig, NoOp, Step, StopHandle};
use crate::error::{LogError, RuntimeError};

/// Records its name on every execution and reports `work` until it runs out.
struct Recording {
    name: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
    work: Vec<usize>,
    stop_after: Option<(usize, StopHandle)>,
}

impl Recording {
    fn new(name: &'static str, trace: &Arc<Mutex<Vec<&'static str>>>, work: Vec<usize>) -> Self {
        Self {
            name,
            trace: trace.clone(),
            work,
            stop_after: None,
        }
    }
}

impl Step for Recording {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self) -> Result<usize, RuntimeError> {
        let mut trace = self.trace.lock().unwrap();
        trace.push(self.name);
        if let Some((limit, stop)) = &self.stop_after {
            if trace.len() >= *limit {
                stop.stop();
            }
        }
        Ok(if self.work.is_empty() { 0 } else { self.work.remove(0) })
    }
}

struct Failing;

impl Step for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn execute(&mut self) -> Result<usize, RuntimeError> {
        Err(RuntimeError::storage("failing", LogError::NotLeader))
    }
}

#[test]
fn test_steps_run_in_registration_order() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut cycle = DutyCycle::new(Box::new(NoOp));
    cycle.add_step(Box::new(Recording::new("a", &trace, vec![2])));
    cycle.add_step(Box::new(Recording::new("b", &trace, vec![1, 1])));

    assert_eq!(cycle.run_once().unwrap(), 3);
    assert_eq!(cycle.run_once().unwrap(), 1);
    assert_eq!(cycle.cycles(), 2);
    assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "a", "b"]);
}

#[test]
fn test_run_until_idle_stops_on_an_empty_cycle() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut cycle = DutyCycle::new(Box::new(NoOp));
    cycle.add_step(Box::new(Recording::new("a", &trace, vec![1, 1, 1])));

    assert_eq!(cycle.run_until_idle(100).unwrap(), 3);
    assert_eq!(cycle.cycles(), 4);
    assert_eq!(cycle.run_until_idle(100).unwrap(), 0);
}

#[test]
fn test_stop_handle_ends_run() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut cycle = DutyCycle::new(IdleConfig::BusySpin.build());
    let mut step = Recording::new("a", &trace, Vec::new());
    step.stop_after = Some((5, cycle.stop_handle()));
    cycle.add_step(Box::new(step));

    cycle.run().unwrap();
    assert_eq!(cycle.cycles(), 5);
    assert!(cycle.stop_handle().is_stopped());
}

#[test]
fn test_step_error_ends_the_cycle() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut cycle = DutyCycle::new(Box::new(NoOp));
    cycle.add_step(Box::new(Failing));
    cycle.add_step(Box::new(Recording::new("after", &trace, vec![1])));

    assert!(cycle.run().is_err());
    assert!(trace.lock().unwrap().is_empty());
    assert_eq!(cycle.cycles(), 0);
}
