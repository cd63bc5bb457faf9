//! The walkers model: random walkers on a torus that eat, breed and starve.

use abm_agent::{Agent, AgentResult, Population, StepContext};
use abm_cluster::Role;
use abm_core::{AgentRng, DataValue, Rank, SimRng, SimulationTime};
use abm_sim::{ControlEvent, EngineControl, Model, SimCommand, SimError, SimResult};
use tracing::info;

/// Energy a newborn starts with; parents pay the same amount.
const BIRTH_ENERGY: f64 = 10.0;
const BREED_AT:     f64 = 2.0 * BIRTH_ENERGY;

pub struct Walker {
    pub pos:    [f64; 2],
    pub energy: f64,
    size:       [f64; 2],
    step:       f64,
}

impl Agent for Walker {
    fn step(&mut self, ctx: &StepContext<'_, Self>, rng: &mut AgentRng) -> AgentResult<()> {
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        self.pos[0] = (self.pos[0] + self.step * angle.cos()).rem_euclid(self.size[0]);
        self.pos[1] = (self.pos[1] + self.step * angle.sin()).rem_euclid(self.size[1]);

        // Foraging: a lucky step finds food.
        self.energy += if rng.gen_bool(0.4) { 2.0 } else { -1.0 };
        if self.energy <= 0.0 {
            ctx.die();
        } else if self.energy >= BREED_AT {
            self.energy -= BIRTH_ENERGY;
            ctx.spawn(Walker { energy: BIRTH_ENERGY, ..*self });
        }
        Ok(())
    }

    fn position(&self) -> Option<[f64; 2]> {
        Some(self.pos)
    }
}

pub struct Walkers {
    pub population: Population<Walker>,
    pub initial:    usize,
    pub size:       [f64; 2],
    pub step:       f64,
    /// Density grid resolution (cells per side).
    pub cells:      u32,
    /// Walkers seen on peers at the last census.
    pub remote:     Vec<(Rank, usize)>,
}

impl Walkers {
    pub fn new(initial: usize) -> Self {
        Self {
            population: Population::new(0),
            initial,
            size:       [100.0, 100.0],
            step:       1.5,
            cells:      10,
            remote:     Vec::new(),
        }
    }

    fn spawn_walker(&mut self, rng: &mut SimRng) {
        let pos = [rng.gen_range(0.0..self.size[0]), rng.gen_range(0.0..self.size[1])];
        self.population.insert(Walker { pos, energy: BIRTH_ENERGY, size: self.size, step: self.step });
    }

    fn density(&self) -> DataValue {
        let n = self.cells as usize;
        let mut cells = vec![0.0; n * n];
        for [x, y] in self.population.positions() {
            let cx = ((x / self.size[0]) * n as f64) as usize;
            let cy = ((y / self.size[1]) * n as f64) as usize;
            cells[cy.min(n - 1) * n + cx.min(n - 1)] += 1.0;
        }
        DataValue::Grid { width: self.cells, height: self.cells, cells }
    }

    fn mean_energy(&self) -> f64 {
        let mut total = 0.0;
        self.population.for_each(|_, w| total += w.energy);
        total / self.population.len().max(1) as f64
    }
}

impl Model for Walkers {
    type Agent = Walker;

    fn setup(&mut self, rng: &mut SimRng) -> SimResult<()> {
        self.population.clear();
        self.remote.clear();
        for _ in 0..self.initial {
            self.spawn_walker(rng);
        }
        Ok(())
    }

    fn population(&self) -> &Population<Walker> {
        &self.population
    }

    fn population_mut(&mut self) -> &mut Population<Walker> {
        &mut self.population
    }

    /// The run ends early once every walker has starved.
    fn end(&mut self, _time: &SimulationTime) -> SimResult<bool> {
        Ok(self.population.is_empty())
    }

    fn variable(&self, name: &str) -> Option<DataValue> {
        match name {
            "count" => Some(DataValue::from(self.population.len())),
            "mean_energy" => Some(DataValue::Float(self.mean_energy())),
            "step" => Some(DataValue::Float(self.step)),
            _ => None,
        }
    }

    fn data_layer(&self, name: &str) -> Option<DataValue> {
        (name == "density").then(|| self.density())
    }

    fn set_variable(&mut self, name: &str, value: DataValue) -> SimResult<()> {
        match name {
            "step" => {
                let step = value.as_f64().filter(|s| *s > 0.0).ok_or_else(|| SimError::InvalidValue {
                    name:   name.into(),
                    reason: format!("{value} is not a positive step"),
                })?;
                self.step = step;
                for id in self.population.ids() {
                    self.population.with_agent_mut(id, |w| w.step = step);
                }
                Ok(())
            }
            _ => Err(SimError::UnknownVariable(name.into())),
        }
    }

    fn on_control_event(&mut self, event: &ControlEvent) -> SimResult<()> {
        info!(?event, "control event");
        Ok(())
    }

    fn export_agents(&mut self) -> SimResult<Vec<u8>> {
        serde_json::to_vec(&self.population.positions()).map_err(|e| SimError::model(e.to_string()))
    }

    fn import_agents(&mut self, from: Rank, payload: &[u8]) -> SimResult<()> {
        let positions: Vec<[f64; 2]> =
            serde_json::from_slice(payload).map_err(|e| SimError::model(e.to_string()))?;
        self.remote.retain(|(rank, _)| *rank != from);
        self.remote.push((from, positions.len()));
        Ok(())
    }

    fn on_cluster_action(&mut self, role: Role, name: &str, payload: &serde_json::Value) -> SimResult<()> {
        info!(?role, action = name, %payload, local = self.population.len(), "cluster action");
        Ok(())
    }
}

/// Queue a census: peers ship their walkers' positions to the coordinator.
pub struct Census;

impl SimCommand<Walkers> for Census {
    fn name(&self) -> &'static str {
        "census"
    }

    fn execute(self: Box<Self>, _model: &mut Walkers, control: &mut EngineControl) -> SimResult<()> {
        control.queue_cluster_action(abm_cluster::Action::CollectAgents);
        Ok(())
    }
}
