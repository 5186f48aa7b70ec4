use crate::types::SlotId;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

pub trait DiceRoller: Send {
    fn roll(&mut self) -> u32;
}

/// Hands every session worker its own roller.
pub trait DiceSource: Send + Sync {
    fn dice_for(&self, slot: SlotId, faces: u32) -> Box<dyn DiceRoller>;
}

/// Uniform `1..=faces` from a generator owned by one worker.
pub struct SeededDice {
    rng: StdRng,
    faces: u32,
}

impl SeededDice {
    pub fn new(rng: StdRng, faces: u32) -> Self {
        Self {
            rng,
            faces: faces.max(1),
        }
    }
}

impl DiceRoller for SeededDice {
    fn roll(&mut self) -> u32 {
        self.rng.gen_range(1..=self.faces)
    }
}

/// Independent generators per slot: fresh entropy, or `seed + slot` for
/// reproducible games.
#[derive(Debug, Clone, Default)]
pub struct RandomDice {
    seed: Option<u64>,
}

impl RandomDice {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }
}

impl DiceSource for RandomDice {
    fn dice_for(&self, slot: SlotId, faces: u32) -> Box<dyn DiceRoller> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(slot as u64)),
            None => StdRng::from_entropy(),
        };
        Box::new(SeededDice::new(rng, faces))
    }
}

/// Replays fixed values per slot; once a script runs out the last value
/// repeats (or 1 for an empty script).
#[derive(Debug, Default)]
pub struct ScriptedDice {
    scripts: Mutex<HashMap<SlotId, Vec<u32>>>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, slot: SlotId, values: impl Into<Vec<u32>>) -> Self {
        self.scripts.lock().insert(slot, values.into());
        self
    }
}

struct Script {
    values: VecDeque<u32>,
    last: u32,
}

impl DiceRoller for Script {
    fn roll(&mut self) -> u32 {
        if let Some(value) = self.values.pop_front() {
            self.last = value;
        }
        self.last
    }
}

impl DiceSource for ScriptedDice {
    fn dice_for(&self, slot: SlotId, _faces: u32) -> Box<dyn DiceRoller> {
        let values = self.scripts.lock().remove(&slot).unwrap_or_default();
        Box::new(Script {
            values: values.into(),
            last: 1,
        })
    }
}
