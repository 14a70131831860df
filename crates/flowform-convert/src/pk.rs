//! Primary-key generation for exported records

use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

/// Leading digits of every generated numeric key.
pub const NUMERIC_PK_PREFIX: i64 = 29;

/// Source of fresh primary keys.
///
/// Graph and question records get UUID strings; tag and trigger-criteria
/// records get integers of the form `29xxxx`.
pub trait PkGenerator {
    fn uuid(&mut self) -> String;
    fn numeric(&mut self) -> i64;
}

/// Random keys. Numeric keys are not repeated within one generator while any remain.
#[derive(Debug, Default)]
pub struct RandomPks {
    issued: HashSet<i64>,
}

impl RandomPks {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw() -> i64 {
        NUMERIC_PK_PREFIX * 10_000 + rand::thread_rng().gen_range(1000..10_000)
    }
}

impl PkGenerator for RandomPks {
    fn uuid(&mut self) -> String {
        Uuid::new_v4().to_string()
    }

    fn numeric(&mut self) -> i64 {
        for _ in 0..64 {
            let candidate = Self::draw();
            if self.issued.insert(candidate) {
                return candidate;
            }
        }
        // Range nearly exhausted
        Self::draw()
    }
}

/// Predictable keys for tests and reproducible exports.
#[derive(Debug, Default)]
pub struct SequentialPks {
    uuids: u64,
    numerics: i64,
}

impl SequentialPks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PkGenerator for SequentialPks {
    fn uuid(&mut self) -> String {
        self.uuids += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.uuids)
    }

    fn numeric(&mut self) -> i64 {
        self.numerics += 1;
        NUMERIC_PK_PREFIX * 10_000 + 1000 + self.numerics
    }
}
