use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dfmea_core::FmeaRow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{GenerationKind, GenerationProvider, GenerationRequest, InferError};

pub const COMPONENTS: [&str; 5] = [
    "Housing Assembly",
    "PCB Module",
    "Display Unit",
    "Connector",
    "Seal",
];

pub const FUNCTIONS: [&str; 5] = [
    "Provide structural support",
    "Process signals",
    "Display information",
    "Enable connectivity",
    "Protect internals",
];

pub const FAILURE_MODES: [&str; 5] = [
    "Crack / fracture",
    "Short circuit",
    "Pixel failure",
    "Loose connection",
    "Seal leak",
];

pub const EFFECTS: [&str; 5] = [
    "Unit inoperable",
    "Data loss",
    "No display",
    "Intermittent operation",
    "Moisture ingress",
];

/// Fabricates fixed-shape rows. Text columns cycle through the five templates,
/// ratings are drawn uniformly: severity 4..=8, occurrence 2..=5, detection 2..=5.
#[derive(Debug)]
pub struct MockRowGenerator {
    rng: Mutex<StdRng>,
}

impl MockRowGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn rows(&self, request: &GenerationRequest) -> Result<Vec<FmeaRow>, InferError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|err| InferError::LockPoisoned(err.to_string()))?;

        let rows = (0..request.count)
            .map(|index| {
                let slot = index % COMPONENTS.len();
                FmeaRow {
                    product_category: request.product_category.clone(),
                    product: request.product.clone(),
                    subsystem: request.subsystem.clone(),
                    component: COMPONENTS[slot].to_owned(),
                    function: FUNCTIONS[slot].to_owned(),
                    failure_mode: FAILURE_MODES[slot].to_owned(),
                    effect: EFFECTS[slot].to_owned(),
                    severity: rng.random_range(4..=8),
                    occurrence: rng.random_range(2..=5),
                    detection: rng.random_range(2..=5),
                    feedback: None,
                }
            })
            .collect();
        Ok(rows)
    }
}

impl Default for MockRowGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockLatency {
    pub generate: Duration,
    pub regenerate: Duration,
}

impl MockLatency {
    pub const ZERO: Self = Self {
        generate: Duration::ZERO,
        regenerate: Duration::ZERO,
    };

    pub fn from_millis(generate_ms: u64, regenerate_ms: u64) -> Self {
        Self {
            generate: Duration::from_millis(generate_ms),
            regenerate: Duration::from_millis(regenerate_ms),
        }
    }

    fn for_kind(self, kind: GenerationKind) -> Duration {
        match kind {
            GenerationKind::Generate => self.generate,
            GenerationKind::Regenerate => self.regenerate,
        }
    }
}

#[derive(Debug)]
pub struct MockGenerationProvider {
    generator: MockRowGenerator,
    latency: MockLatency,
}

impl MockGenerationProvider {
    pub fn new(seed: Option<u64>, latency: MockLatency) -> Self {
        Self {
            generator: MockRowGenerator::new(seed),
            latency,
        }
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    async fn generate_rows(&self, request: &GenerationRequest) -> Result<Vec<FmeaRow>, InferError> {
        let delay = self.latency.for_kind(request.kind);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.generator.rows(request)
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
