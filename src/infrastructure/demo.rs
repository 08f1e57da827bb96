use crate::domain::code::RawCode;
use crate::domain::listing::Listing;
use crate::domain::number::{OwnedNumber, PhoneAssignment};
use crate::domain::ports::{Allocator, AllocatorRef};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Tunables for the simulated provider.
#[derive(Debug, Clone, Copy)]
pub struct DemoConfig {
    /// Probability that an order is filled instead of declined.
    pub success_rate: f64,
    /// Probability that one poll on a number yields a fresh code.
    pub code_chance: f64,
    /// Fixed seed for reproducible runs; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.9,
            code_chance: 0.1,
            seed: None,
        }
    }
}

/// A provider gateway that fabricates numbers and codes.
///
/// Stands in for a real SMS marketplace API: orders are filled with a
/// synthesized phone number and an `act_` reference, and polls occasionally
/// produce a six digit code. Seedable, so demos and tests can replay the
/// exact same run.
pub struct DemoAllocator {
    success_rate: f64,
    code_chance: f64,
    rng: Mutex<StdRng>,
}

impl DemoAllocator {
    pub fn new(config: DemoConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            success_rate: config.success_rate.clamp(0.0, 1.0),
            code_chance: config.code_chance.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl Default for DemoAllocator {
    fn default() -> Self {
        Self::new(DemoConfig::default())
    }
}

#[async_trait]
impl Allocator for DemoAllocator {
    async fn acquire(&self, listing: &Listing) -> Result<PhoneAssignment> {
        let mut rng = self.rng.lock().await;
        if !rng.gen_bool(self.success_rate) {
            return Err(EngineError::AllocationFailed(format!(
                "provider {} declined the order",
                listing.provider
            )));
        }
        let phone_value = synthesize_phone(&mut rng, &listing.country);
        let activation_ref = format!("act_{}", rng.gen_range(100_000..=999_999));
        Ok(PhoneAssignment {
            phone_value,
            activation_ref,
        })
    }

    async fn fetch_codes(&self, _number: &OwnedNumber) -> Result<Vec<RawCode>> {
        let mut rng = self.rng.lock().await;
        if rng.gen_bool(self.code_chance) {
            let code = rng.gen_range(100_000..=999_999).to_string();
            Ok(vec![RawCode::new(code)])
        } else {
            Ok(Vec::new())
        }
    }
}

fn synthesize_phone(rng: &mut StdRng, country: &str) -> String {
    let calling_code = match country.to_ascii_uppercase().as_str() {
        "US" | "CA" => 1,
        "GB" | "UK" => 44,
        "DE" => 49,
        "FR" => 33,
        "NL" => 31,
        "RU" => 7,
        "IN" => 91,
        _ => rng.gen_range(20..=98),
    };
    format!(
        "+{} {} {}-{}",
        calling_code,
        rng.gen_range(200..=989),
        rng.gen_range(100..=999),
        rng.gen_range(1000..=9999)
    )
}

/// Which providers an allocator is allowed to spend money with.
///
/// Denies everything until a provider is explicitly allowed. Matching is
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct AllocatorPolicy {
    allowed_providers: HashSet<String>,
}

impl AllocatorPolicy {
    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn allow(mut self, provider: impl Into<String>) -> Self {
        self.allowed_providers.insert(provider.into().to_lowercase());
        self
    }

    pub fn permits(&self, provider: &str) -> bool {
        self.allowed_providers.contains(&provider.to_lowercase())
    }
}

/// Wraps an allocator and blocks money-spending calls that the policy does
/// not explicitly permit. Read-only polling passes straight through.
pub struct GuardedAllocator {
    inner: AllocatorRef,
    policy: AllocatorPolicy,
}

impl GuardedAllocator {
    pub fn new(inner: AllocatorRef, policy: AllocatorPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Allocator for GuardedAllocator {
    async fn acquire(&self, listing: &Listing) -> Result<PhoneAssignment> {
        if !self.policy.permits(&listing.provider) {
            tracing::warn!(
                provider = %listing.provider,
                listing = %listing.id,
                "order blocked by provider policy"
            );
            return Err(EngineError::PolicyDenied(listing.provider.clone()));
        }
        self.inner.acquire(listing).await
    }

    async fn fetch_codes(&self, number: &OwnedNumber) -> Result<Vec<RawCode>> {
        self.inner.fetch_codes(number).await
    }
}
