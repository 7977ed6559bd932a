use std::sync::Arc;

use facegate_signature::{ExtractError, SignatureExtractor};
use log::debug;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{EventLedger, Outcome};
use crate::registry::{Identity, IdentityRegistry, RegistryError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The matched identity of an authorized decision.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub identity: Uuid,
    pub name: String,
}

/// What came out of one identification: the verdict, the best similarity
/// rounded to four decimals, and the audit event it was recorded under.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub score: f64,
    pub matched: Option<Match>,
    pub event_id: u64,
}

/// Identification core: extraction, linear scan, threshold verdict, audit.
pub struct MatchEngine {
    extractor: Arc<dyn SignatureExtractor>,
    registry: IdentityRegistry,
    ledger: EventLedger,
    threshold: f64,
}

impl MatchEngine {
    pub fn new(
        extractor: Arc<dyn SignatureExtractor>,
        registry: IdentityRegistry,
        ledger: EventLedger,
        threshold: f64,
    ) -> Self {
        Self {
            extractor,
            registry,
            ledger,
            threshold,
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Classify a probe image against every enrolled identity.
    ///
    /// The raw best score is compared to the threshold; ties keep the first
    /// candidate in enrollment order and non-finite similarities never win.
    /// Every scan that gets past extraction records exactly one access
    /// event, unauthorized ones together with the probe signature.
    /// Extraction failures record nothing.
    pub fn identify(&self, probe: &[u8], camera: Option<&str>) -> Result<Decision, EngineError> {
        let signature = self.extractor.extract(probe)?;

        let mut best: Option<(Uuid, f64)> = None;
        let mut scanned = 0usize;
        for entry in self.registry.enrolled()? {
            let (id, stored) = entry?;
            let score = signature.similarity(&stored);
            debug!("candidate {id}: similarity {score:.4}");
            // A degenerate stored vector can surface as NaN; it never wins.
            if score.is_finite() && best.map_or(true, |(_, top)| score > top) {
                best = Some((id, score));
            }
            scanned += 1;
        }
        debug!("scanned {scanned} enrolled candidate(s)");

        let (outcome, score, matched) = match best {
            Some((id, raw)) if raw >= self.threshold => {
                let name = self.registry.get(id)?.name;
                (
                    Outcome::Authorized,
                    round_score(raw),
                    Some(Match { identity: id, name }),
                )
            }
            Some((_, raw)) => (Outcome::Unauthorized, round_score(raw), None),
            // No usable candidate: report zero affinity, never a sentinel.
            None => (Outcome::Unauthorized, 0.0, None),
        };

        let event = self.ledger.record(
            outcome,
            score,
            matched.as_ref().map(|m| m.identity),
            camera,
            &signature,
        )?;

        Ok(Decision {
            outcome,
            score,
            matched,
            event_id: event.id,
        })
    }

    /// Extract a signature from a reference image and attach it to an
    /// existing identity, replacing any previous signature.
    pub fn enroll(&self, identity: Uuid, image: &[u8]) -> Result<Identity, EngineError> {
        // Confirm the identity before running the model, so a bad id fails
        // fast without paying for extraction.
        self.registry.get(identity)?;
        let signature = self.extractor.extract(image)?;
        Ok(self.registry.enroll(identity, &signature)?)
    }
}

/// Scores are stored and reported with four decimal digits.
fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
