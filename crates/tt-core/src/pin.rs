//! Pin state generator
//!
//! A [`PinState`] issues successive [`PinRecord`]s for a certificate
//! fingerprint. Generation numbers start at 1, strictly increase with each
//! rotation and are never handed out twice. Every issued record is kept, the
//! last one being the active pin.
//!
//! The state is plain owned data with `&mut self` mutators. The TLS echo
//! service keeps it inside its accept task, which makes that task the only
//! possible rotator; callers that want several rotators must wrap it in
//! their own lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tt_protocol::{Fingerprint, TackAssertion};

use crate::error::PinError;
use crate::time::current_time_millis;

/// Error type returned by assertion builders
pub type BuildError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the opaque trust-assertion payload for a pin generation.
///
/// The payload is not interpreted by the testbed; it is handed to the TLS
/// layer as-is.
pub trait AssertionBuilder: Send + Sync {
    /// Build the payload binding `generation` to `target`
    fn build(&self, target: &Fingerprint, generation: u64) -> Result<Bytes, BuildError>;
}

/// Builder emitting unsigned TACK records
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedTackBuilder;

impl AssertionBuilder for UnsignedTackBuilder {
    fn build(&self, target: &Fingerprint, generation: u64) -> Result<Bytes, BuildError> {
        Ok(TackAssertion::new(*target, generation).encode())
    }
}

/// One generation of a pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinRecord {
    /// Fingerprint this record pins
    pub target: Fingerprint,
    /// Generation number, starting at 1
    pub generation: u64,
    /// Assertion payload produced by the builder
    #[serde(skip)]
    pub payload: Bytes,
    /// When the record was issued (Unix millis)
    pub issued_at: u64,
}

/// Per-fingerprint pin generator with retained history
pub struct PinState {
    builder: Arc<dyn AssertionBuilder>,
    targets: HashMap<Fingerprint, Vec<PinRecord>>,
}

impl PinState {
    /// Create a pin state that issues unsigned TACK records
    pub fn new() -> Self {
        Self::with_builder(Arc::new(UnsignedTackBuilder))
    }

    /// Create a pin state with a custom assertion builder
    pub fn with_builder(builder: Arc<dyn AssertionBuilder>) -> Self {
        Self {
            builder,
            targets: HashMap::new(),
        }
    }

    /// Issue generation 1 for `target`.
    ///
    /// If `target` is already known, its active record is returned unchanged.
    pub fn initialize(&mut self, target: Fingerprint) -> Result<PinRecord, PinError> {
        if let Some(active) = self.active(&target) {
            tracing::debug!(
                "Pin target {} already initialized at generation {}",
                target.short(),
                active.generation
            );
            return Ok(active.clone());
        }

        let record = self.issue(target, 1)?;
        self.targets.insert(target, vec![record.clone()]);
        tracing::info!("Initialized pin for {} at generation 1", target.short());
        Ok(record)
    }

    /// Issue the next generation for `target`.
    ///
    /// The new record only becomes active when the builder succeeds; a failed
    /// build leaves the previous record active and consumes no generation.
    pub fn rotate(&mut self, target: Fingerprint) -> Result<PinRecord, PinError> {
        let current = self
            .active(&target)
            .map(|r| r.generation)
            .ok_or(PinError::UnknownTarget(target))?;
        let next = current
            .checked_add(1)
            .ok_or(PinError::GenerationOverflow(target))?;

        let record = self.issue(target, next)?;
        self.targets
            .entry(target)
            .or_default()
            .push(record.clone());

        tracing::info!(
            "Rotated pin for {}: generation {} -> {}",
            target.short(),
            current,
            next
        );
        Ok(record)
    }

    /// The active record for `target`
    pub fn active(&self, target: &Fingerprint) -> Option<&PinRecord> {
        self.targets.get(target).and_then(|records| records.last())
    }

    /// Every record issued for `target`, oldest first
    pub fn history(&self, target: &Fingerprint) -> &[PinRecord] {
        self.targets
            .get(target)
            .map(|records| records.as_slice())
            .unwrap_or(&[])
    }

    /// Number of distinct fingerprints tracked
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no fingerprint has been initialized yet
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn issue(&self, target: Fingerprint, generation: u64) -> Result<PinRecord, PinError> {
        let payload = self
            .builder
            .build(&target, generation)
            .map_err(|e| PinError::Assertion {
                generation,
                reason: e.to_string(),
            })?;

        Ok(PinRecord {
            target,
            generation,
            payload,
            issued_at: current_time_millis(),
        })
    }
}

impl Default for PinState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinState")
            .field("targets", &self.targets.len())
            .finish()
    }
}
