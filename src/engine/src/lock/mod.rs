//! Lock engine.
//!
//! Walks the `FROM` instructions of a [`DockerfileDocument`] in order and
//! decides, per instruction, whether to pin, re-pin or leave it alone:
//!
//! | reference           | lock mode          | upgrade mode                    |
//! |---------------------|--------------------|---------------------------------|
//! | stage/scratch/`$`   | unchanged          | unchanged                       |
//! | `name:tag`          | resolve → locked   | resolve → locked                |
//! | `name:tag@digest`   | unchanged          | resolve → upgraded or unchanged |
//! | `name@digest`       | unchanged          | unchanged                       |
//!
//! Resolution failures never abort the walk; they become `failed` decisions
//! and the instruction text is left as written.

mod resolver;

pub use resolver::{CachingResolver, DigestResolver};

use a3s_lock_core::config::LockMode;
use a3s_lock_core::error::{ErrorKind, LockError};

use crate::dockerfile::DockerfileDocument;
use crate::oci::ImageReference;

/// What happened to one `FROM` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    Unchanged,
    Locked,
    Upgraded,
    Failed { kind: ErrorKind, message: String },
}

impl LockOutcome {
    fn failed(error: &LockError) -> Self {
        LockOutcome::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Whether the instruction text was rewritten.
    pub fn is_change(&self) -> bool {
        matches!(self, LockOutcome::Locked | LockOutcome::Upgraded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LockOutcome::Failed { .. })
    }
}

/// Decision for one `FROM` instruction, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockDecision {
    /// 1-based line of the `FROM` keyword
    pub line_number: usize,
    /// Image token before processing
    pub old: String,
    /// Image token after processing (same as `old` unless changed)
    pub new: String,
    pub outcome: LockOutcome,
}

/// Applies lock or upgrade decisions to a document through a resolver.
pub struct LockEngine<R> {
    resolver: R,
    mode: LockMode,
}

impl<R: DigestResolver> LockEngine<R> {
    pub fn new(resolver: R, mode: LockMode) -> Self {
        Self { resolver, mode }
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Decide every instruction and apply the successful changes in place.
    ///
    /// Lookups are issued one at a time so a memoizing resolver sees earlier
    /// results before an identical later lookup.
    pub async fn lock(&self, document: &mut DockerfileDocument) -> Vec<LockDecision> {
        let mut decisions = Vec::with_capacity(document.instructions().len());

        for index in 0..document.instructions().len() {
            let instruction = &document.instructions()[index];
            let line_number = instruction.line_number;
            let old = instruction.image.clone();

            let (outcome, replacement) = match instruction.reference().cloned() {
                Some(reference) => self.decide(&reference).await,
                None => {
                    tracing::debug!(line = line_number, image = %old, "Skipping non-registry base");
                    (LockOutcome::Unchanged, None)
                }
            };

            let mut decision = LockDecision {
                line_number,
                new: old.clone(),
                old,
                outcome,
            };

            if let Some(reference) = replacement {
                match document.replace_reference(index, reference) {
                    Ok(()) => decision.new = document.instructions()[index].image.clone(),
                    Err(e) => decision.outcome = LockOutcome::failed(&e),
                }
            }

            decisions.push(decision);
        }

        decisions
    }

    async fn decide(&self, reference: &ImageReference) -> (LockOutcome, Option<ImageReference>) {
        match (&reference.digest, self.mode) {
            (Some(_), LockMode::Lock) => (LockOutcome::Unchanged, None),
            (Some(_), LockMode::Upgrade) if reference.tag.is_none() => {
                tracing::debug!(reference = %reference, "Digest-only reference is immutable");
                (LockOutcome::Unchanged, None)
            }
            (Some(current), LockMode::Upgrade) => match self.resolver.resolve(reference).await {
                Ok(digest) if &digest == current => (LockOutcome::Unchanged, None),
                Ok(digest) => {
                    tracing::info!(reference = %reference, digest = %digest, "Upgraded base image");
                    (LockOutcome::Upgraded, Some(reference.with_digest(digest)))
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Failed to resolve digest");
                    (LockOutcome::failed(&e), None)
                }
            },
            (None, _) => match self.resolver.resolve(reference).await {
                Ok(digest) => {
                    tracing::info!(reference = %reference, digest = %digest, "Locked base image");
                    (LockOutcome::Locked, Some(reference.with_digest(digest)))
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Failed to resolve digest");
                    (LockOutcome::failed(&e), None)
                }
            },
        }
    }
}
