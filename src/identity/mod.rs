//! Temporary privilege escalation with guaranteed restoration.
//!
//! Steps that need elevated rights acquire them through an [`IdentityGuard`],
//! which captures the acting identity before switching and restores exactly
//! that identity on release. Escalations nest: each acquisition pushes the
//! identity it replaced, and each release pops one level.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, warn};

use crate::error::{IdentityError, Result};

/// The identity a scenario is acting as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActingIdentity {
    /// No one is signed in.
    Anonymous,
    /// Signed in as the named user.
    Named(String),
}

impl ActingIdentity {
    /// The user name, if signed in.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for ActingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// The collaborator that signs users in and out of the system under test.
pub trait IdentityProvider {
    /// The identity currently acting.
    fn current(&self) -> ActingIdentity;

    /// Sign in as a user holding every role in `roles`.
    ///
    /// Returns the identity that is now acting.
    fn authenticate_by_role(
        &self,
        roles: &BTreeSet<String>,
    ) -> std::result::Result<ActingIdentity, IdentityError>;

    /// Sign in as the named user.
    fn authenticate_by_name(&self, name: &str) -> std::result::Result<ActingIdentity, IdentityError>;

    /// Sign out.
    fn reset_to_anonymous(&self) -> std::result::Result<(), IdentityError>;
}

/// Stack-discipline escalation over an [`IdentityProvider`].
pub struct IdentityGuard<'a> {
    provider: Option<&'a dyn IdentityProvider>,
    captured: Vec<ActingIdentity>,
}

impl fmt::Debug for IdentityGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityGuard")
            .field("available", &self.provider.is_some())
            .field("captured", &self.captured)
            .finish()
    }
}

impl<'a> IdentityGuard<'a> {
    /// Create a guard over `provider`.
    #[must_use]
    pub const fn new(provider: &'a dyn IdentityProvider) -> Self {
        Self {
            provider: Some(provider),
            captured: Vec::new(),
        }
    }

    /// Create a guard for an environment with no identity collaborator.
    ///
    /// Every acquisition fails with `IdentityError::IdentityUnavailable`.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            provider: None,
            captured: Vec::new(),
        }
    }

    /// Number of outstanding escalations.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.captured.len()
    }

    /// Whether any escalation is outstanding.
    #[must_use]
    pub const fn is_escalated(&self) -> bool {
        !self.captured.is_empty()
    }

    /// Switch to a user holding every role in `roles`.
    ///
    /// The identity acting before the switch is captured and restored by the
    /// matching [`Self::release`]. A failed switch captures nothing.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::IdentityUnavailable` when there is no provider,
    /// `roles` is empty, or the provider refuses the switch.
    pub fn acquire<I, S>(&mut self, roles: I) -> Result<ActingIdentity>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = self.provider.ok_or_else(|| IdentityError::IdentityUnavailable {
            reason: String::from("no identity provider is configured"),
        })?;

        let role_set: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        if role_set.is_empty() {
            return Err(IdentityError::IdentityUnavailable {
                reason: String::from("at least one role is required"),
            }
            .into());
        }

        let previous = provider.current();
        let acting = provider
            .authenticate_by_role(&role_set)
            .map_err(|error| match error {
                unavailable @ IdentityError::IdentityUnavailable { .. } => unavailable,
                IdentityError::NoActiveEscalation => IdentityError::IdentityUnavailable {
                    reason: format!("provider refused the switch: {error}"),
                },
            })?;
        debug!(
            previous = %previous,
            acting = %acting,
            roles = ?role_set,
            depth = self.captured.len() + 1,
            "escalated identity"
        );
        self.captured.push(previous);
        Ok(acting)
    }

    /// Restore the identity captured by the most recent acquisition.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NoActiveEscalation` when nothing is outstanding,
    /// or the provider's error if the restore fails. A failed restore still
    /// consumes the escalation.
    pub fn release(&mut self) -> Result<()> {
        let previous = self
            .captured
            .pop()
            .ok_or(IdentityError::NoActiveEscalation)?;
        let Some(provider) = self.provider else {
            return Err(IdentityError::NoActiveEscalation.into());
        };

        match &previous {
            ActingIdentity::Anonymous => provider.reset_to_anonymous()?,
            ActingIdentity::Named(name) => {
                provider.authenticate_by_name(name)?;
            }
        }
        debug!(restored = %previous, depth = self.captured.len(), "released identity");
        Ok(())
    }

    /// Release escalations until at most `depth` remain.
    ///
    /// Every level is attempted even if an earlier restore fails.
    ///
    /// # Errors
    ///
    /// Returns the first restore failure.
    pub fn release_to_depth(&mut self, depth: usize) -> Result<()> {
        let mut first_error = None;
        while self.captured.len() > depth {
            if let Err(error) = self.release() {
                warn!(error = %error, "failed to restore identity");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Run `body` with `roles` acquired, releasing afterwards.
    ///
    /// The release runs whether or not `body` succeeds.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error, else `body`'s error, else the release
    /// error. When both `body` and the release fail, the release failure is
    /// logged and `body`'s error is returned.
    pub fn with_roles<I, S, T, F>(&mut self, roles: I, body: F) -> Result<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce() -> Result<T>,
    {
        self.acquire(roles)?;
        let outcome = body();
        let released = self.release();
        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(error)) | (Err(error), Ok(())) => Err(error),
            (Err(error), Err(release_error)) => {
                warn!(error = %release_error, "failed to restore identity after step error");
                Err(error)
            }
        }
    }
}
