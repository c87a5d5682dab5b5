//! Request-scoped tenant context
//!
//! Every inbound request carries an already-validated identity triple
//! (user, tenant, role). The boundary layer turns it into a [`TenantContext`]
//! and installs it into a [`ScopedContext`] for the duration of the request.
//! Repositories read the context to decide whether and how to filter queries.
//!
//! The holder is one-per-request, not process-wide: identity must never leak
//! into a reused worker. [`ScopedContext::install`] returns a guard that
//! clears the slot on drop, including on unwind.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Ambient identity for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub user_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    /// Elevated-role flag: disables tenant filtering for this request.
    pub bypass: bool,
}

impl TenantContext {
    /// Context for a regular authenticated user bound to one tenant.
    pub fn for_user(user_id: Uuid, tenant_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            tenant_id: Some(tenant_id),
            bypass: false,
        }
    }

    /// Context for an elevated role with cross-tenant visibility.
    pub fn elevated(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            tenant_id: None,
            bypass: true,
        }
    }

    /// Context for system/anonymous paths with no tenant binding.
    pub fn system() -> Self {
        Self {
            user_id: None,
            tenant_id: None,
            bypass: false,
        }
    }

    pub fn is_bypass(&self) -> bool {
        self.bypass
    }

    /// The tenant predicate applies only when not bypassing and a tenant id
    /// is present. This is the single rule shared with the database
    /// row-security policy: empty/absent tenant means unrestricted.
    pub fn effective_tenant(&self) -> Option<Uuid> {
        if self.bypass {
            None
        } else {
            self.tenant_id
        }
    }
}

/// Request-scoped holder for the tenant context.
///
/// The slot starts empty, is set exactly once at request start, and is
/// cleared unconditionally at request end via the returned [`ContextGuard`].
#[derive(Debug, Clone, Default)]
pub struct ScopedContext {
    slot: Arc<Mutex<Option<TenantContext>>>,
}

impl ScopedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the context for the current request. The previous value, if
    /// any, is overwritten; the guard clears the slot when dropped.
    pub fn install(&self, ctx: TenantContext) -> ContextGuard {
        let mut slot = self.slot.lock().expect("context slot poisoned");
        if slot.is_some() {
            tracing::warn!("tenant context installed over an uncleaned slot");
        }
        *slot = Some(ctx);
        ContextGuard {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Read the current context, if one is installed.
    pub fn current(&self) -> Option<TenantContext> {
        self.slot.lock().expect("context slot poisoned").clone()
    }

    /// Clear the slot explicitly. Normally the guard does this.
    pub fn clear(&self) {
        *self.slot.lock().expect("context slot poisoned") = None;
    }
}

/// Clears the owning [`ScopedContext`] slot on drop, including on unwind.
#[must_use = "dropping the guard clears the context"]
pub struct ContextGuard {
    slot: Arc<Mutex<Option<TenantContext>>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // A poisoned lock still needs clearing; identity must not survive a panic.
        match self.slot.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}
