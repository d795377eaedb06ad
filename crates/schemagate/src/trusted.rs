// Privileged caller recognition

use crate::context::HookContext;

/// Recognizes callers whose payloads skip validation and defaults
pub trait TrustedSource: Send + Sync {
	fn is_trusted(&self, ctx: &HookContext) -> bool;
}

/// Every call is validated
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTrusted;

impl TrustedSource for NeverTrusted {
	fn is_trusted(&self, _ctx: &HookContext) -> bool {
		false
	}
}

/// Calls with no transport provider originate inside the process and are trusted
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderAbsent;

impl TrustedSource for ProviderAbsent {
	fn is_trusted(&self, ctx: &HookContext) -> bool {
		ctx.params.provider.is_none()
	}
}

impl<F> TrustedSource for F
where
	F: Fn(&HookContext) -> bool + Send + Sync,
{
	fn is_trusted(&self, ctx: &HookContext) -> bool {
		self(ctx)
	}
}
