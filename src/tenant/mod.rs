//! Request-scoped tenant context.
//!
//! The tenant gate establishes a [`TenantContext`] around each authenticated
//! request's handler future. Any code transitively awaited inside that scope
//! can read it via [`TenantContext::current`] without parameter threading;
//! code outside the scope (scheduled jobs, startup) observes `None`.

use uuid::Uuid;

tokio::task_local! {
    static TENANT_CONTEXT: TenantContext;
}

/// Ambient `{company_id, user_id}` pair for one request's task tree.
///
/// Never persisted and never shared across requests: the value lives in
/// task-local storage, so it survives await points within the scoped future
/// but does not leak into tasks spawned outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub company_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(company_id: Uuid, user_id: Uuid) -> Self {
        Self { company_id, user_id }
    }

    /// The ambient context, or `None` when no scope is active.
    ///
    /// Absence is inert by design: system jobs run unscoped and the data
    /// access layer passes their filters through unchanged. User-facing
    /// routes never reach data access without a scope because the tenant
    /// gate is the only way past authentication.
    pub fn current() -> Option<TenantContext> {
        TENANT_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }
}

/// Run `fut` with `ctx` as the ambient tenant context.
///
/// Nested scopes are not needed in this system, but if nested the innermost
/// wins and the outer context resumes when the inner future completes.
pub async fn with_tenant_context<F>(ctx: TenantContext, fut: F) -> F::Output
where
    F: std::future::Future,
{
    TENANT_CONTEXT.scope(ctx, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(company: u128, user: u128) -> TenantContext {
        TenantContext::new(Uuid::from_u128(company), Uuid::from_u128(user))
    }

    #[tokio::test]
    async fn absent_outside_scope() {
        assert_eq!(TenantContext::current(), None);
    }

    #[tokio::test]
    async fn visible_across_await_points() {
        let expected = ctx(1, 2);
        let observed = with_tenant_context(expected.clone(), async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            // A nested call in another "module" still observes the context
            async { TenantContext::current() }.await
        })
        .await;
        assert_eq!(observed, Some(expected));
    }

    #[tokio::test]
    async fn innermost_context_wins_then_outer_resumes() {
        let outer = ctx(1, 1);
        let inner = ctx(2, 2);
        with_tenant_context(outer.clone(), async {
            assert_eq!(TenantContext::current(), Some(outer.clone()));
            with_tenant_context(inner.clone(), async {
                assert_eq!(TenantContext::current(), Some(inner.clone()));
            })
            .await;
            assert_eq!(TenantContext::current(), Some(outer.clone()));
        })
        .await;
    }

    #[tokio::test]
    async fn does_not_leak_into_detached_tasks() {
        let observed = with_tenant_context(ctx(1, 2), async {
            // A detached task is outside the request's task tree
            tokio::spawn(async { TenantContext::current() })
                .await
                .unwrap()
        })
        .await;
        assert_eq!(observed, None);
    }

    #[tokio::test]
    async fn isolated_between_concurrent_scopes() {
        let a = tokio::spawn(with_tenant_context(ctx(10, 1), async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            TenantContext::current().map(|c| c.company_id)
        }));
        let b = tokio::spawn(with_tenant_context(ctx(20, 2), async {
            TenantContext::current().map(|c| c.company_id)
        }));
        assert_eq!(a.await.unwrap(), Some(Uuid::from_u128(10)));
        assert_eq!(b.await.unwrap(), Some(Uuid::from_u128(20)));
    }
}
