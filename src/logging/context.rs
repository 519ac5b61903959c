//! Task-scoped log context.
//!
//! Context is a stack of key/value pairs bound to the current task: entering a
//! scope layers new pairs over the existing ones, leaving it restores the
//! previous set. The stack rides on a task-local, so it survives `.await`
//! suspension points and never leaks between unrelated tasks. Spawned tasks
//! start empty; wrap the spawned future in [`scope`] to carry context across.

use std::collections::BTreeMap;
use std::future::Future;

use crate::logging::record::{AGENT, REQUEST_ID};

tokio::task_local! {
    static CONTEXT: BTreeMap<String, String>;
}

/// Snapshot of the current task's context, innermost values winning.
///
/// Outside any scope this returns an empty map.
pub fn current_context() -> BTreeMap<String, String> {
    CONTEXT.try_with(|ctx| ctx.clone()).unwrap_or_default()
}

/// Look up a single context value in the current scope.
pub fn context_value(key: &str) -> Option<String> {
    CONTEXT.try_with(|ctx| ctx.get(key).cloned()).ok().flatten()
}

/// Run `f` with `pairs` layered over the current context.
///
/// Duplicated keys shadow the outer value for the duration of the scope only.
pub async fn scope<I, K, V, F>(pairs: I, f: F) -> F::Output
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
    F: Future,
{
    let mut merged = current_context();
    for (key, value) in pairs {
        merged.insert(key.into(), value.into());
    }
    CONTEXT.scope(merged, f).await
}

/// Synchronous variant of [`scope`] for non-async call sites.
pub fn sync_scope<I, K, V, R>(pairs: I, f: impl FnOnce() -> R) -> R
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut merged = current_context();
    for (key, value) in pairs {
        merged.insert(key.into(), value.into());
    }
    CONTEXT.sync_scope(merged, f)
}

/// Convenience scope binding the two well-known request keys.
pub async fn request_scope<F>(
    request_id: impl Into<String>,
    agent: impl Into<String>,
    f: F,
) -> F::Output
where
    F: Future,
{
    scope(
        [
            (REQUEST_ID.to_string(), request_id.into()),
            (AGENT.to_string(), agent.into()),
        ],
        f,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_empty_outside_scope() {
        assert!(current_context().is_empty());
        assert_eq!(context_value(REQUEST_ID), None);
    }

    #[tokio::test]
    async fn test_scope_sets_and_restores() {
        scope([("request_id", "req-1")], async {
            assert_eq!(context_value("request_id").as_deref(), Some("req-1"));
        })
        .await;
        assert_eq!(context_value("request_id"), None);
    }

    #[tokio::test]
    async fn test_nested_scopes_shadow_and_merge() {
        scope([("request_id", "req-1"), ("agent", "billing")], async {
            scope([("agent", "inventory")], async {
                let ctx = current_context();
                // Outer key still visible, duplicated key shadowed.
                assert_eq!(ctx.get("request_id").map(String::as_str), Some("req-1"));
                assert_eq!(ctx.get("agent").map(String::as_str), Some("inventory"));
            })
            .await;
            // Inner scope gone, outer value back.
            assert_eq!(context_value("agent").as_deref(), Some("billing"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_context_survives_await_points() {
        scope([("request_id", "req-9")], async {
            tokio::task::yield_now().await;
            assert_eq!(context_value("request_id").as_deref(), Some("req-9"));
            tokio::task::yield_now().await;
            assert_eq!(context_value("request_id").as_deref(), Some("req-9"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_spawned_tasks_start_empty() {
        scope([("request_id", "req-2")], async {
            let handle = tokio::spawn(async { current_context() });
            assert!(handle.await.unwrap().is_empty());
        })
        .await;
    }

    #[test]
    fn test_sync_scope() {
        let seen = sync_scope([("agent", "orders")], || {
            context_value("agent")
        });
        assert_eq!(seen.as_deref(), Some("orders"));
        assert_eq!(context_value("agent"), None);
    }

    #[tokio::test]
    async fn test_request_scope_binds_well_known_keys() {
        request_scope("req-7", "fulfillment", async {
            let ctx = current_context();
            assert_eq!(ctx.get(REQUEST_ID).map(String::as_str), Some("req-7"));
            assert_eq!(ctx.get(AGENT).map(String::as_str), Some("fulfillment"));
        })
        .await;
    }
}
