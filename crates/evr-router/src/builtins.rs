// SPDX-License-Identifier: MIT

//! Built-in `system:*` and `router:*` handlers (§9).
//!
//! `system:shutdown` and `shutdown:ack` are special-cased directly inside
//! [`crate::router::Router`]'s dispatch — they are not registered here.
//! Everything else a fresh router exposes out of the box lives in this
//! module, wired up by [`register_builtin_handlers`] at router
//! construction time rather than via import-time side effects.

use crate::handler::HandlerFn;
use crate::registry::Registration;
use crate::router::Router;
use crate::DEFAULT_PRIORITY;
use evr_core::{Clock, ErrorKind, Pattern};
use std::sync::Arc;

/// Register every built-in handler on `router`. Called once during
/// daemon bootstrap, after the router itself is constructed.
pub fn register_builtin_handlers<C: Clock + 'static>(router: &Arc<Router<C>>) {
    register_health(router);
    register_discover(router);
    register_transformer_admin(router);
}

// Every `Pattern::compile` call in this module compiles a literal built-in
// pattern string, never user input, so the only way these can fail is a
// typo caught the first time the daemon boots in development.
#[allow(clippy::expect_used)]
fn register_health<C: Clock + 'static>(router: &Arc<Router<C>>) {
    let router = router.clone();
    router.register_handler(Registration {
        module: "system".to_string(),
        function: "health".to_string(),
        pattern: Pattern::compile("system:health").expect("built-in pattern is always valid"),
        priority: DEFAULT_PRIORITY,
        filter: None,
        handler: HandlerFn::new(move |_data, _ctx| {
            let router = router.clone();
            async move {
                Ok(serde_json::json!({
                    "status": "ok",
                    "uptime_seconds": router.uptime().as_secs(),
                    "handler_count": router.registry().len(),
                    "transformer_count": router.transformers().len(),
                    "task_count": router.supervisor().task_count(),
                }))
            }
        }),
        params: vec![],
    });
}

#[allow(clippy::expect_used)]
fn register_discover<C: Clock + 'static>(router: &Arc<Router<C>>) {
    let router = router.clone();
    router.register_handler(Registration {
        module: "system".to_string(),
        function: "discover".to_string(),
        pattern: Pattern::compile("system:discover").expect("built-in pattern is always valid"),
        priority: DEFAULT_PRIORITY,
        filter: None,
        handler: HandlerFn::new(move |_data, _ctx| {
            let router = router.clone();
            async move {
                let patterns: Vec<_> = router
                    .registry()
                    .discover()
                    .into_iter()
                    .map(|(pattern, params)| {
                        serde_json::json!({"pattern": pattern, "params": params})
                    })
                    .collect();
                Ok(serde_json::json!({ "handlers": patterns }))
            }
        }),
        params: vec![],
    });
}

#[allow(clippy::expect_used)]
fn register_transformer_admin<C: Clock + 'static>(router: &Arc<Router<C>>) {
    let reg_router = router.clone();
    router.register_handler(Registration {
        module: "router".to_string(),
        function: "register_transformer".to_string(),
        pattern: Pattern::compile("router:register_transformer").expect("built-in pattern is always valid"),
        priority: DEFAULT_PRIORITY,
        filter: None,
        handler: HandlerFn::new(move |data, _ctx| {
            let router = reg_router.clone();
            async move {
                let rules = crate::transformer::parse_registration(&data)
                    .map_err(|e| ErrorKind::ParseError(e.to_string()))?;
                let owner = data
                    .get("owner")
                    .and_then(|v| v.as_str())
                    .unwrap_or("router:register_transformer")
                    .to_string();
                let ids = rules
                    .into_iter()
                    .map(|rule| router.register_transformer(rule, owner.clone()).map(|id| id.to_string()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ErrorKind::ParseError(e.to_string()))?;
                match ids.as_slice() {
                    [single] => Ok(serde_json::json!({"status": "registered", "id": single})),
                    _ => Ok(serde_json::json!({"status": "registered", "ids": ids})),
                }
            }
        }),
        params: vec![],
    });

    let unreg_router = router.clone();
    router.register_handler(Registration {
        module: "router".to_string(),
        function: "unregister_transformer".to_string(),
        pattern: Pattern::compile("router:unregister_transformer").expect("built-in pattern is always valid"),
        priority: DEFAULT_PRIORITY,
        filter: None,
        handler: HandlerFn::new(move |data, _ctx| {
            let router = unreg_router.clone();
            async move {
                let id = data
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ErrorKind::ParseError("unregister_transformer requires data.id".to_string()))?;
                let owner = data.get("owner").and_then(|v| v.as_str()).unwrap_or("router:register_transformer");
                let removed = router.unregister_transformer(crate::transformer::TransformerId::from_string(id), owner);
                Ok(serde_json::json!({"status": if removed { "unregistered" } else { "not_found" }}))
            }
        }),
        params: vec![],
    });

    let list_router = router.clone();
    router.register_handler(Registration {
        module: "router".to_string(),
        function: "list_transformers".to_string(),
        pattern: Pattern::compile("router:list_transformers").expect("built-in pattern is always valid"),
        priority: DEFAULT_PRIORITY,
        filter: None,
        handler: HandlerFn::new(move |_data, _ctx| {
            let router = list_router.clone();
            async move { Ok(serde_json::json!({ "transformers": router.list_transformers() })) }
        }),
        params: vec![],
    });
}

#[cfg(test)]
#[path = "builtins_tests.rs"]
mod tests;
