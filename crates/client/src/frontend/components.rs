//! Leptos wrappers around the route guard and render gates.

use std::sync::Arc;

use leptos::*;
use leptos_router::{NavigateOptions, use_navigate};

use crate::guard::{Navigation, RouteGuard};
use crate::render::{Gate, Viewer};
use crate::routes::AppRoute;

/// Reads the viewer from context; renders `fallback` when there is none.
fn gated(gate: Gate, children: ChildrenFn, fallback: ViewFn) -> impl IntoView {
    let viewer = use_context::<RwSignal<Viewer>>();
    move || {
        let current = viewer.map(|v| v.get()).unwrap_or_default();
        if gate.allows(&current) {
            children().into_view()
        } else {
            fallback.run()
        }
    }
}

/// Shows children iff the viewer holds `<module_base>.<permission>`.
#[component]
pub fn HasPermission(
    #[prop(into)] module_base: String,
    #[prop(into)] permission: String,
    children: ChildrenFn,
    #[prop(optional, into)] fallback: ViewFn,
) -> impl IntoView {
    gated(Gate::permission(module_base, permission), children, fallback)
}

#[component]
pub fn HasMultiplePermissions(
    #[prop(into)] module_base: String,
    permissions: Vec<String>,
    children: ChildrenFn,
    #[prop(optional, into)] fallback: ViewFn,
) -> impl IntoView {
    gated(Gate::permissions(module_base, permissions), children, fallback)
}

#[component]
pub fn HasRole(
    #[prop(into)] role: String,
    children: ChildrenFn,
    #[prop(optional, into)] fallback: ViewFn,
) -> impl IntoView {
    gated(Gate::role(role), children, fallback)
}

#[component]
pub fn HasModule(
    #[prop(into)] module: String,
    children: ChildrenFn,
    #[prop(optional, into)] fallback: ViewFn,
) -> impl IntoView {
    gated(Gate::module(module), children, fallback)
}

/// Runs the route guard before rendering `children`.
#[component]
pub fn Guarded(route: AppRoute, children: ChildrenFn) -> impl IntoView {
    let Some(guard) = use_context::<Arc<RouteGuard>>() else {
        return view! { <p class="error">"Route guard unavailable"</p> }.into_view();
    };
    let viewer = use_context::<RwSignal<Viewer>>();
    let navigate = use_navigate();

    let decision = create_local_resource(
        || (),
        move |_| {
            let guard = Arc::clone(&guard);
            async move { guard.navigate(route).await }
        },
    );

    create_effect(move |_| match decision.get() {
        Some(Ok(Navigation::Allow(user))) => {
            if let Some(viewer) = viewer {
                viewer.set(Viewer::new(user));
            }
        }
        Some(Ok(Navigation::Redirect(redirect))) => navigate(
            redirect.to.path(),
            NavigateOptions {
                replace: redirect.replace,
                ..Default::default()
            },
        ),
        _ => {}
    });

    view! {
        <Suspense fallback=|| ()>
            {move || {
                decision.get().map(|outcome| match outcome {
                    Ok(Navigation::Allow(_)) => children().into_view(),
                    Ok(_) => ().into_view(),
                    Err(err) => view! { <p class="error">{err.to_string()}</p> }.into_view(),
                })
            }}
        </Suspense>
    }
    .into_view()
}
