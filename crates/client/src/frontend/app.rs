//! Leptos application with guarded routing.

use std::sync::Arc;

use leptos::*;
use leptos_router::*;

use vialyzer_auth::Credentials;

use crate::auth_context::AuthContext;
use crate::frontend::components::{Guarded, HasModule, HasPermission};
use crate::guard::RouteGuard;
use crate::render::Viewer;
use crate::resources::Resource;
use crate::routes::AppRoute;

/// Main application component.
#[component]
pub fn App(ctx: Arc<AuthContext>) -> impl IntoView {
    let guard = Arc::new(RouteGuard::new(Arc::clone(&ctx)));
    let viewer = create_rw_signal(ctx.viewer());

    // Drop the viewer whenever the session ends (logout or failed refresh).
    let mut status = ctx.subscribe();
    spawn_local(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if !current.is_authenticated() {
                viewer.set(Viewer::anonymous());
            }
        }
    });

    provide_context(ctx);
    provide_context(guard);
    provide_context(viewer);

    view! {
        <Router>
            <Routes>
                <Route path=AppRoute::SignIn.path() view=SignInPage/>
                <Route path=AppRoute::Home.path() view=|| view! {
                    <Guarded route=AppRoute::Home><HomePage/></Guarded>
                }/>
                <Route path=AppRoute::Cameras.path() view=|| view! {
                    <Guarded route=AppRoute::Cameras>
                        <ResourcePage title="Cameras" resource=Resource::Cameras/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Vehicles.path() view=|| view! {
                    <Guarded route=AppRoute::Vehicles>
                        <ResourcePage title="Vehicles" resource=Resource::Vehicles/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Kpis.path() view=|| view! {
                    <Guarded route=AppRoute::Kpis>
                        <ResourcePage title="KPIs" resource=Resource::Kpis/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Scenarios.path() view=|| view! {
                    <Guarded route=AppRoute::Scenarios>
                        <ResourcePage title="Scenarios" resource=Resource::Scenarios/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Users.path() view=|| view! {
                    <Guarded route=AppRoute::Users>
                        <ResourcePage title="Users" resource=Resource::Users/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Roles.path() view=|| view! {
                    <Guarded route=AppRoute::Roles>
                        <ResourcePage title="Roles" resource=Resource::Roles/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Modules.path() view=|| view! {
                    <Guarded route=AppRoute::Modules>
                        <ResourcePage title="Modules" resource=Resource::Modules/>
                    </Guarded>
                }/>
                <Route path=AppRoute::Companies.path() view=|| view! {
                    <Guarded route=AppRoute::Companies><CompaniesPage/></Guarded>
                }/>
                <Route path=AppRoute::Agents.path() view=|| view! {
                    <Guarded route=AppRoute::Agents><PlaceholderPage title="Agents"/></Guarded>
                }/>
                <Route path=AppRoute::UserCreate.path() view=|| view! {
                    <Guarded route=AppRoute::UserCreate><PlaceholderPage title="New user"/></Guarded>
                }/>
                <Route path=AppRoute::CompanyCreate.path() view=|| view! {
                    <Guarded route=AppRoute::CompanyCreate><PlaceholderPage title="New company"/></Guarded>
                }/>
                <Route path=AppRoute::RoleCreate.path() view=|| view! {
                    <Guarded route=AppRoute::RoleCreate><PlaceholderPage title="New role"/></Guarded>
                }/>
            </Routes>
        </Router>
    }
}

#[component]
fn SignInPage() -> impl IntoView {
    let ctx = use_context::<Arc<AuthContext>>();
    let remembered = ctx.as_ref().and_then(|ctx| ctx.remembered_email());

    let email = create_rw_signal(remembered.clone().unwrap_or_default());
    let password = create_rw_signal(String::new());
    let remember_me = create_rw_signal(remembered.is_some());
    let error = create_rw_signal(None::<String>);
    let is_submitting = create_rw_signal(false);
    let navigate = use_navigate();

    let submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        if is_submitting.get() {
            return;
        }
        let Some(ctx) = ctx.clone() else {
            return;
        };

        is_submitting.set(true);
        let credentials = Credentials::new(email.get(), password.get());
        let remember = remember_me.get();
        let navigate = navigate.clone();

        spawn_local(async move {
            match ctx.login(&credentials, remember).await {
                Ok(()) => {
                    error.set(None);
                    navigate(
                        AppRoute::Home.path(),
                        NavigateOptions {
                            replace: true,
                            ..Default::default()
                        },
                    );
                }
                Err(err) => error.set(Some(err.to_string())),
            }
            is_submitting.set(false);
        });
    };

    view! {
        <div class="sign-in">
            <h1>"Vialyzer"</h1>
            <form on:submit=submit>
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=move || email.get()
                    on:input=move |ev| email.set(event_target_value(&ev))
                />
                <input
                    type="password"
                    placeholder="Password"
                    prop:value=move || password.get()
                    on:input=move |ev| password.set(event_target_value(&ev))
                />
                <label>
                    <input
                        type="checkbox"
                        prop:checked=move || remember_me.get()
                        on:change=move |ev| remember_me.set(event_target_checked(&ev))
                    />
                    "Remember me"
                </label>
                <button type="submit" disabled=move || is_submitting.get()>
                    {move || if is_submitting.get() { "Signing in..." } else { "Sign in" }}
                </button>
                {move || error.get().map(|message| view! { <p class="error">{message}</p> })}
            </form>
        </div>
    }
}

#[component]
fn HomePage() -> impl IntoView {
    let ctx = use_context::<Arc<AuthContext>>();
    let viewer = use_context::<RwSignal<Viewer>>();
    let navigate = use_navigate();

    let name = move || {
        viewer
            .and_then(|v| v.get().user().map(|u| u.name.clone()))
            .unwrap_or_default()
    };

    let sign_out = move |_| {
        let Some(ctx) = ctx.clone() else {
            return;
        };
        let navigate = navigate.clone();
        spawn_local(async move {
            ctx.logout().await;
            navigate(
                AppRoute::SignIn.path(),
                NavigateOptions {
                    replace: true,
                    ..Default::default()
                },
            );
        });
    };

    view! {
        <div class="app">
            <header>
                <h1>{move || format!("Welcome, {}", name())}</h1>
                <button on:click=sign_out>"Sign out"</button>
            </header>
            <nav>
                <HasModule module="cameras"><A href=AppRoute::Cameras.path()>"Cameras"</A></HasModule>
                <HasModule module="vehicles"><A href=AppRoute::Vehicles.path()>"Vehicles"</A></HasModule>
                <HasModule module="kpis"><A href=AppRoute::Kpis.path()>"KPIs"</A></HasModule>
                <HasModule module="scenarios"><A href=AppRoute::Scenarios.path()>"Scenarios"</A></HasModule>
                <HasModule module="agents"><A href=AppRoute::Agents.path()>"Agents"</A></HasModule>
                <HasModule module="users"><A href=AppRoute::Users.path()>"Users"</A></HasModule>
                <HasModule module="companies"><A href=AppRoute::Companies.path()>"Companies"</A></HasModule>
                <HasModule module="roles"><A href=AppRoute::Roles.path()>"Roles"</A></HasModule>
                <HasModule module="modules"><A href=AppRoute::Modules.path()>"Modules"</A></HasModule>
            </nav>
        </div>
    }
}

#[component]
fn ResourcePage(title: &'static str, resource: Resource) -> impl IntoView {
    let ctx = use_context::<Arc<AuthContext>>();

    let rows = create_local_resource(
        || (),
        move |_| {
            let ctx = ctx.clone();
            async move {
                match ctx {
                    Some(ctx) => ctx.query(resource).await.map_err(|e| e.to_string()),
                    None => Err("auth context unavailable".to_string()),
                }
            }
        },
    );

    view! {
        <div class="resource">
            <h2>{title}</h2>
            <Suspense fallback=|| view! { <p>"Loading..."</p> }>
                {move || rows.get().map(|result| match result {
                    Ok(value) => {
                        let count = value.as_array().map(Vec::len).unwrap_or(0);
                        view! { <p>{format!("{count} records")}</p> }.into_view()
                    }
                    Err(message) => view! { <p class="error">{message}</p> }.into_view(),
                })}
            </Suspense>
        </div>
    }
}

#[component]
fn CompaniesPage() -> impl IntoView {
    view! {
        <ResourcePage title="Companies" resource=Resource::Companies/>
        <HasPermission
            module_base="companies"
            permission="create"
            fallback=|| view! { <p class="muted">"Read-only access"</p> }
        >
            <A href=AppRoute::CompanyCreate.path()>"New company"</A>
        </HasPermission>
    }
}

/// Screens whose forms live outside this crate.
#[component]
fn PlaceholderPage(title: &'static str) -> impl IntoView {
    view! {
        <div class="placeholder">
            <h2>{title}</h2>
            <A href=AppRoute::Home.path()>"Back to dashboard"</A>
        </div>
    }
}
