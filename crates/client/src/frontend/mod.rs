//! Leptos frontend for the browser dashboard.

pub mod app;
pub mod browser;
pub mod components;

use std::sync::Arc;

use leptos::*;
use wasm_bindgen::prelude::*;

use crate::config::ClientConfig;
use app::App;

/// WASM entry point; runs when the module loads.
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    let ctx = ClientConfig::from_build_env()
        .and_then(|config| crate::bootstrap(&config, Arc::new(browser::DocumentCookieJar)));

    match ctx {
        Ok(ctx) => mount_to_body(move || view! { <App ctx=ctx.clone()/> }),
        Err(err) => logging::error!("dashboard failed to start: {err:#}"),
    }
}
