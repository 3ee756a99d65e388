//! `document.cookie` backed cookie jar.

use chrono::Duration;
use wasm_bindgen::JsCast;
use web_sys::HtmlDocument;

use crate::cookie::{CookieJar, CookieOptions};

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentCookieJar;

impl DocumentCookieJar {
    fn document() -> Option<HtmlDocument> {
        web_sys::window()?
            .document()?
            .dyn_into::<HtmlDocument>()
            .ok()
    }

    fn write(&self, line: &str) {
        let Some(document) = Self::document() else {
            tracing::warn!("no document; cookie not written");
            return;
        };
        if let Err(err) = document.set_cookie(line) {
            tracing::warn!(?err, "failed to write cookie");
        }
    }
}

impl CookieJar for DocumentCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let cookies = Self::document()?.cookie().ok()?;
        cookies
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    fn set(&self, name: &str, value: &str, options: CookieOptions) {
        self.write(&options.render(name, value));
    }

    fn remove(&self, name: &str) {
        let expired = CookieOptions {
            max_age: Duration::zero(),
            secure: false,
        };
        self.write(&expired.render(name, ""));
    }
}
