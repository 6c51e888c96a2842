//! Embedded static assets for serving the upload form.
//!
//! Only files under `static/` are compiled in, so a request path can never reach anything else on
//! disk.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;
