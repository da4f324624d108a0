//! Embedded label font.

use std::sync::{Arc, OnceLock};

use resvg::usvg::fontdb;
use rust_embed::RustEmbed;
use tracing::debug;

/// Family name of the embedded face used for grid labels.
pub const LABEL_FONT_FAMILY: &str = "DejaVu Sans";

#[derive(RustEmbed)]
#[folder = "assets/fonts/"]
#[include = "*.ttf"]
struct EmbeddedFonts;

/// Read-only font database holding the embedded faces. Loaded once; no system
/// fonts are consulted so output does not depend on the host.
pub fn database() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            for name in EmbeddedFonts::iter() {
                if let Some(file) = EmbeddedFonts::get(&name) {
                    db.load_font_data(file.data.into_owned());
                    debug!(font = %name, "loaded font");
                }
            }
            db.set_sans_serif_family(LABEL_FONT_FAMILY);
            Arc::new(db)
        })
        .clone()
}
