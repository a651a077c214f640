use rocket::{response::Redirect, Route};
use rocket_dyn_templates::{context, Template};

use crate::{
    i18n::{self, Locale},
    routes::Layout,
};

#[must_use]
pub fn routes() -> Vec<Route> {
    routes![root, landing]
}

/// Everybody without a language in the URL gets the fallback one.
#[get("/")]
fn root() -> Redirect {
    Redirect::to(uri!(landing(i18n::FALLBACK)))
}

#[get("/<lang>")]
pub fn landing(lang: Locale) -> Template {
    Template::render(
        "index",
        context! {
            layout: Layout::new(lang),
        },
    )
}
