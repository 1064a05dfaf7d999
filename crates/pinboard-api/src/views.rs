use axum::response::Html;
use axum_extra::extract::CookieJar;
use tera::{Context, Tera};

use pinboard_types::models::{CurrentUser, Flash};

use crate::error::ApiError;
use crate::flash;

/// Compile the page templates baked into the binary.
pub fn templates() -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("auth/login.html", include_str!("../templates/auth/login.html")),
        ("auth/signup.html", include_str!("../templates/auth/signup.html")),
        ("dashboard.html", include_str!("../templates/dashboard.html")),
        ("profile.html", include_str!("../templates/profile.html")),
    ])?;
    Ok(tera)
}

/// Render a full page. Pending cookie flashes are consumed and shown ahead
/// of `extra` flashes raised by the current request.
pub fn render_page(
    tera: &Tera,
    jar: CookieJar,
    template: &str,
    mut context: Context,
    current_user: Option<&CurrentUser>,
    extra: Vec<Flash>,
) -> Result<(CookieJar, Html<String>), ApiError> {
    let (jar, mut flashes) = flash::take(jar);
    flashes.extend(extra);

    context.insert("flashes", &flashes);
    context.insert("current_user", &current_user);

    let html = tera.render(template, &context)?;
    Ok((jar, Html(html)))
}
