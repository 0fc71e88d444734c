use super::handlers::{admin, auth, checkin, checkout, health, root, subscription, triggers};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` document. Handlers sharing a path go in
/// one `routes!` call.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(root::root))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::register::login))
        .routes(routes!(auth::oauth::google_session))
        .routes(routes!(auth::me::me))
        .routes(routes!(auth::session::logout))
        .routes(routes!(checkout::create_session))
        .routes(routes!(checkout::status))
        .routes(routes!(checkout::webhook))
        .routes(routes!(subscription::status))
        .routes(routes!(checkin::create))
        .routes(routes!(checkin::today_checkin))
        .routes(routes!(triggers::list))
        .routes(routes!(triggers::by_type))
        .routes(routes!(admin::create_action, admin::list_actions))
        .routes(routes!(admin::delete_action))
        .routes(routes!(admin::create_trigger, admin::list_triggers))
        .routes(routes!(admin::delete_trigger))
        .routes(routes!(admin::create_verse, admin::list_verses))
        .routes(routes!(admin::delete_verse));

    let tags = [
        ("health", "Liveness and build information"),
        ("auth", "Registration, login and sessions"),
        ("subscription", "Checkout and subscription status"),
        ("checkin", "Daily BASEline check-in"),
        ("triggers", "Trigger library"),
        ("admin", "Content management"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect();

    router.get_openapi_mut().tags = Some(tags);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author<'a>(author: &'a str) -> (Option<&'a str>, Option<&'a str>) {
    let non_empty = |value: &'a str| {
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    };
    match author.split_once('<') {
        Some((name, email)) => (non_empty(name), non_empty(email.trim_end_matches('>'))),
        None => (non_empty(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Blessed Belly"));
            assert_eq!(contact.email.as_deref(), Some("team@blessedbelly.com"));
        }

        let license = doc.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(parse_author("Ann <a@x.com>"), (Some("Ann"), Some("a@x.com")));
        assert_eq!(parse_author("<a@x.com>"), (None, Some("a@x.com")));
        assert_eq!(parse_author("Ann"), (Some("Ann"), None));
        assert_eq!(parse_author("  "), (None, None));
    }

    #[test]
    fn openapi_tags_and_paths() {
        let doc = openapi();
        let tags = doc.tags.clone().unwrap_or_default();
        for name in ["auth", "subscription", "checkin", "admin"] {
            assert!(tags.iter().any(|tag| tag.name == name), "missing tag {name}");
        }
        for path in [
            "/health",
            "/api/auth/register",
            "/api/auth/google/session",
            "/api/auth/me",
            "/api/checkout/status/{session_id}",
            "/api/webhook/stripe",
            "/api/checkin/today",
            "/api/triggers/{trigger_type}",
            "/api/admin/verses/{verse_id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path {path}");
        }
    }
}
