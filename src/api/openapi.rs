use super::handlers::{
    auth::{require_admin, require_auth},
    cart, groups, health, products, profile, reviews, tasks, user_login, user_register,
};
use axum::middleware;
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

pub(crate) const BEARER_SCHEME: &str = "bearer";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI document.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes are grouped by gate: public, authenticated, and admin. Admin routes
/// layer `require_admin` first and `require_auth` second so authentication
/// runs before the role check.
pub(crate) fn api_router() -> OpenApiRouter {
    let public = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(user_register::register))
        .routes(routes!(user_login::login))
        .routes(routes!(products::list_products))
        .routes(routes!(reviews::list_reviews));

    let authenticated = OpenApiRouter::new()
        .routes(routes!(profile::get_profile, profile::update_profile))
        .routes(routes!(groups::list_groups, groups::create_group))
        .routes(routes!(groups::update_group, groups::delete_group))
        .routes(routes!(tasks::list_tasks, tasks::create_task))
        .routes(routes!(tasks::update_task, tasks::delete_task))
        .routes(routes!(cart::get_cart, cart::add_to_cart, cart::clear_cart))
        .routes(routes!(reviews::create_review))
        .route_layer(middleware::from_fn(require_auth));

    let admin = OpenApiRouter::new()
        .routes(routes!(
            products::admin_list_products,
            products::create_product
        ))
        .routes(routes!(products::update_product, products::delete_product))
        .routes(routes!(reviews::admin_list_reviews))
        .routes(routes!(reviews::approve_review))
        .routes(routes!(reviews::reject_review))
        .routes(routes!(reviews::delete_review))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(require_auth));

    OpenApiRouter::with_openapi(cargo_openapi())
        .merge(public)
        .merge(authenticated)
        .merge(admin)
}

fn tags() -> Vec<Tag> {
    [
        ("health", "Service and database status"),
        ("auth", "Registration and login"),
        ("profile", "The caller's own profile"),
        ("groups", "Task groups owned by the caller"),
        ("tasks", "Tasks inside the caller's groups"),
        ("cart", "The caller's shopping cart"),
        ("products", "Public product catalog"),
        ("reviews", "Public reviews and submission"),
        ("admin", "Catalog management and review moderation"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect()
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    // Tags and the bearer scheme live on the base document; merging the route
    // groups only extends them.
    let mut components = Components::new();
    components.add_security_scheme(
        BEARER_SCHEME,
        SecurityScheme::Http(
            HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .build(),
        ),
    );

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(tags()))
        .components(Some(components))
        .build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors look like "Name <email>"; only the first one is used.
    let author = env!("CARGO_PKG_AUTHORS").split(':').next().map(str::trim)?;
    let (name, email) = match author.find('<') {
        Some(start) => (
            optional_str(&author[..start]),
            optional_str(author[start + 1..].trim_end_matches('>')),
        ),
        None => (optional_str(author), None),
    };
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
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

        let contact = doc.info.contact.unwrap_or_default();
        assert_eq!(contact.name.as_deref(), Some("Team Taskmart"));
        assert_eq!(contact.email.as_deref(), Some("team@taskmart.dev"));

        let license = doc.info.license.map(|license| license.name);
        assert_eq!(license.as_deref(), Some("BSD-3-Clause"));
    }

    #[test]
    fn every_route_group_is_documented() {
        let doc = openapi();
        for path in [
            "/health",
            "/api/register",
            "/api/login",
            "/api/profile",
            "/api/groups/{id}/tasks",
            "/api/tasks/{id}",
            "/api/cart",
            "/api/admin/products/{id}",
            "/api/admin/reviews/{id}/approve",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn public_and_protected_methods_share_a_path() {
        let doc = openapi();
        let reviews = doc.paths.paths.get("/api/reviews");
        assert!(reviews.is_some_and(|item| item.get.is_some() && item.post.is_some()));
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = openapi();
        let components = doc.components.unwrap_or_default();
        assert!(components.security_schemes.contains_key(BEARER_SCHEME));

        let tags = doc.tags.unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "admin"));
    }

    #[test]
    fn merged_route_schemas_keep_the_bearer_scheme() {
        let doc = openapi();
        let components = doc.components.unwrap_or_default();
        assert!(components.security_schemes.contains_key(BEARER_SCHEME));
        assert!(!components.schemas.is_empty());
        let documented = doc.tags.unwrap_or_default();
        for tag in tags() {
            assert!(documented.iter().any(|seen| seen.name == tag.name), "{}", tag.name);
        }
    }
}
