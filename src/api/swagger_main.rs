use crate::dto;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(info(
    title = "Todo Assist API",
    description = "Per-user to-do lists with natural-language task entry"
))]
struct TodoAssistApi;

/// Registers the Bearer scheme task endpoints reference as "bearer_auth"
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi
            .components
            .get_or_insert_with(Default::default)
            .add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
    }
}

/// Constructs the route on the API that renders the swagger UI and returns the OpenAPI schema.
/// Merges in OpenAPI definitions from other locations in the app, such as the [dto] package
/// and submodules of [api][crate::api]
pub fn build_documentation() -> SwaggerUi {
    let mut api_docs = TodoAssistApi::openapi();
    api_docs.merge(dto::OpenApiSchemas::openapi());
    api_docs.merge(super::auth::AuthApi::openapi());
    api_docs.merge(super::todo::TaskApi::openapi());
    api_docs.merge(super::parse::ParseApi::openapi());
    BearerSecurity.modify(&mut api_docs);

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_docs)
}
