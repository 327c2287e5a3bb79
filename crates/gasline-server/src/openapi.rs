use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gasline API",
        version = "0.1.0",
        description = "Latest captured retail fuel price."
    ),
    paths(crate::routes::gas_price, crate::routes::health),
    components(schemas(
        crate::dto::GasPriceResponse,
        crate::dto::GasPriceSeries,
        crate::dto::GasPricePoint,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "price", description = "Captured fuel price"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
