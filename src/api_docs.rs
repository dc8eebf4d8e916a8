use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::customers::list_customers,
        api::customers::create_customer,
        api::customers::update_customer,
        api::customers::delete_customer,
        // Add other endpoints here as we document them
    ),
    components(
        schemas(
            // We will need to derive ToSchema for our models
        )
    ),
    tags(
        (name = "motordesk", description = "MotorDesk garage management API")
    )
)]
pub struct ApiDoc;
