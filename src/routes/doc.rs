use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::orders::{ConfirmRequest, OrderDetail, OrderList, PreviewItemRequest, PreviewRequest},
    models::{Order, OrderItem, OrderItemBonus, RewardType},
    preview::{BonusEntry, ChangeReason, PreviewChange, PreviewLine, PreviewRecord},
    response::{ApiResponse, Meta},
    routes::{health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::preview_order,
        orders::confirm_order,
        orders::list_orders,
        orders::get_order
    ),
    components(
        schemas(
            health::HealthData,
            PreviewItemRequest,
            PreviewRequest,
            ConfirmRequest,
            PreviewRecord,
            PreviewLine,
            BonusEntry,
            RewardType,
            PreviewChange,
            ChangeReason,
            Order,
            OrderItem,
            OrderItemBonus,
            OrderDetail,
            OrderList,
            params::SortOrder,
            params::OrderListQuery,
            Meta,
            ApiResponse<PreviewRecord>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order preview, confirmation and history"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
