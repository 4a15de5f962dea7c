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
    dto::{cart::UpdateQuantityRequest, orders::OrderWithItems, profile::UpdateProfileRequest},
    models::{Cart, CartItem, Order, OrderLineItem, Product, Profile, User},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, profile},
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
        profile::get_profile,
        profile::update_profile,
        cart::get_cart,
        cart::add_product,
        cart::update_quantity,
        cart::remove_product,
        cart::clear_cart,
        orders::checkout,
        orders::get_order,
    ),
    components(
        schemas(
            User,
            Profile,
            Product,
            CartItem,
            Cart,
            Order,
            OrderLineItem,
            OrderWithItems,
            UpdateProfileRequest,
            UpdateQuantityRequest,
            Meta,
            ApiResponse<Profile>,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderWithItems>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Profile", description = "Shipping profile of the current user"),
        (name = "Cart", description = "Shopping cart of the current user"),
        (name = "Orders", description = "Checkout and order lookup"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
