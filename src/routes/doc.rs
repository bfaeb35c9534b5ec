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
    dto::{
        admin::{AnalyticsSummary, InventoryAdjustRequest, StatusCount, TopProduct},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, DirectUpdateRequest, ProductRef, UpdateCartItemRequest},
        categories::{CategoryDetail, CategoryList, CategoryWithCount},
        orders::{
            CreateOrderRequest, CustomerInfo, OrderItemInput, OrderList, OrderWithItems,
            UpdateOrderStatusRequest, UpdatePaymentStatusRequest,
        },
        products::{ProductDetail, ProductList},
        users::{UpdateProfileRequest, UpdateRoleRequest, UserList},
    },
    models::{
        Cart, CartItem, Category, Order, OrderItem, OrderStatus, PaymentStatus, Product,
        StoreSettings, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, health, orders, params, products, profile, settings,
    },
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
        auth::register,
        auth::login,
        profile::get_profile,
        profile::update_profile,
        products::list_products,
        products::get_product,
        categories::list_categories,
        categories::get_category,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::direct_update,
        cart::remove_cart_item,
        cart::clear_cart,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        settings::get_settings,
        settings::update_settings,
        admin::list_products,
        admin::get_product,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::create_category,
        admin::update_category,
        admin::delete_category,
        admin::list_users,
        admin::update_user_role,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::update_payment_status,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::analytics
    ),
    components(
        schemas(
            User,
            Product,
            Category,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            StoreSettings,
            ProductRef,
            AddToCartRequest,
            UpdateCartItemRequest,
            DirectUpdateRequest,
            CreateOrderRequest,
            OrderItemInput,
            CustomerInfo,
            OrderList,
            OrderWithItems,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            ProductList,
            ProductDetail,
            CategoryList,
            CategoryDetail,
            CategoryWithCount,
            UserList,
            UpdateRoleRequest,
            UpdateProfileRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            InventoryAdjustRequest,
            AnalyticsSummary,
            StatusCount,
            TopProduct,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Product>,
            ApiResponse<OrderWithItems>,
            ApiResponse<StoreSettings>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration and login"),
        (name = "Profile", description = "Signed-in user's own account"),
        (name = "Products", description = "Storefront catalogue"),
        (name = "Categories", description = "Storefront categories"),
        (name = "Cart", description = "Guest or user cart, keyed by session or the guest_cart_id cookie"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Settings", description = "Store configuration"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
