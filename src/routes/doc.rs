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
        account::{AddressList, NotificationList, WishlistEntry, WishlistList},
        admin::{CouponList, DeliveryZoneList, LowStockList},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{CartLine, CartView},
        catalog::{BannerList, BrandList, CategoryList, ProductDetail, ProductList, ReviewList},
        checkout::Quote,
        orders::{OrderList, OrderTracking, OrderWithItems},
        payments::CallbackAck,
    },
    models::{
        Address, Banner, Brand, Category, Coupon, DeliveryZone, Notification, Order, OrderItem,
        Payment, PickupStation, Product, Review, User,
    },
    response::{ApiResponse, Meta},
    routes::{account, admin, auth, cart, catalog, checkout, health, orders, payments},
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
        catalog::list_products,
        catalog::get_product,
        catalog::list_reviews,
        catalog::create_review,
        catalog::list_categories,
        catalog::list_brands,
        catalog::list_banners,
        cart::view_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart,
        checkout::quote,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::track_order,
        payments::initiate_payment,
        payments::payment_status,
        payments::mpesa_callback,
        account::list_addresses,
        account::create_address,
        account::update_address,
        account::delete_address,
        account::set_default_address,
        account::list_wishlist,
        account::add_to_wishlist,
        account::remove_from_wishlist,
        account::list_notifications,
        account::mark_read,
        account::mark_all_read,
        admin::list_all_orders,
        admin::get_any_order,
        admin::update_order_status,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::low_stock,
        admin::adjust_inventory,
        admin::approve_review,
        admin::delete_review,
        admin::list_coupons,
        admin::create_coupon,
        admin::update_coupon,
        admin::delete_coupon,
        admin::list_delivery_zones,
        admin::create_delivery_zone,
        admin::update_delivery_zone,
        admin::delete_delivery_zone
    ),
    components(
        schemas(
            User,
            Address,
            PickupStation,
            Category,
            Brand,
            Banner,
            Product,
            Review,
            Coupon,
            DeliveryZone,
            Notification,
            Order,
            OrderItem,
            Payment,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ProductList,
            ProductDetail,
            CategoryList,
            BrandList,
            BannerList,
            ReviewList,
            CartLine,
            CartView,
            Quote,
            OrderList,
            OrderWithItems,
            OrderTracking,
            CallbackAck,
            AddressList,
            WishlistEntry,
            WishlistList,
            NotificationList,
            CouponList,
            DeliveryZoneList,
            LowStockList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<Quote>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Payment>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Catalog", description = "Products, categories, brands, banners and reviews"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout quoting"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "M-Pesa payment endpoints"),
        (name = "Account", description = "Addresses, wishlist and notifications"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
