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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartLine, CartList, SetQuantityRequest},
        catalog::{BrandList, BrandResponse, CategoryList, CategoryResponse},
        community::{CommentResponse, LikeResponse, PostList, PostResponse, PostWithComments},
        nft::{BackendMintRequest, MintList, RecordMintRequest},
        notifications::{CreateNotificationRequest, NotificationList, UnreadCount},
        orders::{CheckoutRequest, OrderDetailResponse, OrderList, OrderResponse, OrderWithDetails},
        products::{ProductList, ProductResponse},
        promotions::{PromotionList, PromotionResponse, ValidatePromotionResponse},
        users::{UserList, UserProfile},
    },
    models::{CartItem, Notification, NftMint},
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, catalog, community, health, nft, notifications, orders, params,
        products, promotions, users,
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
        auth::session,
        users::me,
        users::update_me,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        catalog::list_categories,
        catalog::get_category,
        catalog::create_category,
        catalog::update_category,
        catalog::delete_category,
        catalog::list_brands,
        catalog::get_brand,
        catalog::create_brand,
        catalog::update_brand,
        catalog::delete_brand,
        cart::cart_list,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::checkout,
        orders::list_orders,
        orders::track_order,
        orders::get_order,
        orders::cancel_order,
        promotions::validate,
        promotions::list_promotions,
        promotions::create_promotion,
        promotions::update_promotion,
        promotions::delete_promotion,
        community::list_posts,
        community::create_post,
        community::get_post,
        community::delete_post,
        community::add_comment,
        community::delete_comment,
        community::toggle_like,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        nft::list_mints,
        nft::record_mint,
        nft::backend_mint,
        admin::dashboard,
        admin::list_users,
        admin::update_user_role,
        admin::update_user_active,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::create_notification,
    ),
    components(
        schemas(
            UserProfile,
            UserList,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ProductResponse,
            ProductList,
            CategoryResponse,
            CategoryList,
            BrandResponse,
            BrandList,
            CartItem,
            CartLine,
            CartList,
            AddToCartRequest,
            SetQuantityRequest,
            CheckoutRequest,
            OrderResponse,
            OrderDetailResponse,
            OrderWithDetails,
            OrderList,
            PromotionResponse,
            PromotionList,
            ValidatePromotionResponse,
            PostResponse,
            CommentResponse,
            PostWithComments,
            PostList,
            LikeResponse,
            Notification,
            NotificationList,
            UnreadCount,
            CreateNotificationRequest,
            NftMint,
            MintList,
            RecordMintRequest,
            BackendMintRequest,
            admin::UpdateOrderStatusRequest,
            admin::UpdateRoleRequest,
            admin::UpdateActiveRequest,
            admin::DashboardStats,
            params::Pagination,
            Meta,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithDetails>,
            ApiResponse<LoginResponse>,
            ApiResponse<UserProfile>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and session"),
        (name = "Users", description = "Own profile"),
        (name = "Products", description = "Product catalog"),
        (name = "Catalog", description = "Categories and brands"),
        (name = "Cart", description = "User and guest carts"),
        (name = "Orders", description = "Checkout, tracking and cancellation"),
        (name = "Promotions", description = "Promotion codes"),
        (name = "Community", description = "Posts, comments and likes"),
        (name = "Notifications", description = "Persisted notifications"),
        (name = "NFT", description = "Mint bookkeeping"),
        (name = "Admin", description = "Admin console"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
