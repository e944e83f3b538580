use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use domain::memory::InMemoryStore;
use domain::services::{
    DrawConfig, DrawEngine, GroupService, InvitationConfig, InvitationService, MembershipConfig,
    MembershipManager, NotificationSink, RecordingNotificationSink,
};
use domain::store::{GroupStore, InviteStore, UserDirectory, WishlistReader};
use persistence::repositories::{
    GroupRepository, InviteRepository, NotificationRepository, UserRepository,
};
use shared::jwt::JwtConfig;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    create_jwt_config, metrics_handler, metrics_middleware, rate_limit_middleware,
    require_user_auth, trace_id, RateLimiterState,
};
use crate::routes::{draw, groups, health, invites, members};

/// Storage and notification adapters the services run on.
#[derive(Clone)]
pub struct Backends {
    pub groups: Arc<dyn GroupStore>,
    pub invites: Arc<dyn InviteStore>,
    pub users: Arc<dyn UserDirectory>,
    pub wishlists: Arc<dyn WishlistReader>,
    pub notifier: Arc<dyn NotificationSink>,
}

impl Backends {
    /// PostgreSQL repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        let users = Arc::new(UserRepository::new(pool.clone()));
        Self {
            groups: Arc::new(GroupRepository::new(pool.clone())),
            invites: Arc::new(InviteRepository::new(pool.clone())),
            users: users.clone(),
            wishlists: users,
            notifier: Arc::new(NotificationRepository::new(pool)),
        }
    }

    /// Everything in process memory. Used by tests and local runs.
    pub fn in_memory(store: Arc<InMemoryStore>, notifier: Arc<RecordingNotificationSink>) -> Self {
        Self {
            groups: store.clone(),
            invites: store.clone(),
            users: store.clone(),
            wishlists: store,
            notifier,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub store: Arc<dyn GroupStore>,
    pub groups: Arc<GroupService>,
    pub members: Arc<MembershipManager>,
    pub invites: Arc<InvitationService>,
    pub draw: Arc<DrawEngine>,
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> anyhow::Result<Self> {
        let jwt = create_jwt_config(&config.jwt)?;
        let rate_limiter =
            RateLimiterState::new(config.security.rate_limit_per_minute).map(Arc::new);

        let members = Arc::new(MembershipManager::new(
            backends.groups.clone(),
            backends.users.clone(),
            backends.notifier.clone(),
            MembershipConfig {
                max_members_per_group: config.limits.max_members_per_group,
            },
        ));
        let invites = InvitationService::new(
            backends.groups.clone(),
            backends.invites.clone(),
            backends.users.clone(),
            members.clone(),
            backends.notifier.clone(),
            InvitationConfig {
                ttl: config.invite_ttl(),
            },
        );
        let draw = DrawEngine::new(
            backends.groups.clone(),
            backends.wishlists.clone(),
            backends.notifier.clone(),
            DrawConfig {
                max_shuffle_attempts: config.draw.max_shuffle_attempts,
                max_conflict_retries: config.draw.max_conflict_retries,
                wishlist_limit: config.limits.wishlist_items,
            },
        );
        let groups = GroupService::new(backends.groups.clone(), backends.users.clone());

        Ok(Self {
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            rate_limiter,
            store: backends.groups,
            groups: Arc::new(groups),
            members,
            invites: Arc::new(invites),
            draw: Arc::new(draw),
        })
    }
}

pub fn create_app(config: Config, backends: Backends) -> anyhow::Result<Router> {
    let state = AppState::new(config, backends)?;
    Ok(router(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        // Development default
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    // Middleware order: auth runs first, then rate limiting (keyed by the caller)
    let protected_routes = Router::new()
        .route(
            "/api/v1/groups",
            post(groups::create_group).get(groups::list_groups),
        )
        .route(
            "/api/v1/groups/:group_id",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route(
            "/api/v1/groups/:group_id/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/api/v1/groups/:group_id/members/:membership_id",
            delete(members::remove_member),
        )
        .route("/api/v1/groups/:group_id/leave", post(members::leave_group))
        .route(
            "/api/v1/groups/:group_id/transfer",
            post(members::transfer_ownership),
        )
        .route(
            "/api/v1/groups/:group_id/invites",
            post(invites::create_invite).delete(invites::revoke_invites),
        )
        .route(
            "/api/v1/groups/:group_id/invites/direct",
            post(invites::invite_user),
        )
        .route("/api/v1/invites/:code/accept", post(invites::accept_invite))
        .route("/api/v1/groups/:group_id/draw", post(draw::perform_draw))
        .route("/api/v1/groups/:group_id/draw/me", get(draw::my_assignment))
        .route(
            "/api/v1/groups/:group_id/draw/me/wishlist",
            get(draw::my_match_wishlist),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/api/v1/invites/:code", get(invites::preview_invite))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
