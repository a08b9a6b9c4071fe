// src/routes.rs

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, header},
    middleware::{self, Next},
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_MATERIAL_BYTES,
    handlers::{
        admin, attendance, auth, contacts, courses, demo_bookings, enrollments, fee_status,
        health, materials, payments, reviews, tests,
    },
    models::user::Role,
    state::AppState,
    utils::jwt::{
        ADMINS, COURSE_MANAGERS, SCANNERS, STAFF, STUDENTS, auth_middleware, role_guard,
    },
};

/// Multipart framing on top of the PDF itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Requires a valid bearer token on every route of `router`.
fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Requires a valid bearer token whose role is in `roles`.
fn restricted(
    router: Router<AppState>,
    roles: &'static [Role],
    state: &AppState,
) -> Router<AppState> {
    // Layers run outside in: authentication first, then the role check.
    let guarded = router.route_layer(middleware::from_fn(
        move |req: Request, next: Next| role_guard(roles, req, next),
    ));
    authenticated(guarded, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Every endpoint lives under `/api`.
/// * Access is declared per route group: public, any authenticated user, or a role list.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(authenticated(Router::new().route("/me", get(auth::me)), &state));

    let attendance_routes = restricted(
        Router::new()
            .route("/generate", post(attendance::generate_token))
            .route("/me", get(attendance::my_attendance)),
        STUDENTS,
        &state,
    )
    .merge(restricted(
        Router::new().route("/scan", post(attendance::scan)),
        SCANNERS,
        &state,
    ))
    .merge(restricted(
        Router::new().route("/", get(attendance::list_attendance)),
        STAFF,
        &state,
    ));

    let test_routes = authenticated(
        Router::new()
            .route("/", get(tests::list_tests))
            .route("/{id}", get(tests::get_test))
            .route("/{id}/submit", post(tests::submit_test))
            .route("/{id}/result", get(tests::get_result)),
        &state,
    )
    .merge(restricted(
        Router::new()
            .route("/", post(tests::create_test))
            .route("/{id}", put(tests::update_test).delete(tests::delete_test))
            .route("/{id}/results", get(tests::list_results)),
        STAFF,
        &state,
    ));

    let course_routes = Router::new()
        .route("/", get(courses::list_courses))
        .route("/{id}", get(courses::get_course))
        .route("/{id}/reviews", get(reviews::list_course_reviews))
        .merge(restricted(
            Router::new()
                .route("/", post(courses::create_course))
                .route(
                    "/{id}",
                    put(courses::update_course).delete(courses::delete_course),
                ),
            COURSE_MANAGERS,
            &state,
        ));

    let enrollment_routes = restricted(
        Router::new()
            .route("/", post(enrollments::create_enrollment))
            .route("/me", get(enrollments::my_enrollments)),
        STUDENTS,
        &state,
    )
    .merge(restricted(
        Router::new()
            .route("/", get(enrollments::list_enrollments))
            .route("/{id}", delete(enrollments::delete_enrollment)),
        ADMINS,
        &state,
    ));

    let payment_routes = restricted(
        Router::new()
            .route("/order", post(payments::create_order))
            .route("/verify", post(payments::verify_payment))
            .route("/me", get(payments::my_payments)),
        STUDENTS,
        &state,
    )
    .merge(restricted(
        Router::new().route("/", get(payments::list_payments)),
        ADMINS,
        &state,
    ));

    let material_routes = authenticated(
        Router::new()
            .route("/", get(materials::list_materials))
            .route("/{id}/download", get(materials::download_material)),
        &state,
    )
    .merge(restricted(
        Router::new()
            .route(
                "/",
                post(materials::upload_material)
                    .layer(DefaultBodyLimit::max(MAX_MATERIAL_BYTES + UPLOAD_OVERHEAD_BYTES)),
            )
            .route("/{id}", delete(materials::delete_material)),
        STAFF,
        &state,
    ));

    let review_routes = restricted(
        Router::new().route("/", post(reviews::create_review)),
        STUDENTS,
        &state,
    )
    // Ownership is checked in the handler.
    .merge(authenticated(
        Router::new().route("/{id}", delete(reviews::delete_review)),
        &state,
    ));

    let contact_routes = Router::new()
        .route("/", post(contacts::create_contact))
        .merge(restricted(
            Router::new()
                .route("/", get(contacts::list_contacts))
                .route("/{id}", delete(contacts::delete_contact)),
            ADMINS,
            &state,
        ));

    let demo_booking_routes = Router::new()
        .route("/", post(demo_bookings::create_booking))
        .merge(restricted(
            Router::new()
                .route("/", get(demo_bookings::list_bookings))
                .route("/{id}", delete(demo_bookings::delete_booking))
                .route("/{id}/status", put(demo_bookings::update_booking_status)),
            ADMINS,
            &state,
        ));

    let fee_status_routes = restricted(
        Router::new().route("/me", get(fee_status::my_fee_status)),
        STUDENTS,
        &state,
    )
    .merge(restricted(
        Router::new().route(
            "/",
            get(fee_status::list_fee_status).post(fee_status::upsert_fee_status),
        ),
        ADMINS,
        &state,
    ));

    let admin_routes = restricted(
        Router::new()
            .route("/users", get(admin::list_users).post(admin::create_user))
            .route(
                "/users/{id}",
                put(admin::update_user).delete(admin::delete_user),
            ),
        ADMINS,
        &state,
    );

    let api = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/attendance", attendance_routes)
        .nest("/tests", test_routes)
        .nest("/courses", course_routes)
        .nest("/enrollments", enrollment_routes)
        .nest("/payments", payment_routes)
        .nest("/materials", material_routes)
        .nest("/reviews", review_routes)
        .nest("/contacts", contact_routes)
        .nest("/demo-bookings", demo_booking_routes)
        .nest("/fee-status", fee_status_routes)
        .nest("/admin", admin_routes);

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
