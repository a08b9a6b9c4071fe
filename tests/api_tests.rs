// tests/api_tests.rs
//
// End-to-end flows against a real Postgres. Each test returns early when
// DATABASE_URL is not set.

use edu_backend::{
    config::Config,
    models::user::Role,
    routes,
    state::AppState,
    utils::{hash::hash_password, jwt::sign_jwt},
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    pool: PgPool,
    client: Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn post(&self, path: &str, auth: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("Authorization", auth)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    async fn get(&self, path: &str, auth: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Authorization", auth)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Inserts a user straight into the database and returns a bearer header for it.
    async fn user(&self, role: Role) -> (i64, String) {
        let email = format!("{}_{}@example.com", role, uuid::Uuid::new_v4().simple());
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(format!("Test {}", role))
        .bind(&email)
        .bind(hash_password("password123").unwrap())
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .expect("Failed to insert user");

        let token = sign_jwt(id, role, SECRET, 600).unwrap();
        (id, format!("Bearer {}", token))
    }

    async fn generate(&self, student: &str, kind: &str) -> String {
        let response = self
            .post("/api/attendance/generate", student, json!({ "type": kind }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["type"], kind);
        body["token"].as_str().unwrap().to_string()
    }

    async fn scan(&self, scanner: &str, token: &str) -> (StatusCode, Value) {
        let response = self
            .post("/api/attendance/scan", scanner, json!({ "token": token }))
            .await;
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

/// Spawns the app on a random port. `None` when no database is configured.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        cors_origins: Vec::new(),
        admin_email: None,
        admin_password: None,
        attendance_token_ttl_secs: 60,
        gemini_api_key: None,
        gemini_model: "gemini-1.5-flash".to_string(),
        razorpay_key_id: None,
        razorpay_key_secret: None,
    };

    let state = AppState::new(pool.clone(), config).expect("Failed to build state");
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address,
        pool,
        client: Client::new(),
    })
}

#[tokio::test]
async fn register_then_login() {
    let Some(app) = spawn_app().await else { return };
    let email = format!("s_{}@example.com", uuid::Uuid::new_v4().simple());

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Asha", "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["role"], "student");
    assert!(body["user"].get("password").is_none());

    // Same email again
    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "name": "Asha", "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "Bearer");
    let token = body["token"].as_str().unwrap();

    let response = app.get("/api/auth/me", &format!("Bearer {}", token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], email.as_str());
}

#[tokio::test]
async fn attendance_in_then_out_flow() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = app.user(Role::Student).await;
    let (educator_id, educator) = app.user(Role::Educator).await;

    // IN
    let token = app.generate(&student, "IN").await;
    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["attendance"]["inTime"].is_string());
    assert!(body["attendance"]["outTime"].is_null());
    assert_eq!(body["attendance"]["teacherId"], educator_id);

    // Same QR shown twice
    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_USED");

    // A second IN on the same day burns the token but changes nothing
    let token = app.generate(&student, "IN").await;
    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_IN");

    // OUT
    let token = app.generate(&student, "OUT").await;
    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["attendance"]["outTime"].is_string());

    let token = app.generate(&student, "OUT").await;
    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_OUT");

    let response = app.get("/api/attendance/me", &student).await;
    assert_eq!(response.status(), StatusCode::OK);
    let records: Vec<Value> = response.json().await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn out_before_in_leaves_no_record_and_burns_token() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = app.user(Role::Student).await;
    let (_, admin) = app.user(Role::Admin).await;

    let token = app.generate(&student, "OUT").await;
    let (status, body) = app.scan(&admin, &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "OUT_BEFORE_IN");
    assert_eq!(body["success"], false);

    let response = app.get("/api/attendance/me", &student).await;
    let records: Vec<Value> = response.json().await.unwrap();
    assert!(records.is_empty());

    let (status, body) = app.scan(&admin, &token).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_USED");
}

#[tokio::test]
async fn regenerating_invalidates_previous_token() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = app.user(Role::Student).await;
    let (_, educator) = app.user(Role::Educator).await;

    let first = app.generate(&student, "IN").await;
    let second = app.generate(&student, "IN").await;
    assert_ne!(first, second);

    let (status, body) = app.scan(&educator, &first).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app.scan(&educator, &second).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn concurrent_scans_consume_a_token_once() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = app.user(Role::Student).await;
    let (_, educator) = app.user(Role::Educator).await;
    let (_, admin) = app.user(Role::Admin).await;

    let token = app.generate(&student, "IN").await;
    let ((first, first_body), (second, second_body)) =
        tokio::join!(app.scan(&educator, &token), app.scan(&admin, &token));

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

    let rejected = if first == StatusCode::CONFLICT { first_body } else { second_body };
    assert_eq!(rejected["code"], "ALREADY_USED");

    let response = app.get("/api/attendance/me", &student).await;
    let records: Vec<Value> = response.json().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]["inTime"].is_string());
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let (student_id, _) = app.user(Role::Student).await;
    let (_, educator) = app.user(Role::Educator).await;

    let token = uuid::Uuid::new_v4().simple().to_string();
    sqlx::query(
        "INSERT INTO attendance_tokens (student_id, type, token, expires_at, used)
         VALUES ($1, 'IN', $2, NOW() - INTERVAL '5 seconds', FALSE)",
    )
    .bind(student_id)
    .bind(&token)
    .execute(&app.pool)
    .await
    .unwrap();

    let (status, body) = app.scan(&educator, &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "EXPIRED");
}

#[tokio::test]
async fn test_submission_is_graded_once() {
    let Some(app) = spawn_app().await else { return };
    let (student_id, student) = app.user(Role::Student).await;
    let (_, educator) = app.user(Role::Educator).await;

    let response = app
        .post(
            "/api/tests",
            &educator,
            json!({
                "title": "Algebra basics",
                "duration": 30,
                "passingMarks": 40,
                "questions": [
                    {
                        "type": "mcq",
                        "question": "2 + 2 = ?",
                        "options": ["3", "4"],
                        "correctAnswer": 1,
                        "marks": 1,
                        "explanation": "Two plus two is four."
                    },
                    {
                        "type": "mcq",
                        "question": "3 x 3 = ?",
                        "options": ["9", "6"],
                        "correctAnswer": 0,
                        "marks": 2,
                        "explanation": "Three threes are nine."
                    }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let test: Value = response.json().await.unwrap();
    assert_eq!(test["totalMarks"], 3.0);
    let test_id = test["id"].as_i64().unwrap();

    // Students do not see the answer key
    let response = app.get(&format!("/api/tests/{}", test_id), &student).await;
    let visible: Value = response.json().await.unwrap();
    assert!(visible["questions"][0].get("correctAnswer").is_none());

    let submission = json!({
        "answers": [{ "selectedAnswer": 1 }, { "selectedAnswer": 1 }],
        "timeTaken": 120
    });

    let response = app
        .post(&format!("/api/tests/{}/submit", test_id), &student, submission.clone())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    let result = &body["result"];
    assert_eq!(result["obtainedMarks"], 1.0);
    assert_eq!(result["percentage"], 33.33);
    assert_eq!(result["status"], "failed");
    assert_eq!(result["answers"][0]["isCorrect"], true);
    assert_eq!(result["answers"][1]["isCorrect"], false);
    assert_eq!(result["answers"][1]["explanation"], "Three threes are nine.");

    let response = app
        .post(&format!("/api/tests/{}/submit", test_id), &student, submission)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_SUBMITTED");

    let response = app
        .get(&format!("/api/tests/{}/result", test_id), &student)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let populated: Value = response.json().await.unwrap();
    assert_eq!(populated["test"]["title"], "Algebra basics");
    assert_eq!(populated["student"]["id"], student_id);
}

#[tokio::test]
async fn free_course_enrollment_and_review() {
    let Some(app) = spawn_app().await else { return };
    let (_, student) = app.user(Role::Student).await;
    let (_, educator) = app.user(Role::Educator).await;

    let response = app
        .post(
            "/api/courses",
            &educator,
            json!({
                "title": "Intro to Rust",
                "description": "Ownership first",
                "category": "programming",
                "price": 0
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let course: Value = response.json().await.unwrap();
    let course_id = course["id"].as_i64().unwrap();

    // Not enrolled yet
    let review = json!({
        "courseId": course_id,
        "rating": 5,
        "comment": "Great <script>x()</script>"
    });
    let response = app.post("/api/reviews", &student, review.clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post("/api/enrollments", &student, json!({ "courseId": course_id }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let enrollment: Value = response.json().await.unwrap();
    assert_eq!(enrollment["status"], "active");

    let response = app
        .post("/api/enrollments", &student, json!({ "courseId": course_id }))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.post("/api/reviews", &student, review.clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert!(!body["comment"].as_str().unwrap().contains("script"));

    let response = app.post("/api/reviews", &student, review).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .client
        .get(app.url(&format!("/api/courses/{}", course_id)))
        .send()
        .await
        .unwrap();
    let course: Value = response.json().await.unwrap();
    assert_eq!(course["studentsCount"], 1);
}
