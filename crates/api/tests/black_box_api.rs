use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use shopfront_api::config::ApiConfig;
use shopfront_auth::{JwtClaims, Role};
use shopfront_core::{CategoryId, UserId};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = shopfront_api::app::build_app(&ApiConfig::in_memory(jwt_secret))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user: UserId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user,
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin_token(jwt_secret: &str) -> String {
    mint_jwt(jwt_secret, UserId::new(), vec![Role::new("admin")])
}

async fn create_product(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let res = client
        .post(srv.url("/products"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

fn num(v: &serde_json::Value) -> f64 {
    v.as_f64().unwrap_or_else(|| panic!("expected number, got {v}"))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].is_string());

    // Signed with a different secret.
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(admin_token("other-secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let user = UserId::new();
    let token = mint_jwt(jwt_secret, user, vec![Role::new("pricing_manager")]);

    let client = reqwest::Client::new();
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["userId"].as_str().unwrap(), user.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "pricing_manager"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "pricing.adjust"));
}

#[tokio::test]
async fn bulk_update_skips_unknown_products_and_records_history() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let admin = admin_token(jwt_secret);

    let discounted = create_product(
        &client,
        &srv,
        &admin,
        json!({ "name": "Blender", "sku": "BL-1", "price": 1000, "offerPrice": 800 }),
    )
    .await;
    let plain = create_product(
        &client,
        &srv,
        &admin,
        json!({ "name": "Mixer", "sku": "MX-1", "price": 500 }),
    )
    .await;

    let manager = UserId::new();
    let token = mint_jwt(jwt_secret, manager, vec![Role::new("pricing_manager")]);

    let res = client
        .post(srv.url("/pricing/bulk-update"))
        .bearer_auth(&token)
        .json(&json!({
            "productIds": [discounted["id"], plain["id"], UserId::new().to_string()],
            "adjustmentType": "both",
            "adjustmentMethod": "percentage",
            "adjustmentValue": 10,
            "notes": "spring uplift",
            "filterCriteria": { "search": "kitchen" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["productsUpdated"], 2);
    let adjustment_id = body["adjustmentId"].as_str().unwrap().to_string();

    // Prices were written.
    let res = client
        .get(srv.url(&format!("/products/{}", discounted["id"].as_str().unwrap())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let product: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&product["price"]), 1100.0);
    assert_eq!(num(&product["offerPrice"]), 880.0);

    let res = client
        .get(srv.url(&format!("/products/{}", plain["id"].as_str().unwrap())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let product: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&product["price"]), 550.0);
    assert_eq!(num(&product["offerPrice"]), 0.0);

    // Audit record.
    let res = client
        .get(srv.url(&format!("/pricing/history/{adjustment_id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let record: serde_json::Value = res.json().await.unwrap();
    assert_eq!(record["totalProductsAffected"], 2);
    assert_eq!(record["items"].as_array().unwrap().len(), 2);
    assert_eq!(record["performedBy"].as_str().unwrap(), manager.to_string());
    assert_eq!(record["adjustmentType"], "both");
    assert_eq!(record["filterCriteria"]["search"], "kitchen");
    assert_eq!(num(&record["items"][0]["priceChangePercentage"]), 10.0);

    let res = client
        .get(srv.url(&format!("/pricing/history?performedBy={manager}&limit=5")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["hasMore"], false);
    assert_eq!(page["items"][0]["id"].as_str().unwrap(), adjustment_id);
}

#[tokio::test]
async fn bulk_update_validation_errors_are_bad_requests() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let admin = admin_token(jwt_secret);

    let res = client
        .post(srv.url("/pricing/bulk-update"))
        .bearer_auth(&admin)
        .json(&json!({
            "productIds": [],
            "adjustmentType": "both",
            "adjustmentMethod": "fixed_amount",
            "adjustmentValue": -50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(srv.url("/pricing/bulk-update"))
        .bearer_auth(&admin)
        .json(&json!({
            "productIds": [UserId::new().to_string()],
            "adjustmentType": "both",
            "adjustmentMethod": "fixed_amount"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing resolves.
    let res = client
        .post(srv.url("/pricing/bulk-update"))
        .bearer_auth(&admin)
        .json(&json!({
            "productIds": [UserId::new().to_string()],
            "adjustmentType": "both",
            "adjustmentMethod": "fixed_amount",
            "adjustmentValue": -50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn percentage_cut_below_minus_hundred_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let admin = admin_token(jwt_secret);

    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({ "name": "Lamp", "sku": "LM-1", "price": 100, "offerPrice": 80 }),
    )
    .await;
    let product_id = product["id"].as_str().unwrap();

    for path in ["/pricing/bulk-update", "/pricing/preview"] {
        let res = client
            .post(srv.url(path))
            .bearer_auth(&admin)
            .json(&json!({
                "productIds": [product_id],
                "adjustmentType": "both",
                "adjustmentMethod": "percentage",
                "adjustmentValue": -150
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "validation_error");
    }

    let res = client
        .get(srv.url(&format!("/products/{product_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&body["price"]), 100.0);
    assert_eq!(num(&body["offerPrice"]), 80.0);

    // The storefront lookup still resolves against the untouched price.
    let res = client
        .get(srv.url(&format!("/storefront/products/{product_id}/protection-plans")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn viewer_cannot_adjust_prices() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let product = create_product(
        &client,
        &srv,
        &admin_token(jwt_secret),
        json!({ "name": "Kettle", "sku": "KT-1", "price": 40 }),
    )
    .await;

    let viewer = mint_jwt(jwt_secret, UserId::new(), vec![Role::new("viewer")]);
    let res = client
        .post(srv.url("/pricing/bulk-update"))
        .bearer_auth(&viewer)
        .json(&json!({
            "productIds": [product["id"]],
            "adjustmentType": "both",
            "adjustmentMethod": "fixed_amount",
            "adjustmentValue": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Reads are allowed and the price is untouched.
    let res = client
        .get(srv.url(&format!("/products/{}", product["id"].as_str().unwrap())))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&body["price"]), 40.0);
}

#[tokio::test]
async fn preview_does_not_write() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let admin = admin_token(jwt_secret);

    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({ "name": "Toaster", "sku": "TS-1", "price": 500 }),
    )
    .await;

    let res = client
        .post(srv.url("/pricing/preview"))
        .bearer_auth(&admin)
        .json(&json!({
            "productIds": [product["id"]],
            "adjustmentType": "both",
            "adjustmentMethod": "fixed_amount",
            "adjustmentValue": -50
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&body["items"][0]["newPrice"]), 450.0);
    assert_eq!(num(&body["items"][0]["newOfferPrice"]), 0.0);

    let res = client
        .get(srv.url("/pricing/history"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let page: serde_json::Value = res.json().await.unwrap();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn storefront_lists_applicable_plans_without_auth() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let admin = admin_token(jwt_secret);

    let phones = CategoryId::new();
    let product = create_product(
        &client,
        &srv,
        &admin,
        json!({
            "name": "Phone",
            "sku": "PH-1",
            "price": 6000,
            "offerPrice": 500,
            "categoryIds": [phones.to_string()]
        }),
    )
    .await;
    let product_id = product["id"].as_str().unwrap();

    let manager = mint_jwt(jwt_secret, UserId::new(), vec![Role::new("protection_manager")]);
    let res = client
        .post(srv.url("/protection/plans"))
        .bearer_auth(&manager)
        .json(&json!({
            "name": "Screen cover",
            "protectionType": "damage_protection",
            "duration": "1 year",
            "pricing": { "mode": "percentage", "percentage": 5, "minPrice": 50, "maxPrice": 200 },
            "scope": { "appliesTo": "categories", "levels": [[phones.to_string()]] }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let plan: serde_json::Value = res.json().await.unwrap();

    // A plan scoped to nothing never applies.
    let res = client
        .post(srv.url("/protection/plans"))
        .bearer_auth(&manager)
        .json(&json!({
            "name": "Misconfigured",
            "protectionType": "warranty",
            "duration": "2 years",
            "pricing": { "mode": "fixed", "price": 30 },
            "scope": { "appliesTo": "categories", "levels": [[], [], [], [], []] }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .get(srv.url(&format!(
            "/storefront/products/{product_id}/protection-plans?productPrice=6000"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], plan["id"]);
    assert_eq!(num(&items[0]["calculatedPrice"]), 200.0);

    // Without a price the effective (offer) price is used: 5% of 500 clamps up to 50.
    let res = client
        .get(srv.url(&format!("/storefront/products/{product_id}/protection-plans")))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(num(&body["items"][0]["calculatedPrice"]), 50.0);

    let res = client
        .get(srv.url(&format!(
            "/storefront/products/{}/protection-plans",
            UserId::new()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn protection_plan_admin_lifecycle() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new(), vec![Role::new("protection_manager")]);

    let res = client
        .post(srv.url("/protection/plans"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Warranty",
            "protectionType": "warranty",
            "duration": "1 year",
            "pricing": { "mode": "fixed", "price": 20 },
            "scope": { "appliesTo": "all" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let plan: serde_json::Value = res.json().await.unwrap();
    let plan_url = srv.url(&format!("/protection/plans/{}", plan["id"].as_str().unwrap()));
    assert_eq!(plan["isActive"], true);

    let res = client
        .put(&plan_url)
        .bearer_auth(&token)
        .json(&json!({
            "name": "Warranty+",
            "protectionType": "warranty",
            "duration": "2 years",
            "isActive": false,
            "pricing": { "mode": "fixed", "price": 25 },
            "scope": { "appliesTo": "all" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: serde_json::Value = res.json().await.unwrap();
    assert_eq!(updated["name"], "Warranty+");
    assert_eq!(updated["isActive"], false);

    let res = client
        .post(srv.url("/protection/plans"))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Broken",
            "protectionType": "warranty",
            "duration": "1 year",
            "pricing": { "mode": "percentage", "percentage": 150 },
            "scope": { "appliesTo": "all" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.delete(&plan_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(&plan_url).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/protection/plans/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
