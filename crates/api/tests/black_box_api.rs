use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use stockbook_api::config::ApiConfig;
use stockbook_auth::{JwtClaims, Role};
use stockbook_core::UserId;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = stockbook_api::app::build_app(ApiConfig::new(JWT_SECRET))
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn created_id(&self, path: &str, body: Value) -> String {
        let res = self.post(path, body).await;
        assert_eq!(res.status(), StatusCode::CREATED, "POST {path}");
        let created: Value = res.json().await.unwrap();
        created["id"].as_str().unwrap().to_string()
    }

    /// Read models are eventually consistent; poll until `check` accepts the body.
    async fn get_eventually(&self, path: &str, check: impl Fn(&Value) -> bool) -> Value {
        for _ in 0..100 {
            let res = self.get(path).await;
            if res.status() == StatusCode::OK {
                let body: Value = res.json().await.unwrap();
                if check(&body) {
                    return body;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("GET {path} did not reach the expected state within timeout");
    }

    async fn product(&self, sku: &str, price: &str) -> String {
        self.created_id(
            "/products",
            json!({ "sku": sku, "name": format!("Product {sku}"), "price": price, "quantity": 10 }),
        )
        .await
    }

    async fn customer(&self, name: &str) -> String {
        self.created_id("/customers", party_body(name, "12345678901")).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn party_body(name: &str, document: &str) -> Value {
    json!({
        "name": name,
        "document": document,
        "email": "contact@example.com",
        "phone": "5511999990000",
        "address": "1 Main Street",
    })
}

fn mint_jwt(secret: &str) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        email: "minted@example.com".to_string(),
        role: Role::Admin,
        iat: now,
        exp: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn me_requires_a_valid_bearer_token() {
    let srv = TestServer::spawn().await;

    let res = srv.get("/auth/me").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(mint_jwt("some-other-secret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(mint_jwt(JWT_SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["email"], "minted@example.com");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn register_login_and_me() {
    let srv = TestServer::spawn().await;
    let user = json!({ "email": "Ana@Shop.com", "password": "correct-horse", "name": "Ana" });

    let res = srv.post("/auth/register", user.clone()).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let registered: Value = res.json().await.unwrap();
    assert_eq!(registered["user"]["email"], "ana@shop.com");
    assert_eq!(registered["user"]["role"], "user");
    assert!(registered["user"].get("password_hash").is_none());

    let res = srv.post("/auth/register", user).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .post("/auth/login", json!({ "email": "ana@shop.com", "password": "wrong-password" }))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .post("/auth/login", json!({ "email": "ana@shop.com", "password": "correct-horse" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let login: Value = res.json().await.unwrap();
    let token = login["token"].as_str().unwrap();

    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["name"], "Ana");
}

#[tokio::test]
async fn creating_a_product_opens_its_stock() {
    let srv = TestServer::spawn().await;
    let id = srv
        .created_id(
            "/products",
            json!({ "sku": "W-1", "name": "Widget", "price": 2.5, "quantity": 4, "min_quantity": 5 }),
        )
        .await;

    let product = srv.get_eventually(&format!("/products/{id}"), |_| true).await;
    assert_eq!(product["price"], "2.50");

    let inventory = srv
        .get_eventually("/inventory", |b| b["items"].as_array().is_some_and(|a| a.len() == 1))
        .await;
    let row = &inventory["items"][0];
    assert_eq!(row["product_id"], id.as_str());
    assert_eq!(row["quantity"], 4);
    assert_eq!(row["value"], "10.00");
    assert_eq!(row["low_stock"], true);

    let res = srv.post(&format!("/inventory/{id}/adjust"), json!({ "delta": 6 })).await;
    assert_eq!(res.status(), StatusCode::OK);
    srv.get_eventually("/inventory/summary", |b| {
        b["total_value"] == "25.00" && b["low_stock_count"] == 0
    })
    .await;

    let res = srv.post(&format!("/inventory/{id}/adjust"), json!({ "delta": -11 })).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn order_total_is_the_sum_of_line_subtotals() {
    let srv = TestServer::spawn().await;
    let customer = srv.customer("Acme Ltd").await;
    let ten = srv.product("A-1", "10.00").await;
    let five_fifty = srv.product("B-1", "5.50").await;

    let res = srv
        .post(
            "/orders",
            json!({
                "customer_id": customer,
                "items": [
                    { "product_id": ten, "quantity": 2, "unit_price": "10.00" },
                    { "product_id": five_fifty, "quantity": 1 },
                ],
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["total"], "25.50");
    let id = created["id"].as_str().unwrap().to_string();

    let order = srv.get_eventually(&format!("/orders/{id}"), |_| true).await;
    assert_eq!(order["total"], "25.50");
    assert_eq!(order["customer_name"], "Acme Ltd");
    assert_eq!(order["items"][0]["subtotal"], "20.00");
    assert_eq!(order["items"][1]["unit_price"], "5.50");

    let res = srv
        .put(
            &format!("/orders/{id}"),
            json!({ "items": [{ "product_id": five_fifty, "quantity": 3, "unit_price": 1.1 }] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    srv.get_eventually(&format!("/orders/{id}"), |o| o["total"] == "3.30").await;
}

#[tokio::test]
async fn orders_need_a_live_customer() {
    let srv = TestServer::spawn().await;
    let supplier = srv
        .created_id("/suppliers", party_body("Parts Ltd", "12345678000199"))
        .await;

    let res = srv
        .post("/orders", json!({ "customer_id": supplier, "items": [] }))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn running_balance_is_sorted_by_date() {
    let srv = TestServer::spawn().await;
    let product = srv.product("L-1", "1.00").await;

    srv.created_id(
        "/transactions",
        json!({ "date": "2024-01-02", "kind": "credit", "amount": 100, "product_id": product }),
    )
    .await;
    srv.created_id(
        "/transactions",
        json!({ "date": "2024-01-01", "kind": "debit", "amount": "40", "product_id": product }),
    )
    .await;

    let balance = srv
        .get_eventually("/transactions/balance", |b| {
            b["items"].as_array().is_some_and(|a| a.len() == 2)
        })
        .await;
    assert_eq!(
        balance["items"],
        json!([
            { "date": "2024-01-01", "balance": "-40.00" },
            { "date": "2024-01-02", "balance": "60.00" },
        ])
    );

    let stats = srv.get_eventually("/dashboard/stats", |s| s["balance"] == "60.00").await;
    assert_eq!(stats["products"], 1);
}

#[tokio::test]
async fn customer_and_supplier_routes_are_kind_guarded() {
    let srv = TestServer::spawn().await;
    let customer = srv.customer("Jane Doe").await;
    srv.get_eventually(&format!("/customers/{customer}"), |_| true).await;

    let res = srv.get(&format!("/suppliers/{customer}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .put(&format!("/suppliers/{customer}"), party_body("Jane Doe", "12345678000199"))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .delete(srv.url(&format!("/suppliers/{customer}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let customers = srv.get("/customers").await.json::<Value>().await.unwrap();
    assert_eq!(customers["items"][0]["customer_type"], "individual");
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let srv = TestServer::spawn().await;

    let res = srv.get("/products/not-a-uuid").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = srv.post("/products", json!({ "name": "No sku" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = srv
        .post("/products", json!({ "sku": "X", "name": "Freebie", "price": 0 }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}
