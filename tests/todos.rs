#[macro_use]
mod common;

use actix_web::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;
use todoapp::db;

use common::{test_pool, TestClient, TestResponse};

/// Registers and logs in, leaving the client on the dashboard.
async fn logged_in<S, B>(app: &S, name: &str, email: &str) -> TestClient
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    let mut client = TestClient::new();
    client.register(app, name, email, "pw123456").await;
    let resp = client.login(app, email, "pw123456").await;
    assert_eq!(resp.location.as_deref(), Some("/dashboard"));
    client.follow(app, resp).await;
    client
}

fn todos(page: &TestResponse) -> Vec<Value> {
    page.json()["todos"].as_array().cloned().unwrap_or_default()
}

#[actix_rt::test]
async fn test_task_lifecycle() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = logged_in(&app, "Ann", "ann@x.com").await;

    let resp = client
        .post_form(&app, "/dashboard", &[("title", "  Buy milk  ")])
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/dashboard"));

    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task added."]);
    let list = todos(&page);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Buy milk");
    assert_eq!(list[0]["is_done"], false);
    let id = list[0]["id"].as_i64().unwrap();

    let resp = client
        .post_form(&app, &format!("/todo/{}/toggle", id), &[])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task updated."]);
    assert_eq!(todos(&page)[0]["is_done"], true);

    let resp = client
        .post_form(&app, &format!("/todo/{}/edit", id), &[("title", "Buy oat milk")])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task title saved."]);
    assert_eq!(todos(&page)[0]["title"], "Buy oat milk");
    assert_eq!(todos(&page)[0]["is_done"], true);

    let resp = client
        .post_form(&app, &format!("/todo/{}/delete", id), &[])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task deleted."]);
    assert!(todos(&page).is_empty());
}

#[actix_rt::test]
async fn test_dashboard_lists_newest_first() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = logged_in(&app, "Ann", "ann@x.com").await;

    for title in ["first", "second", "third"] {
        let resp = client
            .post_form(&app, "/dashboard", &[("title", title)])
            .await;
        client.follow(&app, resp).await;
    }

    let page = client.get(&app, "/dashboard").await;
    let titles: Vec<Value> = todos(&page).iter().map(|t| t["title"].clone()).collect();
    assert_eq!(titles, vec!["third", "second", "first"]);
}

#[actix_rt::test]
async fn test_invalid_titles_are_rejected() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = logged_in(&app, "Ann", "ann@x.com").await;

    let resp = client
        .post_form(&app, "/dashboard", &[("title", "   ")])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task title cannot be empty."]);

    let too_long = "x".repeat(151);
    let resp = client
        .post_form(&app, "/dashboard", &[("title", too_long.as_str())])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(
        page.flash_messages(),
        vec!["Task title must be under 150 characters."]
    );
    assert!(todos(&page).is_empty());

    let exact = "y".repeat(150);
    let resp = client
        .post_form(&app, "/dashboard", &[("title", exact.as_str())])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task added."]);
    let id = todos(&page)[0]["id"].as_i64().unwrap();

    // A bad rename leaves the task untouched.
    let resp = client
        .post_form(&app, &format!("/todo/{}/edit", id), &[("title", "")])
        .await;
    let page = client.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task title cannot be empty."]);
    assert_eq!(todos(&page)[0]["title"], exact.as_str());
}

#[actix_rt::test]
async fn test_tasks_are_isolated_between_users() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut ann = logged_in(&app, "Ann", "ann@x.com").await;
    let mut bob = logged_in(&app, "Bob", "bob@x.com").await;

    let resp = ann
        .post_form(&app, "/dashboard", &[("title", "Ann's task")])
        .await;
    let page = ann.follow(&app, resp).await;
    let id = todos(&page)[0]["id"].as_i64().unwrap();

    let page = bob.get(&app, "/dashboard").await;
    assert!(todos(&page).is_empty());

    for action in ["toggle", "delete"] {
        let resp = bob
            .post_form(&app, &format!("/todo/{}/{}", id, action), &[])
            .await;
        assert_eq!(resp.location.as_deref(), Some("/dashboard"));
        let page = bob.follow(&app, resp).await;
        assert_eq!(page.flash_messages(), vec!["Task not found."]);
    }
    let resp = bob
        .post_form(&app, &format!("/todo/{}/edit", id), &[("title", "mine now")])
        .await;
    let page = bob.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task not found."]);

    let task = db::todos::get_owned(&pool, id, 1)
        .await
        .unwrap()
        .expect("Ann's task should be untouched");
    assert_eq!(task.title, "Ann's task");
    assert!(!task.is_done);

    // Ids that never existed look the same.
    let resp = ann.post_form(&app, "/todo/9999/toggle", &[]).await;
    let page = ann.follow(&app, resp).await;
    assert_eq!(page.flash_messages(), vec!["Task not found."]);
}

#[actix_rt::test]
async fn test_task_routes_require_login() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = TestClient::new();
    client.get(&app, "/login").await;

    let resp = client
        .post_form(&app, "/dashboard", &[("title", "sneaky")])
        .await;
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.location.as_deref(), Some("/login?next=%2Fdashboard"));

    let resp = client.post_form(&app, "/todo/1/toggle", &[]).await;
    assert_eq!(
        resp.location.as_deref(),
        Some("/login?next=%2Ftodo%2F1%2Ftoggle")
    );
    assert_eq!(db::todos::count(&pool).await.unwrap(), 0);
}

#[actix_rt::test]
async fn test_create_without_csrf_token_is_rejected() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = logged_in(&app, "Ann", "ann@x.com").await;

    let resp = client
        .post_form_raw(&app, "/dashboard", &[("title", "Buy milk")])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"], "CSRF token missing or invalid.");

    let resp = client.get(&app, "/db-ping").await;
    assert_eq!(resp.json()["todos"], 0);
}

#[actix_rt::test]
async fn test_csrf_token_rotates_on_login() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = TestClient::new();
    client.register(&app, "Ann", "ann@x.com", "pw123456").await;
    let before = client.csrf_token.clone().unwrap();

    let resp = client.login(&app, "ann@x.com", "pw123456").await;
    let page = client.follow(&app, resp).await;
    let after = page.json()["csrf_token"].as_str().unwrap().to_string();
    assert_ne!(before, after);

    // The pre-login token no longer works.
    let title = "stale";
    let stale = before.as_str();
    let resp = client
        .post_form_raw(&app, "/dashboard", &[("title", title), ("csrf_token", stale)])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_deleting_a_user_removes_their_tasks() {
    let pool = test_pool().await;
    let app = test_app!(pool);
    let mut client = logged_in(&app, "Ann", "ann@x.com").await;
    let resp = client
        .post_form(&app, "/dashboard", &[("title", "Buy milk")])
        .await;
    client.follow(&app, resp).await;
    assert_eq!(db::todos::count(&pool).await.unwrap(), 1);

    sqlx::query("DELETE FROM users WHERE email = ?")
        .bind("ann@x.com")
        .execute(&pool)
        .await
        .unwrap();
    assert_eq!(db::todos::count(&pool).await.unwrap(), 0);
}
