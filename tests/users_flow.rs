mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{acquire_db_lock, json_body, TestApp};
use loan_origination::domain::Role;
use loan_origination::seed::{self, SeedError, SeedSummary};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn admins_list_and_edit_accounts() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (customer_id, customer) = app.user_with_token("rina@example.com", Role::Customer).await?;
    let (_, admin) = app.user_with_token("admin@example.com", Role::Admin).await?;

    let response = app.get("/api/users", Some(&customer)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.get("/api/users", Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert!(body["data"][0].get("password_hash").is_none());

    let path = format!("/api/users/{customer_id}");
    let response = app.get(&path, Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["email"], "rina@example.com");

    let response = app
        .get(&format!("/api/users/{}", Uuid::new_v4()), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.put_json(&path, &json!({ "role": "agent" }), Some(&customer)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.put_json(&path, &json!({ "role": "agent" }), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["role"], "AGENT");
    let code = body["data"]["agent_code"].as_str().unwrap_or_default().to_string();
    assert!(code.starts_with("AG-"), "unexpected agent code {code}");

    let response = app
        .put_json(&path, &json!({ "name": "Rina W.", "phone": "0812" }), Some(&admin))
        .await?;
    let body = json_body(response).await?;
    assert_eq!(body["data"]["agent_code"], code.as_str());
    assert_eq!(body["data"]["name"], "Rina W.");
    assert_eq!(body["data"]["phone"], "0812");

    let response = app
        .put_json(
            &path,
            &json!({ "role": "customer", "phone": "", "email": "Rina.W@Example.com" }),
            Some(&admin),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["data"]["role"], "CUSTOMER");
    assert!(body["data"]["agent_code"].is_null());
    assert!(body["data"]["phone"].is_null());
    assert_eq!(body["data"]["email"], "rina.w@example.com");

    for payload in [
        json!({ "name": "  " }),
        json!({ "role": "ROOT" }),
        json!({ "email": "not-an-email" }),
    ] {
        let response = app.put_json(&path, &payload, Some(&admin)).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
    }

    let response = app
        .put_json(&path, &json!({ "email": "admin@example.com" }), Some(&admin))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "email already in use");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn accounts_with_history_cannot_be_deleted() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let (owner_id, owner) = app.user_with_token("rina@example.com", Role::Customer).await?;
    let (idle_id, _) = app.user_with_token("joko@example.com", Role::Customer).await?;
    let (admin_id, admin) = app.user_with_token("admin@example.com", Role::Admin).await?;

    app.submit_application(&owner).await?;

    let response = app.delete(&format!("/api/users/{owner_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await?;
    assert_eq!(
        body["message"],
        "user still owns credit applications or status history"
    );

    let response = app.delete(&format!("/api/users/{admin_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.delete(&format!("/api/users/{idle_id}"), Some(&owner)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.delete(&format!("/api/users/{idle_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get(&format!("/api/users/{idle_id}"), Some(&admin)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn seeding_fills_an_empty_database_once() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let issuer = app.state.display_codes.clone();
    let clock = app.clock.clone();
    let summary = app
        .with_conn(move |conn| {
            seed::seed_demo_data(conn, &issuer, clock.as_ref(), seed::DEFAULT_PASSWORD)
                .context("seeding failed")
        })
        .await?;
    assert_eq!(
        summary,
        SeedSummary {
            users: 4,
            applications: 3,
            statuses: 6,
        }
    );

    let admin = app.login_token("admin@example.com", seed::DEFAULT_PASSWORD).await?;
    app.login_token("agent@example.com", seed::DEFAULT_PASSWORD).await?;

    let response = app.get("/api/applications", Some(&admin)).await?;
    let body = json_body(response).await?;
    let mut statuses: Vec<String> = body["data"]
        .as_array()
        .context("applications list")?
        .iter()
        .filter_map(|application| application["current_status"].as_str().map(str::to_string))
        .collect();
    statuses.sort();
    assert_eq!(statuses, ["APPROVED", "IN_REVIEW", "REJECTED"]);

    let response = app.get("/api/statuses", Some(&admin)).await?;
    let body = json_body(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(6));

    let response = app.get("/api/sla", Some(&admin)).await?;
    let body = json_body(response).await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    let response = app.get("/api/users", Some(&admin)).await?;
    let body = json_body(response).await?;
    let agent = body["data"]
        .as_array()
        .context("users list")?
        .iter()
        .find(|user| user["role"] == "AGENT")
        .context("seeded agent")?;
    assert!(agent["agent_code"]
        .as_str()
        .is_some_and(|code| code.starts_with("AG-")));

    let issuer = app.state.display_codes.clone();
    let clock = app.clock.clone();
    let again = app
        .with_conn(move |conn| {
            Ok(seed::seed_demo_data(
                conn,
                &issuer,
                clock.as_ref(),
                seed::DEFAULT_PASSWORD,
            ))
        })
        .await?;
    assert!(matches!(again, Err(SeedError::NotEmpty(4))));

    app.cleanup().await?;
    Ok(())
}
