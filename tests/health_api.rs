use actix_web::{App, test, web};
use serde_json::Value;

use youtube_uploader::config::Config;
use youtube_uploader::configure_routes;

#[actix_web::test]
async fn health_reports_ok_with_epoch_millis() {
    let config = web::Data::new(Config::default());
    let app = test::init_service(
        App::new()
            .app_data(config.clone())
            .configure(configure_routes),
    )
    .await;

    let before = chrono::Utc::now().timestamp_millis();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    let timestamp = body["timestamp"].as_i64().expect("numeric timestamp");
    assert!(timestamp >= before);
}
