mod common;

use std::time::Duration;

use common::{callback_url, http_client};
use reqwest::StatusCode;
use spotmood::{server::RedirectListener, types::PendingCode};

const CALLBACK: &str = "/callback";

async fn start() -> spotmood::server::ListenerHandle {
    RedirectListener::start("127.0.0.1:0".parse().unwrap(), CALLBACK)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_code_with_trailing_parameters_is_captured() {
    let mut listener = start().await;
    let url = callback_url(listener.local_addr(), CALLBACK, "code=ABC123&state=xyz");

    let res = http_client().get(url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let outcome = listener.await_result(Duration::from_secs(2)).await;
    assert_eq!(outcome, PendingCode::Code("ABC123".into()));
    listener.stop().await;
}

#[tokio::test]
async fn test_only_first_callback_resolves() {
    let mut listener = start().await;
    let addr = listener.local_addr();
    let client = http_client();

    let first = client
        .get(callback_url(addr, CALLBACK, "code=FIRST"))
        .send()
        .await
        .unwrap();
    let second = client
        .get(callback_url(addr, CALLBACK, "code=SECOND"))
        .send()
        .await
        .unwrap();
    let denied = client
        .get(callback_url(addr, CALLBACK, "error=access_denied"))
        .send()
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::GONE);
    assert_eq!(denied.status(), StatusCode::GONE);
    assert_eq!(
        listener.await_result(Duration::from_secs(2)).await,
        PendingCode::Code("FIRST".into())
    );
    listener.stop().await;
}

#[tokio::test]
async fn test_missing_code_is_a_denial() {
    let mut listener = start().await;
    let url = callback_url(listener.local_addr(), CALLBACK, "error=access_denied&state=xyz");

    let res = http_client().get(url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        listener.await_result(Duration::from_secs(2)).await,
        PendingCode::Denied("access_denied".into())
    );
    listener.stop().await;
}

#[tokio::test]
async fn test_bare_callback_is_a_denial() {
    let mut listener = start().await;
    let url = format!("http://{}{}", listener.local_addr(), CALLBACK);

    let res = http_client().get(url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        listener.await_result(Duration::from_secs(2)).await,
        PendingCode::Denied("missing authorization code".into())
    );
    listener.stop().await;
}

#[tokio::test]
async fn test_other_paths_do_not_resolve() {
    let mut listener = start().await;
    let addr = listener.local_addr();
    let client = http_client();

    let favicon = client
        .get(format!("http://{addr}/favicon.ico"))
        .send()
        .await
        .unwrap();
    assert_eq!(favicon.status(), StatusCode::NOT_FOUND);

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let body: serde_json::Value = health.json().await.unwrap();
    assert_eq!(body["service"], "spotmood");

    assert_eq!(
        listener.await_result(Duration::from_millis(200)).await,
        PendingCode::TimedOut
    );
    listener.stop().await;
}

#[tokio::test]
async fn test_wait_is_bounded() {
    let mut listener = start().await;
    assert_eq!(
        listener.await_result(Duration::from_millis(100)).await,
        PendingCode::TimedOut
    );
    // The mailbox is read once.
    assert_eq!(
        listener.await_result(Duration::from_millis(100)).await,
        PendingCode::ListenerClosed
    );
    listener.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent_and_releases_port() {
    let mut listener = start().await;
    let addr = listener.local_addr();

    listener.stop().await;
    listener.stop().await;

    let mut again = RedirectListener::start(addr, CALLBACK).await.unwrap();
    assert_eq!(again.local_addr(), addr);
    again.stop().await;
}

#[tokio::test]
async fn test_second_bind_on_busy_port_is_rejected() {
    let mut listener = start().await;

    let err = RedirectListener::start(listener.local_addr(), CALLBACK)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        spotmood::error::AuthError::ListenerUnavailable(_)
    ));
    listener.stop().await;
}

#[tokio::test]
async fn test_listeners_do_not_share_mailboxes() {
    let mut first = start().await;
    let mut second = start().await;

    http_client()
        .get(callback_url(first.local_addr(), CALLBACK, "code=ONE"))
        .send()
        .await
        .unwrap();

    assert_eq!(
        first.await_result(Duration::from_secs(2)).await,
        PendingCode::Code("ONE".into())
    );
    assert_eq!(
        second.await_result(Duration::from_millis(100)).await,
        PendingCode::TimedOut
    );
    first.stop().await;
    second.stop().await;
}

#[tokio::test]
async fn test_relative_path_is_rejected() {
    let err = RedirectListener::start("127.0.0.1:0".parse().unwrap(), "callback")
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        spotmood::error::AuthError::InvalidConfiguration(_)
    ));
}

#[tokio::test]
async fn test_parameter_like_path_is_rejected() {
    for path in ["/:cb", "/auth/*rest", "/{cb}"] {
        let err = RedirectListener::start("127.0.0.1:0".parse().unwrap(), path)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            spotmood::error::AuthError::InvalidConfiguration(_)
        ));
    }
}
