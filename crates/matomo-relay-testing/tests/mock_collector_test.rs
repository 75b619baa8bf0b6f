use http::{Method, StatusCode};
use matomo_relay_testing::{MockCollector, MockCollectorError, MockResponse, RequestMatcher};
use std::time::Duration;

#[tokio::test]
async fn test_records_decoded_query() {
    let collector = MockCollector::start().await.unwrap();

    let resp = reqwest::get(format!(
        "{}?rec=1&url=http%3A%2F%2Fexample.com%2Fa%3Fb%3Dc&ua=curl%2F8.0",
        collector.tracking_url()
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let received = collector.received_requests();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method, Method::GET);
    assert_eq!(received[0].path, "/matomo.php");
    assert_eq!(received[0].query_param("rec"), Some("1"));
    assert_eq!(received[0].query_param("url"), Some("http://example.com/a?b=c"));
    assert_eq!(received[0].query_param("ua"), Some("curl/8.0"));
    assert_eq!(received[0].query_param("lang"), None);
}

#[tokio::test]
async fn test_expectation_response_and_verify() {
    let collector = MockCollector::start().await.unwrap();

    collector
        .expect(RequestMatcher::new().method(Method::GET).query_param("idsite", "7"))
        .respond_with(MockResponse::new().status(StatusCode::BAD_REQUEST).body("bad site"))
        .once();

    let resp = reqwest::get(format!("{}?idsite=7", collector.tracking_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.unwrap(), "bad site");

    let resp = reqwest::get(format!("{}?idsite=8", collector.tracking_url()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert_eq!(collector.unmatched_requests().len(), 1);
    assert_eq!(collector.received_requests().len(), 2);
    collector.verify();
}

#[tokio::test]
#[should_panic]
async fn test_verify_fails_on_missing_call() {
    let collector = MockCollector::start().await.unwrap();

    collector
        .expect(RequestMatcher::new().has_query_param("token_auth"))
        .times(2);

    reqwest::get(format!("{}?token_auth=x", collector.tracking_url()))
        .await
        .unwrap();

    collector.verify();
}

#[tokio::test]
async fn test_never_expectation() {
    let collector = MockCollector::start().await.unwrap();
    collector.expect(RequestMatcher::new().path("/forbidden")).never();

    reqwest::get(collector.tracking_url()).await.unwrap();

    collector.verify();
}

#[tokio::test]
async fn test_wait_for_detached_requests() {
    let collector = MockCollector::start().await.unwrap();
    let url = collector.tracking_url();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 0..3 {
            reqwest::get(format!("{}?n={}", url, i)).await.unwrap();
        }
    });

    let received = collector
        .wait_for_requests(3, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(received.len(), 3);
    assert_eq!(received[2].query_param("n"), Some("2"));
}

#[tokio::test]
async fn test_wait_times_out() {
    let collector = MockCollector::start().await.unwrap();

    let err = collector
        .wait_for_requests(1, Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MockCollectorError::Timeout {
            expected: 1,
            received: 0,
            ..
        }
    ));
}
