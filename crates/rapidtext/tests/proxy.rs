//! Relay endpoint tests over real sockets

mod common;

use common::{closed_port, pdf_with_pages, spawn_gateway};
use rapidtext::{ProxyGateway, DEFAULT_USER_AGENT};
use std::net::SocketAddr;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway_for(domain: &str, upstream: SocketAddr) -> SocketAddr {
    let gateway = ProxyGateway::builder()
        .resolve(domain, upstream)
        .build()
        .unwrap();
    spawn_gateway(gateway).await
}

fn relay_url(gateway: SocketAddr, target: &str) -> String {
    let query: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("url", target)
        .finish();
    format!("http://{gateway}/api/proxy?{query}")
}

#[tokio::test]
async fn test_success_streams_body_with_safe_headers() {
    let mock_server = MockServer::start().await;
    let pdf = pdf_with_pages(&["Relayed"]);

    Mock::given(method("GET"))
        .and(path("/files/report.pdf"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(pdf.clone(), "application/pdf")
                .insert_header("content-disposition", "attachment; filename=\"report.pdf\"")
                .insert_header("set-cookie", "session=secret")
                .insert_header("x-upstream-secret", "1"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let target = format!(
        "http://files.public.test:{}/files/report.pdf",
        mock_server.address().port()
    );

    let response = reqwest::get(relay_url(gateway, &target)).await.unwrap();
    assert_eq!(response.status(), 200);

    let headers = response.headers();
    assert_eq!(headers["content-type"], "application/pdf");
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=\"report.pdf\""
    );
    assert_eq!(headers["cache-control"], "no-store");
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.get("set-cookie").is_none());
    assert!(headers.get("x-upstream-secret").is_none());

    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], &pdf[..]);
}

#[tokio::test]
async fn test_upstream_status_passed_through() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("upstream page"))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let target = format!("http://files.public.test:{}/missing", mock_server.address().port());

    let response = reqwest::get(relay_url(gateway, &target)).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "Upstream HTTP 404 Not Found");
}

#[tokio::test]
async fn test_upstream_reason_is_canonical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unusual"))
        .respond_with(ResponseTemplate::new(599).set_body_string("origin overloaded"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hotlink"))
        .respond_with(ResponseTemplate::new(403).set_body_string("hotlinking not allowed"))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let port = mock_server.address().port();

    let response = reqwest::get(relay_url(
        gateway,
        &format!("http://files.public.test:{port}/unusual"),
    ))
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 599);
    assert_eq!(response.text().await.unwrap(), "Upstream HTTP 599");

    let response = reqwest::get(relay_url(
        gateway,
        &format!("http://files.public.test:{port}/hotlink"),
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(response.text().await.unwrap(), "Upstream HTTP 403 Forbidden");
}

#[tokio::test]
async fn test_head_refused_without_upstream_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("large file"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let target = format!("http://files.public.test:{}/big", mock_server.address().port());

    let response = reqwest::Client::new()
        .head(relay_url(gateway, &target))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
    assert_eq!(response.headers()["allow"], "GET");
}

#[tokio::test]
async fn test_redirect_to_blocked_host_refused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header(
                "location",
                format!("http://127.0.0.1:{}/secret", mock_server.address().port()).as_str(),
            ),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("metadata"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let target = format!("http://files.public.test:{}/start", mock_server.address().port());

    let response = reqwest::get(relay_url(gateway, &target)).await.unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(response.text().await.unwrap(), "Blocked host");
}

#[tokio::test]
async fn test_redirect_to_public_host_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header(
            "location",
            format!("http://files.public.test:{}/new", mock_server.address().port()).as_str(),
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("moved text", "text/plain"))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for("files.public.test", *mock_server.address()).await;
    let target = format!("http://files.public.test:{}/old", mock_server.address().port());

    let response = reqwest::get(relay_url(gateway, &target)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "moved text");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let down = closed_port();
    let gateway = gateway_for("down.public.test", down).await;
    let target = format!("http://down.public.test:{}/", down.port());

    let response = reqwest::get(relay_url(gateway, &target)).await.unwrap();
    assert_eq!(response.status(), 502);
    assert!(!response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_literal_private_targets_refused() {
    let gateway = spawn_gateway(ProxyGateway::new().unwrap()).await;

    for target in [
        "http://localhost/",
        "http://127.0.0.1:8080/",
        "http://169.254.169.254/latest/meta-data/",
        "http://[::1]/",
        "http://10.0.0.5/admin",
    ] {
        let response = reqwest::get(relay_url(gateway, target)).await.unwrap();
        assert_eq!(response.status(), 403, "{target}");
        assert_eq!(response.text().await.unwrap(), "Blocked host");
    }
}

#[tokio::test]
async fn test_missing_url_parameter() {
    let gateway = spawn_gateway(ProxyGateway::new().unwrap()).await;

    let response = reqwest::get(format!("http://{gateway}/api/proxy"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.text().await.unwrap(),
        "Missing 'url' query parameter"
    );
}
