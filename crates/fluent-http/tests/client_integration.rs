//! Integration tests against a local wiremock server

use bytes::Bytes;
use fluent_http::{
    middleware_fn, BasicAuth, Client, HttpClientConfig, HttpError, HttpErrorCategory,
    HttpMethod, Logging, Middleware, RedirectPolicy,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Client {
    Client::new(HttpClientConfig::default()).unwrap()
}

#[tokio::test]
async fn test_post_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .and(header(
            "content-type",
            "application/x-www-form-urlencoded;charset=UTF-8",
        ))
        .and(body_string("address=unknown&name=peter"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let response = fluent_http::post(&format!("{}/post", server.uri()))
        .form([("name", "peter"), ("address", "unknown")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.text().unwrap(), "ok");
    assert_eq!(response.request.method, HttpMethod::Post);
}

#[tokio::test]
async fn test_post_file_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("a.txt");
    std::fs::File::create(&file_path)
        .unwrap()
        .write_all(b"line one\nline two\n")
        .unwrap();

    let response = client()
        .post(&format!("{}/upload", server.uri()))
        .file("file", &file_path)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code, 201);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let content_type = received[0].headers["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let boundary = multer::parse_boundary(&content_type).unwrap();
    let body = Bytes::from(received[0].body.clone());
    let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let field = multipart.next_field().await.unwrap().unwrap();
    assert_eq!(field.name(), Some("file"));
    assert_eq!(field.file_name(), Some("a.txt"));
    assert_eq!(
        field.bytes().await.unwrap(),
        Bytes::from_static(b"line one\nline two\n")
    );
    assert!(multipart.next_field().await.unwrap().is_none());
}

#[tokio::test]
async fn test_json_body_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/1"))
        .and(header("content-type", "application/json;charset=UTF-8"))
        .and(body_string(r#"{"name":"Alice"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"id":1,"name":"Alice"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let response = client()
        .put(&format!("{}/users/1", server.uri()))
        .json(r#"{"name":"Alice"}"#)
        .send()
        .await
        .unwrap();

    assert!(response.is_json());
    let json = response.json().unwrap();
    assert_eq!(json["id"], 1);
}

#[tokio::test]
async fn test_query_is_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("lang", "en"))
        .and(query_param("q", "a b&c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = client()
        .get(&format!("{}/search?lang=en", server.uri()))
        .query("q", "a b&c")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_set_and_add_headers_reach_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    client()
        .get(&server.uri())
        .set_header("x-single", "one")
        .set_header("x-single", "two")
        .add_header("x-multi", "one")
        .add_header("x-multi", "two")
        .send()
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let headers = &received[0].headers;
    let single: Vec<_> = headers.get_all("x-single").iter().collect();
    let multi: Vec<_> = headers.get_all("x-multi").iter().collect();
    assert_eq!(single, vec!["two"]);
    assert_eq!(multi, vec!["one", "two"]);
}

#[tokio::test]
async fn test_empty_body_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "text/plain;charset=UTF-8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client()
        .post(&server.uri())
        .text("")
        .send()
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert!(received[0].body.is_empty());
}

#[tokio::test]
async fn test_timeout_against_slow_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let started = Instant::now();
    let failure = client()
        .get(&format!("{}/slow", server.uri()))
        .timeout(Duration::from_secs(1))
        .send()
        .await
        .unwrap_err();

    assert!(started.elapsed() <= Duration::from_millis(1500));
    assert_eq!(failure.error.category(), HttpErrorCategory::Timeout);
    assert!(failure.response.request.url.ends_with("/slow"));
    assert!(failure.response.body.is_empty());
}

#[tokio::test]
async fn test_redirect_loop_stops_at_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let failure = client()
        .get(&format!("{}/loop", server.uri()))
        .send()
        .await
        .unwrap_err();

    assert_eq!(failure.error.category(), HttpErrorCategory::Redirect);
    assert!(matches!(failure.error, HttpError::Redirect(ref msg) if msg.contains("10 redirects")));

    // the original request plus ten followed redirects
    let hops = server.received_requests().await.unwrap().len();
    assert_eq!(hops, 11);
}

#[tokio::test]
async fn test_redirects_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;

    let client =
        Client::new(HttpClientConfig::new().redirect_policy(RedirectPolicy::Reject)).unwrap();
    let failure = client
        .get(&format!("{}/old", server.uri()))
        .send()
        .await
        .unwrap_err();
    assert_eq!(failure.error.category(), HttpErrorCategory::Redirect);

    let client =
        Client::new(HttpClientConfig::new().redirect_policy(RedirectPolicy::Stop)).unwrap();
    let response = client
        .get(&format!("{}/old", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code, 301);
    assert_eq!(response.header("location"), Some("/new"));
}

#[tokio::test]
async fn test_body_replayed_on_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(307).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/new"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = client()
        .post(&format!("{}/old", server.uri()))
        .text("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
    assert!(response.url.ends_with("/new"));
}

#[tokio::test]
async fn test_cookies_persist_on_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = client();
    session
        .get(&format!("{}/login", server.uri()))
        .send()
        .await
        .unwrap();
    let response = session
        .get(&format!("{}/me", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);

    let stranger = client()
        .get(&format!("{}/me", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status_code, 401);
}

#[tokio::test]
async fn test_manual_cookie_merges_with_jar() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let session = client();
    session
        .get(&format!("{}/login", server.uri()))
        .send()
        .await
        .unwrap();
    session
        .get(&format!("{}/me", server.uri()))
        .add_cookie("theme", "dark")
        .send()
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let me = received
        .iter()
        .find(|request| request.url.path() == "/me")
        .unwrap();
    let cookies: Vec<_> = me
        .headers
        .get_all("cookie")
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies, vec!["theme=dark; session=abc"]);
}

#[tokio::test]
async fn test_cookie_set_on_redirect_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("set-cookie", "session=abc; Path=/")
                .insert_header("location", "/home"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/home"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&server)
        .await;

    let response = client()
        .get(&format!("{}/login", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().unwrap(), "welcome");
}

#[tokio::test]
async fn test_middleware_sees_every_redirect_hop() {
    let origin = MockServer::start().await;
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/end", target.uri())),
        )
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&target)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = seen.clone();
        middleware_fn(move |request, next| {
            seen.lock().unwrap().push(request.url().path().to_string());
            Box::pin(async move { next.round_trip(request).await })
        })
    };
    let middlewares: Vec<Arc<dyn Middleware>> =
        vec![Arc::new(BasicAuth::new("user", "pass").unwrap()), recorder];
    let client = Client::with_middlewares(HttpClientConfig::default(), middlewares).unwrap();

    let response = client
        .get(&format!("{}/start", origin.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.text().unwrap(), "done");
    assert!(response.url.ends_with("/end"));
    assert_eq!(*seen.lock().unwrap(), vec!["/start", "/end"]);
}

#[tokio::test]
async fn test_connection_failure_keeps_request() {
    let failure = client()
        .get("http://127.0.0.1:1/unreachable")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap_err();

    assert_eq!(failure.error.category(), HttpErrorCategory::Connection);
    assert_eq!(failure.response.request.url, "http://127.0.0.1:1/unreachable");
    assert!(!failure.response.is_received());
}

#[tokio::test]
async fn test_oversized_response_headers_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-big", "a".repeat(6 * 1024)))
        .mount(&server)
        .await;

    let failure = client().get(&server.uri()).send().await.unwrap_err();
    assert!(matches!(failure.error, HttpError::ResponseError(_)));
}

#[tokio::test]
async fn test_middlewares_wrap_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::with_middlewares(
        HttpClientConfig::default(),
        vec![
            Arc::new(BasicAuth::new("user", "pass").unwrap()),
            Arc::new(Logging::new()),
        ],
    )
    .unwrap();

    let response = client
        .get(&format!("{}/private", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().unwrap(), "secret");
}

#[tokio::test]
async fn test_spawn_get_delivers_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("async"))
        .mount(&server)
        .await;

    let receiver = client().spawn_get(&server.uri());
    let response = receiver.await.unwrap().unwrap();
    assert_eq!(response.text().unwrap(), "async");
}

#[tokio::test]
async fn test_callback_post_processes_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let failure = client()
        .delete(&format!("{}/items/9", server.uri()))
        .on_complete(|outcome| {
            outcome.and_then(|response| {
                if response.is_success() {
                    Ok(response)
                } else {
                    let error =
                        HttpError::ResponseError(format!("unexpected status {}", response.status_code));
                    Err(fluent_http::SendFailure::new(error, response))
                }
            })
        })
        .send()
        .await
        .unwrap_err();

    assert_eq!(failure.response.status_code, 404);
    assert!(failure.error.to_string().contains("unexpected status 404"));
}
