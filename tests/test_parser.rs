use live_rocket::config::Limits;
use live_rocket::http::parser::{ParseError, decode, parse_http_request};
use live_rocket::http::request::{Method, Version};
use live_rocket::StatusCode;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = decode(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, Version::Http11);
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = decode(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(parsed.headers.get("User-Agent").unwrap(), "test-client");
    assert_eq!(parsed.headers.get("Accept").unwrap(), "*/*");
}

#[test]
fn test_parse_repeated_headers_accumulate() {
    let req = b"GET / HTTP/1.1\r\nX-Tag: a\r\nx-tag: b\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    let tags: Vec<&str> = parsed.headers.get_all("X-TAG").collect();
    assert_eq!(tags, vec!["a", "b"]);
}

#[test]
fn test_parse_splits_query_string() {
    let req = b"GET /search?q=rust&tag=a&tag=b HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.path, "/search");
    assert_eq!(parsed.query.get("q"), Some("rust"));
    assert_eq!(parsed.query.get_all("tag"), ["a".to_string(), "b".to_string()]);
}

#[test]
fn test_parse_percent_decodes_path() {
    let req = b"GET /files/my%20notes.txt HTTP/1.1\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.path, "/files/my notes.txt");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = decode(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let result = decode(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"INVALID / HTTP/1.1\r\n\r\n";
    let result = decode(req);

    assert!(matches!(result, Err(ParseError::InvalidMethod)));
}

#[test]
fn test_parse_missing_version_is_malformed() {
    let req = b"GET /\r\nHost: example.com\r\n\r\n";
    let err = decode(req).unwrap_err();

    assert_eq!(err, ParseError::InvalidRequest);
    assert_eq!(err.status(), StatusCode::BadRequest);
}

#[test]
fn test_parse_rejects_unknown_version() {
    let req = b"GET / HTTP/2.0\r\n\r\n";
    assert_eq!(decode(req).unwrap_err(), ParseError::InvalidVersion);
}

#[test]
fn test_parse_rejects_relative_path() {
    let req = b"GET index.html HTTP/1.1\r\n\r\n";
    assert_eq!(decode(req).unwrap_err(), ParseError::InvalidPath);
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    let result = decode(req);

    assert!(matches!(result, Err(ParseError::InvalidHeader)));
}

#[test]
fn test_parse_conflicting_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 3\r\nContent-Length: 4\r\n\r\nabcd";
    assert_eq!(decode(req).unwrap_err(), ParseError::InvalidContentLength);
}

#[test]
fn test_parse_chunked_wins_over_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 100\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n";
    let (parsed, consumed) = decode(req).unwrap();

    assert_eq!(parsed.body, b"abc".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = decode(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_http10() {
    let req = b"GET / HTTP/1.0\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.version, Version::Http10);
    assert!(!parsed.keep_alive());
}

#[test]
fn test_parse_request_with_empty_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.body.len(), 0);
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = decode(req).unwrap();

    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_parse_header_lookup_is_case_insensitive() {
    let req = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    let (parsed, _) = decode(req).unwrap();

    assert!(parsed.headers.contains("content-type"));
    assert_eq!(parsed.header("CONTENT-TYPE"), Some("application/json"));
}

#[test]
fn test_parse_pipelined_requests_consume_one_at_a_time() {
    let req = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let (first, consumed) = decode(req).unwrap();
    let (second, rest) = decode(&req[consumed..]).unwrap();

    assert_eq!(first.path, "/a");
    assert_eq!(second.path, "/b");
    assert_eq!(consumed + rest, req.len());
}

#[test]
fn test_parse_oversized_headers() {
    let limits = Limits {
        max_header_bytes: 64,
        max_body_bytes: 1024,
    };
    let req = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "x".repeat(200));
    let err = parse_http_request(req.as_bytes(), &limits).unwrap_err();

    assert_eq!(err, ParseError::HeadersTooLarge);
    assert_eq!(err.status(), StatusCode::RequestHeaderFieldsTooLarge);
}
