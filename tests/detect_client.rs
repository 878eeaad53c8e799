//! Exercises the HTTP detection client against a canned local server.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use sortcam::{Detector, HttpDetectionClient};

/// Accepts one connection, captures the full request, sends `response`.
fn serve_once(response: String) -> (SocketAddr, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let addr = listener.local_addr().expect("local addr");

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_request(&mut stream);
        stream.write_all(response.as_bytes()).expect("write response");
        stream.flush().expect("flush response");
        request
    });

    (addr, handle)
}

/// Reads headers plus a Content-Length body from the stream.
fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");

    let mut request = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut chunk).expect("read request");
        assert!(read > 0, "client closed before sending a full request");
        request.extend_from_slice(&chunk[..read]);
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&request[..header_end]).to_string();
    let content_length: usize = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .expect("request must carry Content-Length");

    while request.len() < header_end + content_length {
        let read = stream.read(&mut chunk).expect("read body");
        assert!(read > 0, "client closed mid-body");
        request.extend_from_slice(&chunk[..read]);
    }
    request
}

fn json_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

#[test]
fn submits_multipart_and_parses_detections() {
    let body = r#"{"detections":[{"x":100.0,"y":50.0,"width":50.0,"height":50.0,"label":"recyclable","confidence":0.92}]}"#;
    let (addr, server) = serve_once(json_response(body));

    let client = HttpDetectionClient::new(
        &format!("http://{}/predict", addr),
        Duration::from_secs(5),
    )
    .expect("client");

    let jpeg = [0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9];
    let batch = client.submit(&jpeg).expect("submit");

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.detections()[0].label, "recyclable");
    assert_eq!(batch.detections()[0].confidence, 0.92);

    let request = server.join().expect("server thread");
    let text = String::from_utf8_lossy(&request);
    assert!(text.starts_with("POST /predict HTTP/1.1\r\n"));
    assert!(text.contains("multipart/form-data; boundary="));
    assert!(text.contains("Content-Disposition: form-data; name=\"image\"; filename=\"frame.jpg\""));
    assert!(
        request.windows(jpeg.len()).any(|w| w == jpeg),
        "request body must carry the jpeg payload verbatim"
    );
}

#[test]
fn malformed_response_body_is_an_empty_batch() {
    let (addr, server) = serve_once(json_response("<html>not json</html>"));

    let client = HttpDetectionClient::new(
        &format!("http://{}/predict", addr),
        Duration::from_secs(5),
    )
    .expect("client");

    let batch = client.submit(&[0xFF, 0xD8]).expect("submit succeeds");
    assert!(batch.is_empty());
    server.join().expect("server thread");
}

#[test]
fn absent_detections_field_is_an_empty_batch() {
    let (addr, server) = serve_once(json_response(r#"{"status":"idle"}"#));

    let client = HttpDetectionClient::new(
        &format!("http://{}/predict", addr),
        Duration::from_secs(5),
    )
    .expect("client");

    assert!(client.submit(&[0xFF, 0xD8]).expect("submit").is_empty());
    server.join().expect("server thread");
}

#[test]
fn non_2xx_status_is_an_error() {
    let (addr, server) = serve_once(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string(),
    );

    let client = HttpDetectionClient::new(
        &format!("http://{}/predict", addr),
        Duration::from_secs(5),
    )
    .expect("client");

    assert!(client.submit(&[0xFF, 0xD8]).is_err());
    server.join().expect("server thread");
}

#[test]
fn connection_refused_is_an_error_not_a_panic() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr")
    };

    let client = HttpDetectionClient::new(
        &format!("http://{}/predict", addr),
        Duration::from_secs(1),
    )
    .expect("client");

    assert!(client.submit(&[0xFF, 0xD8]).is_err());
}
