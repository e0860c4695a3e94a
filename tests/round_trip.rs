// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives an upload and a download through the full stack against a local
//! HTTP server, verifying the bytes and the content hashes round-trip.

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use gcs_client::hash_validator::HashValidator;
use gcs_client::http_client::HttpClient;
use gcs_client::object_read_stream::ObjectReadStream;
use gcs_client::object_write_stream::ObjectWriteStream;
use gcs_client::options::ClientOptions;
use gcs_client::request::{ReadObjectRangeRequest, ResumableUploadRequest, UploadChunkRequest};
use gcs_client::retry_resumable_upload_session::RetryResumableUploadSession;
use httptest::{Expectation, Server, matchers::*, responders::status_code};
use std::io::{Read, Write};

const QUANTUM: usize = UploadChunkRequest::CHUNK_SIZE_QUANTUM;

fn test_payload() -> Vec<u8> {
    (0..QUANTUM + 100).map(|i| (i % 251) as u8).collect()
}

fn crc32c_b64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(crc32c::crc32c(data).to_be_bytes())
}

fn md5_b64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(md5::compute(data).0)
}

fn test_client(server: &Server) -> HttpClient {
    let options = ClientOptions::new().with_endpoint(format!("http://{}", server.addr()));
    HttpClient::new(options).expect("client creation succeeds")
}

#[test]
fn upload_then_download_round_trips() -> anyhow::Result<()> {
    let payload = test_payload();
    let object_metadata = serde_json::json!({
        "name": "round-trip",
        "bucket": "test-bucket",
        "size": payload.len().to_string(),
        "crc32c": crc32c_b64(&payload),
        "md5Hash": md5_b64(&payload),
    })
    .to_string();

    let server = Server::run();
    let session_path = "/upload/session/round-trip-1";
    let session_url = server.url(session_path).to_string();

    server.expect(
        Expectation::matching(all_of![
            request::method_path("POST", "/upload/storage/v1/b/test-bucket/o"),
            request::query(url_decoded(contains(("uploadType", "resumable")))),
            request::query(url_decoded(contains(("name", "round-trip")))),
        ])
        .respond_with(status_code(200).append_header("location", session_url)),
    );
    // One full quantum, committed on the first attempt.
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", session_path),
            request::headers(contains((
                "content-range",
                format!("bytes 0-{}/*", QUANTUM - 1)
            ))),
        ])
        .respond_with(status_code(308).append_header("range", format!("bytes=0-{}", QUANTUM - 1))),
    );
    // The 100-byte residual finalizes the object.
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", session_path),
            request::headers(contains((
                "content-range",
                format!("bytes {}-{}/{}", QUANTUM, QUANTUM + 99, QUANTUM + 100)
            ))),
        ])
        .respond_with(
            status_code(200)
                .append_header("content-type", "application/json")
                .body(object_metadata),
        ),
    );

    let client = test_client(&server);
    let retry = client.options().default_retry_policy();
    let backoff = client.options().default_backoff_policy();
    let request = ResumableUploadRequest::new("test-bucket", "round-trip");
    let session = client.create_resumable_session(&request)?;
    let session = Box::new(RetryResumableUploadSession::new(session, retry, backoff));

    let mut stream = ObjectWriteStream::new(session, QUANTUM, HashValidator::new_composite())?;
    stream.write_all(&payload)?;
    let response = stream.close()?;
    assert_eq!(
        response.upload_state,
        gcs_client::resumable_upload_session::UploadState::Done
    );
    assert_eq!(stream.received_hash(), stream.computed_hash());

    // Download the object back and compare.
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/storage/v1/b/test-bucket/o/round-trip"),
            request::query(url_decoded(contains(("alt", "media")))),
        ])
        .respond_with(
            status_code(200)
                .append_header(
                    "x-goog-hash",
                    format!(
                        "crc32c={},md5={}",
                        crc32c_b64(&payload),
                        md5_b64(&payload)
                    ),
                )
                .body(payload.clone()),
        ),
    );

    let read_request = ReadObjectRangeRequest::new("test-bucket", "round-trip");
    let source = client.read_object(&read_request)?;
    let mut stream = ObjectReadStream::new(&read_request, Box::new(source));
    let mut downloaded = Vec::new();
    stream.read_to_end(&mut downloaded)?;
    stream.close();

    assert_eq!(downloaded, payload);
    assert!(stream.status().is_ok(), "{:?}", stream.status());
    assert_eq!(stream.received_hash(), stream.computed_hash());
    Ok(())
}

#[test]
fn upload_recovers_from_a_transient_fault() -> anyhow::Result<()> {
    let payload = test_payload();
    let object_metadata = serde_json::json!({
        "name": "recovered",
        "bucket": "test-bucket",
        "crc32c": crc32c_b64(&payload),
        "md5Hash": md5_b64(&payload),
    })
    .to_string();

    let server = Server::run();
    let session_path = "/upload/session/recovered-1";
    let session_url = server.url(session_path).to_string();

    server.expect(
        Expectation::matching(request::method_path(
            "POST",
            "/upload/storage/v1/b/test-bucket/o",
        ))
        .respond_with(status_code(200).append_header("location", session_url)),
    );
    // The first attempt at the chunk fails with a retryable error; after the
    // session reset reports nothing committed, the same chunk is re-sent.
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", session_path),
            request::headers(contains((
                "content-range",
                format!("bytes 0-{}/*", QUANTUM - 1)
            ))),
        ])
        .times(2)
        .respond_with(httptest::responders::cycle![
            status_code(503).body("service unavailable"),
            status_code(308).append_header("range", format!("bytes=0-{}", QUANTUM - 1)),
        ]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", session_path),
            request::headers(contains(("content-range", "bytes */*"))),
        ])
        .times(1)
        .respond_with(status_code(308)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("PUT", session_path),
            request::headers(contains((
                "content-range",
                format!("bytes {}-{}/{}", QUANTUM, QUANTUM + 99, QUANTUM + 100)
            ))),
        ])
        .respond_with(
            status_code(200)
                .append_header("content-type", "application/json")
                .body(object_metadata),
        ),
    );

    let client = test_client(&server);
    let retry = client.options().default_retry_policy();
    let backoff = client.options().default_backoff_policy();
    let request = ResumableUploadRequest::new("test-bucket", "recovered");
    let session = client.create_resumable_session(&request)?;
    let session = Box::new(RetryResumableUploadSession::new(session, retry, backoff));

    let mut stream = ObjectWriteStream::new(session, QUANTUM, HashValidator::new_composite())?;
    stream.write_all(&payload)?;
    let response = stream.close()?;
    assert_eq!(
        response.upload_state,
        gcs_client::resumable_upload_session::UploadState::Done
    );
    assert_eq!(stream.received_hash(), stream.computed_hash());
    Ok(())
}
