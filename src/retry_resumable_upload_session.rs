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

//! A decorator to retry a resumable upload session across transient faults.

use crate::backoff_policy::BackoffPolicy;
use crate::resumable_upload_session::{ResumableUploadResponse, ResumableUploadSession};
use crate::retry_policy::RetryPolicy;
use crate::{Error, Result};
use bytes::Bytes;

/// Decorates a [ResumableUploadSession] with retry and backoff policies.
///
/// On a transient failure the decorator resets the inner session to learn
/// the commit frontier, trims any prefix the server already committed from
/// the payload, and retries. Chunk attempts and reset attempts draw from a
/// single budget, owned by this object for the lifetime of the session.
pub struct RetryResumableUploadSession {
    session: Box<dyn ResumableUploadSession>,
    retry_policy: Box<dyn RetryPolicy>,
    backoff_policy: Box<dyn BackoffPolicy>,
}

impl RetryResumableUploadSession {
    pub fn new(
        session: Box<dyn ResumableUploadSession>,
        retry_policy: Box<dyn RetryPolicy>,
        backoff_policy: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            session,
            retry_policy,
            backoff_policy,
        }
    }

    /// The shared retry loop for intermediate and final chunks.
    ///
    /// `upload_size` is `None` for intermediate chunks.
    fn upload_generic_chunk(
        &mut self,
        mut payload: Bytes,
        upload_size: Option<u64>,
        operation: &str,
    ) -> Result<ResumableUploadResponse> {
        // The offset this call is writing at; advanced when a reset reveals
        // that a failed attempt committed part of the payload.
        let mut expected_offset = self.session.next_expected_byte();
        let mut last_error = Error::unknown(format!("{operation} called with an exhausted budget"));
        'attempt: while !self.retry_policy.is_exhausted() {
            let result = match upload_size {
                None => self.session.upload_chunk(payload.clone()),
                Some(size) => self.session.upload_final_chunk(payload.clone(), size),
            };
            let error = match result {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            if !self.retry_policy.on_failure(&error) {
                if !self.retry_policy.is_exhausted() {
                    return Err(error);
                }
                last_error = error;
                break 'attempt;
            }
            tracing::debug!("transient failure in {operation}, resetting session: {error}");
            last_error = error;
            std::thread::sleep(self.backoff_policy.on_completion());

            while !self.retry_policy.is_exhausted() {
                match self.session.reset_session() {
                    Ok(reset) => {
                        let committed = self.session.next_expected_byte();
                        if committed > expected_offset {
                            // The failed attempt partially (or fully)
                            // succeeded; only the suffix is re-sent.
                            let skip = committed - expected_offset;
                            if skip >= payload.len() as u64 && upload_size.is_none() {
                                return Ok(reset);
                            }
                            payload = payload.slice((skip as usize).min(payload.len())..);
                            expected_offset = committed;
                        }
                        continue 'attempt;
                    }
                    Err(error) => {
                        if !self.retry_policy.on_failure(&error) {
                            if !self.retry_policy.is_exhausted() {
                                return Err(error);
                            }
                            last_error = error;
                            break 'attempt;
                        }
                        tracing::debug!("transient failure resetting session: {error}");
                        last_error = error;
                        std::thread::sleep(self.backoff_policy.on_completion());
                    }
                }
            }
            break 'attempt;
        }
        Err(Error::new(
            last_error.kind(),
            format!("Retry policy exhausted in {operation}: {last_error}"),
        ))
    }
}

impl ResumableUploadSession for RetryResumableUploadSession {
    fn upload_chunk(&mut self, payload: Bytes) -> Result<ResumableUploadResponse> {
        self.upload_generic_chunk(payload, None, "UploadChunk")
    }

    fn upload_final_chunk(
        &mut self,
        payload: Bytes,
        upload_size: u64,
    ) -> Result<ResumableUploadResponse> {
        self.upload_generic_chunk(payload, Some(upload_size), "UploadFinalChunk")
    }

    fn reset_session(&mut self) -> Result<ResumableUploadResponse> {
        self.session.reset_session()
    }

    fn next_expected_byte(&self) -> u64 {
        self.session.next_expected_byte()
    }

    fn session_id(&self) -> &str {
        self.session.session_id()
    }

    fn done(&self) -> bool {
        self.session.done()
    }

    fn last_response(&self) -> &Result<ResumableUploadResponse> {
        self.session.last_response()
    }
}

impl std::fmt::Debug for RetryResumableUploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryResumableUploadSession")
            .field("session_id", &self.session.session_id())
            .field("next_expected_byte", &self.session.next_expected_byte())
            .field("retry_policy", &self.retry_policy)
            .field("backoff_policy", &self.backoff_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff_policy::ExponentialBackoffPolicy;
    use crate::request::UploadChunkRequest;
    use crate::resumable_upload_session::{MockResumableUploadSession, UploadState};
    use crate::retry_policy::LimitedErrorCountRetryPolicy;
    use mockall::Sequence;
    use std::time::Duration;

    fn transient_error() -> Error {
        Error::unavailable("try again")
    }

    fn permanent_error() -> Error {
        Error::permission_denied("uh-oh")
    }

    fn in_progress(last_committed_byte: u64) -> ResumableUploadResponse {
        ResumableUploadResponse {
            upload_session_url: String::new(),
            last_committed_byte,
            payload: Bytes::new(),
            upload_state: UploadState::InProgress,
        }
    }

    fn test_session(
        mock: MockResumableUploadSession,
        maximum_failures: u32,
    ) -> RetryResumableUploadSession {
        RetryResumableUploadSession::new(
            Box::new(mock),
            Box::new(LimitedErrorCountRetryPolicy::new(maximum_failures)),
            Box::new(
                ExponentialBackoffPolicy::new(
                    Duration::from_millis(10),
                    Duration::from_millis(160),
                    2.0,
                )
                .unwrap(),
            ),
        )
    }

    fn quantum_payload() -> Bytes {
        Bytes::from(vec![b'0'; UploadChunkRequest::CHUNK_SIZE_QUANTUM])
    }

    // Transient failures on both the chunk and the reset are recovered:
    //
    // 1. upload_chunk() -> transient error
    // 2. reset_session() -> transient error
    // 3. reset_session() -> success (0 bytes committed)
    // 4. upload_chunk() -> success (quantum bytes committed)
    // 5. upload_chunk() -> transient error
    // 6. reset_session() -> success (quantum bytes committed)
    // 7. upload_chunk() -> success (2 * quantum bytes committed)
    // 8. upload_chunk() -> success (3 * quantum bytes committed)
    #[test]
    fn handle_transient() {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;
        let payload = quantum_payload();

        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();

        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(|| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(|| Ok(in_progress(0)));
        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(move |_| Ok(in_progress(quantum - 1)));
        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(move || Ok(in_progress(quantum - 1)));
        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(move |_| Ok(in_progress(2 * quantum - 1)));
        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(move |_| Ok(in_progress(3 * quantum - 1)));

        // next_expected_byte() tracks the mock protocol state. The decorator
        // reads it once at the start of each call and once after every
        // successful reset: 0 (call 1), 0 (after reset), quantum (call 2),
        // quantum (after reset), 2 * quantum (call 3).
        let mut committed = vec![0_u64, 0, quantum, quantum, 2 * quantum];
        committed.reverse();
        mock.expect_next_expected_byte()
            .returning(move || committed.pop().unwrap_or(3 * quantum));

        let mut session = test_session(mock, 10);

        let response = session.upload_chunk(payload.clone()).unwrap();
        assert_eq!(response.last_committed_byte, quantum - 1);

        let response = session.upload_chunk(payload.clone()).unwrap();
        assert_eq!(response.last_committed_byte, 2 * quantum - 1);

        let response = session.upload_chunk(payload).unwrap();
        assert_eq!(response.last_committed_byte, 3 * quantum - 1);
    }

    // A permanent error on upload_chunk() aborts immediately, no reset.
    #[test]
    fn permanent_error_on_upload() {
        let mut mock = MockResumableUploadSession::new();
        mock.expect_next_expected_byte().return_const(0_u64);
        mock.expect_upload_chunk()
            .once()
            .returning(|_| Err(permanent_error()));

        let mut session = test_session(mock, 10);
        let err = session.upload_chunk(quantum_payload()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
        assert!(!err.message().contains("Retry policy exhausted"), "{err}");
    }

    // A permanent error on reset_session() propagates unwrapped.
    #[test]
    fn permanent_error_on_reset() {
        let mut mock = MockResumableUploadSession::new();
        mock.expect_next_expected_byte().return_const(0_u64);
        mock.expect_upload_chunk()
            .once()
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .returning(|| Err(permanent_error()));

        let mut session = test_session(mock, 10);
        let err = session.upload_chunk(quantum_payload()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
    }

    // Too many transients on upload_chunk() exhaust the budget:
    //
    // 1. upload_chunk() -> transient error
    // 2. reset_session() -> success (0 bytes committed)
    // 3. upload_chunk() -> transient error
    // 4. reset_session() -> success (0 bytes committed)
    // 5. upload_chunk() -> transient error, the policy is exhausted.
    #[test]
    fn too_many_transients_on_upload_chunk() {
        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();
        mock.expect_next_expected_byte().return_const(0_u64);
        for _ in 0..2 {
            mock.expect_upload_chunk()
                .once()
                .in_sequence(&mut seq)
                .returning(|_| Err(transient_error()));
            mock.expect_reset_session()
                .once()
                .in_sequence(&mut seq)
                .returning(|| Ok(in_progress(0)));
        }
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Err(transient_error()));

        let mut session = test_session(mock, 2);
        let err = session.upload_chunk(quantum_payload()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unavailable);
        assert!(err.message().contains("Retry policy exhausted"), "{err}");
    }

    // The budget is shared across user calls: the first call consumes it
    // recovering, the second call fails without a reset attempt.
    //
    // 1. upload_chunk() -> transient error
    // 2. reset_session() -> transient error
    // 3. reset_session() -> success (0 bytes committed)
    // 4. upload_chunk() -> success (quantum bytes committed)
    // 5. upload_chunk() -> transient error, the policy is exhausted.
    #[test]
    fn too_many_transients_on_reset() {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;
        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(|| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(|| Ok(in_progress(0)));
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(move |_| Ok(in_progress(quantum - 1)));
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Err(transient_error()));

        let mut committed = vec![0_u64, 0, quantum];
        committed.reverse();
        mock.expect_next_expected_byte()
            .returning(move || committed.pop().unwrap_or(quantum));

        let mut session = test_session(mock, 2);

        let response = session.upload_chunk(quantum_payload()).unwrap();
        assert_eq!(response.last_committed_byte, quantum - 1);

        let err = session.upload_chunk(quantum_payload()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unavailable);
        assert!(err.message().contains("Retry policy exhausted"), "{err}");
    }

    // A permanent error on upload_final_chunk() aborts immediately.
    #[test]
    fn permanent_error_on_upload_final_chunk() {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;
        let mut mock = MockResumableUploadSession::new();
        mock.expect_next_expected_byte().return_const(0_u64);
        mock.expect_upload_final_chunk()
            .once()
            .withf(move |_, size| *size == quantum)
            .returning(|_, _| Err(permanent_error()));

        let mut session = test_session(mock, 10);
        let err = session
            .upload_final_chunk(quantum_payload(), quantum)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::PermissionDenied);
    }

    // Too many transients on upload_final_chunk() exhaust the budget.
    #[test]
    fn too_many_transients_on_upload_final_chunk() {
        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();
        mock.expect_next_expected_byte().return_const(0_u64);
        for _ in 0..2 {
            mock.expect_upload_final_chunk()
                .once()
                .in_sequence(&mut seq)
                .returning(|_, _| Err(transient_error()));
            mock.expect_reset_session()
                .once()
                .in_sequence(&mut seq)
                .returning(|| Ok(in_progress(0)));
        }
        mock.expect_upload_final_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_, _| Err(transient_error()));

        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;
        let mut session = test_session(mock, 2);
        let err = session
            .upload_final_chunk(quantum_payload(), quantum)
            .unwrap_err();
        assert!(err.message().contains("Retry policy exhausted"), "{err}");
    }

    // A reset that reveals partial progress trims the committed prefix.
    #[test]
    fn reset_trims_committed_prefix() {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;
        let payload = quantum_payload();
        let half = quantum / 2;

        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();
        let want = payload.clone();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(move || Ok(in_progress(half - 1)));
        let want = payload.slice(half as usize..);
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .withf(move |p| *p == want)
            .returning(move |_| Ok(in_progress(quantum - 1)));

        let mut committed = vec![0_u64, half];
        committed.reverse();
        mock.expect_next_expected_byte()
            .returning(move || committed.pop().unwrap_or(quantum));

        let mut session = test_session(mock, 10);
        let response = session.upload_chunk(payload).unwrap();
        assert_eq!(response.last_committed_byte, quantum - 1);
    }

    // A reset that reveals the whole chunk was committed skips the re-send.
    #[test]
    fn reset_reporting_full_commit_skips_resend() {
        let quantum = UploadChunkRequest::CHUNK_SIZE_QUANTUM as u64;

        let mut mock = MockResumableUploadSession::new();
        let mut seq = Sequence::new();
        mock.expect_upload_chunk()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Err(transient_error()));
        mock.expect_reset_session()
            .once()
            .in_sequence(&mut seq)
            .returning(move || Ok(in_progress(quantum - 1)));

        let mut committed = vec![0_u64];
        committed.reverse();
        mock.expect_next_expected_byte()
            .returning(move || committed.pop().unwrap_or(quantum));

        let mut session = test_session(mock, 10);
        let response = session.upload_chunk(quantum_payload()).unwrap();
        assert_eq!(response.last_committed_byte, quantum - 1);
    }

    #[test]
    fn done_is_pass_through() {
        let mut mock = MockResumableUploadSession::new();
        mock.expect_done().once().return_const(true);

        let session = test_session(mock, 10);
        assert!(session.done());
    }

    #[test]
    fn last_response_is_pass_through() {
        let last = Ok(ResumableUploadResponse {
            upload_session_url: "url".to_string(),
            last_committed_byte: 1,
            payload: Bytes::from_static(b"payload"),
            upload_state: UploadState::Done,
        });
        let mut mock = MockResumableUploadSession::new();
        mock.expect_last_response().return_const(last.clone());

        let session = test_session(mock, 10);
        assert_eq!(session.last_response(), &last);
    }

    #[test]
    fn session_id_is_pass_through() {
        let mut mock = MockResumableUploadSession::new();
        mock.expect_session_id()
            .return_const("https://example.com/session".to_string());

        let session = test_session(mock, 10);
        assert_eq!(session.session_id(), "https://example.com/session");
    }
}
