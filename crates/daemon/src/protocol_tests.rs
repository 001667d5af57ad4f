// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use pj_core::{JobStatus, WorkerId, WorkerPhase};

#[test]
fn submit_request_is_tagged_json() {
    let request = Request::Submit {
        name: "plot sheet 1".to_string(),
        payload: "open a.dwg\nplot\n".to_string(),
    };

    let encoded = encode(&request).expect("encode failed");
    let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(value["type"], "Submit");
    assert_eq!(value["payload"], "open a.dwg\nplot\n");

    let decoded: Request = decode(&encoded).expect("decode failed");
    assert_eq!(request, decoded);
}

#[test]
fn jobs_response_carries_summaries() {
    let response = Response::Jobs {
        jobs: vec![
            JobSummary {
                id: JobId::from("job-1"),
                name: "a".to_string(),
                status: JobStatus::Complete,
                worker: Some(WorkerId(1)),
            },
            JobSummary {
                id: JobId::from("job-2"),
                name: "b".to_string(),
                status: JobStatus::Waiting,
                worker: None,
            },
        ],
    };

    let decoded: Response = decode(&encode(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn workers_response_carries_log_tail() {
    let response = Response::Workers {
        workers: vec![WorkerSummary {
            id: WorkerId(3),
            phase: WorkerPhase::Settling,
            job: Some(JobId::from("job-9")),
            pid: Some(4242),
            jobs_run: 7,
            log_tail: vec!["regenerating".to_string()],
        }],
    };

    let decoded: Response = decode(&encode(&response).unwrap()).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn unknown_request_type_is_rejected() {
    let result: Result<Request, _> = decode(br#"{"type":"Explode"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_returns_written_bytes() {
    let mut buffer = Vec::new();
    write_message(&mut buffer, b"hello world").await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back, b"hello world");
}

#[tokio::test]
async fn read_message_reports_closed_connection() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn read_message_rejects_oversized_length() {
    let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    let mut cursor = std::io::Cursor::new(len.to_vec());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
}

#[tokio::test]
async fn request_roundtrips_over_a_stream() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    let data = encode(&Request::Ping).unwrap();
    write_message(&mut client, &data).await.unwrap();
    let request = read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap();
    assert_eq!(request, Request::Ping);

    write_response(&mut server, &Response::Pong, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    let response: Response = decode(&read_message(&mut client).await.unwrap()).unwrap();
    assert_eq!(response, Response::Pong);
}

#[tokio::test(start_paused = true)]
async fn read_request_times_out_on_silent_client() {
    let (_client, mut server) = tokio::io::duplex(1024);
    let result = read_request(&mut server, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
