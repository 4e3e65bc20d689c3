// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::BufReader;

#[tokio::test]
async fn write_then_read_roundtrips_a_single_frame() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &serde_json::json!({"event": "ping", "data": {}})).await.unwrap();
    assert!(buffer.ends_with(b"\n"));

    let mut reader = BufReader::new(std::io::Cursor::new(buffer));
    let frame = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(frame["event"], "ping");
}

#[tokio::test]
async fn read_frame_returns_none_on_clean_eof() {
    let mut reader = BufReader::new(std::io::Cursor::new(Vec::new()));
    assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn multiple_frames_are_read_in_order() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, &serde_json::json!({"n": 1})).await.unwrap();
    write_frame(&mut buffer, &serde_json::json!({"n": 2})).await.unwrap();

    let mut reader = BufReader::new(std::io::Cursor::new(buffer));
    let first = read_frame(&mut reader).await.unwrap().unwrap();
    let second = read_frame(&mut reader).await.unwrap().unwrap();
    assert_eq!(first["n"], 1);
    assert_eq!(second["n"], 2);
    assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn malformed_json_line_is_a_frame_error() {
    let mut buffer = b"not json\n".to_vec();
    let mut reader = BufReader::new(std::io::Cursor::new(std::mem::take(&mut buffer)));
    let err = read_frame(&mut reader).await.unwrap_err();
    assert!(matches!(err, FrameError::Json(_)));
}
