mod common;

use bedrock_chat_agents::{BackendInvoker, KnowledgeBaseInvoker, drain};
use bedrock_chat_common::{ChatRequest, Error, Turn};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_ARN: &str = "arn:aws:bedrock:us-east-1::foundation-model/meta.llama3-8b-instruct-v1:0";

fn invoker(uri: String) -> KnowledgeBaseInvoker {
    KnowledgeBaseInvoker::new(common::client(), uri, "KB12345".to_string(), MODEL_ARN.to_string())
}

#[tokio::test]
async fn test_retrieve_and_generate_returns_output_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/retrieveAndGenerate"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "input": {"text": "What is the refund policy?"},
            "retrieveAndGenerateConfiguration": {
                "type": "KNOWLEDGE_BASE",
                "knowledgeBaseConfiguration": {
                    "knowledgeBaseId": "KB12345",
                    "modelArn": MODEL_ARN
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"text": "Refunds are issued within 30 days."},
            "citations": [],
            "sessionId": "kb-session"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = ChatRequest {
        message: "What is the refund policy?".to_string(),
        history: vec![],
        session_id: Some("client-session".to_string()),
    };
    let reply = invoker(mock_server.uri()).invoke(&request).await.unwrap();

    // Only agent sessions are echoed back.
    assert!(reply.session_id.is_none());
    assert_eq!(
        drain(reply.result).await.unwrap(),
        "Refunds are issued within 30 days."
    );
}

#[tokio::test]
async fn test_history_is_flattened_into_input_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/retrieveAndGenerate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": {"text": "ok"}})))
        .mount(&mock_server)
        .await;

    let request = ChatRequest {
        message: "and the second?".to_string(),
        history: vec![Turn::user("first question"), Turn::assistant("first answer")],
        session_id: None,
    };
    invoker(mock_server.uri()).invoke(&request).await.unwrap();

    let received = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    let text = body["input"]["text"].as_str().unwrap();
    assert!(text.contains("USER: first question\nASSISTANT: first answer"));
    assert!(text.ends_with("The user now asks:\nand the second?"));
}

#[tokio::test]
async fn test_missing_output_text_is_empty_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"citations": []})))
        .mount(&mock_server)
        .await;

    let request = ChatRequest {
        message: "hello".to_string(),
        history: vec![],
        session_id: None,
    };
    let reply = invoker(mock_server.uri()).invoke(&request).await.unwrap();
    assert_eq!(drain(reply.result).await.unwrap(), "");
}

#[tokio::test]
async fn test_validation_exception_is_backend_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazon.bedrock#ValidationException",
            "message": "Knowledge base KB12345 does not exist."
        })))
        .mount(&mock_server)
        .await;

    let request = ChatRequest {
        message: "hello".to_string(),
        history: vec![],
        session_id: None,
    };
    let err = invoker(mock_server.uri()).invoke(&request).await.unwrap_err();
    assert!(matches!(
        &err,
        Error::Backend { status: Some(400), kind: Some(kind), .. } if kind == "ValidationException"
    ));
    assert_eq!(err.to_string(), "Knowledge base KB12345 does not exist.");
}
