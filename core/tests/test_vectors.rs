//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! `requests.json` describes operation inputs and the request each must
//! produce; `errors.json` describes failed responses and the error each must
//! map to.

use colore_client::{
    ClientConfig, ColoreClient, ColoreError, Content, ConversionRequest, CreateDocument, Expect,
    HttpMethod, HttpRequest, HttpResponse, StagedFile, UpdateDocument,
};
use serde_json::Value;

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "HEAD" => HttpMethod::Head,
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_expect(s: &str) -> Expect {
    match s {
        "nothing" => Expect::Nothing,
        "json" => Expect::Json,
        "binary" => Expect::Binary,
        other => panic!("unknown expect: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
        })
        .collect()
}

fn str_arg<'a>(args: &'a Value, name: &str) -> &'a str {
    args[name].as_str().unwrap()
}

fn build(client: &ColoreClient, operation: &str, args: &Value, staged: &StagedFile) -> HttpRequest {
    match operation {
        "ping" => client.build_ping(),
        "create_document" => {
            let doc: CreateDocument = serde_json::from_value(args.clone()).unwrap();
            client.build_create_document(&doc, staged)
        }
        "update_document" => {
            let doc: UpdateDocument = serde_json::from_value(args.clone()).unwrap();
            client.build_update_document(&doc, staged)
        }
        "update_title" => client.build_update_title(str_arg(args, "doc_id"), str_arg(args, "title")),
        "request_conversion" => {
            let request: ConversionRequest = serde_json::from_value(args.clone()).unwrap();
            client.build_request_conversion(&request)
        }
        "delete_document" => client.build_delete_document(str_arg(args, "doc_id")),
        "delete_version" => client.build_delete_version(str_arg(args, "doc_id"), str_arg(args, "version")),
        "get_document" => client.build_get_document(
            str_arg(args, "doc_id"),
            str_arg(args, "filename"),
            args["version"].as_str().unwrap_or(colore_client::CURRENT),
        ),
        "get_document_info" => client.build_get_document_info(str_arg(args, "doc_id")),
        "convert" => client.build_convert(staged, str_arg(args, "action"), str_arg(args, "language")),
        other => panic!("unknown operation: {other}"),
    }
}

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let app = vectors["app"].as_str().unwrap();
    let base_uri = vectors["base_uri"].as_str().unwrap();
    let staged = StagedFile::stage(Content::Bytes(b"vector payload"), None).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let backtrace = case["backtrace"].as_bool().unwrap_or(false);
        let config = ClientConfig::new(app, base_uri).with_backtrace(backtrace);
        let client = ColoreClient::new(config).unwrap();
        let expected = &case["expected_request"];

        let req = build(&client, case["operation"].as_str().unwrap(), &case["args"], &staged);

        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{base_uri}{}", expected["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.query, pairs(&expected["query"]), "{name}: query");
        assert_eq!(req.expect, parse_expect(expected["expect"].as_str().unwrap()), "{name}: expect");
        assert_eq!(
            req.headers,
            vec![("user-agent".to_string(), "Colore Client".to_string())],
            "{name}: headers"
        );

        match req.multipart() {
            Some(upload) => {
                assert_eq!(upload.fields, pairs(&expected["fields"]), "{name}: fields");
                assert_eq!(upload.file.field, "file", "{name}: file field");
                assert_eq!(upload.file.path, staged.path(), "{name}: staged path");
                assert_eq!(upload.file.len, staged.len(), "{name}: file length");
                if let Some(file_name) = expected["file_name"].as_str() {
                    assert_eq!(upload.file.filename, file_name, "{name}: file name");
                }
            }
            None => assert!(
                expected["fields"].as_array().unwrap().is_empty(),
                "{name}: expected multipart fields"
            ),
        }
    }
}

#[test]
fn error_test_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let client = ColoreClient::new(ClientConfig::new("client_test", "http://localhost:9240")).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let body = sim["body"].as_str().unwrap();
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        };
        let expected = &case["expected_error"];

        let err = client.parse_json(response).unwrap_err();
        match expected["kind"].as_str().unwrap() {
            "client" => assert!(matches!(err, ColoreError::Client(_)), "{name}: expected client error"),
            "server" => assert!(matches!(err, ColoreError::Server(_)), "{name}: expected server error"),
            other => panic!("{name}: unknown kind: {other}"),
        }
        assert_eq!(err.status(), Some(expected["status"].as_u64().unwrap() as u16), "{name}: status");
        assert_eq!(err.to_string(), expected["message"].as_str().unwrap(), "{name}: message");
        assert_eq!(err.response_body(), Some(body), "{name}: response body");
    }
}
