use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use defect_dashboard::app::{AppState, router};
use defect_dashboard::config::ServerConfig;
use defect_dashboard::keywords::KeywordStore;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;

pub const BOUNDARY: &str = "defect-test-boundary";

pub const SAMPLE_CSV: &str = "标题,缺陷模块,状态,创建时间,更新时间,完成时间,缺陷分析类型
登录超时,用户模块,新建,2024-06-01 09:00:00,,,A类
支付重复扣款,支付模块,已关闭,2024-05-01,2024-05-02,2024-05-03 12:00:00,B类
数据导出乱码,,待验证,2024-05-10,2024-05-12 08:00:00,,A类
";

/// Router backed by a keyword file inside a temp dir; keep the dir alive
/// for the duration of the test.
pub fn create_test_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        keywords_file: dir.path().join("keywords.json"),
        ..ServerConfig::default()
    };
    let keywords = KeywordStore::open(&config.keywords_file).unwrap();
    (router(Arc::new(AppState::new(config, keywords))), dir)
}

pub fn multipart_upload(filename: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = filename,
        c = contents
    );
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
