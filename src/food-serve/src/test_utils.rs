use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use tensorflow::{DataType, Graph, Output};

/// `input` placeholder fed straight into an `output` identity, so the
/// scores are the preprocessed pixels themselves.
pub fn identity_graph_def(device: Option<&str>) -> Vec<u8> {
    let mut graph = Graph::new();

    let mut nd = graph.new_operation("Placeholder", "input").unwrap();
    nd.set_attr_type("dtype", DataType::Float).unwrap();
    let input = nd.finish().unwrap();

    let mut nd = graph.new_operation("Identity", "output").unwrap();
    nd.add_input(Output {
        operation: input,
        index: 0,
    });
    if let Some(device) = device {
        nd.set_device(device).unwrap();
    }
    nd.finish().unwrap();

    graph.graph_def().unwrap()
}

/// Serves `body` on `/model.pb` and a 404 on `/missing`, counting GETs.
pub async fn spawn_artifact_server(body: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    let model_hits = Arc::clone(&hits);
    let missing_hits = Arc::clone(&hits);
    let app = Router::new()
        .route(
            "/model.pb",
            get(move || async move {
                model_hits.fetch_add(1, Ordering::SeqCst);
                body
            }),
        )
        .route(
            "/missing",
            get(move || async move {
                missing_hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NOT_FOUND
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hits)
}
