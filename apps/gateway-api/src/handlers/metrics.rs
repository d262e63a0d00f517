//! 运行指标快照
//!
//! - GET /metrics

use crate::utils::ok;
use api_contract::MetricsSnapshotDto;
use axum::response::Response;
use gw_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsSnapshotDto {
        connect_failures: snapshot.connect_failures,
        polls: snapshot.polls,
        poll_failures: snapshot.poll_failures,
        points_persisted: snapshot.points_persisted,
        persist_failures: snapshot.persist_failures,
        messages_forwarded: snapshot.messages_forwarded,
        bytes_forwarded: snapshot.bytes_forwarded,
        messages_buffered: snapshot.messages_buffered,
        messages_dropped: snapshot.messages_dropped,
        publish_failures: snapshot.publish_failures,
        template_failures: snapshot.template_failures,
    })
}
