//! Integration test: a Read and a Write between two distinct nodes
//! over real loopback UDP sockets.

use matter_interaction::data_source::AttributeRead;
use matter_wire::datamodel::{AttributeReportPayload, AttributePath, ReadRequestPayload, WriteRequestPayload};
use matter_wire::tlv::TlvElement;

use matter_integration_tests::spawn_two_nodes;

fn on_off_path() -> AttributePath {
    AttributePath {
        endpoint: 1,
        cluster: 6,
        attribute: 0,
        list_index: None,
    }
}

#[tokio::test]
async fn read_sees_the_peers_attribute_state() {
    let (node_a, node_b) = spawn_two_nodes().await;
    node_b
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(true)));

    let report = node_a
        .client
        .read(
            node_a.session_id,
            ReadRequestPayload {
                attribute_requests: vec![on_off_path()],
                event_requests: vec![],
                data_version_filters: vec![],
                fabric_filtered: false,
            },
        )
        .await
        .expect("read succeeds");

    assert_eq!(report.attribute_reports.len(), 1);
    match &report.attribute_reports[0] {
        AttributeReportPayload::Value { value, .. } => assert_eq!(*value, TlvElement::Bool(true)),
        other => panic!("expected a value report, got {other:?}"),
    }
}

#[tokio::test]
async fn write_is_visible_to_a_subsequent_read() {
    let (node_a, node_b) = spawn_two_nodes().await;
    node_b
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(false)));

    let response = node_a
        .client
        .write(
            node_a.session_id,
            WriteRequestPayload {
                writes: vec![(on_off_path(), TlvElement::Bool(true))],
                suppress_response: false,
                timed_request: false,
            },
        )
        .await
        .expect("write succeeds")
        .expect("a non-suppressed write gets a response");

    assert_eq!(response.results.len(), 1);

    let report = node_a
        .client
        .read(
            node_a.session_id,
            ReadRequestPayload {
                attribute_requests: vec![on_off_path()],
                event_requests: vec![],
                data_version_filters: vec![],
                fabric_filtered: false,
            },
        )
        .await
        .expect("read succeeds");

    match &report.attribute_reports[0] {
        AttributeReportPayload::Value { value, .. } => assert_eq!(*value, TlvElement::Bool(true)),
        other => panic!("expected a value report, got {other:?}"),
    }
}

#[tokio::test]
async fn reads_flow_in_both_directions_concurrently() {
    let (node_a, node_b) = spawn_two_nodes().await;
    node_a
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(true)));
    node_b
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(false)));

    let request = ReadRequestPayload {
        attribute_requests: vec![on_off_path()],
        event_requests: vec![],
        data_version_filters: vec![],
        fabric_filtered: false,
    };

    let (report_b_of_a, report_a_of_b) = tokio::join!(
        node_b.client.read(node_b.session_id, request.clone()),
        node_a.client.read(node_a.session_id, request),
    );

    match &report_b_of_a.expect("b reads a").attribute_reports[0] {
        AttributeReportPayload::Value { value, .. } => assert_eq!(*value, TlvElement::Bool(true)),
        other => panic!("unexpected report {other:?}"),
    }
    match &report_a_of_b.expect("a reads b").attribute_reports[0] {
        AttributeReportPayload::Value { value, .. } => assert_eq!(*value, TlvElement::Bool(false)),
        other => panic!("unexpected report {other:?}"),
    }
}
