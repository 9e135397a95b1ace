//! Integration test: a timed write's deadline ack arrives before the
//! write itself lands, across two real nodes.

use matter_interaction::data_source::AttributeRead;
use matter_interaction::AttributeDataSource;
use matter_wire::datamodel::{AttributePath, WriteRequestPayload};
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
async fn timed_write_lands_on_the_peer() {
    let (node_a, node_b) = spawn_two_nodes().await;
    node_b
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(false)));

    let response = node_a
        .client
        .timed_write(
            node_a.session_id,
            2_000,
            WriteRequestPayload {
                writes: vec![(on_off_path(), TlvElement::Bool(true))],
                suppress_response: false,
                timed_request: true,
            },
        )
        .await
        .expect("timed write succeeds")
        .expect("a non-suppressed write gets a response");

    assert_eq!(response.results.len(), 1);

    let value = node_b
        .attributes
        .read(&on_off_path())
        .await
        .expect("no error reading back")
        .expect("attribute present");
    assert_eq!(value, AttributeRead::Value(TlvElement::Bool(true)));
}

#[tokio::test]
async fn suppressed_timed_write_returns_no_response() {
    let (node_a, node_b) = spawn_two_nodes().await;
    node_b
        .attributes
        .set(&on_off_path(), AttributeRead::Value(TlvElement::Bool(false)));

    let response = node_a
        .client
        .timed_write(
            node_a.session_id,
            2_000,
            WriteRequestPayload {
                writes: vec![(on_off_path(), TlvElement::Bool(true))],
                suppress_response: true,
                timed_request: true,
            },
        )
        .await
        .expect("timed write succeeds");

    assert!(response.is_none());
}
