use crate::{IngestWarning, Session};
use futures::executor::block_on;

fn view_page(view: &str, script: &str) -> String {
    format!(
        r##"<html>
<head><title>{view} title</title></head>
<body>
<map name="{view}map">
<area shape="rect" coords="0,0,10,10" href="elements/id-a.html"/>
</map>
<script>
{script}
</script>
</body>
</html>"##
    )
}

const SCRIPT_ONE: &str = r#"dataElements.push({id: "id-a", type: "BusinessActor", name: "Actor"});
dataRelationships.push({id: "id-r", type: "TriggeringRelationship", source: "id-a", target: "id-b"});"#;

const SCRIPT_TWO: &str = r#"dataElements.push({id: "id-a", type: "BusinessActor", name: "Actor"});
dataElements.push({id: "id-b", type: "BusinessEvent", name: "Signed"});"#;

#[test]
fn shared_elements_merge_across_views() {
    let mut session = Session::new();
    session
        .ingest_page_sync(&view_page("id-v1", SCRIPT_ONE))
        .unwrap();
    session
        .ingest_page_sync(&view_page("id-v2", SCRIPT_TWO))
        .unwrap();

    let graph = session.graph();
    assert_eq!(graph.elements.len(), 2);
    assert_eq!(graph.views.len(), 2);
    // The relationship waited for id-b and resolved on the second page.
    assert!(graph.relationships.contains_key("id-r"));
    assert!(graph.pending().is_empty());
}

#[test]
fn batch_ingest_isolates_failing_pages() {
    let mut session = Session::new();
    let good = view_page("id-v1", SCRIPT_TWO);
    let statuses = session.ingest_pages_sync([
        ("broken.html", "<html><body>no data</body></html>"),
        ("id-v1.html", good.as_str()),
    ]);

    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].report.is_none());
    assert!(statuses[0].error.is_some());
    assert!(statuses[1].report.is_some());
    assert_eq!(session.graph().elements.len(), 2);
}

#[test]
fn finish_keeps_relationships_resolved_by_the_last_page() {
    let mut session = Session::new();
    session
        .ingest_page_sync(&view_page("id-v1", SCRIPT_ONE))
        .unwrap();
    // The final page supplies the missing endpoint; resolution must not wait
    // for an ingest that never comes.
    let report = session
        .ingest_page_sync(&view_page("id-v2", SCRIPT_TWO))
        .unwrap();
    assert_eq!(report.resolved_relationships, 1);
    assert_eq!(report.pending_relationships, 0);

    let warnings = session.finish();
    assert!(warnings.is_empty(), "relationship dropped: {warnings:?}");
    assert!(session.graph().relationships.contains_key("id-r"));
}

#[test]
fn finish_drops_unresolved_relationships() {
    let mut session = Session::new();
    session
        .ingest_page_sync(&view_page("id-v1", SCRIPT_ONE))
        .unwrap();

    let warnings = session.finish();
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        &warnings[0],
        IngestWarning::DroppedPendingRelationship { target, .. } if target == "id-b"
    ));
    assert!(session.graph().pending().is_empty());
    assert!(!session.graph().relationships.contains_key("id-r"));
}

#[test]
fn async_wrappers_delegate_to_sync() {
    let page = view_page("id-v1", SCRIPT_TWO);

    let mut sync_session = Session::new();
    let sync_report = sync_session.ingest_page_sync(&page).unwrap();

    let mut async_session = Session::new();
    let async_report = block_on(async_session.ingest_page(&page)).unwrap();

    assert_eq!(sync_report, async_report);
    assert_eq!(
        sync_session.graph().elements.len(),
        async_session.graph().elements.len()
    );
}

#[test]
fn sessions_do_not_share_state() {
    let mut one = Session::new();
    one.ingest_page_sync(&view_page("id-v1", SCRIPT_TWO)).unwrap();

    let two = Session::new();
    assert!(two.graph().is_empty());
    assert_eq!(one.into_graph().elements.len(), 2);
}
