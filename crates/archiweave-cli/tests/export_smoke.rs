use assert_cmd::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

const VIEW_ONE: &str = r##"<html>
<head><title>Customer View</title></head>
<body>
<img src="../img/id-view1.png" usemap="#id-view1map"/>
<map name="id-view1map">
<area shape="rect" coords="10,10,150,70" href="elements/id-actor.html"/>
<area shape="rect" coords="200,10,340,70" href="elements/id-process.html"/>
</map>
<script>
dataElements.push({id: "id-actor", type: "BusinessActor", name: decodeURL("Customer"), folder: decodeURL("Business")});
dataElements.push({id: "id-process", type: "BusinessProcess", name: decodeURL("Order+Handling"), folder: decodeURL("Business")});
dataRelationships.push({id: "id-serves", type: "ServingRelationship", source: "id-process", target: "id-actor"});
</script>
</body>
</html>"##;

const VIEW_TWO: &str = r##"<html>
<head><title>Application View</title></head>
<body>
<img src="../img/id-view2.png" usemap="#id-view2map"/>
<map name="id-view2map">
<area shape="rect" coords="10,10,150,70" href="elements/id-process.html"/>
<area shape="rect" coords="200,10,340,70" href="elements/id-crm.html"/>
</map>
<script>
dataElements.push({id: "id-process", type: "BusinessProcess", name: decodeURL("Order+Handling")});
dataElements.push({id: "id-crm", type: "ApplicationComponent", name: decodeURL("CRM")});
dataRelationships.push({id: "id-supports", type: "ServingRelationship", source: "id-crm", target: "id-process"});
</script>
</body>
</html>"##;

fn write_fixtures(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
    let one = dir.path().join("id-view1.html");
    let two = dir.path().join("id-view2.html");
    fs::write(&one, VIEW_ONE).expect("write fixture");
    fs::write(&two, VIEW_TWO).expect("write fixture");
    (one, two)
}

#[test]
fn cli_exports_an_exchange_document() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (one, two) = write_fixtures(&tmp);
    let out = tmp.path().join("model.xml");

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    Command::new(exe)
        .args([
            "export",
            "--out",
            out.to_string_lossy().as_ref(),
            one.to_string_lossy().as_ref(),
            two.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let xml = fs::read_to_string(&out).expect("read document");
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("xmlns=\"http://www.opengroup.org/xsd/archimate/3.0/\""));
    // Shared element defined exactly once across both views.
    assert_eq!(xml.matches("<element identifier=\"id-process\"").count(), 1);
    assert!(xml.contains("<view identifier=\"id-view1\" xsi:type=\"Diagram\">"));
    assert!(xml.contains("<view identifier=\"id-view2\" xsi:type=\"Diagram\">"));
}

#[test]
fn cli_export_selects_a_single_view() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (one, two) = write_fixtures(&tmp);

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    let assert = Command::new(exe)
        .args([
            "export",
            "--view",
            "id-view2",
            one.to_string_lossy().as_ref(),
            two.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let xml = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 output");
    assert!(xml.contains("<view identifier=\"id-view2\""));
    assert!(!xml.contains("<view identifier=\"id-view1\""));
    // The selection narrows the views section only, not the model itself.
    assert!(xml.contains("<element identifier=\"id-actor\""));
}

#[test]
fn cli_export_survives_a_broken_page() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (one, _) = write_fixtures(&tmp);
    let broken = tmp.path().join("broken.html");
    fs::write(&broken, "<html><body>nothing embedded</body></html>").expect("write fixture");

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    let assert = Command::new(exe)
        .args([
            "export",
            broken.to_string_lossy().as_ref(),
            one.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let output = assert.get_output();
    let stderr = String::from_utf8(output.stderr.clone()).expect("utf-8 stderr");
    assert!(stderr.contains("broken.html"));
    let xml = String::from_utf8(output.stdout.clone()).expect("utf-8 stdout");
    assert!(xml.contains("<view identifier=\"id-view1\""));
}

#[test]
fn cli_export_fails_when_nothing_was_ingested() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let broken = tmp.path().join("broken.html");
    fs::write(&broken, "<html><body>nothing embedded</body></html>").expect("write fixture");

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    Command::new(exe)
        .args(["export", broken.to_string_lossy().as_ref()])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn cli_extract_prints_payload_json() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (one, _) = write_fixtures(&tmp);

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    let assert = Command::new(exe)
        .args(["extract", "--pretty", one.to_string_lossy().as_ref()])
        .assert()
        .success();

    let json = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 output");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    assert_eq!(value["view"]["id"], "id-view1");
    assert_eq!(value["elements"][1]["name"], "Order Handling");
}

#[test]
fn cli_report_lists_per_page_statuses() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (one, two) = write_fixtures(&tmp);
    let missing = tmp.path().join("missing.html");

    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    let assert = Command::new(exe)
        .args([
            "report",
            one.to_string_lossy().as_ref(),
            two.to_string_lossy().as_ref(),
            missing.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let json = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 output");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");
    let pages = value["pages"].as_array().expect("pages array");
    assert_eq!(pages.len(), 3);
    assert!(pages[0]["error"].is_null());
    assert!(pages[2]["error"].is_string());
}

#[test]
fn cli_rejects_unknown_flags() {
    let exe = assert_cmd::cargo_bin!("archiweave-cli");
    Command::new(exe)
        .args(["export", "--bogus"])
        .assert()
        .failure()
        .code(2);
}
