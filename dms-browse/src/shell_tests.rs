use std::sync::Arc;
use std::time::Duration;

use dms_core::DmsClient;
use dms_view::{NodeKind, ViewConfig, icon_for};
use serde_json::json;
use tokio::time::timeout;
use uuid::Uuid;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const FILE_A: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
const FOLDER_DOCS: &str = "4f7d1c2e-0b1a-4c3d-9e8f-112233445566";

fn node(name: &str, kind: NodeKind, size: Option<u64>) -> Node {
    Node {
        id: Uuid::new_v4(),
        name: name.to_string(),
        kind,
        size,
        modified_at: None,
        icon: icon_for(name, kind),
        selected: false,
    }
}

fn snapshot(children: Vec<Node>) -> ViewSnapshot {
    let docs = Uuid::new_v4();
    ViewSnapshot {
        folder: Some(docs),
        generation: 1,
        children,
        breadcrumbs: vec![BreadcrumbEntry::ROOT, BreadcrumbEntry::folder(docs, "Docs")],
        loading: false,
        drag_over: false,
    }
}

#[test]
fn tokenize_groups_quoted_words() {
    assert_eq!(
        tokenize(r#"rename "old name.txt" new.txt"#).unwrap(),
        vec!["rename", "old name.txt", "new.txt"]
    );
    assert_eq!(tokenize(r#"mkdir """#).unwrap(), vec!["mkdir", ""]);
    assert!(tokenize(r#"open "broken"#).is_err());
}

#[test]
fn parse_maps_text_to_commands() {
    assert_eq!(parse_command("   ").unwrap(), None);
    assert_eq!(parse_command("ls").unwrap(), Some(ShellCommand::List));
    assert_eq!(
        parse_command("cd ..").unwrap(),
        Some(ShellCommand::Cd(Location::Parent))
    );
    assert_eq!(
        parse_command("mv /").unwrap(),
        Some(ShellCommand::Move(Location::Root))
    );
    assert_eq!(
        parse_command("cp Archive").unwrap(),
        Some(ShellCommand::Copy(Location::Named("Archive".into())))
    );
    assert_eq!(
        parse_command("sel a.txt b.txt").unwrap(),
        Some(ShellCommand::Select(vec!["a.txt".into(), "b.txt".into()]))
    );
    assert_eq!(
        parse_command("put /tmp/a.txt").unwrap(),
        Some(ShellCommand::Upload(vec![PathBuf::from("/tmp/a.txt")]))
    );
    assert_eq!(
        parse_command(r#"rename a.txt "b c.txt""#).unwrap(),
        Some(ShellCommand::Rename {
            from: "a.txt".into(),
            to: "b c.txt".into()
        })
    );
    assert_eq!(parse_command("none").unwrap(), Some(ShellCommand::SelectAll(false)));
    assert_eq!(parse_command("q").unwrap(), Some(ShellCommand::Quit));
}

#[test]
fn parse_rejects_bad_arity_and_unknown_commands() {
    assert!(parse_command("cd").is_err());
    assert!(parse_command("sel").is_err());
    assert!(parse_command("put").is_err());
    assert!(parse_command("rename a").is_err());
    assert!(parse_command("format c:").is_err());
}

#[test]
fn locations_resolve_against_snapshot() {
    let folder = node("Archive", NodeKind::Folder, None);
    let folder_id = folder.id;
    let view = snapshot(vec![folder, node("a.txt", NodeKind::File, Some(1))]);

    assert_eq!(resolve_location(&view, &Location::Root).unwrap(), None);
    assert_eq!(resolve_location(&view, &Location::Parent).unwrap(), None);
    assert_eq!(
        resolve_location(&view, &Location::Named("Archive".into())).unwrap(),
        Some(folder_id)
    );
    assert!(resolve_location(&view, &Location::Named("a.txt".into())).is_err());
    assert!(resolve_location(&view, &Location::Named("missing".into())).is_err());
}

#[test]
fn listing_shows_selection_icons_and_sizes() {
    let mut file = node("report.pdf", NodeKind::File, Some(2048));
    file.selected = true;
    let view = snapshot(vec![node("Archive", NodeKind::Folder, None), file]);

    let rendered = render_listing(&view);
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "Root / Docs");
    assert!(lines[1].starts_with("  [ ] folder"));
    assert!(lines[1].contains("Archive/"));
    assert!(lines[2].starts_with("  [x] picture_as_pdf"));
    assert!(lines[2].ends_with("2.0 KiB"));
}

#[test]
fn empty_listing_points_at_upload() {
    let rendered = render_listing(&snapshot(Vec::new()));
    assert!(rendered.contains("put <path>"));
}

#[test]
fn sizes_use_binary_units() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KiB");
    assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/folders/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": FILE_A, "type": "FILE", "name": "a.txt", "size": 3 },
            { "id": FOLDER_DOCS, "type": "FOLDER", "name": "Docs" }
        ])))
        .mount(server)
        .await;
}

async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<ViewEvent>,
    mut accept: impl FnMut(&ViewEvent) -> bool,
) -> ViewEvent {
    loop {
        let event = timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for view event")
            .expect("controller stopped");
        if accept(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn selecting_by_name_and_deleting_hits_file_endpoint() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/files"))
        .and(body_json(json!({ "documentIds": [FILE_A] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = DmsClient::with_base_url(&server.uri(), "test-token").unwrap();
    let (handle, mut events) = dms_view::spawn(Arc::new(client), ViewConfig::default());
    handle.load_folder(None).unwrap();
    wait_for(&mut events, |event| matches!(event, ViewEvent::FolderLoaded { .. })).await;

    let shell = Shell::new(handle, false);
    for line in ["sel a.txt", "rm"] {
        let command = parse_command(line).unwrap().unwrap();
        assert_eq!(shell.execute(command).await.unwrap(), Reply::Done);
    }
    let settled = wait_for(&mut events, |event| matches!(event, ViewEvent::BatchSettled(_))).await;
    assert_eq!(
        settled.notification().as_deref(),
        Some("Items deleted successfully")
    );
}

#[tokio::test]
async fn commands_naming_missing_or_wrong_items_fail_locally() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let client = DmsClient::with_base_url(&server.uri(), "test-token").unwrap();
    let (handle, mut events) = dms_view::spawn(Arc::new(client), ViewConfig::default());
    handle.load_folder(None).unwrap();
    wait_for(&mut events, |event| matches!(event, ViewEvent::FolderLoaded { .. })).await;

    let shell = Shell::new(handle, false);
    assert!(shell.execute(ShellCommand::Cd(Location::Named("a.txt".into()))).await.is_err());
    assert!(shell.execute(ShellCommand::Open("ghost".into())).await.is_err());
    assert!(
        shell
            .execute(ShellCommand::Upload(vec![PathBuf::from("/definitely/not/here.txt")]))
            .await
            .is_err()
    );
    assert!(matches!(
        shell.execute(ShellCommand::Pwd).await.unwrap(),
        Reply::Print(path) if path == "Root"
    ));
    assert_eq!(shell.execute(ShellCommand::Quit).await.unwrap(), Reply::Quit);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}
