use std::time::Duration;

use vista::fs::MapFs;
use vista::{App, Method, Request, Response, StatusCode};

const INTERVAL: Duration = Duration::from_millis(20);

fn watched(files: &MapFs) -> App {
    App::builder()
        .fs(files.clone())
        .watch(true)
        .check_interval(INTERVAL)
        .build()
}

async fn get(app: &App, path: &str) -> Response {
    app.serve(Request::new(Method::Get, path)).await
}

// Polls until `path` answers `expected` or a couple of seconds pass.
async fn eventually(app: &App, path: &str, expected: &str) -> Response {
    let mut resp = get(app, path).await;
    for _ in 0..100 {
        if resp.status() == StatusCode::Ok && resp.text() == expected {
            break;
        }
        tokio::time::sleep(INTERVAL).await;
        resp = get(app, path).await;
    }
    resp
}

fn site() -> MapFs {
    MapFs::new()
        .with_file("components/nav.html", "<nav>v1</nav>")
        .with_file(
            "layouts/main.html",
            "{{> components/nav}}{{#> content}} {{/content}}",
        )
        .with_file(
            "pages/index.html",
            "<!--layout:main-->\n{{#*inline \"content\"}}<p>home</p>{{/inline}}",
        )
}

#[tokio::test]
async fn edited_pages_are_served_without_restart() {
    let files = site();
    let app = watched(&files);
    assert_eq!(get(&app, "/").await.text(), "<nav>v1</nav><p>home</p>");

    files.insert(
        "pages/index.html",
        "<!--layout:main-->\n{{#*inline \"content\"}}<p>new home</p>{{/inline}}",
    );
    let resp = eventually(&app, "/", "<nav>v1</nav><p>new home</p>").await;
    assert_eq!(resp.text(), "<nav>v1</nav><p>new home</p>");
    app.close();
}

#[tokio::test]
async fn component_edits_reach_every_page_using_them() {
    let files = site();
    let app = watched(&files);

    files.insert("components/nav.html", "<nav>v2</nav>");
    let resp = eventually(&app, "/", "<nav>v2</nav><p>home</p>").await;
    assert_eq!(resp.text(), "<nav>v2</nav><p>home</p>");
    app.close();
}

#[tokio::test]
async fn new_files_get_routes() {
    let files = site();
    let app = watched(&files);
    assert_eq!(get(&app, "/about").await.status(), StatusCode::NotFound);

    files.insert("pages/about.html", "<p>about</p>");
    files.insert("public/notes.txt", "notes");
    assert_eq!(eventually(&app, "/about", "<p>about</p>").await.text(), "<p>about</p>");
    assert_eq!(eventually(&app, "/notes.txt", "notes").await.text(), "notes");
    app.close();
}

#[tokio::test]
async fn deleted_pages_keep_their_last_version() {
    let files = site().with_file("pages/gone.html", "<p>still here</p>");
    let app = watched(&files);

    files.remove("pages/gone.html");
    files.insert("pages/marker.html", "marker");
    // Once the marker is live, the removal has been processed too.
    eventually(&app, "/marker", "marker").await;

    let resp = get(&app, "/gone").await;
    assert_eq!(resp.status(), StatusCode::Ok);
    assert_eq!(resp.text(), "<p>still here</p>");
    app.close();
}

#[tokio::test]
async fn broken_edits_keep_serving_the_previous_version() {
    let files = site();
    let app = watched(&files);

    files.insert("pages/index.html", "{{#if x}}a{{/each}}");
    files.insert("pages/marker.html", "marker");
    eventually(&app, "/marker", "marker").await;

    assert_eq!(get(&app, "/").await.text(), "<nav>v1</nav><p>home</p>");
    app.close();
}

#[tokio::test]
async fn closed_apps_stop_reloading() {
    let files = site();
    let app = watched(&files);
    assert_eq!(app.check_interval().map(|i| i.get()), Some(INTERVAL));

    app.close();
    assert!(app.check_interval().is_none());

    files.insert("pages/late.html", "late");
    tokio::time::sleep(INTERVAL * 10).await;
    assert_eq!(get(&app, "/late").await.status(), StatusCode::NotFound);
}

#[tokio::test]
async fn unwatched_apps_ignore_changes() {
    let files = site();
    let app = App::builder().fs(files.clone()).build();
    assert!(app.check_interval().is_none());

    files.insert("pages/late.html", "late");
    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(get(&app, "/late").await.status(), StatusCode::NotFound);
}
