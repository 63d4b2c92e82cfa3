//! Shared helpers for end-to-end pipeline tests

use std::fs;
use std::path::{Path, PathBuf};

use srcscan::config::Settings;
use tiny_http::{Response, Server};
use tokio::sync::watch;

/// Serve fixed routes on an ephemeral local port; unknown paths get a 404.
pub fn serve(routes: &[(&str, &str)]) -> String {
    let server = Server::http("127.0.0.1:0").expect("bind test server");
    let port = server.server_addr().to_ip().expect("tcp listener").port();
    let routes: Vec<(String, String)> = routes
        .iter()
        .map(|(path, body)| (path.to_string(), body.to_string()))
        .collect();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let response = match routes.iter().find(|(route, _)| *route == path) {
                Some((_, body)) => Response::from_string(body.clone()),
                None => Response::from_string("not found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    format!("http://127.0.0.1:{port}")
}

/// Write an executable stub tool running the given shell body.
pub fn stub_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).expect("create stub dir");
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub tool");
    let mut perms = fs::metadata(&path).expect("stub metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("make stub executable");
    path
}

/// Settings pointing every directory into the test root. Stub binaries are
/// wired in by the caller.
pub fn test_settings(root: &Path) -> Settings {
    Settings {
        output_dir: root.join("output"),
        temp_dir: root.join("temp"),
        semgrep_rules: vec!["p/javascript".to_string()],
        ..Settings::default()
    }
}

pub fn no_cancel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    std::mem::forget(tx);
    rx
}
