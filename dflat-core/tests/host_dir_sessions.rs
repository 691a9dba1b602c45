//! Sessions served from a real directory and from a ZIP disk image.

use std::fs;
use std::io::{Cursor, Write};

use dflat_core::host::{HostSession, ScriptedHost, SessionEnd};
use dflat_core::protocol::Command;
use dflat_core::{load_image, FileServer, FileStore, HostDirStore, LineInterface, State};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn settle<S: FileStore>(server: &mut FileServer<ScriptedHost, S>) {
    let done = server.poll_until(100_000, |s| {
        s.lines().is_idle() && s.state() == State::WaitForSelect
    });
    assert!(done);
}

fn card() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("HELLO.BAS"), b"10 PRINT").unwrap();
    fs::create_dir(dir.path().join("Games")).unwrap();
    fs::write(dir.path().join("Games").join("elite.bin"), b"ELITE").unwrap();
    dir
}

#[test]
fn test_host_dir_load_save_delete() {
    let dir = card();
    let store = HostDirStore::new(dir.path()).unwrap();
    let host = ScriptedHost::with_sessions([
        HostSession::load("HELLO.BAS", 8),
        HostSession::save("NEW.TXT", b"saved"),
        HostSession::with_filename(Command::Delete, "HELLO.BAS"),
    ]);
    let mut server = FileServer::new(host, store);
    settle(&mut server);

    let logs = server.lines().logs();
    assert_eq!(logs[0].received, b"10 PRINT");
    assert_eq!(logs[0].end, SessionEnd::Completed);
    assert_eq!(fs::read(dir.path().join("NEW.TXT")).unwrap(), b"saved");
    assert!(!dir.path().join("HELLO.BAS").exists());
    assert!(server.lines().holds().is_empty());
}

#[test]
fn test_host_dir_mixed_case_directory() {
    let dir = card();
    let store = HostDirStore::new(dir.path()).unwrap();
    let host = ScriptedHost::with_sessions([
        HostSession::list(),
        HostSession::open_dir("GAMES"),
        HostSession::load("ELITE.BIN", 5),
    ]);
    let mut server = FileServer::new(host, store);
    settle(&mut server);

    let logs = server.lines().logs();
    assert_eq!(logs[0].received, b"GAMES        0     HELLO.BAS    8     \r\0");
    assert_eq!(server.current_path(), "/GAMES/");
    assert_eq!(logs[2].received, b"ELITE");
}

#[test]
fn test_zip_image_served() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_directory("utils/", SimpleFileOptions::default()).unwrap();
    writer.start_file("utils/copy.com", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"COPY").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let store = load_image(Cursor::new(bytes)).unwrap();
    let host = ScriptedHost::with_sessions([
        HostSession::open_dir("UTILS"),
        HostSession::load("COPY.COM", 4),
    ]);
    let mut server = FileServer::new(host, store);
    settle(&mut server);

    assert_eq!(server.lines().logs()[1].received, b"COPY");
}

#[test]
fn test_idle_port_stays_released() {
    let dir = card();
    let store = HostDirStore::new(dir.path()).unwrap();
    let mut server = FileServer::new(ScriptedHost::new(), store);
    for _ in 0..10 {
        server.poll();
    }
    assert_eq!(server.state(), State::WaitForSelect);
    assert!(!server.lines_mut().is_selected());
    assert!(server.lines().logs().is_empty());
}
