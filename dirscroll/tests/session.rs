use std::path::{Path, PathBuf};
use std::time::Duration;

use dirscroll::{
    BalancerConfig, BalancerPhase, RowBuffer, SessionConfig, SortBy, SortSpec, StdFileSystem,
    ViewSession, Viewport,
};
use pretty_assertions::assert_eq;

mod common;
use common::unique_temp_dir;

fn photo_library(prefix: &str, count: usize) -> PathBuf {
    let dir = unique_temp_dir(prefix);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        std::fs::write(dir.join(format!("photo_{i:05}.jpg")), b"").unwrap();
    }
    dir
}

fn open(dir: &Path) -> (ViewSession, RowBuffer) {
    let config = SessionConfig::new(dir)
        .sort(SortSpec::new(SortBy::Name))
        .balancer(BalancerConfig::default().poll_interval(Duration::from_millis(2)));
    let (session, seed) =
        ViewSession::open(StdFileSystem, config, "root:", Viewport::new(0, 19, 20)).unwrap();
    (session, RowBuffer::from_seed(seed))
}

fn settle(session: &ViewSession, rows: &mut RowBuffer) {
    while let Ok(shift) = session.shifts().recv_timeout(Duration::from_millis(60)) {
        rows.apply(&shift);
    }
}

#[test]
fn scrolling_through_a_large_directory() {
    let dir = photo_library("scroll", 600);
    let (session, mut rows) = open(&dir);
    assert_eq!(rows.range().len(), 50);
    assert_eq!(rows.first_index(), 0);

    for first in (0..=580).step_by(13).chain((0..=580).rev().step_by(11)) {
        session.set_viewport(first, first + 19, 20);
        settle(&session, &mut rows);

        assert_eq!(rows.range(), session.materialized().range());
        assert!(rows.range().contains(first) && rows.range().contains(first + 19));
        let expected = format!("photo_{first:05}.jpg");
        assert_eq!(rows.get(first).unwrap().name, expected);
        assert!(rows.len() <= 50);
    }

    drop(session);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn refresh_picks_up_new_files() {
    let dir = photo_library("refresh", 40);
    let (mut session, mut rows) = open(&dir);
    assert_eq!(session.snapshot().len(), 40);

    std::fs::write(dir.join("photo_00000a.jpg"), b"").unwrap();
    let seed = session.refresh().unwrap();
    rows.replace(seed.generation, seed.first_index, seed.rows);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.len(), 41);
    assert_eq!(snapshot.index_of("root:photo_00000a.jpg"), Some(1));
    assert_eq!(rows.get(1).unwrap().identifier, "root:photo_00000a.jpg");
    assert_eq!(rows.generation(), session.materialized().generation);

    session.stop();
    assert_eq!(session.phase(), BalancerPhase::Stopped);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn jump_and_navigate() {
    let dir = photo_library("jump", 120);
    std::fs::create_dir_all(dir.join("albums")).unwrap();
    std::fs::write(dir.join("albums").join("cover.jpg"), b"").unwrap();
    let (mut session, mut rows) = open(&dir);

    let seed = session.reseed_at_identifier("root:photo_00100.jpg").unwrap();
    rows.replace(seed.generation, seed.first_index, seed.rows);
    settle(&session, &mut rows);
    assert!(rows.range().contains(101));
    assert_eq!(rows.range(), session.materialized().range());

    let seed = session.change_directory("root:albums").unwrap();
    assert_eq!(session.directory(), "root:albums");
    assert_eq!(seed.rows.len(), 1);
    assert_eq!(seed.rows[0].identifier, "root:albums/cover.jpg");
    assert_eq!(
        session.resolve(&seed.rows[0].identifier).unwrap(),
        dir.join("albums").join("cover.jpg")
    );

    drop(session);
    let _ = std::fs::remove_dir_all(&dir);
}
